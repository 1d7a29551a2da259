//! Contracts between the blog view and the services around it.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::posts::PostRecord;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("blog checkout not found at {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("refusing to remove post directory for slug '{0}'")]
    InvalidSlug(String),
    #[error("serializing {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("removing {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Supplies the flat list of post records.
pub trait IndexProvider {
    fn fetch_index(&self) -> Result<Vec<PostRecord>, ProviderError>;
}

/// Supplies the ordered list of known category names.
pub trait CategoryProvider {
    fn fetch_categories(&self) -> Result<Vec<String>, ProviderError>;
}

pub trait ReadStateProvider {
    fn is_read(&self, slug: &str) -> bool;
}

pub trait AuthProvider {
    fn is_authenticated(&self) -> bool;
    fn import_credential(&self, content: &str);
}

/// Writes an edited post list back to wherever the index lives.
pub trait PersistenceService {
    fn save(
        &self,
        original: &[PostRecord],
        edited: &[PostRecord],
        categories: &[String],
    ) -> Result<(), PersistenceError>;
}

/// Holds the imported private key for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    key: Arc<RwLock<Option<String>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthProvider for KeyStore {
    fn is_authenticated(&self) -> bool {
        self.key.read().is_some()
    }

    fn import_credential(&self, content: &str) {
        let trimmed = content.trim();
        *self.key.write() = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

/// Snapshot of the slugs the reader has opened.
#[derive(Debug, Clone, Default)]
pub struct ReadSet {
    slugs: HashSet<String>,
}

impl ReadSet {
    pub fn insert(&mut self, slug: impl Into<String>) {
        self.slugs.insert(slug.into());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slugs.len()
    }
}

impl FromIterator<String> for ReadSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            slugs: iter.into_iter().collect(),
        }
    }
}

impl ReadStateProvider for ReadSet {
    fn is_read(&self, slug: &str) -> bool {
        self.slugs.contains(slug)
    }
}
