use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::config::StorageOptions;
use crate::providers::{ReadSet, ReadStateProvider};

mod schema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub slug: String,
    pub read_at: i64,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn mark_read(&self, slug: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO read_articles (slug, read_at) VALUES (?1, ?2)
                 ON CONFLICT(slug) DO UPDATE SET read_at = excluded.read_at",
                params![slug, now],
            )
            .with_context(|| format!("marking '{slug}' as read"))?;
            Ok(())
        })
    }

    pub fn fetch_read_record(&self, slug: &str) -> Result<Option<ReadRecord>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT slug, read_at FROM read_articles WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(ReadRecord {
                        slug: row.get(0)?,
                        read_at: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("looking up read state")
        })
    }

    pub fn fetch_read_slugs(&self) -> Result<ReadSet> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT slug FROM read_articles ORDER BY read_at DESC")
                .context("preparing read state query")?;
            let slugs = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<ReadSet, _>>()?;
            Ok(slugs)
        })
    }

    /// Drops read marks for posts that no longer exist.
    pub fn forget_read(&self, slugs: &[String]) -> Result<usize> {
        if slugs.is_empty() {
            return Ok(0);
        }
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("DELETE FROM read_articles WHERE slug = ?1")
                .context("preparing read state delete")?;
            let mut removed = 0;
            for slug in slugs {
                removed += stmt
                    .execute(params![slug])
                    .with_context(|| format!("forgetting read state for '{slug}'"))?;
            }
            Ok(removed)
        })
    }
}

impl ReadStateProvider for StorageHandle {
    fn is_read(&self, slug: &str) -> bool {
        match self.fetch_read_record(slug) {
            Ok(record) => record.is_some(),
            Err(err) => {
                tracing::warn!(?err, slug, "read state lookup failed");
                false
            }
        }
    }
}

pub fn init(storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &storage.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}
