use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::posts::PostRecord;
use crate::providers::{
    CategoryProvider, IndexProvider, PersistenceError, PersistenceService, ProviderError,
};
use crate::selection::compute_removed_slugs;

const BLOGS_DIR: &str = "public/blogs";
const INDEX_FILE: &str = "index.json";
const CATEGORIES_FILE: &str = "categories.json";
const TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoriesFile {
    Wrapped { categories: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Debug, Serialize)]
struct CategoriesOut<'a> {
    categories: &'a [String],
}

/// Local checkout of a blog repository: `public/blogs/index.json`,
/// `public/blogs/categories.json` and one directory per post slug.
#[derive(Debug, Clone)]
pub struct BlogRepo {
    root: PathBuf,
}

impl BlogRepo {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blogs_dir(&self) -> PathBuf {
        self.root.join(BLOGS_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.blogs_dir().join(INDEX_FILE)
    }

    pub fn categories_path(&self) -> PathBuf {
        self.blogs_dir().join(CATEGORIES_FILE)
    }

    pub fn post_dir(&self, slug: &str) -> Result<PathBuf, PersistenceError> {
        let mut components = Path::new(slug).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.blogs_dir().join(slug)),
            _ => Err(PersistenceError::InvalidSlug(slug.to_string())),
        }
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>, ProviderError> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "blog file missing, treating as empty");
                Ok(None)
            }
            Err(source) => Err(ProviderError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl IndexProvider for BlogRepo {
    fn fetch_index(&self) -> Result<Vec<PostRecord>, ProviderError> {
        let path = self.index_path();
        let Some(raw) = self.read_optional(&path)? else {
            return Ok(Vec::new());
        };
        let items: Vec<PostRecord> =
            serde_json::from_str(&raw).map_err(|source| ProviderError::Parse {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(count = items.len(), path = %path.display(), "loaded blog index");
        Ok(items)
    }
}

impl CategoryProvider for BlogRepo {
    fn fetch_categories(&self) -> Result<Vec<String>, ProviderError> {
        let path = self.categories_path();
        let Some(raw) = self.read_optional(&path)? else {
            return Ok(Vec::new());
        };
        let parsed: CategoriesFile =
            serde_json::from_str(&raw).map_err(|source| ProviderError::Parse {
                path: path.clone(),
                source,
            })?;
        Ok(match parsed {
            CategoriesFile::Wrapped { categories } | CategoriesFile::Bare(categories) => {
                categories
            }
        })
    }
}

impl PersistenceService for BlogRepo {
    fn save(
        &self,
        original: &[PostRecord],
        edited: &[PostRecord],
        categories: &[String],
    ) -> Result<(), PersistenceError> {
        if !self.root.is_dir() {
            return Err(PersistenceError::MissingRoot(self.root.clone()));
        }
        let removed = compute_removed_slugs(original, edited);
        let doomed = removed
            .iter()
            .map(|slug| self.post_dir(slug))
            .collect::<Result<Vec<_>, _>>()?;

        let blogs_dir = self.blogs_dir();
        fs::create_dir_all(&blogs_dir).map_err(|source| PersistenceError::Write {
            path: blogs_dir.clone(),
            source,
        })?;

        let index = serde_json::to_string_pretty(edited).map_err(|source| {
            PersistenceError::Serialize {
                what: "blog index",
                source,
            }
        })?;
        let categories = serde_json::to_string_pretty(&CategoriesOut { categories }).map_err(
            |source| PersistenceError::Serialize {
                what: "categories",
                source,
            },
        )?;
        write_atomically(&self.index_path(), &index)?;
        write_atomically(&self.categories_path(), &categories)?;

        for dir in doomed {
            match fs::remove_dir_all(&dir) {
                Ok(()) => tracing::info!(path = %dir.display(), "removed post directory"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(path = %dir.display(), "post directory already absent");
                }
                Err(source) => {
                    return Err(PersistenceError::Remove { path: dir, source });
                }
            }
        }
        tracing::info!(
            removed = removed.len(),
            remaining = edited.len(),
            "blog index saved"
        );
        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    let tmp = path.with_extension(TMP_EXTENSION);
    let mut body = contents.to_string();
    body.push('\n');
    fs::write(&tmp, body).map_err(|source| PersistenceError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::Value;
    use tempfile::TempDir;

    const INDEX: &str = r#"[
  {"slug": "hello-world", "title": "Hello", "date": "2024-03-01", "category": "Life", "tags": ["intro"]},
  {"slug": "rust-notes", "title": "Rust notes", "date": "2023-12-31T10:00:00Z", "category": "Tech"},
  {"slug": "draft", "title": "Draft", "date": "2024-01-15"}
]"#;

    fn seeded_repo() -> anyhow::Result<(TempDir, BlogRepo)> {
        let temp = TempDir::new()?;
        let repo = BlogRepo::open(temp.path());
        fs::create_dir_all(repo.blogs_dir())?;
        fs::write(repo.index_path(), INDEX)?;
        fs::write(repo.categories_path(), r#"{"categories": ["Tech", "Life"]}"#)?;
        for slug in ["hello-world", "rust-notes", "draft"] {
            let dir = repo.blogs_dir().join(slug);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("index.md"), format!("# {slug}\n"))?;
        }
        Ok((temp, repo))
    }

    #[test]
    fn loads_index_and_categories() -> anyhow::Result<()> {
        let (_temp, repo) = seeded_repo()?;
        let items = repo.fetch_index()?;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title(), "Hello");
        assert_eq!(items[2].category, None);
        assert_eq!(repo.fetch_categories()?, vec!["Tech", "Life"]);
        Ok(())
    }

    #[test]
    fn accepts_bare_category_arrays_and_missing_files() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let repo = BlogRepo::open(temp.path());
        assert!(repo.fetch_index()?.is_empty());
        assert!(repo.fetch_categories()?.is_empty());
        fs::create_dir_all(repo.blogs_dir())?;
        fs::write(repo.categories_path(), r#"["A", "B"]"#)?;
        assert_eq!(repo.fetch_categories()?, vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn malformed_index_reports_parse_error() -> anyhow::Result<()> {
        let (_temp, repo) = seeded_repo()?;
        fs::write(repo.index_path(), "{ not json")?;
        assert_matches!(repo.fetch_index(), Err(ProviderError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn save_rewrites_index_and_removes_post_directories() -> anyhow::Result<()> {
        let (_temp, repo) = seeded_repo()?;
        let original = repo.fetch_index()?;
        let edited: Vec<PostRecord> = original
            .iter()
            .filter(|item| item.slug != "draft")
            .cloned()
            .collect();
        let categories = vec!["Tech".to_string(), "Life".to_string(), "Notes".to_string()];

        repo.save(&original, &edited, &categories)?;

        assert!(!repo.blogs_dir().join("draft").exists());
        assert!(repo.blogs_dir().join("hello-world/index.md").exists());
        let reloaded = repo.fetch_index()?;
        assert_eq!(reloaded, edited);
        let raw: Value = serde_json::from_str(&fs::read_to_string(repo.index_path())?)?;
        assert_eq!(raw[0]["tags"][0], "intro");
        assert_eq!(repo.fetch_categories()?, categories);
        assert!(!repo.index_path().with_extension(TMP_EXTENSION).exists());
        Ok(())
    }

    #[test]
    fn save_rejects_slugs_that_escape_the_blog_dir() -> anyhow::Result<()> {
        let (_temp, repo) = seeded_repo()?;
        let original = vec![PostRecord::new("../../etc", "2024-01-01")];
        let result = repo.save(&original, &[], &[]);
        assert_matches!(result, Err(PersistenceError::InvalidSlug(slug)) if slug == "../../etc");
        assert_eq!(repo.fetch_index()?.len(), 3);
        Ok(())
    }

    #[test]
    fn save_fails_without_checkout() {
        let repo = BlogRepo::open("/definitely/not/a/blog/checkout");
        assert_matches!(
            repo.save(&[], &[], &[]),
            Err(PersistenceError::MissingRoot(_))
        );
    }
}
