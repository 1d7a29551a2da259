use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS read_articles (
            slug TEXT PRIMARY KEY,
            read_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS read_articles_read_at ON read_articles(read_at DESC);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
