//! Row types and SQLite schema for the memory index.

use {
    sqlx::{FromRow, SqlitePool},
    tracing::warn,
};

/// One tracked document.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRow {
    /// Root-relative path with `/` separators.
    pub path: String,
    /// Content hash; empty when the last index pass could not embed the file.
    pub hash: String,
    pub mtime: i64,
    pub size: i64,
}

/// One indexed chunk of a document.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkRow {
    pub id: String,
    pub path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub hash: String,
    /// Embedding model id, or empty when the chunk is keyword-only.
    pub model: String,
    pub text: String,
    /// Little-endian `f32` bytes.
    pub embedding: Option<Vec<u8>>,
    /// Unix milliseconds.
    pub updated_at: i64,
}

/// A cached vector keyed by chunk content hash.
#[derive(Debug, Clone, FromRow)]
pub struct CacheRow {
    pub hash: String,
    pub embedding: Vec<u8>,
    pub dims: i64,
    pub updated_at: i64,
}

/// A full-text match. `rank` is the engine's bm25 rank (lower is better).
#[derive(Debug, Clone, FromRow)]
pub struct KeywordRow {
    pub id: String,
    pub path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
    pub rank: f64,
}

const CORE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS files (
        path  TEXT PRIMARY KEY,
        hash  TEXT NOT NULL,
        mtime INTEGER NOT NULL,
        size  INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chunks (
        id         TEXT PRIMARY KEY,
        path       TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line   INTEGER NOT NULL,
        hash       TEXT NOT NULL,
        model      TEXT NOT NULL,
        text       TEXT NOT NULL,
        embedding  BLOB,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path)",
    "CREATE TABLE IF NOT EXISTS embedding_cache (
        hash       TEXT PRIMARY KEY,
        embedding  BLOB NOT NULL,
        dims       INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_embedding_cache_updated_at ON embedding_cache(updated_at)",
    "CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

const FTS_SCHEMA: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
        text,
        id UNINDEXED,
        path UNINDEXED,
        model UNINDEXED,
        start_line UNINDEXED,
        end_line UNINDEXED
    )";

/// Create the memory tables. Returns whether the full-text mirror is usable;
/// a SQLite build without FTS5 still gets a working (vector-only) index.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<bool> {
    for stmt in CORE_SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    match sqlx::query(FTS_SCHEMA).execute(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            warn!(error = %e, "full-text index unavailable, keyword search disabled");
            Ok(false)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        assert!(run_migrations(&pool).await.unwrap());
        assert!(run_migrations(&pool).await.unwrap());

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in ["chunks", "chunks_fts", "embedding_cache", "files", "meta"] {
            assert!(names.contains(&expected), "missing table {expected}");
        }
    }
}
