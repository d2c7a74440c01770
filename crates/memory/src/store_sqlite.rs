//! SQLite-backed [`MemoryStore`] with an FTS5 keyword mirror.
use std::{
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use {
    async_trait::async_trait,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::warn,
};

use crate::{
    embeddings::embedding_to_blob,
    schema::{CacheRow, ChunkRow, FileRow, KeywordRow, run_migrations},
    store::MemoryStore,
};

pub struct SqliteMemoryStore {
    pool: SqlitePool,
    fts: AtomicBool,
}

impl SqliteMemoryStore {
    /// Wrap an already-migrated pool, assuming the full-text mirror exists.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            fts: AtomicBool::new(true),
        }
    }

    /// Wrap a pool whose full-text mirror should never be used.
    pub fn without_fts(pool: SqlitePool) -> Self {
        Self {
            pool,
            fts: AtomicBool::new(false),
        }
    }

    /// Open (creating if needed) the database at `db_path` and run migrations.
    /// `":memory:"` opens a private in-memory database.
    pub async fn open(db_path: &str) -> anyhow::Result<Self> {
        let pool = if db_path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect(":memory:")
                .await?
        } else {
            if let Some(parent) = std::path::Path::new(db_path).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            let options =
                SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?.create_if_missing(true);
            SqlitePoolOptions::new().connect_with(options).await?
        };
        let fts = run_migrations(&pool).await?;
        Ok(Self {
            pool,
            fts: AtomicBool::new(fts),
        })
    }

    fn disable_fts(&self, err: &sqlx::Error) {
        if self.fts.swap(false, Ordering::AcqRel) {
            warn!(error = %err, "full-text index failed, keyword search disabled");
        }
    }

    async fn mirror_fts(&self, path: &str, chunks: &[ChunkRow]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks_fts WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        for c in chunks {
            sqlx::query(
                "INSERT INTO chunks_fts (text, id, path, model, start_line, end_line)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&c.text)
            .bind(&c.id)
            .bind(&c.path)
            .bind(&c.model)
            .bind(c.start_line)
            .bind(c.end_line)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn get_file(&self, path: &str) -> anyhow::Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT path, hash, mtime, size FROM files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_files(&self) -> anyhow::Result<Vec<FileRow>> {
        let rows =
            sqlx::query_as::<_, FileRow>("SELECT path, hash, mtime, size FROM files ORDER BY path")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn upsert_file(&self, file: &FileRow) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO files (path, hash, mtime, size) VALUES (?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                hash = excluded.hash, mtime = excluded.mtime, size = excluded.size",
        )
        .bind(&file.path)
        .bind(&file.hash)
        .bind(file.mtime)
        .bind(file.size)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_chunks_for_file(
        &self,
        path: &str,
        chunks: &[ChunkRow],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        for c in chunks {
            sqlx::query(
                "INSERT INTO chunks
                    (id, path, start_line, end_line, hash, model, text, embedding, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&c.id)
            .bind(&c.path)
            .bind(c.start_line)
            .bind(c.end_line)
            .bind(&c.hash)
            .bind(&c.model)
            .bind(&c.text)
            .bind(c.embedding.as_deref())
            .bind(c.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        if self.fts_available()
            && let Err(e) = self.mirror_fts(path, chunks).await
        {
            self.disable_fts(&e);
        }
        Ok(())
    }

    async fn delete_chunks_for_file(&self, path: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM chunks WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        if self.fts_available()
            && let Err(e) = sqlx::query("DELETE FROM chunks_fts WHERE path = ?")
                .bind(path)
                .execute(&self.pool)
                .await
        {
            self.disable_fts(&e);
        }
        Ok(())
    }

    async fn get_chunks_for_file(&self, path: &str) -> anyhow::Result<Vec<ChunkRow>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT id, path, start_line, end_line, hash, model, text, embedding, updated_at
             FROM chunks WHERE path = ? ORDER BY start_line, end_line",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_embedded_chunks(&self) -> anyhow::Result<Vec<ChunkRow>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT id, path, start_line, end_line, hash, model, text, embedding, updated_at
             FROM chunks WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_chunks(&self) -> anyhow::Result<usize> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    fn fts_available(&self) -> bool {
        self.fts.load(Ordering::Acquire)
    }

    async fn keyword_search(
        &self,
        fts_query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<KeywordRow>> {
        anyhow::ensure!(self.fts_available(), "full-text index unavailable");
        let result = sqlx::query_as::<_, KeywordRow>(
            "SELECT id, path,
                    CAST(start_line AS INTEGER) AS start_line,
                    CAST(end_line AS INTEGER) AS end_line,
                    text, bm25(chunks_fts) AS rank
             FROM chunks_fts
             WHERE chunks_fts MATCH ?
             ORDER BY rank
             LIMIT ?",
        )
        .bind(fts_query)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await;
        Ok(result?)
    }

    async fn get_cached_embedding(&self, hash: &str) -> anyhow::Result<Option<CacheRow>> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT hash, embedding, dims, updated_at FROM embedding_cache WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn put_cached_embedding(&self, hash: &str, embedding: &[f32]) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO embedding_cache (hash, embedding, dims, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(hash) DO UPDATE SET
                embedding = excluded.embedding,
                dims = excluded.dims,
                updated_at = excluded.updated_at",
        )
        .bind(hash)
        .bind(embedding_to_blob(embedding))
        .bind(i64::try_from(embedding.len()).unwrap_or(0))
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_cached_embeddings(&self) -> anyhow::Result<usize> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM embedding_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    async fn evict_embedding_cache(&self, max_rows: usize) -> anyhow::Result<usize> {
        let count = self.count_cached_embeddings().await?;
        if count <= max_rows {
            return Ok(0);
        }
        let excess = i64::try_from(count - max_rows).unwrap_or(i64::MAX);
        let result = sqlx::query(
            "DELETE FROM embedding_cache WHERE hash IN (
                SELECT hash FROM embedding_cache ORDER BY updated_at ASC, hash ASC LIMIT ?
             )",
        )
        .bind(excess)
        .execute(&self.pool)
        .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(0))
    }

    async fn get_meta(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set_meta(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
