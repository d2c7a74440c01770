//! Persistence contract for the memory index.

use async_trait::async_trait;

use crate::schema::{CacheRow, ChunkRow, FileRow, KeywordRow};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    // files
    async fn get_file(&self, path: &str) -> anyhow::Result<Option<FileRow>>;
    async fn list_files(&self) -> anyhow::Result<Vec<FileRow>>;
    async fn upsert_file(&self, file: &FileRow) -> anyhow::Result<()>;
    async fn delete_file(&self, path: &str) -> anyhow::Result<()>;

    // chunks
    /// Atomically drop every chunk of `path` and insert `chunks` in its place.
    async fn replace_chunks_for_file(&self, path: &str, chunks: &[ChunkRow])
    -> anyhow::Result<()>;
    async fn delete_chunks_for_file(&self, path: &str) -> anyhow::Result<()>;
    async fn get_chunks_for_file(&self, path: &str) -> anyhow::Result<Vec<ChunkRow>>;
    /// Every chunk carrying a vector, for a linear similarity scan.
    async fn list_embedded_chunks(&self) -> anyhow::Result<Vec<ChunkRow>>;
    async fn count_chunks(&self) -> anyhow::Result<usize>;

    // full-text mirror
    /// Whether keyword search can currently be served.
    fn fts_available(&self) -> bool;
    async fn keyword_search(&self, fts_query: &str, limit: usize)
    -> anyhow::Result<Vec<KeywordRow>>;

    // embedding cache
    async fn get_cached_embedding(&self, hash: &str) -> anyhow::Result<Option<CacheRow>>;
    async fn put_cached_embedding(&self, hash: &str, embedding: &[f32]) -> anyhow::Result<()>;
    async fn count_cached_embeddings(&self) -> anyhow::Result<usize>;
    /// Delete the least recently written rows until at most `max_rows` remain.
    async fn evict_embedding_cache(&self, max_rows: usize) -> anyhow::Result<usize>;

    // metadata
    async fn get_meta(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_meta(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
