//! Memory management: markdown files → chunked → embedded → hybrid search in SQLite.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod embeddings_fallback;
#[cfg(feature = "local-embeddings")]
pub mod embeddings_local;
pub mod embeddings_ollama;
pub mod embeddings_openai;
pub mod error;
pub mod manager;
pub mod schema;
pub mod search;
pub mod store;
pub mod store_sqlite;
#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use {
    config::MemoryConfig,
    embeddings::EmbeddingProvider,
    embeddings_fallback::EmbeddingChain,
    error::{MemoryError, Result},
    manager::{
        MemoryManager, MemoryStatus, ReadFileParams, ReadFileResult, SearchOptions, SyncOptions,
        SyncReport,
    },
    search::SearchResult,
    store::MemoryStore,
    store_sqlite::SqliteMemoryStore,
};
