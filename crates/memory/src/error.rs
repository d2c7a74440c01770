//! Typed errors surfaced by the public [`MemoryManager`](crate::manager::MemoryManager) operations.
//!
//! Backend seams (the store and provider traits) speak `anyhow`; everything that
//! crosses the manager boundary is folded into [`MemoryError`]. The type is `Clone`
//! so one coalesced sync result can be handed to every waiter.

use std::sync::Arc;

pub type Result<T, E = MemoryError> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryError {
    /// Every tier of the embedding chain failed (or none is configured).
    #[error("all embedding providers failed: {}", attempts.join("; "))]
    EmbeddingExhausted { attempts: Vec<String> },

    /// A read request pointed outside the memory root.
    #[error("path escapes memory root: {0}")]
    PathTraversal(String),

    /// A read request named something other than a markdown document.
    #[error("unsupported memory file: {0}")]
    UnsupportedFile(String),

    #[error("memory file not found: {0}")]
    FileNotFound(String),

    #[error("io error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("store error: {0:#}")]
    Store(Arc<anyhow::Error>),

    #[error("{0:#}")]
    Internal(Arc<anyhow::Error>),
}

impl MemoryError {
    pub fn exhausted(attempts: Vec<String>) -> Self {
        Self::EmbeddingExhausted { attempts }
    }

    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(Arc::new(err))
    }

    pub fn is_embedding_exhausted(&self) -> bool {
        matches!(self, Self::EmbeddingExhausted { .. })
    }
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        // Provider chains wrap their exhaustion error in anyhow; unwrap it again.
        match err.downcast::<MemoryError>() {
            Ok(inner) => inner,
            Err(other) => Self::Internal(Arc::new(other)),
        }
    }
}
