use std::{path::PathBuf, time::Duration};

/// Filename of the primary long-term memory document inside the memory root.
pub const PRIMARY_FILE: &str = "MEMORY.md";
/// Lower-case alias accepted for the primary document.
pub const PRIMARY_FILE_ALIAS: &str = "memory.md";
/// Directory (relative to the memory root) holding dated log documents.
pub const LOG_DIR: &str = "memory";
/// Extension shared by every managed document.
pub const MEMORY_EXTENSION: &str = "md";

/// Configuration for the memory subsystem.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Workspace root holding `MEMORY.md` and the `memory/` log directory.
    pub root: PathBuf,
    /// Path to the SQLite database file (or `:memory:` for tests).
    pub db_path: String,
    /// Target chunk size in tokens (approximated as `chars / 4`).
    pub chunk_tokens: usize,
    /// Overlap between consecutive chunks in tokens.
    pub chunk_overlap: usize,
    /// Weight for vector similarity in hybrid search (0.0–1.0).
    pub vector_weight: f32,
    /// Weight for keyword/FTS similarity in hybrid search (0.0–1.0).
    pub text_weight: f32,
    /// Default `max_results` when a search does not specify one.
    pub max_results: usize,
    /// Default `min_score` when a search does not specify one.
    pub min_score: f32,
    /// Each search path over-fetches `max_results * candidate_multiplier` rows.
    pub candidate_multiplier: usize,
    /// Snippets in search results are cut to this many characters.
    pub snippet_max_chars: usize,
    /// Debounce window applied to file-system events.
    pub watch_debounce: Duration,
    /// Evict the oldest embedding-cache rows beyond this count after each sync.
    pub cache_max_entries: Option<usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            db_path: "memory.db".into(),
            chunk_tokens: 400,
            chunk_overlap: 80,
            vector_weight: 0.7,
            text_weight: 0.3,
            max_results: 6,
            min_score: 0.35,
            candidate_multiplier: 4,
            snippet_max_chars: 700,
            watch_debounce: Duration::from_millis(1500),
            cache_max_entries: None,
        }
    }
}

impl MemoryConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }
}
