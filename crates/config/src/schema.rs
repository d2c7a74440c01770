//! Shape of `mnemo.toml`.

use std::path::PathBuf;

use {secrecy::Secret, serde::Deserialize};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    pub memory: MemorySection,
    pub embeddings: EmbeddingsSection,
}

/// `[memory]`: where documents live and how they are indexed and searched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Workspace root holding `MEMORY.md` and `memory/`. Defaults to the current dir.
    pub root: Option<PathBuf>,
    /// SQLite index location. Defaults to `<data_dir>/memory.db`.
    pub db_path: Option<PathBuf>,
    pub chunk_tokens: usize,
    pub chunk_overlap: usize,
    pub vector_weight: f32,
    pub text_weight: f32,
    pub max_results: usize,
    pub min_score: f32,
    pub snippet_max_chars: usize,
    pub candidate_multiplier: usize,
    pub watch: bool,
    pub watch_debounce_ms: u64,
    pub cache_max_entries: Option<usize>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            root: None,
            db_path: None,
            chunk_tokens: 400,
            chunk_overlap: 80,
            vector_weight: 0.7,
            text_weight: 0.3,
            max_results: 6,
            min_score: 0.35,
            snippet_max_chars: 700,
            candidate_multiplier: 4,
            watch: true,
            watch_debounce_ms: 1500,
            cache_max_entries: None,
        }
    }
}

/// `[embeddings]`: the three provider tiers, tried in order.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingsSection {
    /// GGUF model for in-process embeddings (tier 1).
    pub local_model_path: Option<PathBuf>,
    pub remote_base_url: String,
    pub remote_model: String,
    pub remote_dims: usize,
    /// Without a key the remote tier is skipped.
    pub remote_api_key: Option<Secret<String>>,
    pub fallback_base_url: String,
    pub fallback_model: String,
    pub fallback_dims: usize,
    pub fallback_enabled: bool,
}

impl Default for EmbeddingsSection {
    fn default() -> Self {
        Self {
            local_model_path: None,
            remote_base_url: "https://api.openai.com".into(),
            remote_model: "text-embedding-3-small".into(),
            remote_dims: 1536,
            remote_api_key: None,
            fallback_base_url: "http://localhost:11434".into(),
            fallback_model: "nomic-embed-text".into(),
            fallback_dims: 768,
            fallback_enabled: true,
        }
    }
}
