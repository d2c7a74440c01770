//! Turn a loaded `mnemo.toml` into a ready [`MemoryManager`].

use std::path::PathBuf;

use {
    mnemo_config::{EmbeddingsSection, MemorySection, MnemoConfig},
    mnemo_memory::{
        EmbeddingChain, EmbeddingProvider, MemoryConfig, MemoryManager, SqliteMemoryStore,
        embeddings_ollama::OllamaEmbeddingProvider, embeddings_openai::OpenAiEmbeddingProvider,
    },
    secrecy::{ExposeSecret, Secret},
    tracing::{info, warn},
};

pub async fn build_manager(
    config: &MnemoConfig,
    root_override: Option<PathBuf>,
) -> anyhow::Result<MemoryManager> {
    let root = match root_override.or_else(|| config.memory.root.clone()) {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let db_path = config
        .memory
        .db_path
        .clone()
        .unwrap_or_else(|| mnemo_config::data_dir().join("memory.db"));

    let memory_config = memory_config(&config.memory, root, db_path);
    let store = SqliteMemoryStore::open(&memory_config.db_path).await?;
    let chain = build_chain(&config.embeddings);

    info!(
        root = %memory_config.root.display(),
        db = %memory_config.db_path,
        provider = chain.name(),
        "memory manager ready"
    );
    Ok(MemoryManager::new(memory_config, Box::new(store), chain))
}

pub fn memory_config(section: &MemorySection, root: PathBuf, db_path: PathBuf) -> MemoryConfig {
    MemoryConfig {
        root,
        db_path: db_path.to_string_lossy().into_owned(),
        chunk_tokens: section.chunk_tokens,
        chunk_overlap: section.chunk_overlap,
        vector_weight: section.vector_weight,
        text_weight: section.text_weight,
        max_results: section.max_results,
        min_score: section.min_score,
        candidate_multiplier: section.candidate_multiplier,
        snippet_max_chars: section.snippet_max_chars,
        watch_debounce: std::time::Duration::from_millis(section.watch_debounce_ms),
        cache_max_entries: section.cache_max_entries,
    }
}

/// Re-scan period for `watch` when filesystem events are disabled in config.
pub fn poll_interval(section: &MemorySection) -> Option<std::time::Duration> {
    (!section.watch).then(|| std::time::Duration::from_millis(section.watch_debounce_ms.max(1)))
}

/// Local model, then the remote API (when a key is present), then the
/// fallback model server.
pub fn build_chain(section: &EmbeddingsSection) -> EmbeddingChain {
    let mut tiers: Vec<Box<dyn EmbeddingProvider>> = Vec::new();

    #[cfg(feature = "local-embeddings")]
    if let Some(path) = &section.local_model_path {
        match mnemo_memory::embeddings_local::LocalEmbeddingProvider::load(path) {
            Ok(provider) => tiers.push(Box::new(provider)),
            Err(e) => warn!(path = %path.display(), error = %e, "local embedding model unavailable"),
        }
    }
    #[cfg(not(feature = "local-embeddings"))]
    if section.local_model_path.is_some() {
        warn!("local_model_path is set but this build has no local-embeddings support");
    }

    if let Some(key) = &section.remote_api_key {
        tiers.push(Box::new(
            OpenAiEmbeddingProvider::new(Secret::new(key.expose_secret().clone()))
                .with_base_url(section.remote_base_url.clone())
                .with_model(section.remote_model.clone(), section.remote_dims),
        ));
    }

    if section.fallback_enabled {
        tiers.push(Box::new(
            OllamaEmbeddingProvider::new()
                .with_base_url(section.fallback_base_url.clone())
                .with_model(section.fallback_model.clone(), section.fallback_dims),
        ));
    }

    if tiers.is_empty() {
        warn!("no embedding provider configured, search will be keyword-only");
    }
    EmbeddingChain::new(tiers)
}
