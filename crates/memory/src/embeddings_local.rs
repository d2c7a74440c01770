//! First tier: in-process GGUF embedding model through llama.cpp.
//!
//! Inference is CPU-bound, so every batch runs on the blocking pool with its own
//! context. The model itself is shared between batches.

use std::{
    num::NonZeroU32,
    path::Path,
    sync::{Arc, OnceLock},
};

use {
    anyhow::Context,
    async_trait::async_trait,
    llama_cpp_2::{
        context::params::LlamaContextParams,
        llama_backend::LlamaBackend,
        llama_batch::LlamaBatch,
        model::{AddBos, LlamaModel, params::LlamaModelParams},
    },
    tracing::info,
};

use crate::embeddings::{EmbeddingProvider, normalize_embedding};

/// Context window used for embedding; longer chunks are truncated.
const CONTEXT_TOKENS: u32 = 2048;

static BACKEND: OnceLock<Result<LlamaBackend, String>> = OnceLock::new();

fn backend() -> anyhow::Result<&'static LlamaBackend> {
    BACKEND
        .get_or_init(|| LlamaBackend::init().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| anyhow::anyhow!("llama.cpp backend unavailable: {e}"))
}

pub struct LocalEmbeddingProvider {
    model: Arc<LlamaModel>,
    model_name: String,
    dims: usize,
}

impl LocalEmbeddingProvider {
    /// Load a GGUF embedding model from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        anyhow::ensure!(
            path.exists(),
            "local embedding model not found at {}",
            path.display()
        );
        let backend = backend()?;
        let model = LlamaModel::load_from_file(backend, path, &LlamaModelParams::default())
            .with_context(|| format!("failed to load GGUF model {}", path.display()))?;
        let dims = usize::try_from(model.n_embd()).unwrap_or(0);
        anyhow::ensure!(dims > 0, "model {} reports no embedding size", path.display());

        let model_name = model_name_from_path(path);
        info!(model = %model_name, dims, "local embedding model loaded");
        Ok(Self {
            model: Arc::new(model),
            model_name,
            dims,
        })
    }
}

fn model_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn embed_blocking(model: &LlamaModel, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
    let backend = backend()?;
    let params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(CONTEXT_TOKENS))
        .with_n_batch(CONTEXT_TOKENS)
        .with_n_ubatch(CONTEXT_TOKENS)
        .with_embeddings(true);
    let mut ctx = model
        .new_context(backend, params)
        .context("failed to create llama.cpp context")?;

    let mut out = Vec::with_capacity(texts.len());
    for text in texts {
        let mut tokens = model
            .str_to_token(text, AddBos::Always)
            .context("tokenization failed")?;
        tokens.truncate(CONTEXT_TOKENS as usize);

        let mut batch = LlamaBatch::new(CONTEXT_TOKENS as usize, 1);
        batch.add_sequence(&tokens, 0, false)?;
        ctx.clear_kv_cache();
        ctx.decode(&mut batch).context("llama.cpp decode failed")?;
        let embedding = ctx
            .embeddings_seq_ith(0)
            .context("model produced no sequence embedding")?;
        out.push(normalize_embedding(embedding.to_vec()));
    }
    Ok(out)
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || embed_blocking(&model, &texts)).await?
    }

    fn name(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
