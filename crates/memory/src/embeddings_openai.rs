//! Remote embeddings tier: any OpenAI-compatible `/v1/embeddings` endpoint.
use async_trait::async_trait;
use {
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
};

use crate::embeddings::{EmbeddingProvider, normalize_embedding};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_DIMS: usize = 1536;

pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: secrecy::Secret<String>,
    base_url: String,
    model: String,
    dims: usize,
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: secrecy::Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: normalize_base_url(DEFAULT_BASE_URL),
            model: DEFAULT_MODEL.to_string(),
            dims: DEFAULT_DIMS,
        }
    }

    pub fn with_model(mut self, model: String, dims: usize) -> Self {
        self.model = model;
        self.dims = dims;
        self
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = normalize_base_url(&url);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Order response rows by their server-provided `index`; rows without one keep
/// their position.
fn into_ordered_vectors(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    for (pos, row) in data.iter_mut().enumerate() {
        row.index.get_or_insert(pos);
    }
    data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
    data.into_iter()
        .map(|d| normalize_embedding(d.embedding))
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let req = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let resp = self
            .client
            .post(embeddings_endpoint(&self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingResponse>()
            .await?;

        anyhow::ensure!(
            resp.data.len() == texts.len(),
            "embedding response has {} rows for {} inputs",
            resp.data.len(),
            texts.len()
        );
        Ok(into_ordered_vectors(resp.data))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
