//! Embedding provider contract shared by every backend tier.

use async_trait::async_trait;

/// Turns text into fixed-length vectors.
///
/// Implementations must return vectors that went through [`normalize_embedding`]
/// so cosine similarity reduces to a dot product.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single query string.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Embed many texts, preserving input order. Backends with a batch endpoint
    /// should override this.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Short backend label used in logs and error reports (`"local"`, `"openai"`, ...).
    fn name(&self) -> &str;

    /// Identifier of the model producing the vectors; stored on every chunk.
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;
}

/// Replace non-finite components with zero and scale to unit length.
///
/// A zero-magnitude vector is returned as all zeros rather than NaN.
pub fn normalize_embedding(mut vec: Vec<f32>) -> Vec<f32> {
    for v in vec.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
    let magnitude = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude < 1e-10 {
        return vec;
    }
    for v in vec.iter_mut() {
        *v /= magnitude;
    }
    vec
}

/// Serialize a vector as little-endian `f32` bytes.
pub fn embedding_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_blob`]. Trailing bytes that do not form a full `f32`
/// are ignored.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
