//! Tiered embedding chain with sticky downgrade.
//!
//! Tiers are tried in priority order. Once a tier fails, the chain moves past it
//! for every later call made through this instance; it only comes back after
//! [`EmbeddingChain::reset`] or a fresh chain.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use {async_trait::async_trait, tracing::warn};

use crate::{embeddings::EmbeddingProvider, error::MemoryError};

pub struct EmbeddingChain {
    tiers: Vec<Box<dyn EmbeddingProvider>>,
    /// Index of the tier currently in use; `tiers.len()` once all have failed.
    level: AtomicUsize,
    /// Vector length actually observed from each tier (0 until first success).
    observed_dims: Vec<AtomicUsize>,
    /// Failure reasons for the tiers that were passed over.
    failures: Mutex<Vec<String>>,
}

impl EmbeddingChain {
    pub fn new(tiers: Vec<Box<dyn EmbeddingProvider>>) -> Self {
        let observed_dims = tiers.iter().map(|_| AtomicUsize::new(0)).collect();
        Self {
            tiers,
            level: AtomicUsize::new(0),
            observed_dims,
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Index of the tier that will serve the next call.
    pub fn current_level(&self) -> usize {
        self.level.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_level() >= self.tiers.len()
    }

    /// Tier serving calls, or the last configured tier once exhausted.
    fn current(&self) -> Option<(usize, &dyn EmbeddingProvider)> {
        let idx = self.current_level().min(self.tiers.len().checked_sub(1)?);
        Some((idx, self.tiers[idx].as_ref()))
    }

    /// Go back to the first tier. Nothing in the crate calls this on its own.
    pub fn reset(&self) {
        self.level.store(0, Ordering::Release);
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    fn exhausted_error(&self) -> anyhow::Error {
        let mut attempts = self
            .failures
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default();
        if attempts.is_empty() {
            attempts.push("no embedding provider configured".into());
        }
        anyhow::Error::new(MemoryError::exhausted(attempts))
    }

    /// Step past tier `failed` unless another caller already did.
    fn downgrade(&self, failed: usize, err: &anyhow::Error) {
        let tier = &self.tiers[failed];
        if self
            .level
            .compare_exchange(failed, failed + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(
                provider = tier.name(),
                model = tier.model_name(),
                error = %err,
                "embedding provider failed, falling back to next tier"
            );
            if let Ok(mut failures) = self.failures.lock() {
                failures.push(format!("{}: {err:#}", tier.name()));
            }
        }
    }

    async fn run(&self, request: Request<'_>) -> anyhow::Result<Vec<Vec<f32>>> {
        loop {
            let idx = self.current_level();
            let Some(tier) = self.tiers.get(idx) else {
                return Err(self.exhausted_error());
            };
            let result = match request {
                Request::One(text) => tier.embed(text).await.map(|v| vec![v]),
                Request::Batch(texts) => tier.embed_batch(texts).await.and_then(|out| {
                    anyhow::ensure!(
                        out.len() == texts.len(),
                        "{} returned {} vectors for {} inputs",
                        tier.name(),
                        out.len(),
                        texts.len()
                    );
                    Ok(out)
                }),
            };
            match result {
                Ok(vectors) => {
                    if let Some(dims) = vectors.first().map(Vec::len)
                        && dims > 0
                    {
                        self.observed_dims[idx].store(dims, Ordering::Release);
                    }
                    return Ok(vectors);
                },
                Err(err) => self.downgrade(idx, &err),
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Request<'a> {
    One(&'a str),
    Batch(&'a [String]),
}

#[async_trait]
impl EmbeddingProvider for EmbeddingChain {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.run(Request::One(text))
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(Request::Batch(texts)).await
    }

    fn name(&self) -> &str {
        self.current().map(|(_, t)| t.name()).unwrap_or("none")
    }

    fn model_name(&self) -> &str {
        self.current().map(|(_, t)| t.model_name()).unwrap_or("")
    }

    fn dimensions(&self) -> usize {
        match self.current() {
            Some((idx, tier)) => match self.observed_dims[idx].load(Ordering::Acquire) {
                0 => tier.dimensions(),
                observed => observed,
            },
            None => 0,
        }
    }
}
