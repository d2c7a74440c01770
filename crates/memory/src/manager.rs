//! Memory manager: orchestrates file sync, chunking, embedding, and search.
use std::{
    collections::{HashMap, HashSet},
    path::{Component, Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use {
    futures::{
        FutureExt,
        future::{BoxFuture, Shared},
    },
    serde::Serialize,
    tracing::{debug, info, warn},
    walkdir::WalkDir,
};

use crate::{
    chunker::{Chunk, chunk_markdown, hash_text},
    config::{LOG_DIR, MEMORY_EXTENSION, MemoryConfig, PRIMARY_FILE, PRIMARY_FILE_ALIAS},
    embeddings::{EmbeddingProvider, blob_to_embedding, embedding_to_blob},
    embeddings_fallback::EmbeddingChain,
    error::{MemoryError, Result},
    schema::{ChunkRow, FileRow},
    search::{self, Candidate, FusionWeights, SearchResult},
    store::MemoryStore,
};

/// Meta key recording the embedding model of the last complete sync.
const META_EMBEDDING_MODEL: &str = "embedding_model";
/// Lines returned by [`MemoryManager::read_file`] when no count is given.
pub const DEFAULT_READ_LINES: usize = 50;

type SharedSync = Shared<BoxFuture<'static, Result<SyncReport>>>;

pub struct MemoryManager {
    inner: Arc<Inner>,
    #[cfg(feature = "file-watcher")]
    watcher: Mutex<Option<crate::watcher::MemoryWatcher>>,
}

struct Inner {
    config: MemoryConfig,
    store: Box<dyn MemoryStore>,
    embedder: EmbeddingChain,
    dirty: Arc<AtomicBool>,
    /// The running sync pass, tagged with its id. The pass clears it on exit.
    inflight: Mutex<Option<(u64, SharedSync)>>,
    next_sync_id: AtomicU64,
}

/// Status info about the memory system.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatus {
    pub total_files: usize,
    pub total_chunks: usize,
    pub cached_embeddings: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    /// Index of the embedding tier in use (equal to `embedding_tiers` once all failed).
    pub fallback_level: usize,
    pub embedding_tiers: usize,
    pub fts_available: bool,
    pub dirty: bool,
}

/// Sync report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub files_updated: usize,
    pub files_unchanged: usize,
    pub files_removed: usize,
    pub errors: usize,
    pub chunks_indexed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Files indexed without vectors because every embedding tier failed.
    pub embedding_failed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Re-index every file even when its hash is unchanged.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub max_results: Option<usize>,
    pub min_score: Option<f32>,
}

impl SearchOptions {
    pub fn limit(max_results: usize) -> Self {
        Self {
            max_results: Some(max_results),
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadFileParams {
    pub rel_path: String,
    /// 1-indexed first line.
    pub from: Option<usize>,
    pub lines: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFileResult {
    pub text: String,
    pub path: String,
}

enum FileOutcome {
    Updated(usize),
    Unchanged,
    /// Indexed keyword-only; carries the exhaustion error.
    Degraded(usize, MemoryError),
}

impl MemoryManager {
    pub fn new(config: MemoryConfig, store: Box<dyn MemoryStore>, embedder: EmbeddingChain) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                embedder,
                // Nothing has been indexed by this instance yet.
                dirty: Arc::new(AtomicBool::new(true)),
                inflight: Mutex::new(None),
                next_sync_id: AtomicU64::new(0),
            }),
            #[cfg(feature = "file-watcher")]
            watcher: Mutex::new(None),
        }
    }

    /// Create a memory manager without embeddings. Keyword (FTS) search only.
    pub fn keyword_only(config: MemoryConfig, store: Box<dyn MemoryStore>) -> Self {
        Self::new(config, store, EmbeddingChain::new(Vec::new()))
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &dyn MemoryStore {
        self.inner.store.as_ref()
    }

    pub fn embedder(&self) -> &EmbeddingChain {
        &self.inner.embedder
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Flag the index as stale; the next search syncs first.
    pub fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::Release);
    }

    /// Start watching the memory root. Events only set the dirty flag.
    #[cfg(feature = "file-watcher")]
    pub fn start_watching(&self) -> Result<()> {
        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            let watcher = crate::watcher::MemoryWatcher::start(
                &self.inner.config.root,
                self.inner.config.watch_debounce,
                Arc::clone(&self.inner.dirty),
            )?;
            *slot = Some(watcher);
        }
        Ok(())
    }

    /// Release the file watch. The index stays usable.
    pub fn close(&self) {
        #[cfg(feature = "file-watcher")]
        {
            let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.take().is_some() {
                debug!("memory watcher stopped");
            }
        }
    }

    /// Synchronize the index with the memory root.
    ///
    /// Concurrent callers share one in-flight pass and all receive its result.
    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport> {
        let (id, task) = {
            let mut slot = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((id, task)) => {
                    debug!("joining in-flight memory sync");
                    (*id, task.clone())
                },
                None => {
                    let id = self.inner.next_sync_id.fetch_add(1, Ordering::Relaxed);
                    let inner = Arc::clone(&self.inner);
                    // Runs to completion even if every caller stops waiting.
                    let handle = tokio::spawn(async move {
                        let result = inner.run_sync(options.force).await;
                        inner.finish_sync(id);
                        result
                    });
                    let task = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(MemoryError::Internal(Arc::new(anyhow::anyhow!(
                                "memory sync task failed: {e}"
                            ))))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some((id, task.clone()));
                    (id, task)
                },
            }
        };
        let result = task.await;
        // Also covers a pass that panicked before releasing the slot.
        self.inner.finish_sync(id);
        result
    }

    /// Search memory using hybrid vector + keyword search.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        if self.is_dirty() {
            match self.sync(SyncOptions::default()).await {
                Ok(report) => debug!(?report, "lazy sync before search"),
                Err(e) => warn!(error = %e, "sync before search failed, searching current index"),
            }
        }
        self.inner.search(query, options).await
    }

    /// Read a slice of a memory document by root-relative path.
    pub async fn read_file(&self, params: ReadFileParams) -> Result<ReadFileResult> {
        self.inner.read_file(params).await
    }

    /// Get status information about the memory system.
    pub async fn status(&self) -> Result<MemoryStatus> {
        let store = self.inner.store.as_ref();
        let embedder = &self.inner.embedder;
        Ok(MemoryStatus {
            total_files: store.list_files().await.map_err(MemoryError::store)?.len(),
            total_chunks: store.count_chunks().await.map_err(MemoryError::store)?,
            cached_embeddings: store
                .count_cached_embeddings()
                .await
                .map_err(MemoryError::store)?,
            embedding_provider: embedder.name().to_string(),
            embedding_model: if embedder.tier_count() == 0 {
                "none (keyword-only)".into()
            } else {
                embedder.model_name().to_string()
            },
            fallback_level: embedder.current_level(),
            embedding_tiers: embedder.tier_count(),
            fts_available: store.fts_available(),
            dirty: self.is_dirty(),
        })
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    async fn run_sync(&self, force: bool) -> Result<SyncReport> {
        // Cleared up front so edits landing mid-pass trigger another sync.
        self.dirty.store(false, Ordering::Release);
        let result = self.sync_all(force).await;
        if let Err(ref e) = result
            && !e.is_embedding_exhausted()
        {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    /// Release the in-flight slot so the next caller starts a fresh pass.
    fn finish_sync(&self, id: u64) {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
    }

    async fn sync_all(&self, force: bool) -> Result<SyncReport> {
        let force = force || self.model_changed().await?;

        let candidates = list_memory_files(&self.config.root);
        self.sync_candidates(&candidates, force).await
    }

    /// Index `candidates`, drop files missing from it, and record the model.
    async fn sync_candidates(
        &self,
        candidates: &[(String, PathBuf)],
        mut force: bool,
    ) -> Result<SyncReport> {
        let store = self.store.as_ref();
        let mut report = SyncReport::default();
        let mut exhausted = None;

        // A tier switch mid-pass leaves earlier files on the old tier's vectors,
        // so the pass is repeated with the new tier; bounded by tier count.
        for _ in 0..=self.embedder.tier_count() {
            let level = self.embedder.current_level();
            for (rel, abs) in candidates {
                match self.sync_file(abs, rel, force, &mut report).await {
                    Ok(FileOutcome::Updated(chunks)) => {
                        report.files_updated += 1;
                        report.chunks_indexed += chunks;
                    },
                    Ok(FileOutcome::Unchanged) => report.files_unchanged += 1,
                    Ok(FileOutcome::Degraded(chunks, err)) => {
                        report.files_updated += 1;
                        report.chunks_indexed += chunks;
                        report.embedding_failed += 1;
                        exhausted = Some(err);
                    },
                    Err(e) => {
                        warn!(path = %rel, error = %e, "failed to sync file");
                        report.errors += 1;
                    },
                }
            }

            if exhausted.is_some() || self.embedder.current_level() == level {
                break;
            }
            info!(
                model = self.embedder.model_name(),
                "embedding tier changed during sync, re-indexing all files"
            );
            force = true;
            report = SyncReport::default();
        }

        // Remove files no longer on disk.
        let discovered: HashSet<&str> = candidates.iter().map(|(rel, _)| rel.as_str()).collect();
        for file in store.list_files().await.map_err(MemoryError::store)? {
            if !discovered.contains(file.path.as_str()) {
                debug!(path = %file.path, "removing stale file from memory index");
                store
                    .delete_chunks_for_file(&file.path)
                    .await
                    .map_err(MemoryError::store)?;
                store
                    .delete_file(&file.path)
                    .await
                    .map_err(MemoryError::store)?;
                report.files_removed += 1;
            }
        }

        if let Some(max_rows) = self.config.cache_max_entries {
            match store.evict_embedding_cache(max_rows).await {
                Ok(0) => {},
                Ok(evicted) => info!(evicted, "embedding cache: evicted old entries"),
                Err(e) => warn!(error = %e, "embedding cache eviction failed"),
            }
        }

        if let Some(err) = exhausted {
            warn!(
                files = report.embedding_failed,
                "memory sync finished without embeddings for some files"
            );
            return Err(err);
        }

        if self.embedder.tier_count() > 0 && !self.embedder.is_exhausted() {
            store
                .set_meta(META_EMBEDDING_MODEL, self.embedder.model_name())
                .await
                .map_err(MemoryError::store)?;
        }

        if report.files_updated > 0 || report.files_removed > 0 {
            info!(
                updated = report.files_updated,
                unchanged = report.files_unchanged,
                removed = report.files_removed,
                chunks = report.chunks_indexed,
                cache_hits = report.cache_hits,
                "memory sync complete"
            );
        }
        Ok(report)
    }

    /// Whether the embedding model differs from the one the index was built with.
    async fn model_changed(&self) -> Result<bool> {
        if self.embedder.tier_count() == 0 || self.embedder.is_exhausted() {
            return Ok(false);
        }
        let previous = self
            .store
            .get_meta(META_EMBEDDING_MODEL)
            .await
            .map_err(MemoryError::store)?;
        let current = self.embedder.model_name();
        match previous {
            Some(prev) if prev != current => {
                info!(from = %prev, to = %current, "embedding model changed, re-indexing memory");
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    /// Sync a single file.
    async fn sync_file(
        &self,
        path: &Path,
        rel: &str,
        force: bool,
        report: &mut SyncReport,
    ) -> anyhow::Result<FileOutcome> {
        let metadata = tokio::fs::metadata(path).await?;
        let mtime = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let size = metadata.len() as i64;
        let bytes = tokio::fs::read(path).await?;
        let content = String::from_utf8_lossy(&bytes);
        let hash = hash_text(&content);

        let existing = self.store.get_file(rel).await?;
        if !force && let Some(existing) = existing && existing.hash == hash {
            if existing.mtime != mtime || existing.size != size {
                self.store
                    .upsert_file(&FileRow {
                        path: rel.to_string(),
                        hash,
                        mtime,
                        size,
                    })
                    .await?;
            }
            return Ok(FileOutcome::Unchanged);
        }

        let chunks = chunk_markdown(
            &content,
            self.config.chunk_tokens,
            self.config.chunk_overlap,
        );

        let (vectors, model, degraded) = match self.resolve_embeddings(&chunks, report).await {
            Ok((vectors, model)) => (vectors.into_iter().map(Some).collect(), model, None),
            Err(err) if err.is_embedding_exhausted() => {
                (vec![None; chunks.len()], String::new(), Some(err))
            },
            Err(err) => return Err(err.into()),
        };

        let now = chrono::Utc::now().timestamp_millis();
        let rows: Vec<ChunkRow> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector): (&Chunk, Option<Vec<f32>>)| ChunkRow {
                id: uuid::Uuid::new_v4().to_string(),
                path: rel.to_string(),
                start_line: chunk.start_line as i64,
                end_line: chunk.end_line as i64,
                hash: chunk.hash.clone(),
                model: if vector.is_some() {
                    model.clone()
                } else {
                    String::new()
                },
                text: chunk.text.clone(),
                embedding: vector.map(|v| embedding_to_blob(&v)),
                updated_at: now,
            })
            .collect();

        self.store.replace_chunks_for_file(rel, &rows).await?;
        self.store
            .upsert_file(&FileRow {
                path: rel.to_string(),
                // An empty hash makes the next sync retry the embedding.
                hash: if degraded.is_some() {
                    String::new()
                } else {
                    hash
                },
                mtime,
                size,
            })
            .await?;

        info!(path = %rel, chunks = rows.len(), "synced file");
        Ok(match degraded {
            Some(err) => FileOutcome::Degraded(rows.len(), err),
            None => FileOutcome::Updated(rows.len()),
        })
    }

    /// Vectors for `chunks`, reusing cached ones whose dimensionality matches
    /// the current model. Returns the vectors and the model that produced them.
    async fn resolve_embeddings(
        &self,
        chunks: &[Chunk],
        report: &mut SyncReport,
    ) -> Result<(Vec<Vec<f32>>, String)> {
        if chunks.is_empty() {
            return Ok((Vec::new(), self.embedder.model_name().to_string()));
        }
        if self.embedder.tier_count() == 0 {
            return Err(MemoryError::exhausted(vec![
                "no embedding provider configured".into(),
            ]));
        }

        let expected_dims = self.embedder.dimensions();
        let mut resolved: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let hit = self
                .store
                .get_cached_embedding(&chunk.hash)
                .await
                .map_err(MemoryError::store)?
                .filter(|row| expected_dims > 0 && usize::try_from(row.dims).ok() == Some(expected_dims))
                .map(|row| blob_to_embedding(&row.embedding));
            resolved.push(hit);
        }

        let mut pending: Vec<usize> = (0..chunks.len()).filter(|&i| resolved[i].is_none()).collect();
        report.cache_hits += chunks.len() - pending.len();
        report.cache_misses += pending.len();

        // A tier switch during the call changes dimensionality; bounded by tier count.
        for _ in 0..=self.embedder.tier_count() {
            if pending.is_empty() {
                break;
            }
            self.embed_pending(chunks, &pending, &mut resolved).await?;

            let dims = self.embedder.dimensions();
            pending = resolved
                .iter()
                .enumerate()
                .filter(|(_, v)| v.as_ref().is_none_or(|v| v.len() != dims))
                .map(|(i, _)| i)
                .collect();
        }

        let vectors = resolved.into_iter().map(Option::unwrap_or_default).collect();
        Ok((vectors, self.embedder.model_name().to_string()))
    }

    /// Embed the chunks at `pending` (each distinct hash once) and write the
    /// results back to the cache.
    async fn embed_pending(
        &self,
        chunks: &[Chunk],
        pending: &[usize],
        resolved: &mut [Option<Vec<f32>>],
    ) -> Result<()> {
        let mut unique: Vec<&Chunk> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for &i in pending {
            if seen.insert(chunks[i].hash.as_str()) {
                unique.push(&chunks[i]);
            }
        }

        let texts: Vec<String> = unique.iter().map(|c| c.text.clone()).collect();
        let fresh = self.embedder.embed_batch(&texts).await?;

        let mut by_hash: HashMap<&str, Vec<f32>> = HashMap::with_capacity(fresh.len());
        for (chunk, vector) in unique.iter().zip(fresh) {
            self.store
                .put_cached_embedding(&chunk.hash, &vector)
                .await
                .map_err(MemoryError::store)?;
            by_hash.insert(chunk.hash.as_str(), vector);
        }
        for &i in pending {
            if let Some(v) = by_hash.get(chunks[i].hash.as_str()) {
                resolved[i] = Some(v.clone());
            }
        }
        Ok(())
    }

    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        let cleaned = query.trim();
        let max_results = options.max_results.unwrap_or(self.config.max_results);
        if cleaned.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }
        let min_score = options.min_score.unwrap_or(self.config.min_score);
        let candidate_limit = max_results.saturating_mul(self.config.candidate_multiplier.max(1));

        let (vector, vector_error) = self.vector_candidates(cleaned, candidate_limit).await?;
        let keyword = self.keyword_candidates(cleaned, candidate_limit).await;

        let weights = match (&vector, &keyword) {
            // No stored vector shares the query's dimensionality.
            (Some(v), Some(_)) if v.is_empty() => FusionWeights::keyword_only(),
            (Some(_), Some(_)) => {
                FusionWeights::new(self.config.vector_weight, self.config.text_weight)
            },
            (None, Some(_)) => FusionWeights::keyword_only(),
            (Some(_), None) => FusionWeights::vector_only(),
            (None, None) => {
                return Err(vector_error.unwrap_or_else(|| {
                    MemoryError::exhausted(vec!["no retrieval method available".into()])
                }));
            },
        };

        let fused = search::merge_hybrid(
            vector.unwrap_or_default(),
            keyword.unwrap_or_default(),
            weights,
        );
        Ok(search::finalize(
            fused,
            min_score,
            max_results,
            self.config.snippet_max_chars,
        ))
    }

    /// Top chunks by cosine similarity. `None` when the query cannot be embedded.
    async fn vector_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<(Option<Vec<Candidate>>, Option<MemoryError>)> {
        if self.embedder.tier_count() == 0 {
            return Ok((None, None));
        }
        let level = self.embedder.current_level();
        let query_vec = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                let err = MemoryError::from(e);
                warn!(error = %err, "query embedding failed, keyword search only");
                return Ok((None, Some(err)));
            },
        };
        if self.embedder.current_level() != level {
            // Stored vectors come from the previous tier until the next sync.
            debug!("embedding tier changed during query, marking index dirty");
            self.dirty.store(true, Ordering::Release);
        }

        let rows = self
            .store
            .list_embedded_chunks()
            .await
            .map_err(MemoryError::store)?;
        let mut scored: Vec<Candidate> = rows
            .into_iter()
            .filter_map(|row| {
                let vector = blob_to_embedding(row.embedding.as_deref()?);
                if vector.len() != query_vec.len() {
                    return None;
                }
                Some(Candidate {
                    score: search::cosine_similarity(&query_vec, &vector),
                    id: row.id,
                    path: row.path,
                    start_line: to_usize(row.start_line),
                    end_line: to_usize(row.end_line),
                    text: row.text,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok((Some(scored), None))
    }

    /// Full-text matches. `None` when the full-text engine is unavailable.
    async fn keyword_candidates(&self, query: &str, limit: usize) -> Option<Vec<Candidate>> {
        if !self.store.fts_available() {
            return None;
        }
        let Some(fts_query) = search::build_fts_query(query) else {
            return Some(Vec::new());
        };
        match self.store.keyword_search(&fts_query, limit).await {
            Ok(rows) => Some(
                rows.into_iter()
                    .map(|row| Candidate {
                        score: search::rank_to_score(row.rank),
                        id: row.id,
                        path: row.path,
                        start_line: to_usize(row.start_line),
                        end_line: to_usize(row.end_line),
                        text: row.text,
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "keyword search failed, using vector results only");
                None
            },
        }
    }

    async fn read_file(&self, params: ReadFileParams) -> Result<ReadFileResult> {
        let rel = validate_rel_path(&params.rel_path)?;

        let root = tokio::fs::canonicalize(&self.config.root).await?;
        let resolved = match tokio::fs::canonicalize(root.join(&rel)).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MemoryError::FileNotFound(rel));
            },
            Err(e) => return Err(e.into()),
        };
        // Symlinks may still point outside the root.
        if !resolved.starts_with(&root) {
            return Err(MemoryError::PathTraversal(params.rel_path));
        }
        if !resolved.is_file() {
            return Err(MemoryError::FileNotFound(rel));
        }

        let bytes = tokio::fs::read(&resolved).await?;
        let content = String::from_utf8_lossy(&bytes);
        let from = params.from.unwrap_or(1).max(1);
        let count = params.lines.unwrap_or(DEFAULT_READ_LINES);
        let text = content
            .split('\n')
            .skip(from - 1)
            .take(count)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ReadFileResult { text, path: rel })
    }
}

/// Lexically validate a read request before touching the filesystem. Returns
/// the path normalised to `/` separators.
fn validate_rel_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MemoryError::UnsupportedFile(raw.to_string()));
    }
    let path = Path::new(trimmed);
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MemoryError::PathTraversal(raw.to_string()));
            },
        }
    }
    if path.extension().and_then(|e| e.to_str()) != Some(MEMORY_EXTENSION) || parts.is_empty() {
        return Err(MemoryError::UnsupportedFile(raw.to_string()));
    }
    Ok(parts.join("/"))
}

/// Enumerate the primary document plus every markdown log under `memory/`.
/// Returns `(root-relative path, absolute path)` pairs.
pub fn list_memory_files(root: &Path) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();

    for name in [PRIMARY_FILE, PRIMARY_FILE_ALIAS] {
        let path = root.join(name);
        if path.is_file() && !path.is_symlink() {
            files.push((name.to_string(), path));
            break;
        }
    }

    let log_dir = root.join(LOG_DIR);
    if !log_dir.is_dir() {
        debug!(dir = %log_dir.display(), "memory log directory does not exist, skipping");
        return files;
    }
    for entry in WalkDir::new(&log_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MEMORY_EXTENSION) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, path.to_path_buf()));
    }
    files
}

fn to_usize(v: i64) -> usize {
    usize::try_from(v).unwrap_or(0)
}
