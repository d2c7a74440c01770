//! Debounced file watching for the memory root.
//!
//! The watcher never indexes anything itself; it only flags the index as
//! dirty so the next search (or explicit sync) picks the changes up.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{Event, EventKind, RecommendedWatcher, RecursiveMode},
    },
    tracing::{debug, info, warn},
};

use crate::config::{LOG_DIR, MEMORY_EXTENSION};

/// Keeps the debouncer alive; dropping it stops watching.
pub struct MemoryWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl MemoryWatcher {
    /// Watch `root` (non-recursively, for the primary document) and its log
    /// directory (recursively). The log directory is created if missing.
    pub fn start(root: &Path, debounce: Duration, dirty: Arc<AtomicBool>) -> anyhow::Result<Self> {
        let log_dir = root.join(LOG_DIR);
        std::fs::create_dir_all(&log_dir)?;

        let filter_dir = log_dir.clone();
        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    if events.iter().any(|e| is_relevant(&e.event, &filter_dir)) {
                        dirty.store(true, Ordering::Release);
                        debug!(events = events.len(), "memory files changed, index marked dirty");
                    }
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "memory watcher error");
                    }
                },
            }
        })?;

        debouncer.watch(root, RecursiveMode::NonRecursive)?;
        debouncer.watch(&log_dir, RecursiveMode::Recursive)?;
        info!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "watching memory files");

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Markdown adds, edits and removals count; so does removing a directory under
/// the log directory, since the files inside it vanish without their own events.
fn is_relevant(event: &Event, log_dir: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|p| {
        is_markdown(p) || (matches!(event.kind, EventKind::Remove(_)) && p.starts_with(log_dir))
    })
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(MEMORY_EXTENSION)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        notify_debouncer_full::notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind},
        std::path::PathBuf,
        tempfile::TempDir,
    };

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn markdown_changes_are_relevant() {
        let log_dir = Path::new("/ws/memory");
        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), "/ws/memory/a.md"),
            log_dir
        ));
        assert!(is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/ws/MEMORY.md"),
            log_dir
        ));
        assert!(is_relevant(
            &event(EventKind::Remove(RemoveKind::Folder), "/ws/memory/archive"),
            log_dir
        ));
    }

    #[test]
    fn other_events_are_ignored() {
        let log_dir = Path::new("/ws/memory");
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), "/ws/memory/a.md"),
            log_dir
        ));
        assert!(!is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/ws/notes.txt"),
            log_dir
        ));
        assert!(!is_relevant(
            &event(EventKind::Create(CreateKind::Folder), "/ws/memory/archive"),
            log_dir
        ));
    }

    #[tokio::test]
    async fn file_write_marks_dirty() {
        let tmp = TempDir::new().unwrap();
        let dirty = Arc::new(AtomicBool::new(false));
        let watcher =
            MemoryWatcher::start(tmp.path(), Duration::from_millis(50), Arc::clone(&dirty)).unwrap();
        assert!(tmp.path().join("memory").is_dir());

        std::fs::write(tmp.path().join("memory/2024-03-01.md"), "new entry").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !dirty.load(Ordering::Acquire) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(dirty.load(Ordering::Acquire));
        drop(watcher);
    }
}
