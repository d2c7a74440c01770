#[cfg(feature = "file-watcher")]
use std::time::Duration;

use {
    mnemo_memory::{
        MemoryManager, MemoryStatus, ReadFileParams, SearchOptions, SearchResult, SyncOptions,
        SyncReport,
    },
    tracing::{info, warn},
};

pub async fn sync(manager: &MemoryManager, force: bool) -> anyhow::Result<()> {
    let report = manager.sync(SyncOptions { force }).await?;
    println!("{}", format_report(&report));
    Ok(())
}

pub async fn search(
    manager: &MemoryManager,
    query: &str,
    max_results: Option<usize>,
    min_score: Option<f32>,
    json: bool,
) -> anyhow::Result<()> {
    let results = manager
        .search(query, SearchOptions {
            max_results,
            min_score,
        })
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No results.");
    } else {
        for result in &results {
            println!("{}", format_result(result));
        }
    }
    Ok(())
}

pub async fn read(
    manager: &MemoryManager,
    path: String,
    from: Option<usize>,
    lines: Option<usize>,
) -> anyhow::Result<()> {
    let out = manager
        .read_file(ReadFileParams {
            rel_path: path,
            from,
            lines,
        })
        .await?;
    println!("{}", out.text);
    Ok(())
}

pub async fn status(manager: &MemoryManager, json: bool) -> anyhow::Result<()> {
    let status = manager.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(&status));
    }
    Ok(())
}

/// Keep the index fresh until ctrl-c. With `poll` set, the root is re-scanned
/// on that period instead of subscribing to filesystem events.
#[cfg(feature = "file-watcher")]
pub async fn watch(manager: &MemoryManager, poll: Option<Duration>) -> anyhow::Result<()> {
    if let Err(e) = manager.sync(SyncOptions::default()).await {
        warn!(error = %e, "initial sync incomplete");
    }
    let mut rescan = match poll {
        Some(period) => {
            info!(?period, "file events disabled, polling memory root");
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            Some(interval)
        },
        None => {
            manager.start_watching()?;
            None
        },
    };

    let mut tick = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = next_rescan(&mut rescan) => manager.mark_dirty(),
            _ = tick.tick() => {
                if manager.is_dirty() {
                    match manager.sync(SyncOptions::default()).await {
                        Ok(report) => info!(
                            updated = report.files_updated,
                            removed = report.files_removed,
                            "re-synced after file changes"
                        ),
                        Err(e) => warn!(error = %e, "sync after file changes failed"),
                    }
                }
            },
        }
    }

    manager.close();
    info!("stopped watching");
    Ok(())
}

#[cfg(feature = "file-watcher")]
async fn next_rescan(rescan: &mut Option<tokio::time::Interval>) {
    match rescan {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending().await,
    }
}

fn format_report(report: &SyncReport) -> String {
    let mut out = format!(
        "{} updated, {} unchanged, {} removed, {} chunks indexed ({} cached, {} embedded)",
        report.files_updated,
        report.files_unchanged,
        report.files_removed,
        report.chunks_indexed,
        report.cache_hits,
        report.cache_misses,
    );
    if report.errors > 0 {
        out.push_str(&format!(", {} errors", report.errors));
    }
    out
}

fn format_result(result: &SearchResult) -> String {
    let preview = result.snippet.lines().next().unwrap_or_default();
    format!("{:.3}  {}\n       {preview}", result.score, result.citation)
}

fn format_status(status: &MemoryStatus) -> String {
    [
        format!("files:       {}", status.total_files),
        format!("chunks:      {}", status.total_chunks),
        format!("cache:       {}", status.cached_embeddings),
        format!(
            "embeddings:  {} / {} (fallback level {}, {} tiers)",
            status.embedding_provider,
            status.embedding_model,
            status.fallback_level,
            status.embedding_tiers
        ),
        format!("full-text:   {}", if status.fts_available { "yes" } else { "no" }),
        format!("dirty:       {}", status.dirty),
    ]
    .join("\n")
}
