//! Corpus discovery and chunked execution.
//!
//! Chunks are run one after another, each through a fresh pool, so at most
//! one chunk's worth of items is ever in flight.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{
    core::pool::run_pool,
    error::{BatchError, FailureKind, Result},
    io::{
        paths::identity_from_path,
        progress::{emit_batch_progress, BatchProgress},
    },
    types::{Outcome, SourceRef, Stage, StageReport, WorkItem},
};

#[derive(Clone, Debug)]
pub struct DiscoveryOptions {
    /// Lower-case extensions without the dot.
    pub extensions: Vec<String>,
    pub recursive: bool,
    /// Files under this directory are never yielded.
    pub exclude_dir: Option<PathBuf>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["wav".into(), "mp3".into()],
            recursive: true,
            exclude_dir: None,
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Lists audio files under `root` in walk order (not sorted). Dot-files,
/// such as interrupted resample output, are never yielded.
pub fn discover_audio_files(root: &Path, opts: &DiscoveryOptions) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(BatchError::Config(format!(
            "input directory {} does not exist",
            root.display()
        )));
    }

    let exclude = opts
        .exclude_dir
        .as_ref()
        .map(|d| d.canonicalize().unwrap_or_else(|_| d.clone()));
    let max_depth = if opts.recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| match &exclude {
            Some(ex) if e.depth() > 0 && e.file_type().is_dir() => e
                .path()
                .canonicalize()
                .map(|p| !p.starts_with(ex))
                .unwrap_or(true),
            _ => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file()
            && !is_hidden(entry.path())
            && has_allowed_extension(entry.path(), &opts.extensions)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Builds cleanup work items from discovered files, in discovery order.
pub fn local_work_items(files: Vec<PathBuf>, output_dir: &Path) -> Vec<WorkItem> {
    let items: Vec<WorkItem> = files
        .into_iter()
        .filter_map(|path| match identity_from_path(&path) {
            Some(identity) => Some(WorkItem::new(identity, SourceRef::Local(path), output_dir)),
            None => {
                warn!(path = %path.display(), "skipping file without a usable name");
                None
            }
        })
        .collect();
    dedup_identities(items)
}

/// Drops items whose identity repeats an earlier one so no two items share
/// a target path. Order is kept.
pub fn dedup_identities(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.identity().to_string());
            if !fresh {
                warn!(identity = item.identity(), "duplicate identity, skipping");
            }
            fresh
        })
        .collect()
}

/// Splits `items` into consecutive windows of `chunk_size`; the last one may
/// be shorter.
pub fn chunk_items(items: &[WorkItem], chunk_size: usize) -> Vec<&[WorkItem]> {
    items.chunks(chunk_size.max(1)).collect()
}

pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    total.div_ceil(chunk_size.max(1))
}

/// Drives `worker` over every item, one chunk at a time.
pub fn run_chunked<F>(
    stage: Stage,
    items: &[WorkItem],
    chunk_size: usize,
    jobs: usize,
    worker: F,
) -> StageReport
where
    F: Fn(&WorkItem) -> Outcome + Sync,
{
    let chunks = chunk_items(items, chunk_size);
    let total = chunks.len();

    let mut report = StageReport::new(stage);
    report.found = items.len();
    report.chunks = total;

    emit_batch_progress(BatchProgress::StageStarted {
        stage,
        found: items.len(),
        chunks: total,
    });

    let reporting_worker = |item: &WorkItem| {
        let outcome = worker(item);
        emit_batch_progress(BatchProgress::ItemFinished {
            identity: item.identity(),
            outcome: &outcome,
        });
        outcome
    };

    for (i, chunk) in chunks.iter().enumerate() {
        let index = i + 1;
        info!(%stage, batch = index, total, size = chunk.len(), "processing batch");
        emit_batch_progress(BatchProgress::ChunkStarted {
            index,
            total,
            size: chunk.len(),
        });

        let outcomes = run_pool(chunk, &reporting_worker, jobs);
        let before = (report.completed, report.skipped, report.failed);
        for item in chunk.iter() {
            match outcomes.get(item.identity()) {
                Some(outcome) => report.record(item.identity(), outcome),
                None => report.record(
                    item.identity(),
                    &Outcome::Failed {
                        kind: FailureKind::Other,
                        reason: "no result from worker".into(),
                    },
                ),
            }
        }

        emit_batch_progress(BatchProgress::ChunkFinished {
            index,
            total,
            completed: report.completed - before.0,
            skipped: report.skipped - before.1,
            failed: report.failed - before.2,
        });
    }

    report
}
