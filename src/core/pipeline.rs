//! The two pipeline stages. They share nothing in memory: the fetch stage's
//! output directory is the cleanup stage's input directory.

use std::{fs, path::Path};

use tracing::{info, warn};

use crate::{
    core::{
        chunker::{dedup_identities, discover_audio_files, local_work_items, run_chunked, DiscoveryOptions},
        gate::should_skip,
        pool::default_jobs,
        tools::{canonicalize_vocals, prune_engine_root, resample, separate, Resampler, SeparationEngine},
    },
    error::{BatchError, FailureKind, Result},
    io::{
        manifest::{manifest_work_items, read_manifest},
        net::{write_bytes_atomic, Fetcher},
        progress::{emit_batch_progress, BatchProgress},
    },
    types::{CleanupOptions, FetchOptions, GateMode, Outcome, SourceRef, Stage, StageReport, WorkItem},
};

/// Downloads every included manifest entry to `output_dir/identity.wav` and
/// resamples it in place. Existing targets are skipped.
pub fn run_fetch_stage(
    opts: &FetchOptions,
    fetcher: &dyn Fetcher,
    resampler: &dyn Resampler,
) -> Result<StageReport> {
    check_chunk_size(opts.chunk_size)?;
    fs::create_dir_all(&opts.output_dir).map_err(BatchError::fs(&opts.output_dir))?;

    let records = read_manifest(&opts.manifest_path, &opts.columns)?;
    let items = dedup_identities(manifest_work_items(&records, &opts.output_dir));
    info!(
        rows = records.len(),
        included = items.len(),
        "manifest loaded"
    );

    let jobs = opts.jobs.unwrap_or_else(|| default_jobs(0));
    let report = run_chunked(Stage::Fetch, &items, opts.chunk_size, jobs, |item| {
        fetch_item(item, opts, fetcher, resampler)
    });

    info!(
        found = report.found,
        downloaded = report.completed,
        skipped = report.skipped,
        failed = report.failed,
        "fetch stage finished"
    );
    emit_batch_progress(BatchProgress::StageFinished(&report));
    Ok(report)
}

/// Separates vocals from every audio file under `input_dir` and lands them
/// at `output_dir/identity.wav`, resampled. Existing targets are skipped.
pub fn run_cleanup_stage(
    opts: &CleanupOptions,
    engine: &dyn SeparationEngine,
    resampler: &dyn Resampler,
) -> Result<StageReport> {
    check_chunk_size(opts.chunk_size)?;
    fs::create_dir_all(&opts.output_dir).map_err(BatchError::fs(&opts.output_dir))?;
    check_distinct_dirs(&opts.input_dir, &opts.output_dir)?;

    let discovery = DiscoveryOptions {
        extensions: opts.extensions.clone(),
        recursive: opts.recursive,
        exclude_dir: Some(opts.output_dir.clone()),
    };
    let files = discover_audio_files(&opts.input_dir, &discovery)?;
    let items = local_work_items(files, &opts.output_dir);
    info!(files = items.len(), dir = %opts.input_dir.display(), "corpus discovered");

    // One unit stays free for the engine's own threads.
    let jobs = opts.jobs.unwrap_or_else(|| default_jobs(1));
    let report = run_chunked(Stage::Cleanup, &items, opts.chunk_size, jobs, |item| {
        clean_item(item, opts, engine, resampler)
    });

    prune_engine_root(&opts.output_dir, engine.model_name());

    info!(
        found = report.found,
        processed = report.completed,
        skipped = report.skipped,
        failed = report.failed,
        "cleanup stage finished"
    );
    emit_batch_progress(BatchProgress::StageFinished(&report));
    Ok(report)
}

fn fetch_item(
    item: &WorkItem,
    opts: &FetchOptions,
    fetcher: &dyn Fetcher,
    resampler: &dyn Resampler,
) -> Outcome {
    if skip(item, opts.gate) {
        return Outcome::Skipped;
    }
    let SourceRef::Remote(url) = item.source() else {
        return unexpected_source(item);
    };

    let result = fetcher.fetch(url).and_then(|bytes| {
        write_bytes_atomic(item.target_path(), &bytes)?;
        info!(identity = item.identity(), bytes = bytes.len(), "downloaded");
        resample(resampler, item.target_path(), opts.sample_rate, None)
    });
    to_outcome(item, result)
}

fn clean_item(
    item: &WorkItem,
    opts: &CleanupOptions,
    engine: &dyn SeparationEngine,
    resampler: &dyn Resampler,
) -> Outcome {
    if skip(item, opts.gate) {
        return Outcome::Skipped;
    }
    let SourceRef::Local(input) = item.source() else {
        return unexpected_source(item);
    };

    info!(identity = item.identity(), input = %input.display(), "separating");
    let result = separate(engine, input, &opts.output_dir, item.identity()).and_then(|layout| {
        canonicalize_vocals(
            &layout,
            item.target_path(),
            resampler,
            opts.sample_rate,
            opts.channels,
        )
    });
    to_outcome(item, result)
}

fn skip(item: &WorkItem, gate: GateMode) -> bool {
    let done = should_skip(item, gate);
    if done {
        info!(identity = item.identity(), "already exists, skipping");
    }
    done
}

fn to_outcome(item: &WorkItem, result: Result<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Completed,
        Err(e) => {
            warn!(identity = item.identity(), error = %e, "item failed");
            Outcome::Failed {
                kind: e.kind(),
                reason: e.to_string(),
            }
        }
    }
}

fn unexpected_source(item: &WorkItem) -> Outcome {
    Outcome::Failed {
        kind: FailureKind::Other,
        reason: format!("unexpected source {:?}", item.source()),
    }
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(BatchError::Config("chunk size must be at least 1".into()));
    }
    Ok(())
}

fn check_distinct_dirs(input: &Path, output: &Path) -> Result<()> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(BatchError::Config(format!(
            "input and output directory are both {}",
            output.display()
        )));
    }
    Ok(())
}
