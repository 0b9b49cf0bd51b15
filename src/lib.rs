//! # stem-batch-core
//!
//! Resumable batch pipeline that fetches audio listed in manifests, strips
//! background music with an external two-stem separation engine and lands
//! 16 kHz vocals at `output_dir/identity.wav`.
//!
//! Work is split into fixed-size chunks run one after another through a
//! bounded worker pool. A target that already exists is never redone, so an
//! interrupted run can simply be started again.

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

pub use crate::{
    config::ToolConfig,
    core::{
        chunker::{chunk_count, chunk_items, discover_audio_files, run_chunked, DiscoveryOptions},
        gate::should_skip,
        pipeline::{run_cleanup_stage, run_fetch_stage},
        pool::{default_jobs, run_pool},
        tools::{
            canonicalize_vocals, resample, separate, DemucsCli, FfmpegCli, Resampler,
            SeparationEngine,
        },
    },
    error::{BatchError, FailureKind, Result},
    io::{
        manifest::{manifest_work_items, read_manifest},
        net::{Fetcher, HttpFetcher},
        paths::SeparationLayout,
        progress::{set_batch_progress_callback, BatchProgress},
    },
    types::{
        CleanupOptions, FetchOptions, GateMode, ManifestColumns, ManifestRecord, Outcome,
        SourceRef, Stage, StageReport, WorkItem,
    },
};
