use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{error::FailureKind, io::paths::target_path};

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_MODEL: &str = "htdemucs";

/// Where a work item's input comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRef {
    Remote(String),
    Local(PathBuf),
}

/// One unit of work. `target_path` is always `output_dir/identity.wav`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    identity: String,
    source: SourceRef,
    target_path: PathBuf,
}

impl WorkItem {
    pub fn new(identity: impl Into<String>, source: SourceRef, output_dir: &Path) -> Self {
        let identity = identity.into();
        let target_path = target_path(output_dir, &identity);
        Self {
            identity,
            source,
            target_path,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestRecord {
    pub identity: String,
    pub url: String,
    pub include: bool,
}

/// Column names looked up in manifest headers. The inclusion column differs
/// between dataset variants, so all three are configurable.
#[derive(Clone, Debug)]
pub struct ManifestColumns {
    pub identity: String,
    pub url: String,
    pub include: String,
}

impl Default for ManifestColumns {
    fn default() -> Self {
        Self {
            identity: "file_name".into(),
            url: "url".into(),
            include: "Music".into(),
        }
    }
}

/// How the idempotency gate decides that a target is already done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateMode {
    /// Existence alone marks completion.
    #[default]
    Exists,
    /// The target must also parse as a WAV file.
    ValidWav,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Skipped,
    Failed { kind: FailureKind, reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetch => f.write_str("fetch"),
            Stage::Cleanup => f.write_str("cleanup"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub identity: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Aggregate counts for one stage run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub found: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks: usize,
    pub failures: Vec<ItemFailure>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            found: 0,
            completed: 0,
            skipped: 0,
            failed: 0,
            chunks: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, identity: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed { kind, reason } => {
                self.failed += 1;
                self.failures.push(ItemFailure {
                    identity: identity.to_string(),
                    kind: *kind,
                    reason: reason.clone(),
                });
            }
        }
    }

    /// Items that went through a worker, whatever the result.
    pub fn processed(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// A single manifest file or a directory of `*.csv` manifests.
    pub manifest_path: PathBuf,
    pub output_dir: PathBuf,
    pub columns: ManifestColumns,
    pub chunk_size: usize,
    /// `None` picks the host's available parallelism.
    pub jobs: Option<usize>,
    pub sample_rate: u32,
    pub gate: GateMode,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("manifests"),
            output_dir: PathBuf::from("audio_files"),
            columns: ManifestColumns::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            jobs: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            gate: GateMode::Exists,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CleanupOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub chunk_size: usize,
    /// `None` picks available parallelism minus one reserved unit for the engine.
    pub jobs: Option<usize>,
    pub sample_rate: u32,
    pub channels: Option<u16>,
    pub gate: GateMode,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("audio_files"),
            output_dir: PathBuf::from("cleaned_audio"),
            extensions: vec!["wav".into(), "mp3".into()],
            recursive: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            jobs: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: Some(1),
            gate: GateMode::Exists,
        }
    }
}
