use std::path::{Path, PathBuf};

pub const OUTPUT_EXTENSION: &str = "wav";
pub const VOCALS_FILE: &str = "vocals.wav";
pub const RESIDUAL_FILE: &str = "no_vocals.wav";
pub const TEMP_EXTENSION: &str = "part";

/// Canonical output location for an identity: `output_dir/identity.wav`.
pub fn target_path(output_dir: &Path, identity: &str) -> PathBuf {
    output_dir.join(format!("{identity}.{OUTPUT_EXTENSION}"))
}

/// Identity of a local input file: its base name with the last extension
/// stripped, which is also the directory name the separation engine uses.
pub fn identity_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Output layout written by the separation engine for one input:
/// `output_dir/<model>/<identity>/{vocals,no_vocals}.wav`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeparationLayout {
    model_dir: PathBuf,
    item_dir: PathBuf,
}

impl SeparationLayout {
    pub fn new(output_dir: &Path, model_name: &str, identity: &str) -> Self {
        let model_dir = output_dir.join(model_name);
        let item_dir = model_dir.join(identity);
        Self {
            model_dir,
            item_dir,
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn item_dir(&self) -> &Path {
        &self.item_dir
    }

    pub fn vocals(&self) -> PathBuf {
        self.item_dir.join(VOCALS_FILE)
    }

    pub fn residual(&self) -> PathBuf {
        self.item_dir.join(RESIDUAL_FILE)
    }
}

/// True when `identity` names a single file in the output directory: no
/// separators, not `.` or `..`.
pub fn is_flat_identity(identity: &str) -> bool {
    !identity.is_empty()
        && identity != "."
        && identity != ".."
        && !identity.contains(['/', '\\'])
}

/// Hidden sibling the resample tool writes to before it replaces `path`.
/// The `.part` suffix keeps leftovers out of audio discovery.
pub fn resample_temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".into());
    path.with_file_name(format!(".{name}.resample.{TEMP_EXTENSION}"))
}
