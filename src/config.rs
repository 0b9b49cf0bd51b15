use std::{env, path::PathBuf, time::Duration};

use crate::{
    core::tools::{DemucsCli, FfmpegCli},
    error::{BatchError, Result},
    types::DEFAULT_MODEL,
};

pub const DEMUCS_BIN_VAR: &str = "STEM_BATCH_DEMUCS_BIN";
pub const FFMPEG_BIN_VAR: &str = "STEM_BATCH_FFMPEG_BIN";
pub const MODEL_VAR: &str = "STEM_BATCH_MODEL";
pub const TOOL_TIMEOUT_VAR: &str = "STEM_BATCH_TOOL_TIMEOUT_SECS";

pub fn demucs_bin() -> PathBuf {
    env::var(DEMUCS_BIN_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("demucs"))
}

pub fn ffmpeg_bin() -> PathBuf {
    env::var(FFMPEG_BIN_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("ffmpeg"))
}

/// Settings for the external separation and resampling tools.
#[derive(Clone, Debug)]
pub struct ToolConfig {
    pub demucs_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
    pub model_name: String,
    pub use_gpu: bool,
    /// Kill a tool that runs past this. `None` blocks until it exits.
    pub timeout: Option<Duration>,
    pub show_output: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            demucs_bin: PathBuf::from("demucs"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            model_name: DEFAULT_MODEL.into(),
            use_gpu: false,
            timeout: None,
            show_output: false,
        }
    }
}

impl ToolConfig {
    pub fn from_env() -> Result<Self> {
        let timeout = match env::var(TOOL_TIMEOUT_VAR) {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    BatchError::Config(format!("{TOOL_TIMEOUT_VAR} must be whole seconds, got `{raw}`"))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            demucs_bin: demucs_bin(),
            ffmpeg_bin: ffmpeg_bin(),
            model_name: env::var(MODEL_VAR).unwrap_or_else(|_| DEFAULT_MODEL.into()),
            timeout,
            ..Self::default()
        })
    }

    pub fn separation_engine(&self) -> DemucsCli {
        DemucsCli {
            program: self.demucs_bin.clone(),
            model_name: self.model_name.clone(),
            use_gpu: self.use_gpu,
            timeout: self.timeout,
            show_output: self.show_output,
        }
    }

    pub fn resampler(&self) -> FfmpegCli {
        FfmpegCli {
            program: self.ffmpeg_bin.clone(),
            timeout: self.timeout,
            show_output: self.show_output,
        }
    }
}
