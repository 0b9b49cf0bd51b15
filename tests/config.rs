use std::{path::PathBuf, time::Duration};

use stem_batch_core::config::{DEMUCS_BIN_VAR, FFMPEG_BIN_VAR, MODEL_VAR, TOOL_TIMEOUT_VAR};
use stem_batch_core::{BatchError, SeparationEngine, ToolConfig};

// Single test: it mutates process-wide environment variables.
#[test]
fn tool_config_reads_environment() {
    for var in [DEMUCS_BIN_VAR, FFMPEG_BIN_VAR, MODEL_VAR, TOOL_TIMEOUT_VAR] {
        std::env::remove_var(var);
    }

    let defaults = ToolConfig::from_env().unwrap();
    assert_eq!(defaults.demucs_bin, PathBuf::from("demucs"));
    assert_eq!(defaults.ffmpeg_bin, PathBuf::from("ffmpeg"));
    assert_eq!(defaults.model_name, "htdemucs");
    assert_eq!(defaults.timeout, None);

    std::env::set_var(DEMUCS_BIN_VAR, "/opt/demucs/bin/demucs");
    std::env::set_var(MODEL_VAR, "mdx_extra");
    std::env::set_var(TOOL_TIMEOUT_VAR, "90");

    let cfg = ToolConfig::from_env().unwrap();
    assert_eq!(cfg.demucs_bin, PathBuf::from("/opt/demucs/bin/demucs"));
    assert_eq!(cfg.timeout, Some(Duration::from_secs(90)));

    let engine = cfg.separation_engine();
    assert_eq!(engine.model_name(), "mdx_extra");
    assert_eq!(engine.timeout, Some(Duration::from_secs(90)));
    assert_eq!(cfg.resampler().program, PathBuf::from("ffmpeg"));

    std::env::set_var(TOOL_TIMEOUT_VAR, "soon");
    assert!(matches!(ToolConfig::from_env(), Err(BatchError::Config(_))));

    for var in [DEMUCS_BIN_VAR, MODEL_VAR, TOOL_TIMEOUT_VAR] {
        std::env::remove_var(var);
    }
}
