use std::path::Path;

use crate::types::{GateMode, WorkItem};

/// True when the item's target already exists and can be skipped.
///
/// With [`GateMode::Exists`] no content is inspected, so a truncated file
/// left by an interrupted run counts as done. [`GateMode::ValidWav`]
/// additionally requires a readable WAV header.
pub fn should_skip(item: &WorkItem, mode: GateMode) -> bool {
    target_done(item.target_path(), mode)
}

pub fn target_done(path: &Path, mode: GateMode) -> bool {
    match mode {
        GateMode::Exists => path.exists(),
        GateMode::ValidWav => path.is_file() && hound::WavReader::open(path).is_ok(),
    }
}
