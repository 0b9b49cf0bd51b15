use std::sync::{Mutex, OnceLock};

use crate::types::{Outcome, Stage, StageReport};

#[derive(Clone, Debug)]
pub enum BatchProgress<'a> {
    StageStarted { stage: Stage, found: usize, chunks: usize },
    ChunkStarted { index: usize, total: usize, size: usize },
    ItemFinished { identity: &'a str, outcome: &'a Outcome },
    ChunkFinished {
        index: usize,
        total: usize,
        completed: usize,
        skipped: usize,
        failed: usize,
    },
    StageFinished(&'a StageReport),
}

type ProgressCallback = Box<dyn Fn(BatchProgress<'_>) + Send + 'static>;

static BATCH_PROGRESS_CB: OnceLock<Mutex<Option<ProgressCallback>>> = OnceLock::new();

pub fn set_batch_progress_callback(cb: impl Fn(BatchProgress<'_>) + Send + 'static) {
    let slot = BATCH_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn emit_batch_progress(event: BatchProgress<'_>) {
    if let Some(m) = BATCH_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(event);
            }
        }
    }
}
