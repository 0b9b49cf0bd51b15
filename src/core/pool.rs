//! Bounded worker pool over OS threads.
//!
//! Every item is handed to the worker exactly once; a failing or panicking
//! worker only affects its own item. `run_pool` returns after all workers
//! finished.

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
};

use rayon::prelude::*;
use tracing::{error, warn};

use crate::{
    error::FailureKind,
    types::{Outcome, WorkItem},
};

/// Host parallelism minus `reserved` units, never below one.
pub fn default_jobs(reserved: usize) -> usize {
    let n = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);
    std::cmp::max(1, n.saturating_sub(reserved))
}

/// Runs `worker` over `items` with at most `max_concurrency` workers in
/// flight. Results are keyed by item identity.
pub fn run_pool<F>(items: &[WorkItem], worker: F, max_concurrency: usize) -> HashMap<String, Outcome>
where
    F: Fn(&WorkItem) -> Outcome + Sync,
{
    if items.is_empty() {
        return HashMap::new();
    }

    let threads = max_concurrency.clamp(1, items.len());
    let run_one = |item: &WorkItem| -> (String, Outcome) {
        let outcome = catch_unwind(AssertUnwindSafe(|| worker(item))).unwrap_or_else(|panic| {
            let reason = panic_message(panic.as_ref());
            error!(identity = item.identity(), %reason, "worker panicked");
            Outcome::Failed {
                kind: FailureKind::Other,
                reason: format!("worker panicked: {reason}"),
            }
        });
        (item.identity().to_string(), outcome)
    };

    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| items.par_iter().map(run_one).collect()),
        Err(e) => {
            warn!(error = %e, "failed to build worker pool, running items sequentially");
            items.iter().map(run_one).collect()
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
