use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use stem_batch_core::{default_jobs, run_pool, FailureKind, Outcome, SourceRef, WorkItem};

fn items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| {
            WorkItem::new(
                format!("item{i:02}"),
                SourceRef::Remote(format!("http://h/{i}")),
                std::path::Path::new("/out"),
            )
        })
        .collect()
}

#[test]
fn one_failure_does_not_affect_siblings() {
    let list = items(6);
    let outcomes = run_pool(
        &list,
        |item| match item.identity() {
            "item02" => Outcome::Failed {
                kind: FailureKind::Fetch,
                reason: "404".into(),
            },
            "item04" => panic!("worker blew up"),
            _ => Outcome::Completed,
        },
        3,
    );

    assert_eq!(outcomes.len(), 6);
    for item in &list {
        let outcome = &outcomes[item.identity()];
        match item.identity() {
            "item02" => assert!(matches!(outcome, Outcome::Failed { kind: FailureKind::Fetch, .. })),
            "item04" => match outcome {
                Outcome::Failed { reason, .. } => assert!(reason.contains("worker blew up")),
                other => panic!("expected failure, got {other:?}"),
            },
            _ => assert_eq!(outcome, &Outcome::Completed),
        }
    }
}

#[test]
fn concurrency_never_exceeds_the_limit() {
    let list = items(12);
    let active = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);

    let outcomes = run_pool(
        &list,
        |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
            done.fetch_add(1, Ordering::SeqCst);
            Outcome::Completed
        },
        2,
    );

    assert_eq!(outcomes.len(), 12);
    // every worker finished before run_pool returned
    assert_eq!(done.load(Ordering::SeqCst), 12);
    assert_eq!(active.load(Ordering::SeqCst), 0);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {peak}");
}

#[test]
fn empty_input_returns_nothing() {
    let outcomes = run_pool(&[], |_| Outcome::Completed, 4);
    assert!(outcomes.is_empty());
}

#[test]
fn default_jobs_is_at_least_one() {
    assert!(default_jobs(0) >= 1);
    assert!(default_jobs(usize::MAX) == 1);
    assert!(default_jobs(1) <= default_jobs(0));
}
