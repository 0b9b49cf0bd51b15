use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};
use tempfile::tempdir;

use stem_batch_core::core::chunker::local_work_items;
use stem_batch_core::io::paths::resample_temp_path;
use stem_batch_core::{
    chunk_count, chunk_items, discover_audio_files, run_chunked, set_batch_progress_callback,
    BatchProgress, DiscoveryOptions, FailureKind, Outcome, SourceRef, Stage, WorkItem,
};

fn items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| {
            WorkItem::new(
                format!("{i:03}"),
                SourceRef::Remote(format!("http://h/{i}")),
                Path::new("/out"),
            )
        })
        .collect()
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"audio").unwrap();
}

fn names(files: &[PathBuf]) -> HashSet<String> {
    files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn chunks_cover_every_item_exactly_once() {
    for n in [0usize, 1, 7, 10, 25] {
        let list = items(n);
        for size in [1usize, 3, 10, 200] {
            let chunks = chunk_items(&list, size);
            assert_eq!(chunks.len(), chunk_count(n, size), "n={n} size={size}");
            assert_eq!(chunks.len(), (n + size - 1) / size);
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));

            let rebuilt: Vec<WorkItem> = chunks.concat();
            assert_eq!(rebuilt, list, "n={n} size={size}");
        }
    }
}

#[test]
fn discovery_filters_extensions_and_recurses() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("in");
    touch(&root.join("a.wav"));
    touch(&root.join("nested/deeper/b.MP3"));
    touch(&root.join("c.txt"));
    touch(&root.join("d.flac"));

    let found = discover_audio_files(&root, &DiscoveryOptions::default()).unwrap();
    assert_eq!(names(&found), HashSet::from(["a.wav".to_string(), "b.MP3".to_string()]));

    let flat = DiscoveryOptions {
        recursive: false,
        ..DiscoveryOptions::default()
    };
    let found = discover_audio_files(&root, &flat).unwrap();
    assert_eq!(names(&found), HashSet::from(["a.wav".to_string()]));

    let with_flac = DiscoveryOptions {
        extensions: vec!["flac".into()],
        ..DiscoveryOptions::default()
    };
    let found = discover_audio_files(&root, &with_flac).unwrap();
    assert_eq!(names(&found), HashSet::from(["d.flac".to_string()]));
}

#[test]
fn discovery_skips_the_output_directory() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("in");
    touch(&root.join("keep.wav"));
    touch(&root.join("cleaned/old.wav"));
    touch(&root.join("cleaned/htdemucs/old/vocals.wav"));

    let opts = DiscoveryOptions {
        exclude_dir: Some(root.join("cleaned")),
        ..DiscoveryOptions::default()
    };
    let found = discover_audio_files(&root, &opts).unwrap();
    assert_eq!(names(&found), HashSet::from(["keep.wav".to_string()]));
}

#[test]
fn interrupted_resample_leftovers_are_not_work() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("audio_files");
    let audio = root.join("a.wav");
    touch(&audio);
    touch(&resample_temp_path(&audio));
    touch(&root.join(".b.wav"));

    let found = discover_audio_files(&root, &DiscoveryOptions::default()).unwrap();
    let list = local_work_items(found, &tmp.path().join("cleaned_audio"));
    let ids: Vec<&str> = list.iter().map(|i| i.identity()).collect();
    assert_eq!(ids, vec!["a"]);
}

#[test]
fn discovery_of_missing_root_fails() {
    let tmp = tempdir().unwrap();
    assert!(discover_audio_files(&tmp.path().join("missing"), &DiscoveryOptions::default()).is_err());
}

#[test]
fn colliding_identities_keep_the_first_file() {
    let out = Path::new("/out");
    let files = vec![
        PathBuf::from("/in/a.wav"),
        PathBuf::from("/in/b.wav"),
        PathBuf::from("/in/sub/a.mp3"),
    ];
    let list = local_work_items(files, out);
    let ids: Vec<&str> = list.iter().map(|i| i.identity()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(list[0].source(), &SourceRef::Local(PathBuf::from("/in/a.wav")));
    assert_eq!(list[0].target_path(), out.join("a.wav"));
}

#[test]
fn chunks_run_sequentially_and_counts_add_up() {
    let list = items(10);
    let chunk_size = 3;
    let finished = Mutex::new(HashSet::<usize>::new());
    let violations = Mutex::new(Vec::<usize>::new());

    let batch_totals = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batch_totals);
    set_batch_progress_callback(move |event| {
        if let BatchProgress::ChunkFinished {
            index,
            completed,
            skipped,
            failed,
            ..
        } = event
        {
            sink.lock().unwrap().push((index, completed, skipped, failed));
        }
    });

    let report = run_chunked(Stage::Fetch, &list, chunk_size, 4, |item| {
        let idx: usize = item.identity().parse().unwrap();
        let chunk_start = (idx / chunk_size) * chunk_size;
        {
            let done = finished.lock().unwrap();
            if (0..chunk_start).any(|earlier| !done.contains(&earlier)) {
                violations.lock().unwrap().push(idx);
            }
        }
        thread::sleep(Duration::from_millis(5));
        finished.lock().unwrap().insert(idx);

        match idx {
            4 => Outcome::Failed {
                kind: FailureKind::Filesystem,
                reason: "disk full".into(),
            },
            7 | 8 => Outcome::Skipped,
            _ => Outcome::Completed,
        }
    });

    assert!(violations.lock().unwrap().is_empty(), "a chunk started before the previous one finished");
    assert_eq!(finished.lock().unwrap().len(), 10);

    assert_eq!(report.stage, Stage::Fetch);
    assert_eq!(report.found, 10);
    assert_eq!(report.chunks, 4);
    assert_eq!(report.completed, 7);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed(), report.found);
    assert_eq!(report.failures[0].identity, "004");
    assert_eq!(report.failures[0].kind, FailureKind::Filesystem);

    assert_eq!(
        *batch_totals.lock().unwrap(),
        vec![(1, 3, 0, 0), (2, 2, 0, 1), (3, 1, 2, 0), (4, 1, 0, 0)]
    );
}
