use std::fs;
use tempfile::tempdir;

use stem_batch_core::{should_skip, GateMode, SourceRef, WorkItem};

fn write_wav(path: &std::path::Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..1600 {
        w.write_sample(((i % 64) as i16 - 32) * 100).unwrap();
    }
    w.finalize().unwrap();
}

#[test]
fn existing_target_is_skipped_missing_is_not() {
    let tmp = tempdir().unwrap();
    let item = WorkItem::new("song", SourceRef::Remote("http://h/song".into()), tmp.path());

    assert!(!should_skip(&item, GateMode::Exists));

    fs::write(item.target_path(), b"anything").unwrap();
    assert!(should_skip(&item, GateMode::Exists));
}

#[test]
fn truncated_file_passes_existence_check_but_not_wav_check() {
    let tmp = tempdir().unwrap();
    let item = WorkItem::new("cut", SourceRef::Remote("http://h/cut".into()), tmp.path());
    fs::write(item.target_path(), b"RIFF\x00\x00").unwrap();

    assert!(should_skip(&item, GateMode::Exists));
    assert!(!should_skip(&item, GateMode::ValidWav));

    write_wav(item.target_path());
    assert!(should_skip(&item, GateMode::ValidWav));
}

#[test]
fn target_path_is_derived_from_identity_only() {
    let tmp = tempdir().unwrap();
    let a = WorkItem::new("x", SourceRef::Local("/in/one/x.mp3".into()), tmp.path());
    let b = WorkItem::new("x", SourceRef::Local("/in/two/x.wav".into()), tmp.path());
    assert_eq!(a.target_path(), tmp.path().join("x.wav"));
    assert_eq!(a.target_path(), b.target_path());
}
