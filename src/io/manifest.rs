//! Manifest reading: CSV files with an identity column, a source URL column
//! and an inclusion flag. Only rows flagged `true` (any case) become work.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{BatchError, Result},
    io::paths::is_flat_identity,
    types::{ManifestColumns, ManifestRecord, SourceRef, WorkItem},
};

const MANIFEST_EXTENSION: &str = "csv";

/// Parses the inclusion flag the way the manifests write it.
pub fn parse_include_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Reads every record from a manifest file, or from every `*.csv` file in a
/// directory (concatenated in file-name order).
pub fn read_manifest(path: &Path, columns: &ManifestColumns) -> Result<Vec<ManifestRecord>> {
    if path.is_file() {
        return read_manifest_file(path, columns);
    }

    // In a directory a broken manifest is skipped so the others still yield work.
    let mut records = Vec::new();
    for file in &manifest_files(path)? {
        match read_manifest_file(file, columns) {
            Ok(mut rows) => {
                debug!(file = %file.display(), rows = rows.len(), "read manifest");
                records.append(&mut rows);
            }
            Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable manifest"),
        }
    }
    Ok(records)
}

fn manifest_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(BatchError::fs(path))? {
        let p = entry.map_err(BatchError::fs(path))?.path();
        let is_csv = p
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(MANIFEST_EXTENSION))
            .unwrap_or(false);
        if is_csv && p.is_file() {
            files.push(p);
        }
    }
    files.sort();

    if files.is_empty() {
        warn!(dir = %path.display(), "no manifest files found");
    }
    Ok(files)
}

fn read_manifest_file(file: &Path, columns: &ManifestColumns) -> Result<Vec<ManifestRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(file)
        .map_err(|e| BatchError::Manifest(format!("{}: {e}", file.display())))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                BatchError::Manifest(format!(
                    "{}: missing column `{name}`",
                    file.display()
                ))
            })
    };

    let id_col = column(&columns.identity)?;
    let url_col = column(&columns.url)?;
    let include_col = column(&columns.include)?;

    let mut out = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| BatchError::Manifest(format!("{}: {e}", file.display())))?;
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        let identity = field(id_col);
        if identity.is_empty() {
            warn!(file = %file.display(), row = row + 1, "skipping manifest row without identity");
            continue;
        }
        if !is_flat_identity(&identity) {
            warn!(
                file = %file.display(),
                row = row + 1,
                identity = %identity,
                "skipping manifest row whose identity is not a plain file name"
            );
            continue;
        }

        out.push(ManifestRecord {
            identity,
            url: field(url_col),
            include: parse_include_flag(record.get(include_col).unwrap_or("")),
        });
    }
    Ok(out)
}

/// Turns included records into fetch work items, in row order.
pub fn manifest_work_items(records: &[ManifestRecord], output_dir: &Path) -> Vec<WorkItem> {
    records
        .iter()
        .filter(|r| r.include)
        .map(|r| WorkItem::new(r.identity.clone(), SourceRef::Remote(r.url.clone()), output_dir))
        .collect()
}
