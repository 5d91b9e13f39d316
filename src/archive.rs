//! Zip packaging of processed files

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::files::ProcessedFile;

/// Archive file name for a batch finished at `now`: `watermarked_<unix millis>.zip`
pub fn archive_name(now: DateTime<Utc>) -> String {
    format!("watermarked_{}.zip", now.timestamp_millis())
}

/// Returns true for formats that are already compressed and won't benefit from Deflate
fn is_already_compressed(name: &str) -> bool {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "docx" | "xlsx" | "zip")
}

/// Entries in first-seen order; a repeated name keeps its first slot but
/// takes the later file's bytes
fn collapse_duplicates(files: &[ProcessedFile]) -> Vec<&ProcessedFile> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<&ProcessedFile> = Vec::with_capacity(files.len());

    for file in files {
        match slots.get(file.name.as_str()) {
            Some(&slot) => {
                tracing::warn!(name = %file.name, "duplicate archive entry, later file wins");
                entries[slot] = file;
            }
            None => {
                slots.insert(file.name.as_str(), entries.len());
                entries.push(file);
            }
        }
    }

    entries
}

/// Build a zip archive in memory with one entry per processed file.
///
/// Entry names are the output names; collisions are not renamed.
pub fn build_archive(files: &[ProcessedFile]) -> Result<Vec<u8>> {
    zip_entries(&collapse_duplicates(files))
}

fn zip_entries(entries: &[&ProcessedFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let stored = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Stored)
        .unix_permissions(0o644);
    let deflated = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for file in entries {
        let opts = if is_already_compressed(&file.name) {
            stored
        } else {
            deflated
        };
        zip.start_file(file.name.as_str(), opts)?;
        zip.write_all(&file.bytes)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Build the archive and write it into `dir` under [`archive_name`]
pub fn write_archive(files: &[ProcessedFile], dir: &Path) -> Result<PathBuf> {
    let entries = collapse_duplicates(files);
    let bytes = zip_entries(&entries)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(archive_name(Utc::now()));
    fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "archive written");
    Ok(path)
}
