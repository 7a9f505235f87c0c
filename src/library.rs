//! Listing of the download directory.
//!
//! Only the top level of the directory is scanned; the downloader writes
//! every file directly into it. Everything here is blocking filesystem work
//! and is expected to run on `spawn_blocking`.

use std::{path::Path, time::SystemTime};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::content_type::is_video_extension;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// One playable file in the library, shaped for the JSON API.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryEntry {
    pub filename: String,
    /// File stem; the downloader names files after the video title.
    pub title: String,
    pub extension: String,
    pub size_bytes: u64,
    pub size_formatted: String,
    pub modified: DateTime<Utc>,
    pub modified_formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub total_files: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_download: Option<String>,
}

/// Lists video files in `dir`, newest first. A missing or unreadable
/// directory is an empty library, and unreadable files are skipped.
pub fn scan_library(dir: &Path) -> Vec<LibraryEntry> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut entries: Vec<LibraryEntry> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable library entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let extension = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase())?;
            if !is_video_extension(&extension) {
                return None;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping library file");
                    return None;
                }
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some(library_entry(
                entry.file_name().to_string_lossy().into_owned(),
                extension,
                metadata.len(),
                modified,
            ))
        })
        .collect();

    entries.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    entries
}

/// Describes a single library file, or `None` when it is not a readable
/// video file directly inside `dir`.
pub fn describe_file(dir: &Path, filename: &str) -> Option<LibraryEntry> {
    let path = dir.join(filename);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| is_video_extension(ext))?;
    let metadata = std::fs::metadata(&path).ok().filter(|m| m.is_file())?;
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    Some(library_entry(
        filename.to_owned(),
        extension,
        metadata.len(),
        modified,
    ))
}

fn library_entry(
    filename: String,
    extension: String,
    size_bytes: u64,
    modified: SystemTime,
) -> LibraryEntry {
    let modified: DateTime<Utc> = modified.into();
    let title = Path::new(&filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.clone());
    LibraryEntry {
        title,
        extension,
        size_bytes,
        size_formatted: format_file_size(size_bytes),
        modified_formatted: format_modified(modified),
        modified,
        filename,
    }
}

/// Aggregates a scanned library. `entries` must be newest first, as
/// returned by [`scan_library`].
pub fn library_stats(entries: &[LibraryEntry]) -> LibraryStats {
    let total_size = entries.iter().map(|entry| entry.size_bytes).sum();
    LibraryStats {
        total_files: entries.len(),
        total_size,
        total_size_formatted: format_file_size(total_size),
        latest_download: entries.first().map(|entry| entry.modified_formatted.clone()),
    }
}

/// Renders sizes as `0 B`, `512.0 B`, `1.5 KB`, ... using 1024 steps.
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_owned();
    }

    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", SIZE_UNITS[unit])
}

/// Local wall-clock time, the way the library is shown to its owner.
fn format_modified(modified: DateTime<Utc>) -> String {
    modified
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, time::Duration};
    use tempfile::tempdir;

    fn touch(path: &Path, len: usize, age_secs: u64) {
        fs::write(path, vec![0u8; len]).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn scan_lists_videos_newest_first() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("old.mp4"), 10, 3600);
        touch(&dir.path().join("new.WEBM"), 2048, 60);
        touch(&dir.path().join("notes.txt"), 5, 10);
        touch(&dir.path().join("partial.mp4.part"), 5, 10);
        fs::create_dir(dir.path().join("folder.mp4")).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested").join("deep.mp4"), 5, 10);

        let entries = scan_library(dir.path());
        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["new.WEBM", "old.mp4"]);

        let newest = &entries[0];
        assert_eq!(newest.title, "new");
        assert_eq!(newest.extension, "webm");
        assert_eq!(newest.size_bytes, 2048);
        assert_eq!(newest.size_formatted, "2.0 KB");
        assert_eq!(newest.modified_formatted.len(), "2024-01-01 00:00".len());
    }

    #[test]
    fn describe_file_matches_scan() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("clip.mov"), 300, 5);
        touch(&dir.path().join("clip.txt"), 300, 5);

        let entry = describe_file(dir.path(), "clip.mov").unwrap();
        let scanned = &scan_library(dir.path())[0];
        assert_eq!(entry.filename, scanned.filename);
        assert_eq!(entry.size_bytes, 300);
        assert_eq!(entry.modified, scanned.modified);
        assert!(describe_file(dir.path(), "clip.txt").is_none());
        assert!(describe_file(dir.path(), "absent.mp4").is_none());
    }

    #[test]
    fn missing_directory_is_empty_library() {
        let dir = tempdir().unwrap();
        assert!(scan_library(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn stats_sum_sizes_and_report_latest() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.mp4"), 1024, 100);
        touch(&dir.path().join("b.mkv"), 512, 10);

        let entries = scan_library(dir.path());
        let stats = library_stats(&entries);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 1536);
        assert_eq!(stats.total_size_formatted, "1.5 KB");
        assert_eq!(stats.latest_download, Some(entries[0].modified_formatted.clone()));

        let empty = library_stats(&[]);
        assert_eq!(empty.total_files, 0);
        assert_eq!(empty.total_size_formatted, "0 B");
        assert!(empty.latest_download.is_none());
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024u64.pow(4)), "3.0 TB");
        assert_eq!(format_file_size(2048 * 1024u64.pow(4)), "2048.0 TB");
    }
}
