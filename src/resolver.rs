//! Confines user-supplied filenames to the download directory.

use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid file name")]
    InvalidPath,
    #[error("file not found")]
    NotFound,
    #[error("inspecting media file: {0}")]
    Io(#[source] io::Error),
}

/// A library file that was just validated against the root directory.
///
/// Only [`MediaRoot::resolve`] builds these, so `path` is always inside the
/// root. Nothing here is cached: the file may be replaced or deleted between
/// requests.
#[derive(Debug, Clone)]
pub struct MediaFile {
    filename: String,
    path: PathBuf,
    size_bytes: u64,
    extension: Option<String>,
}

impl MediaFile {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }
}

/// Canonicalized download directory.
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    /// Canonicalizes `dir`, which must already exist as a directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let root = std::fs::canonicalize(dir)
            .with_context(|| format!("resolving download directory {}", dir.display()))?;
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Maps `filename` to a regular file directly inside the root.
    ///
    /// Names are checked lexically before any filesystem access, so traversal
    /// attempts such as `../../etc/passwd` never reach `stat`. The canonical
    /// path is then re-checked to catch symlinks pointing out of the root.
    pub async fn resolve(&self, filename: &str) -> Result<MediaFile, ResolveError> {
        if !is_plain_segment(filename) {
            return Err(ResolveError::InvalidPath);
        }

        let candidate = match tokio::fs::canonicalize(self.root.join(filename)).await {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ResolveError::NotFound);
            }
            Err(err) => return Err(ResolveError::Io(err)),
        };

        if !candidate.starts_with(&self.root) || candidate == self.root {
            return Err(ResolveError::InvalidPath);
        }

        let metadata = match tokio::fs::metadata(&candidate).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ResolveError::NotFound);
            }
            Err(err) => return Err(ResolveError::Io(err)),
        };
        if !metadata.is_file() {
            return Err(ResolveError::NotFound);
        }

        let extension = candidate
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        Ok(MediaFile {
            filename: filename.to_owned(),
            path: candidate,
            size_bytes: metadata.len(),
            extension,
        })
    }
}

/// Longest single path component common filesystems accept, in bytes.
const MAX_NAME_LEN: usize = 255;

fn is_plain_segment(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn root_with_file() -> (tempfile::TempDir, MediaRoot) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clip.MP4"), b"0123456789").unwrap();
        let root = MediaRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn resolves_plain_file_inside_root() {
        let (_dir, root) = root_with_file();
        let file = root.resolve("clip.MP4").await.unwrap();
        assert!(file.path().starts_with(root.path()));
        assert_eq!(file.filename(), "clip.MP4");
        assert_eq!(file.size_bytes(), 10);
        assert_eq!(file.extension(), Some("mp4"));
    }

    #[tokio::test]
    async fn rejects_traversal_and_separators() {
        let (_dir, root) = root_with_file();
        for name in [
            "",
            ".",
            "..",
            "../../etc/passwd",
            "/etc/passwd",
            "sub/clip.MP4",
            "..\\clip.MP4",
            "clip\0.mp4",
        ] {
            assert!(
                matches!(root.resolve(name).await, Err(ResolveError::InvalidPath)),
                "{name:?}"
            );
        }
    }

    #[tokio::test]
    async fn overlong_name_is_invalid() {
        let (_dir, root) = root_with_file();
        let name = format!("{}.mp4", "a".repeat(300));
        assert!(matches!(root.resolve(&name).await, Err(ResolveError::InvalidPath)));

        let longest = format!("{}.mp4", "a".repeat(MAX_NAME_LEN - 4));
        assert!(matches!(root.resolve(&longest).await, Err(ResolveError::NotFound)));
    }

    #[tokio::test]
    async fn missing_file_and_directories_are_not_found() {
        let (dir, root) = root_with_file();
        fs::create_dir(dir.path().join("nested")).unwrap();
        assert!(matches!(root.resolve("nope.mp4").await, Err(ResolveError::NotFound)));
        assert!(matches!(root.resolve("nested").await, Err(ResolveError::NotFound)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_root_is_invalid() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.mp4"), b"secret").unwrap();
        let (dir, root) = root_with_file();
        std::os::unix::fs::symlink(outside.path().join("secret.mp4"), dir.path().join("link.mp4"))
            .unwrap();
        assert!(matches!(root.resolve("link.mp4").await, Err(ResolveError::InvalidPath)));
    }

    #[test]
    fn root_must_be_existing_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(MediaRoot::new(&file).is_err());
        assert!(MediaRoot::new(dir.path().join("missing")).is_err());
    }
}
