//! Remote video lookup and download.
//!
//! The server talks to a [`Fetcher`] trait object chosen once at startup:
//! [`YtDlp`] when the `yt-dlp` tool is configured and installed, otherwise
//! [`Offline`], which answers from a demo [`Catalog`] and refuses downloads.

mod offline;
mod ytdlp;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{FetchBackend, Settings};

pub use offline::{Catalog, Offline};
pub use ytdlp::YtDlp;

pub const DEFAULT_SEARCH_LIMIT: usize = 12;
const MAX_VIDEO_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote fetching is disabled")]
    Disabled,
    #[error("invalid video id {0:?}")]
    InvalidId(String),
    #[error(transparent)]
    Tool(#[from] anyhow::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Everything the detail view shows for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
}

impl VideoDetails {
    pub fn summary(&self) -> VideoSummary {
        VideoSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            channel: self.channel.clone(),
            duration: self.duration.clone(),
            thumbnail: self.thumbnail.clone(),
        }
    }
}

/// Remote video source. Calls block (they may spawn processes), so async
/// callers go through `spawn_blocking`.
pub trait Fetcher: Send + Sync {
    /// Short name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    fn search(&self, query: &str) -> FetchResult<Vec<VideoSummary>>;

    /// `Ok(None)` when the video does not exist or cannot be looked up.
    fn video(&self, id: &str) -> FetchResult<Option<VideoDetails>>;

    /// Downloads `id` into `dest_dir` and returns the written file's path.
    fn download(&self, id: &str, dest_dir: &Path) -> FetchResult<PathBuf>;
}

/// Picks the fetcher for the life of the process.
pub fn select_fetcher(settings: &Settings) -> Box<dyn Fetcher> {
    if settings.fetch_backend == FetchBackend::YtDlp {
        let ytdlp = YtDlp::new(&settings.ytdlp_path)
            .with_cookies(settings.cookies_file.clone())
            .with_search_limit(settings.search_limit);
        match ytdlp.ensure_available() {
            Ok(()) => {
                info!(program = %settings.ytdlp_path.display(), "using yt-dlp fetcher");
                return Box::new(ytdlp);
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "yt-dlp unavailable, falling back to offline catalog");
            }
        }
    }

    let catalog = match &settings.catalog_file {
        Some(path) => Catalog::load(path).unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "using built-in demo catalog");
            Catalog::builtin()
        }),
        None => Catalog::builtin(),
    };
    info!(videos = catalog.len(), "using offline fetcher");
    Box::new(Offline::new(catalog))
}

/// YouTube ids are short and URL-safe. Anything else is refused before it
/// reaches a command line.
pub fn validate_video_id(id: &str) -> FetchResult<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_VIDEO_ID_LEN
        && !id.starts_with('-')
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidId(id.to_owned()))
    }
}

/// Renders durations as `H:MM:SS` or `M:SS` for short clips.
pub fn format_duration(duration: u64) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids_are_validated() {
        assert!(validate_video_id("dQw4w9WgXcQ").is_ok());
        assert!(validate_video_id("a1").is_ok());
        assert!(validate_video_id("abc_DEF-12").is_ok());
        let too_long = "x".repeat(65);
        for bad in ["", "-rf", "a b", "a/b", "id;rm", "ünï", too_long.as_str()] {
            assert!(
                matches!(validate_video_id(bad), Err(FetchError::InvalidId(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn durations_render_like_players() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(601), "10:01");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn offline_backend_selected_when_configured() {
        let settings = Settings {
            fetch_backend: FetchBackend::Offline,
            ..Settings::default()
        };
        let fetcher = select_fetcher(&settings);
        assert_eq!(fetcher.name(), "offline");
    }

    #[test]
    fn missing_ytdlp_falls_back_to_offline() {
        let settings = Settings {
            fetch_backend: FetchBackend::YtDlp,
            ytdlp_path: PathBuf::from("/nonexistent/yt-dlp-for-tests"),
            ..Settings::default()
        };
        let fetcher = select_fetcher(&settings);
        assert_eq!(fetcher.name(), "offline");
    }
}
