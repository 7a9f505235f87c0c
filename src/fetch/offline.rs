use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{FetchError, FetchResult, Fetcher, VideoDetails, VideoSummary};

/// Demo videos served when no remote backend is available.
///
/// Loaded from a TOML file of `[[videos]]` tables, or [`Catalog::builtin`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    videos: Vec<VideoDetails>,
}

impl Catalog {
    pub fn new(videos: Vec<VideoDetails>) -> Self {
        Self { videos }
    }

    pub fn builtin() -> Self {
        let entry = |id: &str, title: &str, channel: &str, duration: &str, description: &str| {
            VideoDetails {
                id: id.to_owned(),
                title: title.to_owned(),
                channel: channel.to_owned(),
                duration: duration.to_owned(),
                description: description.to_owned(),
                thumbnail: None,
                webpage_url: None,
            }
        };
        Self::new(vec![
            entry(
                "a1",
                "Getting started with Rust web servers",
                "PlayYT Labs",
                "10:01",
                "A beginner-friendly intro to serving HTTP.",
            ),
            entry(
                "b2",
                "Rust Basics Tutorial",
                "Code Academy",
                "14:22",
                "Learn the language fundamentals.",
            ),
            entry(
                "c3",
                "Understanding async IO",
                "Tech Explained",
                "9:45",
                "Concepts and patterns for async IO.",
            ),
            entry(
                "d4",
                "Top 10 streaming tips",
                "PlayYT Labs",
                "7:30",
                "Tips and tricks for seekable video playback.",
            ),
        ])
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading catalog {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing catalog {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Answers from a fixed [`Catalog`]; downloads are refused.
#[derive(Debug, Clone)]
pub struct Offline {
    catalog: Catalog,
}

impl Offline {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

impl Fetcher for Offline {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn search(&self, query: &str) -> FetchResult<Vec<VideoSummary>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .catalog
            .videos
            .iter()
            .filter(|video| {
                video.title.to_lowercase().contains(&query)
                    || video.channel.to_lowercase().contains(&query)
            })
            .map(VideoDetails::summary)
            .collect())
    }

    fn video(&self, id: &str) -> FetchResult<Option<VideoDetails>> {
        Ok(self.catalog.videos.iter().find(|video| video.id == id).cloned())
    }

    fn download(&self, _id: &str, _dest_dir: &Path) -> FetchResult<PathBuf> {
        Err(FetchError::Disabled)
    }
}
