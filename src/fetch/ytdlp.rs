use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    DEFAULT_SEARCH_LIMIT, FetchResult, Fetcher, VideoDetails, VideoSummary, format_duration,
    validate_video_id,
};

/// Output template for downloads. The id keeps names unique across videos
/// sharing a title.
const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";
/// Browsers play progressive mp4 everywhere; anything else is a fallback.
const DOWNLOAD_FORMAT: &str = "best[ext=mp4]/best";

/// Subset of yt-dlp's `--dump-single-json` payload. Search results are
/// playlists whose `entries` carry the same fields.
#[derive(Debug, Deserialize)]
struct EntryInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    description: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<ThumbnailInfo>,
    webpage_url: Option<String>,
    #[serde(default)]
    entries: Vec<EntryInfo>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailInfo {
    url: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
}

impl EntryInfo {
    fn channel(&self) -> String {
        self.uploader
            .clone()
            .or_else(|| self.channel.clone())
            .unwrap_or_default()
    }

    fn duration_text(&self) -> String {
        self.duration
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
            .map(|seconds| format_duration(seconds as u64))
            .unwrap_or_default()
    }

    /// Prefers the explicit `thumbnail`, else the widest listed one.
    fn best_thumbnail(&self) -> Option<String> {
        if let Some(thumb) = self.thumbnail.as_ref().filter(|t| !t.is_empty()) {
            return Some(thumb.clone());
        }
        self.thumbnails
            .iter()
            .filter(|thumb| thumb.url.is_some())
            .max_by_key(|thumb| (thumb.width.unwrap_or(0), thumb.height.unwrap_or(0)))
            .and_then(|thumb| thumb.url.clone())
    }

    fn into_summary(self) -> Option<VideoSummary> {
        let id = self.id.clone()?;
        Some(VideoSummary {
            title: self.title.clone().unwrap_or_else(|| id.clone()),
            channel: self.channel(),
            duration: self.duration_text(),
            thumbnail: self.best_thumbnail(),
            id,
        })
    }

    fn into_details(self, fallback_url: String) -> Option<VideoDetails> {
        let id = self.id.clone()?;
        Some(VideoDetails {
            title: self.title.clone().unwrap_or_else(|| id.clone()),
            channel: self.channel(),
            duration: self.duration_text(),
            description: self.description.clone().unwrap_or_default(),
            thumbnail: self.best_thumbnail(),
            webpage_url: Some(self.webpage_url.unwrap_or(fallback_url)),
            id,
        })
    }
}

/// Drives the external `yt-dlp` program.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    cookies: Option<PathBuf>,
    search_limit: usize,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cookies: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_cookies(mut self, cookies: Option<PathBuf>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Runs `<program> --version` to fail loudly when the tool is missing.
    pub fn ensure_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => bail!(
                "{} is installed but returned a failure status",
                self.program.display()
            ),
            Err(err) => bail!(
                "{} is not installed or not in PATH: {}",
                self.program.display(),
                err
            ),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--no-warnings").arg("--no-progress");
        if let Some(cookies) = self.cookies.as_ref().filter(|path| path.exists()) {
            command.arg("--cookies").arg(cookies);
        }
        command
    }

    fn dump_json(&self, target: &str, extra: &[&str]) -> Result<Option<EntryInfo>> {
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .args(extra)
            .arg(target);

        let output = command
            .output()
            .with_context(|| format!("running {} for {}", self.program.display(), target))?;

        if !output.status.success() {
            debug!(lookup = target, status = %output.status, "metadata lookup failed");
            return Ok(None);
        }

        let info: EntryInfo =
            serde_json::from_slice(&output.stdout).context("deserializing yt-dlp JSON")?;
        Ok(Some(info))
    }
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

impl Fetcher for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn search(&self, query: &str) -> FetchResult<Vec<VideoSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let target = format!("ytsearch{}:{}", self.search_limit, query);
        let info = self
            .dump_json(&target, &["--flat-playlist"])?
            .ok_or_else(|| anyhow!("search for {query:?} failed"))?;

        Ok(info
            .entries
            .into_iter()
            .filter_map(EntryInfo::into_summary)
            .collect())
    }

    fn video(&self, id: &str) -> FetchResult<Option<VideoDetails>> {
        validate_video_id(id)?;
        let url = watch_url(id);
        let info = self.dump_json(&url, &["--no-playlist"])?;
        Ok(info.and_then(|info| info.into_details(url)))
    }

    fn download(&self, id: &str, dest_dir: &Path) -> FetchResult<PathBuf> {
        validate_video_id(id)?;
        let url = watch_url(id);
        info!(id, dest = %dest_dir.display(), "downloading video");

        let mut command = self.command();
        command
            .arg("--no-playlist")
            .arg("--restrict-filenames")
            .arg("--format")
            .arg(DOWNLOAD_FORMAT)
            .arg("--output")
            .arg(dest_dir.join(OUTPUT_TEMPLATE))
            // `--print` implies a dry run unless told otherwise.
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg(&url);

        let output = command
            .output()
            .with_context(|| format!("running {} for {}", self.program.display(), url))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "download failed for {} (status {}): {}",
                url,
                output.status,
                stderr.trim()
            )
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("yt-dlp did not report a file for {url}"))?;

        if !path.is_file() {
            return Err(anyhow!("downloaded file {} is missing", path.display()).into());
        }
        info!(id, path = %path.display(), "download complete");
        Ok(path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn install_ytdlp_stub(dir: &Path) -> PathBuf {
        let script_path = dir.join("yt-dlp");
        let script = r#"#!/usr/bin/env bash
set -euo pipefail
prev=""
output=""
for arg in "$@"; do
    if [[ "$prev" == "--output" ]]; then
        output="$arg"
    fi
    prev="$arg"
done
last="${@: -1}"
if [[ "$last" == "--version" ]]; then
    echo "2024.01.01"
    exit 0
fi
if [[ "$last" == ytsearch* ]]; then
cat <<'JSON'
{
  "_type": "playlist",
  "entries": [
    {"id": "alpha", "title": "Alpha Title", "uploader": "Chan", "duration": 125.0,
     "thumbnails": [{"url": "https://img/small.jpg", "width": 120, "height": 90},
                    {"url": "https://img/big.jpg", "width": 1280, "height": 720}]},
    {"title": "no id, skipped"},
    {"id": "beta", "channel": "Other", "thumbnail": "https://img/beta.jpg"}
  ]
}
JSON
exit 0
fi
if [[ "$last" == *"v=missing" ]]; then
    echo "ERROR: Video unavailable" >&2
    exit 1
fi
if [[ -n "$output" ]]; then
    target="$(dirname "$output")/Alpha_Title [alpha].mp4"
    printf 'video-bytes' > "$target"
    echo "[download] Destination: $target"
    echo "$target"
    exit 0
fi
cat <<'JSON'
{"id": "alpha", "title": "Alpha Title", "channel": "Chan", "duration": 3725,
 "description": "Long text", "webpage_url": "https://www.youtube.com/watch?v=alpha"}
JSON
"#;
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
        script_path
    }

    #[test]
    fn search_parses_entries() {
        let dir = tempdir().unwrap();
        let ytdlp = YtDlp::new(install_ytdlp_stub(dir.path())).with_search_limit(5);
        ytdlp.ensure_available().unwrap();

        let results = ytdlp.search("alpha").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "alpha");
        assert_eq!(results[0].channel, "Chan");
        assert_eq!(results[0].duration, "2:05");
        assert_eq!(results[0].thumbnail.as_deref(), Some("https://img/big.jpg"));
        assert_eq!(results[1].title, "beta");
        assert_eq!(results[1].channel, "Other");
        assert_eq!(results[1].duration, "");
        assert!(ytdlp.search("  ").unwrap().is_empty());
    }

    #[test]
    fn video_details_and_missing_videos() {
        let dir = tempdir().unwrap();
        let ytdlp = YtDlp::new(install_ytdlp_stub(dir.path()));

        let details = ytdlp.video("alpha").unwrap().unwrap();
        assert_eq!(details.title, "Alpha Title");
        assert_eq!(details.duration, "1:02:05");
        assert_eq!(details.description, "Long text");
        assert!(ytdlp.video("missing").unwrap().is_none());
        assert!(matches!(ytdlp.video("--exec"), Err(FetchError::InvalidId(_))));
    }

    #[test]
    fn download_returns_reported_path() {
        let dir = tempdir().unwrap();
        let bin = tempdir().unwrap();
        let ytdlp = YtDlp::new(install_ytdlp_stub(bin.path()));

        let path = ytdlp.download("alpha", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Alpha_Title [alpha].mp4"));
        assert_eq!(fs::read(&path).unwrap(), b"video-bytes");
    }

    #[test]
    fn missing_program_is_reported() {
        let ytdlp = YtDlp::new("/nonexistent/yt-dlp");
        assert!(ytdlp.ensure_available().is_err());
        assert!(matches!(ytdlp.search("x"), Err(FetchError::Tool(_))));
    }
}
