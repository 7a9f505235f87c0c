use anyhow::{Context, Result, bail};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{chunks::DEFAULT_CHUNK_SIZE, fetch::DEFAULT_SEARCH_LIMIT};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/playyt-env";
pub const DEFAULT_PLAYYT_PORT: u16 = 8000;
pub const DEFAULT_PLAYYT_HOST: &str = "127.0.0.1";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchBackend {
    #[default]
    YtDlp,
    Offline,
}

impl FetchBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "yt-dlp" | "ytdlp" => Ok(Self::YtDlp),
            "offline" | "disabled" | "demo" => Ok(Self::Offline),
            other => bail!("unknown fetch backend {other:?}"),
        }
    }
}

/// Raw values present in the env-style config file.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub download_dir: Option<PathBuf>,
    pub playyt_host: Option<String>,
    pub playyt_port: Option<u16>,
    pub fetch_backend: Option<FetchBackend>,
    pub ytdlp_path: Option<PathBuf>,
    pub cookies_file: Option<PathBuf>,
    pub search_limit: Option<usize>,
    pub catalog_file: Option<PathBuf>,
    pub stream_chunk_size: Option<usize>,
}

/// Effective server settings after defaults are applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub playyt_host: String,
    pub playyt_port: u16,
    pub fetch_backend: FetchBackend,
    pub ytdlp_path: PathBuf,
    pub cookies_file: Option<PathBuf>,
    pub search_limit: usize,
    pub catalog_file: Option<PathBuf>,
    pub stream_chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env_config(EnvConfig::default())
    }
}

impl Settings {
    pub fn from_env_config(cfg: EnvConfig) -> Self {
        Self {
            download_dir: cfg
                .download_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            playyt_host: cfg
                .playyt_host
                .unwrap_or_else(|| DEFAULT_PLAYYT_HOST.to_string()),
            playyt_port: cfg.playyt_port.unwrap_or(DEFAULT_PLAYYT_PORT),
            fetch_backend: cfg.fetch_backend.unwrap_or_default(),
            ytdlp_path: cfg
                .ytdlp_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_PATH)),
            cookies_file: cfg.cookies_file,
            search_limit: cfg.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            catalog_file: cfg.catalog_file,
            stream_chunk_size: cfg.stream_chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        }
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "DOWNLOAD_DIR" => cfg.download_dir = Some(PathBuf::from(value)),
                "PLAYYT_HOST" => cfg.playyt_host = Some(value.to_string()),
                "PLAYYT_PORT" => {
                    let port: u16 = value
                        .parse()
                        .with_context(|| format!("Parsing PLAYYT_PORT from {}", path.display()))?;
                    cfg.playyt_port = Some(port);
                }
                "FETCH_BACKEND" => {
                    let backend = FetchBackend::parse(value)
                        .with_context(|| format!("Parsing FETCH_BACKEND from {}", path.display()))?;
                    cfg.fetch_backend = Some(backend);
                }
                "YTDLP_PATH" => cfg.ytdlp_path = Some(PathBuf::from(value)),
                "COOKIES_FILE" => cfg.cookies_file = Some(PathBuf::from(value)),
                "SEARCH_LIMIT" => {
                    let limit: usize = value
                        .parse()
                        .with_context(|| format!("Parsing SEARCH_LIMIT from {}", path.display()))?;
                    cfg.search_limit = Some(limit);
                }
                "CATALOG_FILE" => cfg.catalog_file = Some(PathBuf::from(value)),
                "STREAM_CHUNK_SIZE" => {
                    let size: usize = value.parse().with_context(|| {
                        format!("Parsing STREAM_CHUNK_SIZE from {}", path.display())
                    })?;
                    if size == 0 {
                        bail!("STREAM_CHUNK_SIZE must be positive in {}", path.display());
                    }
                    cfg.stream_chunk_size = Some(size);
                }
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

/// Loads settings from `path`; a missing file means all defaults.
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let cfg = read_env_config(path.as_ref())?.unwrap_or_default();
    Ok(Settings::from_env_config(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn read_env_config_extracts_values() {
        let cfg = make_config(
            "# playyt\nDOWNLOAD_DIR=\"/srv/videos\"\nPLAYYT_PORT=\"4242\"\nFETCH_BACKEND=offline\nSEARCH_LIMIT=3\n",
        );
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.download_dir, Some(PathBuf::from("/srv/videos")));
        assert_eq!(parsed.playyt_port, Some(4242));
        assert_eq!(parsed.fetch_backend, Some(FetchBackend::Offline));
        assert_eq!(parsed.search_limit, Some(3));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(dir.path().join("absent")).unwrap();
        assert_eq!(settings.playyt_port, DEFAULT_PLAYYT_PORT);
        assert_eq!(settings.playyt_host, DEFAULT_PLAYYT_HOST);
        assert_eq!(settings.download_dir, PathBuf::from(DEFAULT_DOWNLOAD_DIR));
        assert_eq!(settings.fetch_backend, FetchBackend::YtDlp);
        assert_eq!(settings.stream_chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(settings.catalog_file.is_none());
    }

    #[test]
    fn empty_values_keep_defaults() {
        let cfg = make_config("PLAYYT_HOST=\"\"\nYTDLP_PATH=/opt/yt-dlp\n");
        let settings = load_settings_from(cfg.path()).unwrap();
        assert_eq!(settings.playyt_host, DEFAULT_PLAYYT_HOST);
        assert_eq!(settings.ytdlp_path, PathBuf::from("/opt/yt-dlp"));
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(load_settings_from(make_config("PLAYYT_PORT=http\n").path()).is_err());
        assert!(load_settings_from(make_config("FETCH_BACKEND=ftp\n").path()).is_err());
        assert!(load_settings_from(make_config("STREAM_CHUNK_SIZE=0\n").path()).is_err());
    }
}
