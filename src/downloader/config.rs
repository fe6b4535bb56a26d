// Runtime configuration: tool overrides, timeouts, watch URL base

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::{DownloadError, Result};

pub const ENV_DOWNLOADER: &str = "TUBESAVE_YTDLP";
pub const ENV_ENCODER: &str = "TUBESAVE_FFMPEG";
pub const ENV_PROBE_TIMEOUT: &str = "TUBESAVE_PROBE_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Explicit yt-dlp location, tried before any search directory
    pub downloader_path: Option<PathBuf>,
    /// Explicit ffmpeg location, tried before any search directory
    pub encoder_path: Option<PathBuf>,
    /// Searched after the bundled layouts, before system directories
    pub extra_search_dirs: Vec<PathBuf>,
    /// Bound on title and playlist probes
    pub probe_timeout_secs: u64,
    /// Bound on `--version` / `-version` checks
    pub verify_timeout_secs: u64,
    /// Prefix turned into a watch URL by appending a playlist entry id
    pub watch_url_base: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            downloader_path: None,
            encoder_path: None,
            extra_search_dirs: Vec::new(),
            probe_timeout_secs: 30,
            verify_timeout_secs: 15,
            watch_url_base: "https://www.youtube.com/watch?v=".to_string(),
        }
    }
}

impl DownloaderConfig {
    /// `<config dir>/tubesave/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tubesave").join("config.json"))
    }

    /// Defaults, then the config file, then environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Read a config file; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DownloadError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, format!("{json}\n"))?;
        Ok(())
    }

    /// Apply overrides looked up by environment variable name
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DOWNLOADER).filter(|v| !v.trim().is_empty()) {
            self.downloader_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(path) = lookup(ENV_ENCODER).filter(|v| !v.trim().is_empty()) {
            self.encoder_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(raw) = lookup(ENV_PROBE_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.probe_timeout_secs = secs,
                _ => tracing::warn!("[Config] Ignoring invalid {}={}", ENV_PROBE_TIMEOUT, raw),
            }
        }
        self
    }

    pub fn with_downloader_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.downloader_path = path;
        }
        self
    }

    pub fn with_encoder_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.encoder_path = path;
        }
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DownloaderConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, DownloaderConfig::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = DownloaderConfig {
            downloader_path: Some(PathBuf::from("/opt/yt-dlp")),
            probe_timeout_secs: 5,
            ..DownloaderConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(DownloaderConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "verify_timeout_secs": 3 }"#).unwrap();
        let config = DownloaderConfig::load_from(&path).unwrap();
        assert_eq!(config.verify_timeout_secs, 3);
        assert_eq!(config.probe_timeout_secs, 30);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            DownloaderConfig::load_from(&path),
            Err(DownloadError::Config(_))
        ));
    }

    #[test]
    fn environment_overrides_apply() {
        let config = DownloaderConfig::default().with_overrides(|key| match key {
            ENV_DOWNLOADER => Some("/custom/yt-dlp".to_string()),
            ENV_PROBE_TIMEOUT => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.downloader_path, Some(PathBuf::from("/custom/yt-dlp")));
        assert_eq!(config.encoder_path, None);
        assert_eq!(config.probe_timeout_secs, 30);
    }
}
