// Runtime configuration: defaults, then environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_YTDLP: &str = "MEDIA_DL_YTDLP";
pub const ENV_PYTHON: &str = "MEDIA_DL_PYTHON";
pub const ENV_FFMPEG: &str = "MEDIA_DL_FFMPEG";
pub const ENV_FFPROBE: &str = "MEDIA_DL_FFPROBE";
pub const ENV_DIR: &str = "MEDIA_DL_DIR";
pub const ENV_QUIET: &str = "MEDIA_DL_QUIET";
pub const ENV_INFO_TIMEOUT: &str = "MEDIA_DL_INFO_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Explicit yt-dlp binary; discovered when unset
    pub ytdlp_path: Option<PathBuf>,
    /// Interpreter used for the `python -m yt_dlp` backend
    pub python: String,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub download_dir: PathBuf,
    /// Output name without extension, in yt-dlp template syntax
    pub title_template: String,
    pub quiet: bool,
    pub info_timeout_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            python: "python3".to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from("downloads")),
            title_template: "%(title)s".to_string(),
            quiet: false,
            info_timeout_secs: 30,
        }
    }
}

impl DownloaderConfig {
    /// Defaults with `MEDIA_DL_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = get(ENV_YTDLP) {
            self.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Some(python) = get(ENV_PYTHON) {
            self.python = python;
        }
        if let Some(path) = get(ENV_FFMPEG) {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get(ENV_FFPROBE) {
            self.ffprobe_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get(ENV_DIR) {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(quiet) = get(ENV_QUIET) {
            self.quiet = matches!(quiet.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(secs) = get(ENV_INFO_TIMEOUT).and_then(|s| s.parse().ok()) {
            self.info_timeout_secs = secs;
        }
        self
    }

    /// ffmpeg location handed to yt-dlp.
    ///
    /// Only used when both the encoder and the probe override point at existing files;
    /// otherwise yt-dlp finds the tools itself.
    pub fn ffmpeg_location(&self) -> Option<&Path> {
        match (&self.ffmpeg_path, &self.ffprobe_path) {
            (Some(ffmpeg), Some(ffprobe)) if ffmpeg.exists() && ffprobe.exists() => {
                Some(ffmpeg.as_path())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_YTDLP, "/opt/yt-dlp"),
            (ENV_DIR, "/data/media"),
            (ENV_QUIET, "yes"),
            (ENV_INFO_TIMEOUT, "5"),
            (ENV_PYTHON, "  "),
        ]
        .into_iter()
        .collect();

        let config =
            DownloaderConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/opt/yt-dlp")));
        assert_eq!(config.download_dir, PathBuf::from("/data/media"));
        assert!(config.quiet);
        assert_eq!(config.info_timeout_secs, 5);
        // blank values are ignored
        assert_eq!(config.python, "python3");
    }

    #[test]
    fn test_ffmpeg_location_needs_both_tools() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");
        std::fs::write(&ffmpeg, b"").unwrap();

        let mut config = DownloaderConfig {
            ffmpeg_path: Some(ffmpeg.clone()),
            ffprobe_path: Some(ffprobe.clone()),
            ..Default::default()
        };
        assert_eq!(config.ffmpeg_location(), None);

        std::fs::write(&ffprobe, b"").unwrap();
        assert_eq!(config.ffmpeg_location(), Some(ffmpeg.as_path()));

        config.ffprobe_path = None;
        assert_eq!(config.ffmpeg_location(), None);
    }
}
