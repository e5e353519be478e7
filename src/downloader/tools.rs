use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::utils::run_output_with_timeout;
use crate::config::DownloaderConfig;

/// A version probe that takes longer than this counts as unavailable
const VERSION_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
    Ffprobe,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::Ffprobe => "ffprobe",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            // ffmpeg and ffprobe use a single dash
            ToolType::Ffmpeg | ToolType::Ffprobe => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

pub struct ToolManager {
    config: DownloaderConfig,
}

impl ToolManager {
    pub fn new(config: DownloaderConfig) -> Self {
        Self { config }
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = match path.as_deref() {
            Some(p) => Self::get_version(p, tool_type).await,
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: version.is_some(),
            version,
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        let (ytdlp, ffmpeg, ffprobe) = tokio::join!(
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
            self.get_tool_info(ToolType::Ffprobe),
        );
        vec![ytdlp, ffmpeg, ffprobe]
    }

    /// Configured override first, then common install paths, then PATH
    pub fn locate(&self, tool_type: ToolType) -> Option<PathBuf> {
        let configured = match tool_type {
            ToolType::YtDlp => self.config.ytdlp_path.as_ref(),
            ToolType::Ffmpeg => self.config.ffmpeg_path.as_ref(),
            ToolType::Ffprobe => self.config.ffprobe_path.as_ref(),
        };
        if let Some(path) = configured {
            return Some(path.clone());
        }

        find_binary(tool_type.as_str())
    }

    async fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
        let args = [tool_type.version_arg().to_string()];
        match run_output_with_timeout(path, &args, VERSION_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|l| l.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                debug!("[ToolManager] {} version probe failed: {}", tool_type.as_str(), e);
                None
            }
        }
    }
}

/// Find a binary in common paths (Homebrew, system) or PATH
pub fn find_binary(binary_name: &str) -> Option<PathBuf> {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", binary_name),
        format!("/usr/local/bin/{}", binary_name),
        format!("/usr/bin/{}", binary_name),
    ];

    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| which::which(binary_name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_path_wins() {
        let config = DownloaderConfig {
            ytdlp_path: Some(PathBuf::from("/custom/yt-dlp")),
            ..Default::default()
        };
        let manager = ToolManager::new(config);

        assert_eq!(
            manager.locate(ToolType::YtDlp),
            Some(PathBuf::from("/custom/yt-dlp"))
        );
    }

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let config = DownloaderConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ..Default::default()
        };
        let info = ToolManager::new(config).get_tool_info(ToolType::Ffmpeg).await;

        assert_eq!(info.name, "ffmpeg");
        assert!(!info.is_available);
        assert!(info.version.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_version_probe_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffprobe");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let config = DownloaderConfig {
            ffprobe_path: Some(script),
            ..Default::default()
        };
        let started = std::time::Instant::now();
        let info = ToolManager::new(config).get_tool_info(ToolType::Ffprobe).await;

        assert!(!info.is_available);
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }

    #[test]
    fn test_unknown_binary_not_found() {
        assert!(find_binary("definitely-not-a-real-tool-4821").is_none());
    }
}
