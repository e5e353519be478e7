// Common data models for the download core

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::Date;

use super::errors::DownloadError;

pub const AUDIO_FORMATS: &[&str] = &["mp3", "wav", "aac", "m4a", "ogg", "flac"];
pub const VIDEO_FORMATS: &[&str] = &["mp4", "mkv", "webm", "avi"];

pub const AUDIO_QUALITIES: &[&str] = &["Best", "320k", "256k", "192k", "128k", "96k"];
pub const VIDEO_QUALITIES: &[&str] = &["Best", "Worst", "1080p", "720p", "480p", "360p"];

/// What the user wants out of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    /// Target container/codec names accepted for this kind
    pub fn supported_formats(&self) -> &'static [&'static str] {
        match self {
            Self::Video => VIDEO_FORMATS,
            Self::Audio => AUDIO_FORMATS,
        }
    }

    pub fn quality_choices(&self) -> &'static [&'static str] {
        match self {
            Self::Video => VIDEO_QUALITIES,
            Self::Audio => AUDIO_QUALITIES,
        }
    }

    pub fn default_format(&self) -> &'static str {
        self.supported_formats()[0]
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Parsed quality selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Best,
    Worst,
    /// Cap on video height in pixels ("720p")
    MaxHeight(u32),
    /// Cap on audio bitrate in kbps ("320k")
    MaxBitrate(u32),
}

impl Quality {
    /// Parse a selector such as "Best", "720p" or "192k".
    ///
    /// Returns `None` for anything else; callers decide how to fall back.
    pub fn parse(selector: &str) -> Option<Self> {
        let s = selector.trim().to_lowercase();
        match s.as_str() {
            "best" => return Some(Self::Best),
            "worst" => return Some(Self::Worst),
            _ => {}
        }

        if let Some(height) = s.strip_suffix('p') {
            return height.parse().ok().filter(|h| *h > 0).map(Self::MaxHeight);
        }
        if let Some(bitrate) = s.strip_suffix('k') {
            return bitrate.parse().ok().filter(|b| *b > 0).map(Self::MaxBitrate);
        }
        None
    }
}

/// A single download job. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    url: String,
    media_kind: MediaKind,
    format: String,
    quality_selector: String,
    destination_dir: PathBuf,
}

impl DownloadRequest {
    pub fn new(
        url: impl Into<String>,
        media_kind: MediaKind,
        format: impl Into<String>,
        quality_selector: impl Into<String>,
        destination_dir: impl Into<PathBuf>,
    ) -> Result<Self, DownloadError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(DownloadError::InvalidRequest(
                "Please enter a video URL first".to_string(),
            ));
        }

        let format = format.into().trim().to_lowercase();
        if !media_kind.supported_formats().contains(&format.as_str()) {
            return Err(DownloadError::InvalidRequest(format!(
                "'{}' is not a supported {} format (expected one of: {})",
                format,
                media_kind,
                media_kind.supported_formats().join(", ")
            )));
        }

        Ok(Self {
            url,
            media_kind,
            format,
            quality_selector: quality_selector.into().trim().to_string(),
            destination_dir: destination_dir.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn quality_selector(&self) -> &str {
        &self.quality_selector
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Downloading,
    Finished,
}

/// Normalized progress for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Fraction in [0, 1]
    pub percent: f32,
    pub speed_label: String,
    pub eta_label: String,
    pub phase: ProgressPhase,
}

impl ProgressUpdate {
    /// One-line status text, e.g. "Downloading: 42% | Speed: 1.2MiB/s | ETA: 00:10"
    pub fn status_line(&self) -> String {
        match self.phase {
            ProgressPhase::Downloading => format!(
                "Downloading: {}% | Speed: {} | ETA: {}",
                (self.percent * 100.0) as u32,
                self.speed_label,
                self.eta_label
            ),
            ProgressPhase::Finished => "Download finished, processing...".to_string(),
        }
    }
}

/// Outcome of a download, as reported to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub resolved_file_path: PathBuf,
    pub title: String,
    pub error_message: Option<String>,
}

impl DownloadResult {
    pub fn failed(error: &DownloadError) -> Self {
        Self {
            success: false,
            resolved_file_path: PathBuf::new(),
            title: String::new(),
            error_message: Some(error.to_string()),
        }
    }
}

/// Metadata returned by an info-only query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration: String,
    pub uploader: String,
    pub view_count: Option<u64>,
    pub upload_date: Option<Date>,
}

impl VideoInfo {
    /// Build from yt-dlp's `--dump-json` document
    pub fn from_json(json: &serde_json::Value) -> Self {
        let text = |key: &str| {
            json[key]
                .as_str()
                .filter(|s| !s.is_empty())
                .unwrap_or("Unknown")
                .to_string()
        };

        // duration_string is missing for some extractors; derive it from seconds
        let duration = match json["duration_string"].as_str() {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => json["duration"]
                .as_f64()
                .map(|secs| format_duration(secs as u64))
                .unwrap_or_else(|| "Unknown".to_string()),
        };

        let upload_date = json["upload_date"].as_str().and_then(|raw| {
            Date::parse(raw, format_description!("[year][month][day]")).ok()
        });

        Self {
            title: text("title"),
            duration,
            uploader: text("uploader"),
            view_count: json["view_count"].as_u64(),
            upload_date,
        }
    }

    pub fn view_count_label(&self) -> String {
        match self.view_count {
            Some(n) if n >= 1_000_000 => format!("{:.1}M views", n as f64 / 1_000_000.0),
            Some(n) if n >= 1_000 => format!("{:.1}K views", n as f64 / 1_000.0),
            Some(n) if n > 0 => format!("{} views", n),
            _ => "Unknown views".to_string(),
        }
    }

    pub fn upload_date_label(&self) -> String {
        self.upload_date
            .and_then(|d| d.format(format_description!("[year]-[month]-[day]")).ok())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

fn format_duration(total: u64) -> String {
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quality_parse() {
        assert_eq!(Quality::parse("Best"), Some(Quality::Best));
        assert_eq!(Quality::parse(" worst "), Some(Quality::Worst));
        assert_eq!(Quality::parse("720p"), Some(Quality::MaxHeight(720)));
        assert_eq!(Quality::parse("320K"), Some(Quality::MaxBitrate(320)));
        assert_eq!(Quality::parse("0p"), None);
        assert_eq!(Quality::parse("hd"), None);
        assert_eq!(Quality::parse(""), None);
    }

    #[test]
    fn test_request_validation() {
        let req =
            DownloadRequest::new(" https://x.test/v ", MediaKind::Audio, "MP3", "Best", "/tmp")
                .unwrap();
        assert_eq!(req.url(), "https://x.test/v");
        assert_eq!(req.format(), "mp3");

        let err = DownloadRequest::new("   ", MediaKind::Video, "mp4", "Best", "/tmp").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRequest(_)));

        let err = DownloadRequest::new("https://x.test/v", MediaKind::Video, "mp3", "Best", "/tmp")
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRequest(_)));
    }

    #[test]
    fn test_video_info_from_json() {
        let info = VideoInfo::from_json(&json!({
            "title": "Some Clip",
            "duration_string": "3:25",
            "uploader": "Someone",
            "view_count": 1_234_567u64,
            "upload_date": "20240131"
        }));

        assert_eq!(info.title, "Some Clip");
        assert_eq!(info.duration, "3:25");
        assert_eq!(info.view_count_label(), "1.2M views");
        assert_eq!(info.upload_date_label(), "2024-01-31");
    }

    #[test]
    fn test_video_info_defaults() {
        let info = VideoInfo::from_json(&json!({ "duration": 3725.0, "upload_date": "bogus" }));

        assert_eq!(info.title, "Unknown");
        assert_eq!(info.uploader, "Unknown");
        assert_eq!(info.duration, "1:02:05");
        assert_eq!(info.view_count_label(), "Unknown views");
        assert_eq!(info.upload_date_label(), "Unknown");
    }

    #[test]
    fn test_view_count_labels() {
        let mut info = VideoInfo::from_json(&json!({}));
        info.view_count = Some(3_400);
        assert_eq!(info.view_count_label(), "3.4K views");
        info.view_count = Some(17);
        assert_eq!(info.view_count_label(), "17 views");
    }

    #[test]
    fn test_status_line() {
        let update = ProgressUpdate {
            percent: 0.425,
            speed_label: "1.00MiB/s".to_string(),
            eta_label: "00:09".to_string(),
            phase: ProgressPhase::Downloading,
        };
        assert_eq!(
            update.status_line(),
            "Downloading: 42% | Speed: 1.00MiB/s | ETA: 00:09"
        );
    }
}
