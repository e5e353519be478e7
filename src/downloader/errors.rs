// Error types for the download core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NetworkError,
    ExtractionError,
    TranscodeError,
    FilesystemError,
    /// Non-fatal; never ends an operation
    MalformedProgressError,
    InvalidRequest,
    /// A download was requested while another one is active
    Rejected,
}

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Connection problems, timeouts, unreachable hosts
    #[error("Network error: {0}")]
    Network(String),

    /// Unsupported or unreachable URL, extractor failure, bad metadata
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// ffmpeg post-processing failed
    #[error("Conversion failed: {0}")]
    Transcode(String),

    /// Destination directory or file could not be written
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// A progress record could not be understood
    #[error("Malformed progress: {0}")]
    MalformedProgress(String),

    /// yt-dlp (or python with yt_dlp) is missing
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("A download is already in progress")]
    Busy,
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Extraction(_) | Self::ToolNotFound(_) => ErrorKind::ExtractionError,
            Self::Transcode(_) => ErrorKind::TranscodeError,
            Self::Filesystem(_) => ErrorKind::FilesystemError,
            Self::MalformedProgress(_) => ErrorKind::MalformedProgressError,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Busy => ErrorKind::Rejected,
        }
    }

    /// Classify yt-dlp stderr output into an operation error.
    ///
    /// The message keeps only the most relevant line so it can be shown to a user as is.
    pub fn classify(stderr: &str) -> Self {
        let message = summarize(stderr);
        let lower = stderr.to_lowercase();

        // Permission and disk problems first: they often mention ffmpeg too
        if lower.contains("permission denied")
            || lower.contains("no space left")
            || lower.contains("read-only file system")
            || lower.contains("unable to open for writing")
            || lower.contains("unable to create directory")
        {
            return Self::Filesystem(message);
        }

        if lower.contains("postprocessing")
            || lower.contains("ffmpeg")
            || lower.contains("ffprobe")
            || lower.contains("conversion failed")
            || lower.contains("error opening output")
        {
            return Self::Transcode(message);
        }

        if lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection refused")
            || lower.contains("connection reset")
            || lower.contains("network is unreachable")
            || lower.contains("temporary failure in name resolution")
            || lower.contains("name or service not known")
            || lower.contains("getaddrinfo failed")
            || lower.contains("failed to resolve")
            || lower.contains("http error 5")
        {
            return Self::Network(message);
        }

        Self::Extraction(message)
    }

    /// Force the error into the extraction category, keeping its message.
    ///
    /// Metadata queries report every failure this way.
    pub fn into_extraction(self) -> Self {
        match self {
            Self::Extraction(_) => self,
            Self::ToolNotFound(msg) => Self::Extraction(format!("tool not found: {}", msg)),
            other => Self::Extraction(other.to_string()),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Filesystem(e.to_string())
    }
}

/// Pick the line of tool output worth showing: the last `ERROR:` line, else the last
/// non-empty one.
fn summarize(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_url_is_extraction() {
        let err = DownloadError::classify(
            "WARNING: something\nERROR: Unsupported URL: https://example.invalid/x\n",
        );
        assert_eq!(err.kind(), ErrorKind::ExtractionError);
        assert_eq!(
            err.to_string(),
            "Extraction failed: Unsupported URL: https://example.invalid/x"
        );
    }

    #[test]
    fn test_network_markers() {
        let err = DownloadError::classify(
            "ERROR: [generic] Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>",
        );
        assert_eq!(err.kind(), ErrorKind::NetworkError);

        let err = DownloadError::classify("ERROR: Read timed out.");
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }

    #[test]
    fn test_postprocessing_is_transcode() {
        let err = DownloadError::classify("ERROR: Postprocessing: audio conversion failed: x");
        assert_eq!(err.kind(), ErrorKind::TranscodeError);

        let err = DownloadError::classify("ERROR: ffprobe and ffmpeg not found.");
        assert_eq!(err.kind(), ErrorKind::TranscodeError);
    }

    #[test]
    fn test_filesystem_wins_over_transcode() {
        let err = DownloadError::classify(
            "ERROR: Postprocessing: [Errno 13] Permission denied: '/root/out.mp3'",
        );
        assert_eq!(err.kind(), ErrorKind::FilesystemError);
    }

    #[test]
    fn test_summary_falls_back_to_last_line() {
        let err = DownloadError::classify("first\n\nsomething odd happened\n");
        assert_eq!(err.to_string(), "Extraction failed: something odd happened");

        let err = DownloadError::classify("");
        assert_eq!(err.to_string(), "Extraction failed: unknown error");
    }

    #[test]
    fn test_into_extraction() {
        let err = DownloadError::Network("Read timed out".to_string()).into_extraction();
        assert_eq!(err.kind(), ErrorKind::ExtractionError);
        assert!(err.to_string().contains("Read timed out"));

        let err = DownloadError::ToolNotFound("yt-dlp".to_string()).into_extraction();
        assert_eq!(err.kind(), ErrorKind::ExtractionError);
    }

    #[test]
    fn test_busy_is_rejected() {
        assert_eq!(DownloadError::Busy.kind(), ErrorKind::Rejected);
    }
}
