// FormatSelector - maps media kind and quality to yt-dlp selection expressions
//
// Handles:
// - Format selector strings (height caps for video, bitrate caps for audio)
// - Audio quality passed to the extract-audio post-processor
// - Post-processor arguments naming the target format

use log::warn;

use super::models::{DownloadRequest, MediaKind, Quality};

/// Bitrate handed to the audio extractor when the user asked for "Best"
const BEST_AUDIO_KBPS: u32 = 320;

pub struct FormatSelector;

impl FormatSelector {
    /// Resolve a quality selector for the given kind.
    ///
    /// Unknown selectors and selectors meant for the other kind fall back to `Best`.
    pub fn resolve_quality(kind: MediaKind, selector: &str) -> Quality {
        let quality = match Quality::parse(selector) {
            Some(q) => q,
            None => {
                warn!("[FormatSelector] Unknown quality '{}', using Best", selector);
                return Quality::Best;
            }
        };

        match (kind, quality) {
            (MediaKind::Audio, Quality::MaxHeight(_))
            | (MediaKind::Video, Quality::MaxBitrate(_)) => {
                warn!(
                    "[FormatSelector] Quality '{}' does not apply to {}, using Best",
                    selector, kind
                );
                Quality::Best
            }
            // There is no "worst audio" choice; treat it as best
            (MediaKind::Audio, Quality::Worst) => Quality::Best,
            (_, q) => q,
        }
    }

    /// Get format spec for yt-dlp based on kind and quality selector
    pub fn get_format_spec(kind: MediaKind, selector: &str) -> String {
        match (kind, Self::resolve_quality(kind, selector)) {
            (MediaKind::Audio, Quality::MaxBitrate(kbps)) => {
                format!("bestaudio[abr<={}]/best", kbps)
            }
            (MediaKind::Audio, _) => "bestaudio/best".to_string(),
            (MediaKind::Video, Quality::Worst) => "worstvideo+worstaudio/worst".to_string(),
            (MediaKind::Video, Quality::MaxHeight(h)) => {
                format!("bestvideo[height<={}]+bestaudio/best[height<={}]", h, h)
            }
            (MediaKind::Video, _) => "bestvideo+bestaudio/best".to_string(),
        }
    }

    /// Audio bitrate (kbps) for the extract-audio post-processor
    pub fn audio_quality(selector: &str) -> u32 {
        match Self::resolve_quality(MediaKind::Audio, selector) {
            Quality::MaxBitrate(kbps) => kbps,
            _ => BEST_AUDIO_KBPS,
        }
    }

    /// Post-processor arguments that turn the raw download into the requested format
    pub fn postprocessor_args(request: &DownloadRequest) -> Vec<String> {
        let format = request.format().to_string();
        match request.media_kind() {
            MediaKind::Audio => vec![
                "-x".to_string(),
                "--audio-format".to_string(),
                format,
                "--audio-quality".to_string(),
                format!("{}K", Self::audio_quality(request.quality_selector())),
            ],
            MediaKind::Video => vec![
                "--merge-output-format".to_string(),
                format.clone(),
                "--recode-video".to_string(),
                format,
            ],
        }
    }
}
