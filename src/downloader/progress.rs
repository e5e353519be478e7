// Progress reporting - turns yt-dlp progress output into ProgressUpdate values
//
// yt-dlp is asked to print one machine-readable record per progress tick:
//   [progress] downloading| 42.5%|  1.00MiB/s|00:09
// Older builds that ignore the template still print the classic line:
//   [download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)
// Both are turned into a RawProgress and then normalized.

use log::{debug, warn};
use regex::Regex;

use super::errors::DownloadError;
use super::events::{LogLevel, ProgressEmitter};
use super::models::{ProgressPhase, ProgressUpdate};

/// Prefix of the records produced by [`PROGRESS_TEMPLATE`]
pub const PROGRESS_PREFIX: &str = "[progress] ";

/// Value for yt-dlp's `--progress-template`
pub const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

lazy_static::lazy_static! {
    static ref ANSI_RE: Regex = Regex::new(r"\x1b\[[0-9;]*m").unwrap();
    static ref LEGACY_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*\S+\s+at\s+(\S+)(?:\s+ETA\s+(\S+))?"
    ).unwrap();
}

/// Progress exactly as the external tool reported it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProgress {
    pub status: String,
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl RawProgress {
    /// Parse one line of tool output. Returns `None` for lines that carry no progress.
    pub fn from_line(line: &str) -> Option<Self> {
        if let Some(record) = line.trim_start().strip_prefix(PROGRESS_PREFIX) {
            let mut fields = record.split('|').map(|f| f.to_string());
            let status = fields.next()?.trim().to_string();
            return Some(Self {
                status,
                percent: fields.next(),
                speed: fields.next(),
                eta: fields.next(),
            });
        }

        let caps = LEGACY_RE.captures(line)?;
        Some(Self {
            status: "downloading".to_string(),
            percent: caps.get(1).map(|m| format!("{}%", m.as_str())),
            speed: caps.get(2).map(|m| m.as_str().to_string()),
            eta: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }
}

/// Remove terminal color codes
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Parse "42.5%" (possibly colored, possibly padded) into a fraction in [0, 1].
///
/// `Ok(None)` means the tool had no percentage yet ("NA%" or empty).
pub fn parse_percent(raw: &str) -> Result<Option<f32>, DownloadError> {
    let clean = strip_ansi(raw);
    let trimmed = clean.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();

    if number.is_empty()
        || number.eq_ignore_ascii_case("na")
        || number.eq_ignore_ascii_case("n/a")
    {
        return Ok(None);
    }

    let value: f32 = number
        .parse()
        .map_err(|_| DownloadError::MalformedProgress(format!("bad percent '{}'", trimmed)))?;

    if !value.is_finite() || value < 0.0 {
        return Err(DownloadError::MalformedProgress(format!(
            "percent out of range '{}'",
            trimmed
        )));
    }

    Ok(Some((value / 100.0).min(1.0)))
}

fn label(raw: Option<&str>) -> String {
    let clean = raw.map(strip_ansi).unwrap_or_default();
    let trimmed = clean.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") {
        "N/A".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize a raw record. Malformed input is an error the caller should log and skip.
pub fn normalize(raw: &RawProgress) -> Result<Option<ProgressUpdate>, DownloadError> {
    let speed_label = label(raw.speed.as_deref());
    let eta_label = label(raw.eta.as_deref());

    match raw.status.as_str() {
        "finished" => Ok(Some(ProgressUpdate {
            percent: 1.0,
            speed_label,
            eta_label,
            phase: ProgressPhase::Finished,
        })),
        "downloading" => {
            let percent = match raw.percent.as_deref() {
                Some(p) => parse_percent(p)?,
                None => None,
            };
            Ok(percent.map(|percent| ProgressUpdate {
                percent,
                speed_label,
                eta_label,
                phase: ProgressPhase::Downloading,
            }))
        }
        _ => Ok(None),
    }
}

/// Feeds tool output lines through normalization into a [`ProgressEmitter`]
pub struct ProgressReporter<'a> {
    emitter: &'a ProgressEmitter,
    reported: usize,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(emitter: &'a ProgressEmitter) -> Self {
        Self {
            emitter,
            reported: 0,
        }
    }

    /// Returns true if the line was a progress line (reported or skipped)
    pub fn handle_line(&mut self, line: &str) -> bool {
        match RawProgress::from_line(line) {
            Some(raw) => {
                self.report(&raw);
                true
            }
            None => false,
        }
    }

    pub fn report(&mut self, raw: &RawProgress) {
        match normalize(raw) {
            Ok(Some(update)) => {
                self.reported += 1;
                self.emitter.progress(update);
            }
            Ok(None) => debug!("[Progress] nothing to report for {:?}", raw),
            Err(e) => {
                warn!("[Progress] Progress update error: {}", e);
                self.emitter
                    .log(LogLevel::Warning, format!("Progress update error: {}", e));
            }
        }
    }

    /// Number of updates emitted so far
    pub fn reported(&self) -> usize {
        self.reported
    }
}
