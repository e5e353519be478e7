use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::config::DownloaderConfig;
use crate::downloader::errors::DownloadError;
use crate::downloader::events::{LogLevel, ProgressEmitter};
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{DownloadRequest, DownloadResult, VideoInfo};
use crate::downloader::progress::{ProgressReporter, PROGRESS_TEMPLATE};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::DownloaderBackend;
use crate::downloader::utils::{run_output_with_timeout, spawn_line_stream, Stream};

const TITLE_PREFIX: &str = "[title] ";
const FILE_PREFIX: &str = "[file] ";

/// Post-processor tags yt-dlp prints while ffmpeg runs
const POSTPROCESSOR_TAGS: &[&str] = &[
    "[ExtractAudio]",
    "[VideoConvertor]",
    "[Merger]",
    "[VideoRemuxer]",
    "[FixupM3u8]",
];

/// yt-dlp driven through its command line, either the native binary or `python -m yt_dlp`
pub struct YtDlpBackend {
    name: &'static str,
    program: PathBuf,
    base_args: Vec<String>,
    title_template: String,
    quiet: bool,
    ffmpeg_location: Option<PathBuf>,
    info_timeout_secs: u64,
}

impl YtDlpBackend {
    /// Native `yt-dlp` binary
    pub fn cli(config: &DownloaderConfig) -> Self {
        let program = ToolManager::new(config.clone())
            .locate(ToolType::YtDlp)
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        Self::with_command("yt-dlp", program, Vec::new(), config)
    }

    /// `python3 -m yt_dlp`; the interpreter is configurable (e.g. a venv)
    pub fn python(config: &DownloaderConfig) -> Self {
        Self::with_command(
            "yt-dlp-python",
            PathBuf::from(&config.python),
            vec!["-m".to_string(), "yt_dlp".to_string()],
            config,
        )
    }

    pub fn with_command(
        name: &'static str,
        program: PathBuf,
        base_args: Vec<String>,
        config: &DownloaderConfig,
    ) -> Self {
        Self {
            name,
            program,
            base_args,
            title_template: config.title_template.clone(),
            quiet: config.quiet,
            ffmpeg_location: config.ffmpeg_location().map(Path::to_path_buf),
            info_timeout_secs: config.info_timeout_secs,
        }
    }

    fn command_args(&self, args: Vec<String>) -> Vec<String> {
        let mut full = self.base_args.clone();
        full.extend(args);
        full
    }

    /// Arguments for a metadata-only query
    pub fn info_args(&self, url: &str) -> Vec<String> {
        self.command_args(vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            url.to_string(),
        ])
    }

    /// Arguments for a full download of `request`
    pub fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            FormatSelector::get_format_spec(request.media_kind(), request.quality_selector()),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            format!("before_dl:{}%(title)s", TITLE_PREFIX),
            "--print".to_string(),
            format!("after_move:{}%(filepath)s", FILE_PREFIX),
            "--no-simulate".to_string(),
            "-P".to_string(),
            request.destination_dir().to_string_lossy().to_string(),
            "-o".to_string(),
            format!("{}.%(ext)s", self.title_template),
        ];

        if self.quiet {
            args.push("--quiet".to_string());
            args.push("--no-warnings".to_string());
        }

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        args.extend(FormatSelector::postprocessor_args(request));

        args.push("--".to_string());
        args.push(request.url().to_string());
        self.command_args(args)
    }

    /// Error for a non-zero exit. Without any stderr the exit status is all there is.
    fn failure(&self, status: ExitStatus, stderr: &str) -> DownloadError {
        if !stderr.trim().is_empty() {
            return DownloadError::classify(stderr);
        }
        let reason = match status.code() {
            Some(code) => format!("exit code {}", code),
            None => "killed by a signal".to_string(),
        };
        DownloadError::Extraction(format!(
            "{} ended with {} and no error output",
            self.name, reason
        ))
    }

    fn parse_info(stdout: &[u8]) -> Result<VideoInfo, DownloadError> {
        let text = String::from_utf8_lossy(stdout);
        let document = text
            .lines()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| DownloadError::Extraction("No metadata returned".to_string()))?;
        let json: serde_json::Value = serde_json::from_str(document)
            .map_err(|e| DownloadError::Extraction(format!("Invalid JSON: {}", e)))?;
        Ok(VideoInfo::from_json(&json))
    }
}

#[async_trait]
impl DownloaderBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_available(&self) -> bool {
        let args = self.command_args(vec!["--version".to_string()]);
        match run_output_with_timeout(&self.program, &args, 10).await {
            Ok(out) => out.status.success(),
            Err(e) => {
                debug!("[{}] not available: {}", self.name, e);
                false
            }
        }
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let args = self.info_args(url);
        info!("[{}] Fetching info: {}", self.name, url);

        let output = run_output_with_timeout(&self.program, &args, self.info_timeout_secs)
            .await
            .map_err(DownloadError::into_extraction)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[{}] info failed: {}", self.name, stderr.trim());
            return Err(self.failure(output.status, &stderr).into_extraction());
        }

        Self::parse_info(&output.stdout)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        emitter: &ProgressEmitter,
    ) -> Result<DownloadResult, DownloadError> {
        let args = self.download_args(request);
        info!(
            "[{}] Starting: {} {}",
            self.name,
            self.program.display(),
            args.join(" ")
        );

        let (mut child, mut lines) = spawn_line_stream(&self.program, &args)?;
        let mut reporter = ProgressReporter::new(emitter);
        let mut title: Option<String> = None;
        let mut resolved: Option<PathBuf> = None;
        let mut stderr = String::new();

        while let Some((stream, line)) = lines.recv().await {
            if let Some(t) = line.strip_prefix(TITLE_PREFIX) {
                let t = t.trim().to_string();
                emitter.log(LogLevel::Info, format!("Title: {}", t));
                title = Some(t);
                continue;
            }
            if let Some(path) = line.strip_prefix(FILE_PREFIX) {
                resolved = Some(PathBuf::from(path.trim()));
                continue;
            }
            if reporter.handle_line(&line) {
                continue;
            }
            if POSTPROCESSOR_TAGS.iter().any(|tag| line.starts_with(tag)) {
                emitter.log(LogLevel::Info, line.clone());
            }
            if stream == Stream::Stderr {
                stderr.push_str(&line);
                stderr.push('\n');
            }
            debug!("[{}] {}", self.name, line);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::Extraction(format!("Process error: {}", e)))?;

        if !status.success() {
            let err = self.failure(status, &stderr);
            warn!("[{}] download failed ({}): {}", self.name, status, err);
            return Err(err);
        }

        let title = title.unwrap_or_else(|| "Unknown".to_string());
        let resolved_file_path = resolved.unwrap_or_else(|| {
            request
                .destination_dir()
                .join(format!("{}.{}", title, request.format()))
        });

        info!(
            "[{}] Done after {} progress updates: {}",
            self.name,
            reporter.reported(),
            resolved_file_path.display()
        );

        Ok(DownloadResult {
            success: true,
            resolved_file_path,
            title,
            error_message: None,
        })
    }
}
