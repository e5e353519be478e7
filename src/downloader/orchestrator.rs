// Orchestrator: validates requests, prepares the destination and picks a backend

use log::{debug, info, warn};
use std::sync::Arc;

use super::backends::YtDlpBackend;
use super::errors::DownloadError;
use super::events::{LogLevel, ProgressEmitter};
use super::models::{DownloadRequest, DownloadResult, VideoInfo};
use super::traits::DownloaderBackend;
use crate::config::DownloaderConfig;

pub struct Downloader {
    backends: Vec<Arc<dyn DownloaderBackend>>,
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Native binary first, then the Python module
    pub fn from_config(config: &DownloaderConfig) -> Self {
        let mut downloader = Self::new();
        downloader.add_backend(Arc::new(YtDlpBackend::cli(config)));
        downloader.add_backend(Arc::new(YtDlpBackend::python(config)));
        downloader
    }

    pub fn add_backend(&mut self, backend: Arc<dyn DownloaderBackend>) {
        self.backends.push(backend);
    }

    /// First backend whose tool can actually be run.
    ///
    /// This only skips missing tools; a failed operation is never retried elsewhere.
    async fn select_backend(&self) -> Result<&Arc<dyn DownloaderBackend>, DownloadError> {
        for backend in &self.backends {
            if backend.is_available().await {
                debug!("[Downloader] Using backend: {}", backend.name());
                return Ok(backend);
            }
            debug!("[Downloader] Backend {} unavailable", backend.name());
        }

        Err(DownloadError::ToolNotFound(
            "neither the yt-dlp binary nor the yt_dlp Python module is installed".to_string(),
        ))
    }

    /// Metadata-only query. Every failure is reported as an extraction error.
    pub async fn fetch_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::Extraction("no URL given".to_string()));
        }

        let backend = self
            .select_backend()
            .await
            .map_err(DownloadError::into_extraction)?;
        backend
            .fetch_info(url)
            .await
            .map_err(DownloadError::into_extraction)
    }

    pub async fn download(
        &self,
        request: &DownloadRequest,
        emitter: &ProgressEmitter,
    ) -> Result<DownloadResult, DownloadError> {
        let dest = request.destination_dir();
        tokio::fs::create_dir_all(dest).await.map_err(|e| {
            DownloadError::Filesystem(format!(
                "Could not create download folder {}: {}",
                dest.display(),
                e
            ))
        })?;

        let backend = self.select_backend().await?;
        info!(
            "[Downloader] {} download of {} with {}",
            request.media_kind(),
            request.url(),
            backend.name()
        );
        emitter.log(
            LogLevel::Info,
            format!("Starting {} download...", request.media_kind()),
        );

        match backend.download(request, emitter).await {
            Ok(result) => {
                info!("[Downloader] ✓ Download success with {}", backend.name());
                Ok(result)
            }
            Err(e) => {
                warn!("[Downloader] ✗ {} download failed: {}", backend.name(), e);
                Err(e)
            }
        }
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::ErrorKind;
    use crate::downloader::events::OperationId;
    use crate::downloader::models::MediaKind;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct StubBackend {
        available: bool,
        calls: AtomicUsize,
    }

    impl StubBackend {
        fn new(available: bool) -> Arc<Self> {
            Arc::new(Self {
                available,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DownloaderBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn fetch_info(&self, _url: &str) -> Result<VideoInfo, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DownloadError::Network("Read timed out".to_string()))
        }

        async fn download(
            &self,
            request: &DownloadRequest,
            _emitter: &ProgressEmitter,
        ) -> Result<DownloadResult, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DownloadResult {
                success: true,
                resolved_file_path: request.destination_dir().join("x.mp3"),
                title: "x".to_string(),
                error_message: None,
            })
        }
    }

    fn emitter() -> ProgressEmitter {
        let (tx, _rx) = mpsc::unbounded_channel();
        ProgressEmitter::new(OperationId(1), tx)
    }

    #[tokio::test]
    async fn test_skips_unavailable_backend() {
        let missing = StubBackend::new(false);
        let present = StubBackend::new(true);
        let mut downloader = Downloader::new();
        downloader.add_backend(missing.clone());
        downloader.add_backend(present.clone());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/out");
        let request =
            DownloadRequest::new("https://x.test/a", MediaKind::Audio, "mp3", "Best", &dest)
                .unwrap();

        let result = downloader.download(&request, &emitter()).await.unwrap();

        assert!(result.success);
        assert!(dest.is_dir());
        assert_eq!(missing.calls.load(Ordering::SeqCst), 0);
        assert_eq!(present.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_info_is_not_retried_and_is_extraction() {
        let first = StubBackend::new(true);
        let second = StubBackend::new(true);
        let mut downloader = Downloader::new();
        downloader.add_backend(first.clone());
        downloader.add_backend(second.clone());

        let err = downloader.fetch_info("https://x.test/a").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExtractionError);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_backend() {
        let downloader = Downloader::new();
        let dir = tempfile::tempdir().unwrap();
        let request =
            DownloadRequest::new("https://x.test/a", MediaKind::Video, "mp4", "Best", dir.path())
                .unwrap();

        let err = downloader.download(&request, &emitter()).await.unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));

        let err = downloader.fetch_info("https://x.test/a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionError);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_destination_not_creatable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let dest: PathBuf = blocker.join("sub");

        let mut downloader = Downloader::new();
        downloader.add_backend(StubBackend::new(true));
        let request =
            DownloadRequest::new("https://x.test/a", MediaKind::Video, "mp4", "Best", dest)
                .unwrap();

        let err = downloader.download(&request, &emitter()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilesystemError);
    }
}
