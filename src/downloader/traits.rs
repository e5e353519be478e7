// Downloader backend trait definition

use async_trait::async_trait;

use super::errors::DownloadError;
use super::events::ProgressEmitter;
use super::models::{DownloadRequest, DownloadResult, VideoInfo};

/// Trait for downloader backend implementations
#[async_trait]
pub trait DownloaderBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Check if the underlying tool can be run at all
    async fn is_available(&self) -> bool;

    /// Get metadata from URL without downloading anything
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, DownloadError>;

    /// Download with progress updates
    async fn download(
        &self,
        request: &DownloadRequest,
        emitter: &ProgressEmitter,
    ) -> Result<DownloadResult, DownloadError>;
}
