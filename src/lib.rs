pub mod config;
pub mod downloader;

pub use config::DownloaderConfig;
pub use downloader::{
    DownloadError, DownloadRequest, DownloadResult, Downloader, ErrorKind, MediaKind,
    OperationState, ProgressUpdate, Session, SessionEvent, VideoInfo,
};
