// Download core: orchestration, progress reporting and the presentation-facing session

pub mod backends;
pub mod errors;
pub mod events;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod tools;
pub mod traits;
pub mod utils;

pub use errors::{DownloadError, ErrorKind};
pub use events::{EventReceiver, LogLevel, OperationId, ProgressEmitter, SessionEvent};
pub use models::{
    DownloadRequest, DownloadResult, MediaKind, ProgressPhase, ProgressUpdate, Quality, VideoInfo,
};
pub use orchestrator::Downloader;
pub use session::{OperationState, Session};
pub use traits::DownloaderBackend;
