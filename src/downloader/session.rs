// Session - the state shared between the presentation side and background workers
//
// The presentation side owns the Session and is the only one mutating it. Workers run
// on tokio tasks and report back exclusively through SessionEvent messages; the
// presentation side feeds every received event into `apply`.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::errors::DownloadError;
use super::events::{
    EventReceiver, EventSender, LogLevel, OperationId, ProgressEmitter, SessionEvent,
};
use super::models::{DownloadRequest, DownloadResult};
use super::orchestrator::Downloader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Idle,
    Requested,
    Running,
    Completed,
    Failed,
}

impl OperationState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Requested | Self::Running)
    }
}

pub struct Session {
    downloader: Arc<Downloader>,
    tx: EventSender,
    state: OperationState,
    active: Option<OperationId>,
    current: Option<DownloadRequest>,
    last_result: Option<DownloadResult>,
    next_id: u64,
}

impl Session {
    pub fn new(downloader: Arc<Downloader>) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            downloader,
            tx,
            state: OperationState::Idle,
            active: None,
            current: None,
            last_result: None,
            next_id: 1,
        };
        (session, rx)
    }

    fn next_op(&mut self) -> OperationId {
        let op = OperationId(self.next_id);
        self.next_id += 1;
        op
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn active_operation(&self) -> Option<OperationId> {
        self.active
    }

    pub fn current_request(&self) -> Option<&DownloadRequest> {
        self.current.as_ref()
    }

    pub fn last_result(&self) -> Option<&DownloadResult> {
        self.last_result.as_ref()
    }

    /// Start a download on a background task.
    ///
    /// Rejected with [`DownloadError::Busy`] while another download is requested or
    /// running; no worker is spawned in that case. Must be called inside a tokio runtime.
    pub fn start_download(
        &mut self,
        request: DownloadRequest,
    ) -> Result<OperationId, DownloadError> {
        if self.is_active() {
            warn!("[Session] download rejected: {:?} is still active", self.active);
            return Err(DownloadError::Busy);
        }

        let op = self.next_op();
        self.state = OperationState::Requested;
        self.active = Some(op);
        self.current = Some(request.clone());
        info!("[Session] {} requested: {}", op, request.url());

        let downloader = Arc::clone(&self.downloader);
        let emitter = ProgressEmitter::new(op, self.tx.clone());
        tokio::spawn(async move {
            emitter.emit(SessionEvent::Started { op });

            // Errors stop here; the presentation side only ever sees a result
            let (result, error_kind) = match downloader.download(&request, &emitter).await {
                Ok(result) => {
                    let kind = capitalize(&request.media_kind().to_string());
                    emitter.log(
                        LogLevel::Success,
                        format!("{} download completed successfully!", kind),
                    );
                    (result, None)
                }
                Err(e) => {
                    emitter.log(LogLevel::Error, format!("Download failed: {}", e));
                    (DownloadResult::failed(&e), Some(e.kind()))
                }
            };
            emitter.emit(SessionEvent::Finished {
                op,
                result,
                error_kind,
            });
        });

        Ok(op)
    }

    /// Metadata-only query on a background task. May run alongside a download.
    pub fn fetch_info(&mut self, url: impl Into<String>) -> OperationId {
        let op = self.next_op();
        let url = url.into();
        let downloader = Arc::clone(&self.downloader);
        let emitter = ProgressEmitter::new(op, self.tx.clone());
        info!("[Session] {} fetching info: {}", op, url);

        tokio::spawn(async move {
            emitter.log(LogLevel::Info, "Fetching video information...");
            let result = downloader.fetch_info(&url).await;
            if let Err(e) = &result {
                emitter.log(LogLevel::Error, format!("Failed to get video info: {}", e));
            }
            emitter.emit(SessionEvent::InfoFetched { op, result });
        });

        op
    }

    /// Best-effort stop.
    ///
    /// Only the visible state is reset: the external tool keeps running until it exits
    /// and its late `Finished` event no longer changes the session. Returns false if
    /// nothing was active.
    pub fn stop_requested(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        let Some(op) = self.active.take() else {
            return false;
        };

        warn!("[Session] stop requested for {}; the worker keeps running", op);
        self.state = OperationState::Idle;
        let _ = self.tx.send(SessionEvent::Log {
            op,
            level: LogLevel::Warning,
            message: "Download stop requested...".to_string(),
        });
        true
    }

    /// Fold a worker event into the session state
    pub fn apply(&mut self, event: &SessionEvent) {
        if Some(event.op()) != self.active {
            return;
        }

        match event {
            SessionEvent::Started { .. } => {
                if self.state == OperationState::Requested {
                    self.state = OperationState::Running;
                }
            }
            SessionEvent::Finished { result, .. } => {
                self.state = if result.success {
                    OperationState::Completed
                } else {
                    OperationState::Failed
                };
                self.last_result = Some(result.clone());
                self.active = None;
            }
            _ => {}
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
