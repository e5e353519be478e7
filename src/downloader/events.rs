// Events posted from workers to the presentation side

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use super::errors::{DownloadError, ErrorKind};
use super::models::{DownloadResult, ProgressUpdate, VideoInfo};

/// Identifies one session operation (download or info fetch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The worker picked up the request
    Started { op: OperationId },
    Progress { op: OperationId, update: ProgressUpdate },
    Log { op: OperationId, level: LogLevel, message: String },
    InfoFetched { op: OperationId, result: Result<VideoInfo, DownloadError> },
    Finished {
        op: OperationId,
        result: DownloadResult,
        error_kind: Option<ErrorKind>,
    },
}

impl SessionEvent {
    pub fn op(&self) -> OperationId {
        match self {
            Self::Started { op }
            | Self::Progress { op, .. }
            | Self::Log { op, .. }
            | Self::InfoFetched { op, .. }
            | Self::Finished { op, .. } => *op,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Progress emitter helper handed to backends.
///
/// Sends never block. A closed receiver is ignored: nobody is listening anymore.
#[derive(Clone)]
pub struct ProgressEmitter {
    op: OperationId,
    tx: EventSender,
}

impl ProgressEmitter {
    pub fn new(op: OperationId, tx: EventSender) -> Self {
        Self { op, tx }
    }

    pub fn op(&self) -> OperationId {
        self.op
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn progress(&self, update: ProgressUpdate) {
        self.emit(SessionEvent::Progress { op: self.op, update });
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(SessionEvent::Log {
            op: self.op,
            level,
            message: message.into(),
        });
    }
}
