use std::fmt;

use crate::protocol::{NoticePayload, ProgressPayload, ServerFrame, StatusPayload};

/// Everything the connection manager reports to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// First successful open of a connection instance.
    Connect,
    /// Re-opened after a drop; `attempt` counts tries since the drop.
    Reconnect { attempt: u32 },
    /// A connection attempt failed or an open connection dropped. Retrying
    /// continues.
    ConnectError { message: String },
    ProgressUpdate(ProgressPayload),
    UploadStatus(StatusPayload),
    Completed(NoticePayload),
    Error(NoticePayload),
}

impl ConnectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectionEvent::Connect => EventKind::Connect,
            ConnectionEvent::Reconnect { .. } => EventKind::Reconnect,
            ConnectionEvent::ConnectError { .. } => EventKind::ConnectError,
            ConnectionEvent::ProgressUpdate(_) => EventKind::ProgressUpdate,
            ConnectionEvent::UploadStatus(_) => EventKind::UploadStatus,
            ConnectionEvent::Completed(_) => EventKind::Completed,
            ConnectionEvent::Error(_) => EventKind::Error,
        }
    }
}

impl From<ServerFrame> for ConnectionEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::ProgressUpdate(payload) => ConnectionEvent::ProgressUpdate(payload),
            ServerFrame::UploadStatus(payload) => ConnectionEvent::UploadStatus(payload),
            ServerFrame::Completed(payload) => ConnectionEvent::Completed(payload),
            ServerFrame::Error(payload) => ConnectionEvent::Error(payload),
        }
    }
}

/// Event names handlers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Reconnect,
    ConnectError,
    ProgressUpdate,
    UploadStatus,
    Completed,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Connect,
        EventKind::Reconnect,
        EventKind::ConnectError,
        EventKind::ProgressUpdate,
        EventKind::UploadStatus,
        EventKind::Completed,
        EventKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Reconnect => "reconnect",
            EventKind::ConnectError => "connect_error",
            EventKind::ProgressUpdate => "progress_update",
            EventKind::UploadStatus => "upload_status",
            EventKind::Completed => "completed",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
