use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::view_model::ProgressView;
use crate::{AcceptPolicy, ChunkProgress, PersistedSnapshot, UploadFile, ValidationError};

/// Grace period between completion and clearing the persisted snapshot.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(1);

/// Opaque identifier the backend assigns to a submitted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Submitting,
    Awaiting,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// A job id is known and backend events for it are expected.
    pub fn is_observing(self) -> bool {
        matches!(self, JobStatus::Awaiting | JobStatus::InProgress)
    }

    /// Submission UI is locked while a job is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Submitting | JobStatus::Awaiting | JobStatus::InProgress
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a job is already {status:?}; only one job is observed at a time")]
    Conflict { status: JobStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    status: JobStatus,
    job_id: Option<JobId>,
    chunks: ChunkProgress,
    // Counts restored from disk are shown but not trusted for ordering.
    chunks_provisional: bool,
    last_message: String,
    connection: ConnectionState,
    cleanup_delay: Duration,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_cleanup_delay(DEFAULT_CLEANUP_DELAY)
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cleanup_delay(cleanup_delay: Duration) -> Self {
        Self {
            status: JobStatus::Idle,
            job_id: None,
            chunks: ChunkProgress::default(),
            chunks_provisional: false,
            last_message: String::new(),
            connection: ConnectionState::Disconnected,
            cleanup_delay,
            dirty: false,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn chunks(&self) -> ChunkProgress {
        self.chunks
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn cleanup_delay(&self) -> Duration {
        self.cleanup_delay
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            status: self.status,
            job_id: self.job_id.clone(),
            progress_text: self.last_message.clone(),
            processed: self.chunks.processed,
            total: self.chunks.total,
            percent: self.chunks.percent(),
            upload_active: self.status.is_active(),
            connection: self.connection,
            retrying: self.connection == ConnectionState::Reconnecting,
            can_submit: self.accepts_submit(),
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Synchronous gate in front of a submission; never mutates state.
    pub fn check_submit(
        &self,
        policy: &AcceptPolicy,
        file: Option<&UploadFile>,
    ) -> Result<(), SubmitRejection> {
        policy.validate(file)?;
        if !self.accepts_submit() {
            return Err(SubmitRejection::Conflict {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Job to re-announce to the backend after (re)connecting.
    pub fn resume_target(&self) -> Option<JobId> {
        if self.status.is_observing() {
            self.job_id.clone()
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            job_id: self.job_id.clone(),
            progress: self.last_message.clone(),
            chunks: self.chunks,
            uploading_started: self.status.is_observing(),
        }
    }

    pub(crate) fn accepts_submit(&self) -> bool {
        !self.status.is_active()
    }

    pub(crate) fn accepts_backend_events(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) -> bool {
        if self.connection == connection {
            return false;
        }
        self.connection = connection;
        self.dirty = true;
        true
    }

    pub(crate) fn set_last_message(&mut self, message: impl Into<String>) {
        self.last_message = message.into();
        self.dirty = true;
    }

    pub(crate) fn begin_submit(&mut self, file_name: &str) {
        self.status = JobStatus::Submitting;
        self.job_id = None;
        self.chunks = ChunkProgress::default();
        self.chunks_provisional = false;
        self.last_message = format!("Uploading {file_name}...");
        self.dirty = true;
    }

    pub(crate) fn await_job(&mut self, job_id: JobId) {
        self.status = JobStatus::Awaiting;
        self.job_id = Some(job_id);
        self.last_message = "Waiting for processing to start...".to_string();
        self.dirty = true;
    }

    pub(crate) fn abort_submit(&mut self, reason: &str) {
        self.status = JobStatus::Idle;
        self.job_id = None;
        self.last_message = format!("Upload failed: {reason}");
        self.dirty = true;
    }

    pub(crate) fn resume_from(&mut self, snapshot: PersistedSnapshot) {
        self.status = JobStatus::Awaiting;
        self.job_id = snapshot.job_id;
        self.chunks = snapshot.chunks;
        self.chunks_provisional = true;
        self.last_message = snapshot.progress;
        self.dirty = true;
    }

    /// Applies one progress report. Returns `false` when the reported
    /// processed count is behind the trusted one and the report is dropped.
    pub(crate) fn record_progress(
        &mut self,
        message: String,
        reported: Option<ChunkProgress>,
    ) -> bool {
        if let Some(next) = reported {
            if !self.chunks_provisional && next.processed < self.chunks.processed {
                return false;
            }
            self.chunks = next;
            self.chunks_provisional = false;
        }
        self.status = JobStatus::InProgress;
        self.last_message = message;
        self.dirty = true;
        true
    }

    pub(crate) fn mark_completed(&mut self, message: String) {
        self.status = JobStatus::Completed;
        self.chunks.processed = self.chunks.total;
        self.chunks_provisional = false;
        self.last_message = message;
        self.dirty = true;
    }

    pub(crate) fn mark_failed(&mut self, message: String) {
        self.status = JobStatus::Failed;
        self.last_message = message;
        self.dirty = true;
    }

    pub(crate) fn reset_to_idle(&mut self) {
        self.status = JobStatus::Idle;
        self.job_id = None;
        self.chunks = ChunkProgress::default();
        self.chunks_provisional = false;
        self.dirty = true;
    }
}
