#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Restore the snapshot persisted by a previous run (start-up only).
    RestoreSnapshot(crate::PersistedSnapshot),
    /// A validated file is about to be sent to the backend.
    SubmitStarted { file_name: String },
    /// The backend accepted the upload and assigned a job id.
    JobCreated { job_id: crate::JobId },
    /// The upload request failed before a job id was assigned.
    SubmitFailed { reason: String },
    /// The connection manager was asked to connect.
    ConnectStarted,
    /// First successful connection of a connection instance.
    Connected,
    /// Connection re-established after a drop.
    Reconnected { attempt: u32 },
    /// A connection attempt failed; the manager keeps retrying.
    ConnectFailed { message: String },
    /// The connection was torn down on request.
    Disconnected,
    /// Backend progress for the observed job.
    ProgressUpdate {
        message: String,
        chunks: Option<crate::ChunkProgress>,
    },
    /// Informational backend status text.
    UploadStatus { message: String },
    /// Backend reports the observed job finished.
    Completed { message: Option<String> },
    /// Backend reports the observed job failed.
    BackendError { message: Option<String> },
    /// The post-completion grace period ran out.
    CleanupElapsed { job_id: crate::JobId },
    /// User dismissed a finished or failed job.
    ResetClicked,
}
