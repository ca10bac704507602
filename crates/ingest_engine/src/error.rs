use ingest_core::{JobId, JobStatus, SubmitRejection, ValidationError};
use thiserror::Error;

/// Failure of the job-creation request itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("credential rejected (http status {0})")]
    Unauthorized(u16),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Everything `JobTracker::submit` can report to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("authentication required: {0}")]
    Auth(String),
    #[error("upload failed: {0}")]
    Submission(SubmitError),
    #[error("a job is already {status:?}; wait for it to finish")]
    Conflict { status: JobStatus },
    /// The backend created the job but it failed before observation began.
    #[error("job {job_id} was created but is not being observed (now {status:?})")]
    NotObserved { job_id: JobId, status: JobStatus },
}

impl From<SubmitRejection> for UploadError {
    fn from(rejection: SubmitRejection) -> Self {
        match rejection {
            SubmitRejection::Validation(err) => UploadError::Validation(err),
            SubmitRejection::Conflict { status } => UploadError::Conflict { status },
        }
    }
}

impl From<SubmitError> for UploadError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Unauthorized(status) => {
                UploadError::Auth(format!("server rejected the session token ({status})"))
            }
            other => UploadError::Submission(other),
        }
    }
}
