use crate::{ConnectionState, JobId, JobStatus};

/// Everything a progress display or navigation guard needs, in one copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub status: JobStatus,
    pub job_id: Option<JobId>,
    pub progress_text: String,
    pub processed: u32,
    pub total: u32,
    pub percent: Option<u8>,
    /// A job is being submitted or observed; submission UI stays locked.
    pub upload_active: bool,
    pub connection: ConnectionState,
    /// Connection dropped and the manager is retrying.
    pub retrying: bool,
    pub can_submit: bool,
}

impl ProgressView {
    /// Text inside the progress bar: a percentage once the total is known.
    pub fn bar_label(&self) -> String {
        match self.percent {
            Some(percent) => format!("{percent}%"),
            None => "Processing...".to_string(),
        }
    }

    pub fn chunk_label(&self) -> String {
        format!("Processing Chunks: {}/{}", self.processed, self.total)
    }
}
