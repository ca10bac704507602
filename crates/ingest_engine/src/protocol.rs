//! JSON frames exchanged with the processing backend.
//!
//! Every frame is a text message of the form `{"event": <name>, "data": <payload>}`.

use ingest_core::{ChunkProgress, JobId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

impl ProgressPayload {
    /// Structured counts, when the backend sent a consistent pair.
    pub fn chunks(&self) -> Option<ChunkProgress> {
        ChunkProgress::new(self.processed?, self.total?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoticePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Backend to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    ProgressUpdate(ProgressPayload),
    UploadStatus(StatusPayload),
    Completed(NoticePayload),
    Error(NoticePayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Client to backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Ask the backend to continue (or replay) progress delivery for a job.
    ResumeProcess(ResumeRequest),
}

impl ClientFrame {
    pub fn resume(job_id: &JobId) -> Self {
        ClientFrame::ResumeProcess(ResumeRequest {
            job_id: job_id.as_str().to_string(),
        })
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientFrame::ResumeProcess(_) => "resume_process",
        }
    }

    /// Job named by a resume frame.
    pub fn resumed_job(&self) -> Option<&str> {
        match self {
            ClientFrame::ResumeProcess(request) => Some(&request.job_id),
        }
    }
}

/// Body returned by the job-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobCreatedResponse {
    #[serde(alias = "jobId", alias = "book_id")]
    pub job_id: String,
}

pub fn decode_server_frame(text: &str) -> Result<ServerFrame, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}
