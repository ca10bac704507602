use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use ingest_core::{JobId, UploadFile};
use reqwest::multipart::{Form, Part};

use crate::protocol::JobCreatedResponse;
use crate::SubmitError;

#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub api_base: String,
    pub upload_path: String,
    pub field_name: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:5001".to_string(),
            upload_path: "/api/upload-pdf".to_string(),
            field_name: "pdf".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl SubmitSettings {
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            self.upload_path.trim_start_matches('/')
        )
    }
}

/// Supplies the session token attached to uploads.
pub trait CredentialSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|token| !token.trim().is_empty()))
    }
}

impl CredentialSource for StaticCredential {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    /// Sends the document and returns the job id the backend assigned.
    async fn submit(&self, file: &UploadFile, token: &str) -> Result<JobId, SubmitError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestSubmitter {
    settings: SubmitSettings,
    client: reqwest::Client,
}

impl ReqwestSubmitter {
    pub fn new(settings: SubmitSettings) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| SubmitError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &SubmitSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl Submitter for ReqwestSubmitter {
    async fn submit(&self, file: &UploadFile, token: &str) -> Result<JobId, SubmitError> {
        let url = self.settings.upload_url();
        let mime = file.mime.as_deref().unwrap_or("application/octet-stream");
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(mime)
            .map_err(|err| SubmitError::InvalidResponse(format!("bad mime type {mime}: {err}")))?;
        let form = Form::new().part(self.settings.field_name.clone(), part);

        engine_info!("Uploading {} ({} bytes) to {}", file.name, file.len(), url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SubmitError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SubmitError::HttpStatus(status.as_u16()));
        }

        let body: JobCreatedResponse = response
            .json()
            .await
            .map_err(|err| SubmitError::InvalidResponse(err.to_string()))?;
        let job_id = body.job_id.trim();
        if job_id.is_empty() {
            return Err(SubmitError::InvalidResponse("empty job id".to_string()));
        }
        engine_debug!("Upload of {} accepted as job {}", file.name, job_id);
        Ok(JobId::new(job_id))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SubmitError {
    if err.is_timeout() {
        return SubmitError::Timeout;
    }
    SubmitError::Network(err.to_string())
}

/// Reads a file from disk for submission, guessing its MIME type from the
/// extension.
pub fn load_upload_file(path: &Path) -> io::Result<UploadFile> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_for_extension)
        .map(str::to_string);
    Ok(UploadFile::new(name, mime, bytes))
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "html" | "htm" => Some("text/html"),
        "json" => Some("application/json"),
        _ => None,
    }
}
