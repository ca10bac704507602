//! Ingest engine: connection, submission, persistence and effect execution.
mod connection;
mod error;
mod persist;
mod protocol;
mod store;
mod submit;
mod tracker;
mod types;

pub use connection::{ConnectionManager, ConnectionSettings, Subscription};
pub use error::{SubmitError, UploadError};
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError};
pub use protocol::{
    decode_server_frame, encode_client_frame, ClientFrame, JobCreatedResponse, NoticePayload,
    ProgressPayload, ResumeRequest, ServerFrame, StatusPayload,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, SnapshotRepository, STATE_FILENAME};
pub use submit::{
    load_upload_file, CredentialSource, ReqwestSubmitter, StaticCredential, SubmitSettings,
    Submitter,
};
pub use tracker::{JobTracker, TrackerEvent, TrackerSettings};
pub use types::{ConnectionEvent, EventKind};
