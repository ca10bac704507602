//! Ingest core: pure job-progress state machine and view-model helpers.
mod effect;
mod msg;
mod progress;
mod snapshot;
mod state;
mod update;
mod validate;
mod view_model;

pub use effect::{Effect, Notice, NoticeLevel};
pub use msg::Msg;
pub use progress::ChunkProgress;
pub use snapshot::{PersistedSnapshot, SnapshotKey};
pub use state::{AppState, ConnectionState, JobId, JobStatus, SubmitRejection, DEFAULT_CLEANUP_DELAY};
pub use update::update;
pub use validate::{AcceptPolicy, UploadFile, ValidationError};
pub use view_model::ProgressView;
