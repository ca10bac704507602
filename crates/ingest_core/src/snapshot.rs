use crate::{ChunkProgress, JobId};

/// Names of the durable keys mirrored from the state machine.
///
/// Readers and the writer both go through this enum so the key strings can
/// only drift in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotKey {
    JobId,
    Progress,
    ProcessedChunks,
    TotalChunks,
    UploadingStarted,
}

impl SnapshotKey {
    pub const ALL: [SnapshotKey; 5] = [
        SnapshotKey::JobId,
        SnapshotKey::Progress,
        SnapshotKey::ProcessedChunks,
        SnapshotKey::TotalChunks,
        SnapshotKey::UploadingStarted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotKey::JobId => "job_id",
            SnapshotKey::Progress => "progress",
            SnapshotKey::ProcessedChunks => "processed_chunks",
            SnapshotKey::TotalChunks => "total_chunks",
            SnapshotKey::UploadingStarted => "uploading_started",
        }
    }
}

/// Durable projection of the observed job, used to resume after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedSnapshot {
    pub job_id: Option<JobId>,
    pub progress: String,
    pub chunks: ChunkProgress,
    pub uploading_started: bool,
}

impl PersistedSnapshot {
    /// Rebuilds a snapshot from string values. Missing or unparsable values
    /// fall back to their defaults (empty, 0, 1, false).
    pub fn from_lookup(mut lookup: impl FnMut(SnapshotKey) -> Option<String>) -> Self {
        let job_id = lookup(SnapshotKey::JobId)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(JobId::new);
        let progress = lookup(SnapshotKey::Progress).unwrap_or_default();
        let processed = parse_count(lookup(SnapshotKey::ProcessedChunks)).unwrap_or(0);
        let total = parse_count(lookup(SnapshotKey::TotalChunks))
            .unwrap_or(ChunkProgress::UNKNOWN_TOTAL);
        let chunks = ChunkProgress::new(processed, total).unwrap_or_default();
        let uploading_started = lookup(SnapshotKey::UploadingStarted)
            .is_some_and(|raw| raw.trim().eq_ignore_ascii_case("true"));

        Self {
            job_id,
            progress,
            chunks,
            uploading_started,
        }
    }

    /// Key/value pairs to write; `None` means the key should be removed.
    pub fn entries(&self) -> Vec<(SnapshotKey, Option<String>)> {
        vec![
            (
                SnapshotKey::JobId,
                self.job_id.as_ref().map(|id| id.as_str().to_string()),
            ),
            (SnapshotKey::Progress, Some(self.progress.clone())),
            (
                SnapshotKey::ProcessedChunks,
                Some(self.chunks.processed.to_string()),
            ),
            (SnapshotKey::TotalChunks, Some(self.chunks.total.to_string())),
            (
                SnapshotKey::UploadingStarted,
                Some(self.uploading_started.to_string()),
            ),
        ]
    }

    /// A snapshot names a job that was still being observed.
    pub fn is_resumable(&self) -> bool {
        self.job_id.is_some() && self.uploading_started
    }
}

fn parse_count(raw: Option<String>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse().ok())
}
