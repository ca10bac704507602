use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Mirror the state machine into the durable store.
    PersistSnapshot(crate::PersistedSnapshot),
    /// Remove every durable key.
    ClearPersisted,
    /// Ask the backend to (re)start progress delivery for a job.
    SendResume { job_id: crate::JobId },
    /// Deliver `Msg::CleanupElapsed` after `delay`.
    ScheduleCleanup { job_id: crate::JobId, delay: Duration },
    /// The finished job's results can be shown.
    OpenViewer { job_id: crate::JobId },
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Short user-facing message (a toast in a graphical front end).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
