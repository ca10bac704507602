use crate::{
    AppState, ChunkProgress, ConnectionState, Effect, JobStatus, Msg, Notice, PersistedSnapshot,
};

const COMPLETED_TEXT: &str = "Processing completed!";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::RestoreSnapshot(snapshot) => restore(&mut state, snapshot),
        Msg::SubmitStarted { file_name } => {
            if !state.accepts_submit() {
                return (state, Vec::new());
            }
            state.begin_submit(&file_name);
            // Drops whatever a previous failed or finished job left behind.
            vec![Effect::ClearPersisted]
        }
        Msg::JobCreated { job_id } => {
            if state.status() != JobStatus::Submitting {
                return (state, Vec::new());
            }
            state.await_job(job_id.clone());
            vec![
                Effect::PersistSnapshot(state.snapshot()),
                Effect::SendResume { job_id },
                Effect::Notify(Notice::success("Upload successful!")),
            ]
        }
        Msg::SubmitFailed { reason } => {
            if state.status() != JobStatus::Submitting {
                return (state, Vec::new());
            }
            state.abort_submit(&reason);
            vec![Effect::Notify(Notice::error(format!(
                "Error uploading file: {reason}"
            )))]
        }
        Msg::ConnectStarted => {
            if state.connection() == ConnectionState::Disconnected {
                state.set_connection(ConnectionState::Connecting);
            }
            Vec::new()
        }
        Msg::Connected => {
            state.set_connection(ConnectionState::Connected);
            vec![Effect::Notify(Notice::success("Connected to server"))]
        }
        Msg::Reconnected { attempt } => {
            state.set_connection(ConnectionState::Connected);
            vec![Effect::Notify(Notice::success(format!(
                "Reconnected to server after {attempt} attempt(s)"
            )))]
        }
        Msg::ConnectFailed { message: _ } => {
            // Only the first failure of a streak is announced.
            if state.set_connection(ConnectionState::Reconnecting) {
                vec![Effect::Notify(Notice::error(
                    "Server connection failed. Retrying...",
                ))]
            } else {
                Vec::new()
            }
        }
        Msg::Disconnected => {
            state.set_connection(ConnectionState::Disconnected);
            Vec::new()
        }
        Msg::ProgressUpdate { message, chunks } => {
            if !state.accepts_backend_events() {
                return (state, Vec::new());
            }
            apply_progress(&mut state, message, chunks)
        }
        Msg::UploadStatus { message } => {
            if !state.accepts_backend_events() {
                return (state, Vec::new());
            }
            let mut effects = Vec::with_capacity(2);
            if state.status().is_observing() {
                state.set_last_message(message.clone());
                effects.push(Effect::PersistSnapshot(state.snapshot()));
            }
            effects.push(Effect::Notify(Notice::info(message)));
            effects
        }
        Msg::Completed { message } => {
            if !state.accepts_backend_events() {
                return (state, Vec::new());
            }
            complete(&mut state, message)
        }
        Msg::BackendError { message } => {
            if !state.accepts_backend_events() {
                return (state, Vec::new());
            }
            fail(&mut state, message)
        }
        Msg::CleanupElapsed { job_id } => {
            if state.status() != JobStatus::Completed || state.job_id() != Some(&job_id) {
                return (state, Vec::new());
            }
            state.reset_to_idle();
            vec![Effect::ClearPersisted, Effect::OpenViewer { job_id }]
        }
        Msg::ResetClicked => {
            if !state.status().is_terminal() {
                return (state, Vec::new());
            }
            state.reset_to_idle();
            state.set_last_message(String::new());
            vec![Effect::ClearPersisted]
        }
    };

    (state, effects)
}

fn restore(state: &mut AppState, snapshot: PersistedSnapshot) -> Vec<Effect> {
    if state.status() != JobStatus::Idle {
        return Vec::new();
    }
    if !snapshot.is_resumable() {
        if !snapshot.progress.is_empty() {
            state.set_last_message(snapshot.progress);
        }
        return Vec::new();
    }
    let Some(job_id) = snapshot.job_id.clone() else {
        return Vec::new();
    };
    state.resume_from(snapshot);
    vec![Effect::SendResume { job_id }]
}

fn apply_progress(
    state: &mut AppState,
    message: String,
    chunks: Option<ChunkProgress>,
) -> Vec<Effect> {
    if !state.status().is_observing() {
        return Vec::new();
    }
    let reported = chunks.or_else(|| ChunkProgress::parse_message(&message));
    if !state.record_progress(message, reported) {
        return Vec::new();
    }
    // A final chunk report and an explicit completion event share one path.
    if state.chunks().is_complete() {
        return complete(state, None);
    }
    vec![Effect::PersistSnapshot(state.snapshot())]
}

fn complete(state: &mut AppState, message: Option<String>) -> Vec<Effect> {
    if !state.status().is_observing() {
        return Vec::new();
    }
    let Some(job_id) = state.job_id().cloned() else {
        return Vec::new();
    };
    state.mark_completed(message.unwrap_or_else(|| COMPLETED_TEXT.to_string()));
    vec![
        Effect::PersistSnapshot(state.snapshot()),
        Effect::Notify(Notice::success(COMPLETED_TEXT)),
        Effect::ScheduleCleanup {
            job_id,
            delay: state.cleanup_delay(),
        },
    ]
}

fn fail(state: &mut AppState, message: Option<String>) -> Vec<Effect> {
    let reason = message.unwrap_or_else(|| "Unknown error".to_string());
    let notice = Effect::Notify(Notice::error(format!("Error: {reason}")));
    if !state.status().is_active() {
        return vec![notice];
    }
    state.mark_failed(format!("Error occurred: {reason}"));
    vec![Effect::PersistSnapshot(state.snapshot()), notice]
}
