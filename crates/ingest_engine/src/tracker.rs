//! Shared job tracker: owns the state machine and executes its effects.
//!
//! All mutation goes through one `Mutex<AppState>`. Effects of a message are
//! executed in order before the lock is released, so snapshot writes never
//! reorder. Persisting is a small synchronous file write and runs on the
//! calling thread while the lock is held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use ingest_core::{
    update, AcceptPolicy, AppState, Effect, JobId, Msg, Notice, ProgressView, UploadFile,
    ValidationError, DEFAULT_CLEANUP_DELAY,
};
use tokio::sync::{broadcast, watch};

use crate::protocol::ClientFrame;
use crate::{
    ConnectionEvent, ConnectionManager, ConnectionSettings, CredentialSource, EventKind,
    KeyValueStore, SnapshotRepository, Submitter, UploadError,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub connection: ConnectionSettings,
    pub cleanup_delay: Duration,
    pub accept: AcceptPolicy,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
            accept: AcceptPolicy::default(),
        }
    }
}

/// Side-channel output for front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Notice(Notice),
    /// Results of the finished job can be opened.
    ViewerReady { job_id: JobId },
}

struct TrackerInner {
    settings: TrackerSettings,
    state: Mutex<AppState>,
    repository: SnapshotRepository,
    connection: ConnectionManager,
    submitter: Arc<dyn Submitter>,
    credentials: Arc<dyn CredentialSource>,
    view_tx: watch::Sender<ProgressView>,
    events_tx: broadcast::Sender<TrackerEvent>,
    started: AtomicBool,
}

/// Cloneable handle to the single job tracker of a process.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl JobTracker {
    pub fn new(
        settings: TrackerSettings,
        store: Arc<dyn KeyValueStore>,
        submitter: Arc<dyn Submitter>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let state = AppState::with_cleanup_delay(settings.cleanup_delay);
        let (view_tx, _) = watch::channel(state.view());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let connection = ConnectionManager::new(settings.connection.clone());
        Self {
            inner: Arc::new(TrackerInner {
                settings,
                state: Mutex::new(state),
                repository: SnapshotRepository::new(store),
                connection,
                submitter,
                credentials,
                view_tx,
                events_tx,
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Restores the persisted job, subscribes to the connection and connects.
    /// Repeated calls are no-ops until `shutdown`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let snapshot = self.inner.repository.load();
        if snapshot.is_resumable() {
            engine_info!(
                "Restoring observation of job {}",
                snapshot.job_id.as_ref().map(JobId::as_str).unwrap_or_default()
            );
        }
        self.inner.dispatch(Msg::RestoreSnapshot(snapshot));
        self.inner.attach();
        self.inner.dispatch(Msg::ConnectStarted);
        self.inner.connection.connect();
    }

    /// Validates and uploads a document, then starts observing the new job.
    pub async fn submit(&self, file: Option<UploadFile>) -> Result<JobId, UploadError> {
        let Some(file) = file else {
            return Err(ValidationError::NoFileSelected.into());
        };

        let token = {
            let mut state = self.inner.lock_state();
            state.check_submit(&self.inner.settings.accept, Some(&file))?;
            let Some(token) = self.inner.credentials.token() else {
                drop(state);
                self.inner
                    .notify(Notice::error("Authentication required. Please log in again."));
                return Err(UploadError::Auth("no session token available".to_string()));
            };
            self.inner.step(
                &mut state,
                Msg::SubmitStarted {
                    file_name: file.name.clone(),
                },
            );
            token
        };

        match self.inner.submitter.submit(&file, &token).await {
            Ok(job_id) => {
                let mut state = self.inner.lock_state();
                self.inner.step(
                    &mut state,
                    Msg::JobCreated {
                        job_id: job_id.clone(),
                    },
                );
                if state.job_id() != Some(&job_id) || !state.status().is_observing() {
                    engine_warn!(
                        "Upload of {} created job {} but the job is {:?}",
                        file.name,
                        job_id,
                        state.status()
                    );
                    return Err(UploadError::NotObserved {
                        job_id,
                        status: state.status(),
                    });
                }
                engine_info!("Upload of {} created job {}", file.name, job_id);
                Ok(job_id)
            }
            Err(err) => {
                engine_warn!("Upload of {} failed: {}", file.name, err);
                self.inner.dispatch(Msg::SubmitFailed {
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Dismisses a finished or failed job.
    pub fn reset(&self) {
        self.inner.dispatch(Msg::ResetClicked);
    }

    pub fn view(&self) -> ProgressView {
        self.inner.lock_state().view()
    }

    pub fn watch(&self) -> watch::Receiver<ProgressView> {
        self.inner.view_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    /// Disconnects. The persisted snapshot is left for the next start.
    pub fn shutdown(&self) {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.connection.disconnect();
        self.inner.dispatch(Msg::Disconnected);
        engine_info!("Job tracker stopped");
    }
}

impl TrackerInner {
    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(self: &Arc<Self>, msg: Msg) {
        let mut state = self.lock_state();
        self.step(&mut state, msg);
    }

    fn step(self: &Arc<Self>, state: &mut MutexGuard<'_, AppState>, msg: Msg) {
        let current = std::mem::take(&mut **state);
        let (next, effects) = update(current, msg);
        **state = next;
        if state.consume_dirty() {
            self.view_tx.send_replace(state.view());
        }
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(self: &Arc<Self>, effect: Effect) {
        match effect {
            Effect::PersistSnapshot(snapshot) => {
                if let Err(err) = self.repository.save(&snapshot) {
                    engine_error!("Failed to persist job snapshot: {}", err);
                }
            }
            Effect::ClearPersisted => {
                if let Err(err) = self.repository.clear() {
                    engine_error!("Failed to clear job snapshot: {}", err);
                }
            }
            Effect::SendResume { job_id } => {
                if !self.connection.send(ClientFrame::resume(&job_id)) {
                    engine_debug!("Resume for {} deferred until connected", job_id);
                }
            }
            Effect::ScheduleCleanup { job_id, delay } => self.schedule_cleanup(job_id, delay),
            Effect::OpenViewer { job_id } => {
                engine_info!("Job {} is ready to view", job_id);
                let _ = self.events_tx.send(TrackerEvent::ViewerReady { job_id });
            }
            Effect::Notify(notice) => self.notify(notice),
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events_tx.send(TrackerEvent::Notice(notice));
    }

    fn schedule_cleanup(self: &Arc<Self>, job_id: JobId, delay: Duration) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.started.load(Ordering::SeqCst) {
                engine_debug!("Skipping cleanup of {}: tracker stopped", job_id);
                return;
            }
            inner.dispatch(Msg::CleanupElapsed { job_id });
        });
    }

    fn attach(self: &Arc<Self>) {
        for kind in EventKind::ALL {
            let weak: Weak<Self> = Arc::downgrade(self);
            self.connection.on(kind, move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(event_to_msg(event));
                }
            });
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        self.connection.set_resume_provider(move || {
            weak.upgrade()
                .and_then(|inner| inner.lock_state().resume_target())
        });
    }
}

fn event_to_msg(event: &ConnectionEvent) -> Msg {
    match event {
        ConnectionEvent::Connect => Msg::Connected,
        ConnectionEvent::Reconnect { attempt } => Msg::Reconnected { attempt: *attempt },
        ConnectionEvent::ConnectError { message } => Msg::ConnectFailed {
            message: message.clone(),
        },
        ConnectionEvent::ProgressUpdate(payload) => Msg::ProgressUpdate {
            message: payload.message.clone(),
            chunks: payload.chunks(),
        },
        ConnectionEvent::UploadStatus(payload) => Msg::UploadStatus {
            message: payload.message.clone(),
        },
        ConnectionEvent::Completed(payload) => Msg::Completed {
            message: payload.message.clone(),
        },
        ConnectionEvent::Error(payload) => Msg::BackendError {
            message: payload.message.clone(),
        },
    }
}
