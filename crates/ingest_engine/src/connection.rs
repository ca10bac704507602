//! Persistent WebSocket connection to the processing backend.
//!
//! One background task per connection instance owns the socket. It:
//!
//! - reconnects without limit after a fixed delay,
//! - asks the registered resume provider for a job id on every (re)connect
//!   and sends the resume frame before any event is dispatched,
//! - decodes backend frames and fans them out to subscribed handlers.
//!
//! `disconnect` is authoritative: once it returns no handler fires again for
//! that instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{SinkExt, StreamExt};
use ingest_core::{ConnectionState, JobId};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::protocol::{decode_server_frame, encode_client_frame, ClientFrame};
use crate::{ConnectionEvent, EventKind};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type EventHandler = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;
type ResumeProvider = Arc<dyn Fn() -> Option<JobId> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5001/ws".to_string(),
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            max_frame_bytes: 1024 * 1024,
        }
    }
}

/// Handle returned by [`ConnectionManager::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

enum ConnCmd {
    Send(ClientFrame),
    Shutdown,
}

struct Session {
    cmd_tx: mpsc::UnboundedSender<ConnCmd>,
}

struct HandlerEntry {
    id: u64,
    kind: EventKind,
    handler: EventHandler,
}

struct Inner {
    settings: ConnectionSettings,
    handlers: RwLock<Vec<HandlerEntry>>,
    // Generation of the live connection instance; bumped by connect and disconnect.
    generation: AtomicU64,
    state: Mutex<ConnectionState>,
    session: Mutex<Option<Session>>,
    resume: Mutex<Option<ResumeProvider>>,
    next_handler_id: AtomicU64,
}

/// Cloneable handle to the single backend connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                handlers: RwLock::new(Vec::new()),
                generation: AtomicU64::new(0),
                state: Mutex::new(ConnectionState::Disconnected),
                session: Mutex::new(None),
                resume: Mutex::new(None),
                next_handler_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Starts the connection task. No-op while a connection instance exists.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut session = lock(&self.inner.session);
        if session.is_some() {
            engine_debug!("connect ignored: connection already active");
            return;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.inner.state) = ConnectionState::Connecting;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        engine_info!("Connecting to {}", self.inner.settings.url);
        tokio::spawn(connection_task(Arc::clone(&self.inner), generation, cmd_rx));
        *session = Some(Session { cmd_tx });
    }

    /// Closes the connection and drops every handler and the resume provider.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        let session = lock(&self.inner.session).take();
        {
            let mut handlers = write(&self.inner.handlers);
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            handlers.clear();
        }
        *lock(&self.inner.resume) = None;
        *lock(&self.inner.state) = ConnectionState::Disconnected;

        if let Some(session) = session {
            engine_info!("Disconnecting from {}", self.inner.settings.url);
            let _ = session.cmd_tx.send(ConnCmd::Shutdown);
        }
    }

    /// Registers `handler` for one event kind.
    ///
    /// Handlers run on the connection task and must not call `on`, `off` or
    /// `disconnect` themselves.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        write(&self.inner.handlers).push(HandlerEntry {
            id,
            kind,
            handler: Arc::new(handler),
        });
        Subscription { kind, id }
    }

    pub fn off(&self, subscription: Subscription) {
        write(&self.inner.handlers).retain(|entry| entry.id != subscription.id);
    }

    /// Sets the callback consulted on every connect and reconnect. When it
    /// yields a job id, a resume frame for that job is sent.
    pub fn set_resume_provider<F>(&self, provider: F)
    where
        F: Fn() -> Option<JobId> + Send + Sync + 'static,
    {
        *lock(&self.inner.resume) = Some(Arc::new(provider));
    }

    /// Queues a frame for the backend. Returns `false` (and drops the frame)
    /// while not connected.
    pub fn send(&self, frame: ClientFrame) -> bool {
        if !self.is_connected() {
            engine_debug!("Dropping {} frame: not connected", frame.event_name());
            return false;
        }
        match lock(&self.inner.session).as_ref() {
            Some(session) => session.cmd_tx.send(ConnCmd::Send(frame)).is_ok(),
            None => false,
        }
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, generation: u64, next: ConnectionState) {
        let mut state = lock(&self.state);
        if self.is_current(generation) {
            *state = next;
        }
    }

    fn dispatch(&self, generation: u64, event: &ConnectionEvent) {
        let handlers = read(&self.handlers);
        if !self.is_current(generation) {
            engine_debug!("Dropping {} from a closed connection", event.kind());
            return;
        }
        let kind = event.kind();
        for entry in handlers.iter().filter(|entry| entry.kind == kind) {
            (entry.handler)(event);
        }
    }

    fn resume_target(&self) -> Option<JobId> {
        let provider = lock(&self.resume).clone();
        provider.and_then(|provider| provider())
    }
}

enum PumpExit {
    Shutdown,
    Dropped(String),
}

async fn connection_task(
    inner: Arc<Inner>,
    generation: u64,
    mut cmd_rx: mpsc::UnboundedReceiver<ConnCmd>,
) {
    let settings = inner.settings.clone();
    let mut ever_connected = false;
    let mut attempt: u32 = 0;

    loop {
        let open = open_socket(&settings);
        tokio::pin!(open);
        let opened = loop {
            tokio::select! {
                biased;
                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Send(frame)) => {
                        engine_debug!("Dropping {} frame: still connecting", frame.event_name());
                    }
                    Some(ConnCmd::Shutdown) | None => return,
                },
                result = &mut open => break result,
            }
        };

        match opened {
            Ok(mut socket) => {
                inner.set_state(generation, ConnectionState::Connected);
                let event = if ever_connected {
                    engine_info!("Reconnected to {} after {} attempt(s)", settings.url, attempt);
                    ConnectionEvent::Reconnect { attempt }
                } else {
                    engine_info!("Connected to {}", settings.url);
                    ConnectionEvent::Connect
                };
                ever_connected = true;
                attempt = 0;

                let exit = match announce_resume(&inner, &mut socket).await {
                    Ok(resumed) => {
                        inner.dispatch(generation, &event);
                        pump(&inner, generation, &mut socket, &mut cmd_rx, resumed).await
                    }
                    Err(reason) => PumpExit::Dropped(reason),
                };
                match exit {
                    PumpExit::Shutdown => {
                        let _ = socket.close(None).await;
                        return;
                    }
                    PumpExit::Dropped(reason) => {
                        let message = format!("Connection to {} lost: {}", settings.url, reason);
                        engine_warn!("{}. Retrying in {:?}", message, settings.reconnect_delay);
                        inner.set_state(generation, ConnectionState::Reconnecting);
                        inner.dispatch(generation, &ConnectionEvent::ConnectError { message });
                    }
                }
            }
            Err(message) => {
                engine_warn!("{}. Retrying in {:?}", message, settings.reconnect_delay);
                inner.set_state(generation, ConnectionState::Reconnecting);
                inner.dispatch(generation, &ConnectionEvent::ConnectError { message });
            }
        }

        attempt = attempt.saturating_add(1);
        let pause = tokio::time::sleep(settings.reconnect_delay);
        tokio::pin!(pause);
        loop {
            tokio::select! {
                biased;
                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Send(frame)) => {
                        engine_debug!("Dropping {} frame: reconnecting", frame.event_name());
                    }
                    Some(ConnCmd::Shutdown) | None => return,
                },
                _ = &mut pause => break,
            }
        }
    }
}

async fn open_socket(settings: &ConnectionSettings) -> Result<Socket, String> {
    match tokio::time::timeout(settings.connect_timeout, connect_async(settings.url.as_str())).await
    {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(err)) => Err(format!("Connection to {} failed: {}", settings.url, err)),
        Err(_) => Err(format!(
            "Connection to {} timed out ({:?})",
            settings.url, settings.connect_timeout
        )),
    }
}

/// Sends the resume frame for the provider's job, if any, and returns that job.
async fn announce_resume(inner: &Inner, socket: &mut Socket) -> Result<Option<String>, String> {
    let Some(job_id) = inner.resume_target() else {
        return Ok(None);
    };
    engine_info!("Resuming observation of job {}", job_id);
    send_frame(socket, &ClientFrame::resume(&job_id)).await?;
    Ok(Some(job_id.as_str().to_string()))
}

async fn send_frame(socket: &mut Socket, frame: &ClientFrame) -> Result<(), String> {
    let payload = encode_client_frame(frame)
        .map_err(|err| format!("Failed to encode {}: {}", frame.event_name(), err))?;
    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|err| format!("Failed to send {}: {}", frame.event_name(), err))
}

async fn pump(
    inner: &Inner,
    generation: u64,
    socket: &mut Socket,
    cmd_rx: &mut mpsc::UnboundedReceiver<ConnCmd>,
    mut resumed: Option<String>,
) -> PumpExit {
    loop {
        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => match cmd {
                Some(ConnCmd::Send(frame)) => {
                    // One resume per job and connection.
                    if let Some(job_id) = frame.resumed_job() {
                        if resumed.as_deref() == Some(job_id) {
                            engine_debug!("Job {} already resumed on this connection", job_id);
                            continue;
                        }
                        resumed = Some(job_id.to_string());
                    }
                    if let Err(reason) = send_frame(socket, &frame).await {
                        return PumpExit::Dropped(reason);
                    }
                }
                Some(ConnCmd::Shutdown) | None => return PumpExit::Shutdown,
            },
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str();
                    if text.len() > inner.settings.max_frame_bytes {
                        engine_warn!("Skipping oversized frame ({} bytes)", text.len());
                        continue;
                    }
                    match decode_server_frame(text) {
                        Ok(frame) => inner.dispatch(generation, &ConnectionEvent::from(frame)),
                        Err(err) => engine_warn!("Skipping undecodable frame: {}", err),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = socket.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| format!("server closed connection ({})", u16::from(frame.code)))
                        .unwrap_or_else(|| "server closed connection".to_string());
                    return PumpExit::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return PumpExit::Dropped(err.to_string()),
                None => return PumpExit::Dropped("stream ended".to_string()),
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
