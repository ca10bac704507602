mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ingest_core::{ConnectionState, JobId};
use ingest_engine::{
    ClientFrame, ConnectionEvent, ConnectionManager, ConnectionSettings, EventKind,
    ProgressPayload,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{eventually, init_logging, refused_url, start_server};
use tokio::sync::mpsc;

type Recorded = Arc<Mutex<Vec<ConnectionEvent>>>;

fn settings(url: &str) -> ConnectionSettings {
    ConnectionSettings {
        url: url.to_string(),
        reconnect_delay: Duration::from_millis(50),
        connect_timeout: Duration::from_secs(2),
        ..ConnectionSettings::default()
    }
}

fn record_all(manager: &ConnectionManager) -> Recorded {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = recorded.clone();
        manager.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    }
    recorded
}

fn count(recorded: &Recorded, kind: EventKind) -> usize {
    recorded
        .lock()
        .unwrap()
        .iter()
        .filter(|event| event.kind() == kind)
        .count()
}

#[tokio::test]
async fn connect_is_idempotent() {
    init_logging();
    let server = start_server(|_, socket| socket.hold()).await;
    let manager = ConnectionManager::new(settings(&server.url));
    let recorded = record_all(&manager);

    manager.connect();
    manager.connect();
    manager.connect();

    assert!(eventually(Duration::from_secs(3), || manager.is_connected()).await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(server.accepted(), 1);
    assert_eq!(count(&recorded, EventKind::Connect), 1);
    assert_eq!(count(&recorded, EventKind::Reconnect), 0);

    manager.disconnect();
}

#[tokio::test]
async fn domain_events_reach_matching_subscribers_only() {
    init_logging();
    let server = start_server(|_, mut socket| async move {
        socket
            .send_event(
                "progress_update",
                json!({ "message": "Processing chunk 1/4", "processed": 1, "total": 4 }),
            )
            .await;
        socket
            .send_event("upload_status", json!({ "message": "queued" }))
            .await;
        socket.hold().await;
    })
    .await;
    let manager = ConnectionManager::new(settings(&server.url));
    let progress: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    manager.on(EventKind::ProgressUpdate, move |event| {
        sink.lock().unwrap().push(event.clone())
    });
    let statuses: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let status_subscription = manager.on(EventKind::UploadStatus, move |event| {
        sink.lock().unwrap().push(event.clone())
    });
    manager.off(status_subscription);

    manager.connect();

    assert!(eventually(Duration::from_secs(3), || !progress.lock().unwrap().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        progress.lock().unwrap().clone(),
        vec![ConnectionEvent::ProgressUpdate(ProgressPayload {
            message: "Processing chunk 1/4".to_string(),
            processed: Some(1),
            total: Some(4),
        })]
    );
    assert!(statuses.lock().unwrap().is_empty());

    manager.disconnect();
}

#[tokio::test]
async fn reconnect_sends_exactly_one_resume_per_connection() {
    init_logging();
    let (resume_tx, mut resume_rx) = mpsc::unbounded_channel();
    let server = start_server(move |index, mut socket| {
        let resume_tx = resume_tx.clone();
        async move {
            if index == 0 {
                if let Some(event) = socket.next_event().await {
                    let _ = resume_tx.send((index, event));
                }
                socket.close().await;
                return;
            }
            while let Some(event) = socket.next_event().await {
                let _ = resume_tx.send((index, event));
            }
        }
    })
    .await;
    let manager = ConnectionManager::new(settings(&server.url));
    let recorded = record_all(&manager);
    manager.set_resume_provider(|| Some(JobId::from("job-7")));

    manager.connect();

    let expected = json!({ "jobId": "job-7" });
    for connection in 0..2 {
        let (index, (event, data)) =
            tokio::time::timeout(Duration::from_secs(3), resume_rx.recv())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(index, connection);
        assert_eq!(event, "resume_process");
        assert_eq!(data, expected);
    }
    assert!(eventually(Duration::from_secs(3), || {
        count(&recorded, EventKind::Reconnect) == 1
    })
    .await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(resume_rx.try_recv().is_err());
    assert_eq!(count(&recorded, EventKind::Connect), 1);
    let kinds: Vec<EventKind> = recorded.lock().unwrap().iter().map(|event| event.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Connect, EventKind::ConnectError, EventKind::Reconnect]
    );
    assert!(recorded
        .lock()
        .unwrap()
        .contains(&ConnectionEvent::Reconnect { attempt: 1 }));

    manager.disconnect();
}

#[tokio::test]
async fn resume_already_sent_on_a_connection_is_not_repeated() {
    init_logging();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel();
    let server = start_server(move |_, mut socket| {
        let client_tx = client_tx.clone();
        async move {
            while let Some(event) = socket.next_event().await {
                let _ = client_tx.send(event);
            }
        }
    })
    .await;
    let manager = ConnectionManager::new(settings(&server.url));
    let recorded = record_all(&manager);
    manager.set_resume_provider(|| Some(JobId::from("job-7")));

    manager.connect();
    assert!(eventually(Duration::from_secs(3), || {
        count(&recorded, EventKind::Connect) == 1
    })
    .await);
    assert!(manager.send(ClientFrame::resume(&JobId::from("job-7"))));
    assert!(manager.send(ClientFrame::resume(&JobId::from("job-8"))));

    let mut jobs = Vec::new();
    for _ in 0..2 {
        let (event, data) = tokio::time::timeout(Duration::from_secs(3), client_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, "resume_process");
        jobs.push(data);
    }
    assert_eq!(jobs, vec![json!({ "jobId": "job-7" }), json!({ "jobId": "job-8" })]);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(client_rx.try_recv().is_err());

    manager.disconnect();
}

#[tokio::test]
async fn connect_errors_keep_retrying() {
    init_logging();
    let url = refused_url().await;
    let manager = ConnectionManager::new(ConnectionSettings {
        reconnect_delay: Duration::from_millis(20),
        ..settings(&url)
    });
    let recorded = record_all(&manager);

    manager.connect();

    assert!(eventually(Duration::from_secs(3), || {
        count(&recorded, EventKind::ConnectError) >= 3
    })
    .await);
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert_eq!(count(&recorded, EventKind::Connect), 0);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn no_handler_fires_after_disconnect() {
    init_logging();
    let server = start_server(|_, mut socket| async move {
        let mut processed = 0;
        loop {
            processed += 1;
            let sent = socket
                .send_event(
                    "progress_update",
                    json!({ "message": format!("Processing chunk {processed}/1000") }),
                )
                .await;
            if !sent {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    let manager = ConnectionManager::new(settings(&server.url));
    let recorded = record_all(&manager);

    manager.connect();
    assert!(eventually(Duration::from_secs(3), || {
        count(&recorded, EventKind::ProgressUpdate) >= 3
    })
    .await);

    manager.disconnect();
    let seen = recorded.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(recorded.lock().unwrap().len(), seen);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn send_is_refused_while_disconnected() {
    init_logging();
    let manager = ConnectionManager::new(ConnectionSettings::default());

    assert!(!manager.send(ClientFrame::resume(&JobId::from("job-1"))));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}
