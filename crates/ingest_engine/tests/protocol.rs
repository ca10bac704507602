use ingest_core::{ChunkProgress, JobId};
use ingest_engine::{
    decode_server_frame, encode_client_frame, ClientFrame, ConnectionEvent, EventKind,
    JobCreatedResponse, NoticePayload, ServerFrame,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[test]
fn structured_progress_carries_chunk_counts() {
    let frame = decode_server_frame(
        r#"{"event":"progress_update","data":{"message":"Processing chunk 2/4","processed":2,"total":4}}"#,
    )
    .unwrap();

    let ServerFrame::ProgressUpdate(payload) = frame else {
        panic!("expected progress_update, got {frame:?}");
    };
    assert_eq!(payload.chunks(), ChunkProgress::new(2, 4));
}

#[test]
fn text_only_progress_has_no_structured_counts() {
    let frame =
        decode_server_frame(r#"{"event":"progress_update","data":{"message":"Extracting text"}}"#)
            .unwrap();

    let ServerFrame::ProgressUpdate(payload) = frame else {
        panic!("expected progress_update, got {frame:?}");
    };
    assert_eq!(payload.message, "Extracting text");
    assert_eq!(payload.chunks(), None);
}

#[test]
fn inconsistent_counts_are_dropped() {
    let frame = decode_server_frame(
        r#"{"event":"progress_update","data":{"message":"","processed":5,"total":4}}"#,
    )
    .unwrap();

    let ServerFrame::ProgressUpdate(payload) = frame else {
        panic!("expected progress_update, got {frame:?}");
    };
    assert_eq!(payload.chunks(), None);
}

#[test]
fn completion_and_error_messages_are_optional() {
    let completed = decode_server_frame(r#"{"event":"completed","data":{}}"#).unwrap();
    assert_eq!(completed, ServerFrame::Completed(NoticePayload::default()));

    let error =
        decode_server_frame(r#"{"event":"error","data":{"message":"OCR failed"}}"#).unwrap();
    let event = ConnectionEvent::from(error);
    assert_eq!(event.kind(), EventKind::Error);
    assert_eq!(
        event,
        ConnectionEvent::Error(NoticePayload {
            message: Some("OCR failed".to_string())
        })
    );
}

#[test]
fn unknown_events_fail_to_decode() {
    assert!(decode_server_frame(r#"{"event":"start_process","data":{}}"#).is_err());
    assert!(decode_server_frame("not json").is_err());
}

#[test]
fn resume_uses_the_canonical_event_name() {
    let frame = ClientFrame::resume(&JobId::from("job-42"));
    let encoded: Value = serde_json::from_str(&encode_client_frame(&frame).unwrap()).unwrap();

    assert_eq!(frame.event_name(), "resume_process");
    assert_eq!(
        encoded,
        json!({ "event": "resume_process", "data": { "jobId": "job-42" } })
    );
}

#[test]
fn job_created_response_accepts_known_aliases() {
    for body in [
        r#"{"job_id":"a"}"#,
        r#"{"jobId":"a"}"#,
        r#"{"book_id":"a","message":"ok"}"#,
    ] {
        let response: JobCreatedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.job_id, "a");
    }
}

#[test]
fn event_kinds_use_wire_names() {
    let names: Vec<_> = EventKind::ALL.iter().map(|kind| kind.to_string()).collect();
    assert_eq!(
        names,
        [
            "connect",
            "reconnect",
            "connect_error",
            "progress_update",
            "upload_status",
            "completed",
            "error",
        ]
    );
}
