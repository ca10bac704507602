use ingest_core::{update, AppState, JobId, Msg};

#[test]
fn idle_disconnected_state_ignores_job_events() {
    let state = AppState::new();
    for msg in [
        Msg::ResetClicked,
        Msg::Completed { message: None },
        Msg::CleanupElapsed {
            job_id: JobId::from("job-1"),
        },
        Msg::UploadStatus {
            message: "queued".to_string(),
        },
    ] {
        let (next, effects) = update(state.clone(), msg.clone());

        assert_eq!(state, next, "{msg:?} changed the state");
        assert!(effects.is_empty(), "{msg:?} produced {effects:?}");
    }
}
