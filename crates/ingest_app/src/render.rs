//! Plain-text rendering of tracker output.

use ingest_core::{JobStatus, Notice, NoticeLevel, PersistedSnapshot, ProgressView};

pub fn progress_line(view: &ProgressView) -> String {
    let mut line = format!("[{}]", status_label(view.status));
    if view.status.is_observing() || view.status == JobStatus::Completed {
        line.push_str(&format!(" {}", view.bar_label()));
    }
    if view.total > 1 {
        line.push_str(&format!("  {}", view.chunk_label()));
    }
    if !view.progress_text.is_empty() {
        line.push_str(&format!("  {}", view.progress_text));
    }
    if view.retrying {
        line.push_str("  (reconnecting)");
    }
    line
}

pub fn notice_line(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
    };
    format!("{tag}: {}", notice.text)
}

pub fn snapshot_lines(snapshot: &PersistedSnapshot) -> Vec<String> {
    let Some(job_id) = snapshot.job_id.as_ref() else {
        let mut lines = vec!["No job recorded.".to_string()];
        if !snapshot.progress.is_empty() {
            lines.push(format!("Last message: {}", snapshot.progress));
        }
        return lines;
    };

    let mut lines = vec![
        format!("Job:      {job_id}"),
        format!(
            "Chunks:   {}/{}",
            snapshot.chunks.processed, snapshot.chunks.total
        ),
        format!(
            "Watching: {}",
            if snapshot.uploading_started { "yes" } else { "no" }
        ),
    ];
    if let Some(percent) = snapshot.chunks.percent() {
        lines.push(format!("Progress: {percent}%"));
    }
    if !snapshot.progress.is_empty() {
        lines.push(format!("Message:  {}", snapshot.progress));
    }
    lines
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Idle => "idle",
        JobStatus::Submitting => "uploading",
        JobStatus::Awaiting => "waiting",
        JobStatus::InProgress => "processing",
        JobStatus::Completed => "done",
        JobStatus::Failed => "failed",
    }
}
