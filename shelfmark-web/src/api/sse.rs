//! Live import status over Server-Sent Events
//!
//! The stream re-reads the job record on a fixed poll interval and
//! emits a named event only when observable state changes, then closes
//! once the job is terminal. A reconnecting client re-derives its
//! starting point from current persisted state, so nothing is replayed
//! and nothing is lost; at most, redundant transitional events are
//! skipped.

use crate::api::UserId;
use crate::db::{import_issues, import_jobs};
use crate::error::{ApiError, ApiResult};
use crate::models::{ImportJob, ImportStatus};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Named events to emit for one observed snapshot
///
/// Pure so the transition rules are testable without a stream: the
/// first snapshot announces where the job already is, later snapshots
/// emit progress only when `processed_rows` moved and a terminal event
/// exactly once.
fn events_for(prev: Option<&ImportJob>, current: &ImportJob) -> Vec<&'static str> {
    let terminal_event = match current.status {
        ImportStatus::Failed => "import.failed",
        _ => "import.completed",
    };

    match prev {
        None => match current.status {
            ImportStatus::Queued => vec!["import.started"],
            ImportStatus::Processing => vec!["import.progress"],
            _ => vec![terminal_event],
        },
        Some(prev) => {
            let mut events = Vec::new();
            if current.processed_rows != prev.processed_rows {
                events.push("import.progress");
            }
            if current.is_terminal() && !prev.is_terminal() {
                events.push(terminal_event);
            }
            events
        }
    }
}

/// GET /api/imports/{id}/events
pub async fn import_event_stream(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Scope check up front; the stream itself only needs the job id
    import_jobs::load_for_user(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import job not found: {}", id)))?;

    info!(job_id = %id, "New SSE client subscribed to import events");

    let db = state.db.clone();
    let poll_interval = state.config.import.sse_poll_interval();

    let stream = async_stream::stream! {
        let mut prev: Option<ImportJob> = None;
        let mut poll = tokio::time::interval(poll_interval);
        let mut heartbeat = tokio::time::interval(Duration::from_secs(15));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    debug!(job_id = %id, "SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                _ = poll.tick() => {
                    let job = match import_jobs::load(&db, id).await {
                        Ok(Some(job)) => job,
                        Ok(None) => {
                            warn!(job_id = %id, "SSE: Job disappeared, closing stream");
                            break;
                        }
                        Err(e) => {
                            warn!(job_id = %id, error = %e, "SSE: Failed to read job state");
                            continue;
                        }
                    };

                    let events = events_for(prev.as_ref(), &job);
                    if !events.is_empty() {
                        let issues = import_issues::list_for_job(&db, id)
                            .await
                            .unwrap_or_default();
                        let payload = serde_json::json!({
                            "job": &job,
                            "issues": &issues,
                        });

                        for name in &events {
                            debug!(job_id = %id, event = name, "SSE: Emitting import event");
                            match serde_json::to_string(&payload) {
                                Ok(data) => yield Ok(Event::default().event(*name).data(data)),
                                Err(e) => warn!(job_id = %id, error = %e, "SSE: Failed to serialize event"),
                            }
                        }
                    }

                    let terminal = job.is_terminal();
                    prev = Some(job);
                    if terminal {
                        info!(job_id = %id, "SSE: Job reached terminal state, closing stream");
                        break;
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}
