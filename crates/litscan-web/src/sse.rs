//! Server-Sent Events (SSE) streaming of one task's progress.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::Stream;
use litscan_tasks::{TaskEvent, TaskId, TaskStatusView};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::error::ApiError;
use crate::state::SharedState;

/// The current state as an event, so late subscribers start from a snapshot.
fn snapshot_event(view: &TaskStatusView) -> TaskEvent {
    if view.status.is_terminal() {
        TaskEvent::Finished { task_id: view.task_id, status: view.status, message: view.message.clone() }
    } else {
        TaskEvent::Progress {
            task_id: view.task_id,
            status: view.status,
            progress: view.progress,
            message: view.message.clone(),
        }
    }
}

/// Relays `id`'s events from the shared channel until its final event.
/// After a lag the dropped events may have included that final event, so the
/// current state is re-read and sent in their place.
async fn forward<F>(
    mut rx: broadcast::Receiver<TaskEvent>,
    tx: mpsc::Sender<TaskEvent>,
    id: TaskId,
    first: TaskEvent,
    snapshot: F,
) where
    F: Fn() -> Option<TaskEvent>,
{
    let done = first.is_final();
    if tx.send(first).await.is_err() || done {
        return;
    }
    loop {
        let event = match rx.recv().await {
            Ok(event) if event.task_id() == id => event,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(task_id = %id, skipped, "SSE subscriber lagged, resending current state");
                // A deleted task has nothing left to report
                let Some(event) = snapshot() else { break };
                event
            }
            Err(RecvError::Closed) => break,
        };
        let last = event.is_final();
        if tx.send(event).await.is_err() || last {
            break;
        }
    }
}

/// GET /api/task/{id}/events - snapshot first, then live updates until the
/// task finishes.
pub async fn task_events(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe before reading the snapshot so no update falls in between
    let mut rx = state.orchestrator.subscribe();
    let first = snapshot_event(&state.orchestrator.status(&id)?);

    let (tx, out) = mpsc::channel(64);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(forward(rx, tx, id, first, move || {
        orchestrator.status(&id).ok().map(|view| snapshot_event(&view))
    }));

    let stream = ReceiverStream::new(out).filter_map(|event| {
        serde_json::to_string(&event)
            .ok()
            .map(|data| Ok(Event::default().data(data)))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
