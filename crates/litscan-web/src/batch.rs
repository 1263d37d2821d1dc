//! One-shot runs without the HTTP server.

use std::future::Future;
use std::sync::Arc;

use anyhow::bail;
use litscan_tasks::{Orchestrator, TaskEvent, TaskParams, TaskResults, TaskStatus};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Creates a task and waits for it to finish, logging progress on the way.
///
/// Resolving `stop` cancels the task. Anything other than `completed` is
/// reported as an error carrying the task's final message.
pub async fn run_once<S>(orchestrator: &Arc<Orchestrator>, params: TaskParams, stop: S) -> anyhow::Result<TaskResults>
where
    S: Future<Output = ()>,
{
    let mut events = orchestrator.subscribe();
    let id = orchestrator.create_task(params)?;
    info!(task_id = %id, "Batch run started");

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => {
                warn!(task_id = %id, "Stop requested, cancelling task");
                // Already terminal is fine; the status below says how it ended
                orchestrator.cancel(&id).ok();
                break;
            }
            received = events.recv() => match received {
                Ok(TaskEvent::Progress { task_id, progress, message, .. }) if task_id == id => {
                    info!(progress, "{}", message);
                }
                Ok(event) if event.task_id() == id && event.is_final() => break,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if orchestrator.status(&id)?.status.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Closed) => bail!("Task event channel closed"),
            }
        }
    }

    let view = orchestrator.status(&id)?;
    match view.status {
        TaskStatus::Completed => Ok(orchestrator.results(&id)?),
        other => bail!("Task {} ended {}: {}", id, other, view.message),
    }
}
