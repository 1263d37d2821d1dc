use serde::{Deserialize, Serialize};

use crate::task::{TaskId, TaskStatus};

/// Task updates pushed to subscribers (the SSE endpoint among them).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Status, progress or message changed
    Progress { task_id: TaskId, status: TaskStatus, progress: u8, message: String },
    /// One fan-out unit finished
    ArticleSummarized { task_id: TaskId, pmid: String, completed: usize, total: usize },
    /// The task reached a terminal state
    Finished { task_id: TaskId, status: TaskStatus, message: String },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Progress { task_id, .. }
            | TaskEvent::ArticleSummarized { task_id, .. }
            | TaskEvent::Finished { task_id, .. } => *task_id,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TaskEvent::Finished { .. })
    }
}
