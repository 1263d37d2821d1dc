use thiserror::Error;

use crate::task::{TaskId, TaskStatus};

/// Misuse of the task control surface. The task is left untouched.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("cannot {action} task in state {status}")]
    InvalidState { action: &'static str, status: TaskStatus },
    #[error("task has not completed (state {0})")]
    NotCompleted(TaskStatus),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("task {0} already registered")]
    Duplicate(TaskId),
}
