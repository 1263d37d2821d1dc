//! Task creation, inspection and control.

use axum::{
    extract::{Path, State},
    Json,
};
use litscan_tasks::{TaskId, TaskParams, TaskResults, TaskStatus, TaskStatusView};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// POST /api/search - start a task; returns before any work is done
pub async fn start_search(
    State(state): State<SharedState>,
    Json(params): Json<TaskParams>,
) -> Result<Json<TaskCreated>, ApiError> {
    let task_id = state.orchestrator.create_task(params)?;
    info!(task_id = %task_id, "Search task accepted");
    Ok(Json(TaskCreated { task_id, status: TaskStatus::Pending }))
}

/// GET /api/tasks
pub async fn list_tasks(State(state): State<SharedState>) -> Json<Vec<TaskStatusView>> {
    Json(state.orchestrator.list())
}

/// GET /api/task/{id}
pub async fn task_status(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskStatusView>, ApiError> {
    Ok(Json(state.orchestrator.status(&id)?))
}

/// GET /api/task/{id}/results
pub async fn task_results(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskResults>, ApiError> {
    Ok(Json(state.orchestrator.results(&id)?))
}

pub async fn pause_task(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskStatusView>, ApiError> {
    Ok(Json(state.orchestrator.pause(&id)?))
}

pub async fn resume_task(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskStatusView>, ApiError> {
    Ok(Json(state.orchestrator.resume(&id)?))
}

pub async fn cancel_task(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskStatusView>, ApiError> {
    Ok(Json(state.orchestrator.cancel(&id)?))
}

/// DELETE /api/task/{id} - only finished tasks can be removed
pub async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.delete(&id)?;
    Ok(Json(json!({ "status": "deleted", "task_id": id })))
}
