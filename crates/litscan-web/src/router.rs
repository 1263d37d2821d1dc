//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::handlers::{
    config::{get_config, update_journals},
    tasks::{
        cancel_task, delete_task, list_tasks, pause_task, resume_task, start_search, task_results,
        task_status,
    },
};
use crate::sse::task_events;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let index = ServeFile::new(state.static_dir.join("index.html"));
    let assets = ServeDir::new(&state.static_dir);
    // ServeDir rejects `..` segments, so downloads stay inside the output dir
    let files = ServeDir::new(&state.output_dir);
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Configuration
        .route("/api/config",   get(get_config))
        .route("/api/journals", post(update_journals))

        // Tasks
        .route("/api/search",            post(start_search))
        .route("/api/tasks",             get(list_tasks))
        .route("/api/task/{id}",         get(task_status).delete(delete_task))
        .route("/api/task/{id}/results", get(task_results))
        .route("/api/task/{id}/pause",   post(pause_task))
        .route("/api/task/{id}/resume",  post(resume_task))
        .route("/api/task/{id}/cancel",  post(cancel_task))

        // SSE streaming
        .route("/api/task/{id}/events", get(task_events))

        // Artifacts and the browser client
        .nest_service("/api/files", files)
        .nest_service("/static", assets)
        .route_service("/", index)

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
