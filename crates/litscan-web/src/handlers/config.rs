//! Venue table and search defaults.

use axum::{extract::State, Json};
use litscan_config::VenueBucket;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct SearchDefaults {
    pub start_date: String,
    pub max_results: usize,
    pub max_workers: usize,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub journals: Vec<VenueBucket>,
    pub defaults: SearchDefaults,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct JournalsUpdate {
    pub journals: Vec<VenueBucket>,
}

/// GET /api/config
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let search = state.orchestrator.search_defaults();
    Json(ConfigResponse {
        journals: state.orchestrator.default_venues(),
        defaults: SearchDefaults {
            start_date: search.default_start_date.clone(),
            max_results: search.max_results,
            max_workers: search.max_workers,
        },
        language: state.language.clone(),
    })
}

/// POST /api/journals - replace the default venue buckets
pub async fn update_journals(
    State(state): State<SharedState>,
    Json(update): Json<JournalsUpdate>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.set_default_venues(update.journals)?;
    Ok(Json(json!({ "status": "success" })))
}
