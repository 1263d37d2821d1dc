//! Shared application state for the web server.

use std::path::PathBuf;
use std::sync::Arc;

use litscan_config::Config;
use litscan_tasks::Orchestrator;

/// Shared state injected into every Axum handler.
#[derive(Debug)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Where task artifacts are written and served from
    pub output_dir: PathBuf,
    pub static_dir: PathBuf,
    pub language: String,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &Config) -> Self {
        Self {
            orchestrator,
            output_dir: PathBuf::from(&config.output.dir),
            static_dir: PathBuf::from(&config.server.static_dir),
            language: config.output.language.clone(),
        }
    }
}

pub type SharedState = Arc<AppState>;
