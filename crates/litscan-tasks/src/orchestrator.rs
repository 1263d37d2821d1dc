//! Task lifecycle: creation, the staged pipeline run, and the control surface.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use chrono::Utc;
use futures::FutureExt;
use litscan_config::{Config, SearchConfig, VenueBucket};
use litscan_ingestion::export::{persist_artifacts, render_overview};
use litscan_ingestion::sources::SourceFetcher;
use litscan_llm::EnrichmentClient;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::control::{Cancelled, TaskControl};
use crate::error::TaskError;
use crate::events::TaskEvent;
use crate::fanout::summarize_all;
use crate::registry::{TaskHandle, TaskRegistry};
use crate::task::{checkpoint, Task, TaskId, TaskParams, TaskResults, TaskStatus, TaskStatusView};

pub const CANCELLED_MESSAGE: &str = "Cancelled by user";
pub const NO_SEARCH_RESULTS: &str = "No matching articles found";
pub const NO_VENUE_MATCHES: &str = "No articles matched the selected venues";

const EVENT_CAPACITY: usize = 256;

/// The parts of [`Config`] the orchestrator needs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub output_dir: PathBuf,
    pub search: SearchConfig,
    pub venues: Vec<VenueBucket>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output.dir),
            search: config.search.clone(),
            venues: config.venues.clone(),
        }
    }
}

/// Why a pipeline run stopped before completing.
enum Halt {
    Cancelled,
    Failed(anyhow::Error),
}

impl From<Cancelled> for Halt {
    fn from(_: Cancelled) -> Self {
        Halt::Cancelled
    }
}

impl From<anyhow::Error> for Halt {
    fn from(e: anyhow::Error) -> Self {
        Halt::Failed(e)
    }
}

pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    source: Arc<dyn SourceFetcher>,
    enrichment: EnrichmentClient,
    output_dir: PathBuf,
    search: SearchConfig,
    /// Default buckets; replaced at runtime through the journals endpoint.
    venues: RwLock<Vec<VenueBucket>>,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("model", &self.enrichment.model_id())
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn SourceFetcher>,
        enrichment: EnrichmentClient,
        settings: OrchestratorSettings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry: Arc::new(TaskRegistry::new()),
            source,
            enrichment,
            output_dir: settings.output_dir,
            search: settings.search,
            venues: RwLock::new(settings.venues),
            event_tx,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn search_defaults(&self) -> &SearchConfig {
        &self.search
    }

    pub fn default_venues(&self) -> Vec<VenueBucket> {
        self.venues.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the default buckets. Running tasks keep the list they started with.
    pub fn set_default_venues(&self, venues: Vec<VenueBucket>) -> Result<(), TaskError> {
        if venues.iter().all(|b| b.journals.is_empty()) {
            return Err(TaskError::InvalidParams("venue table must list at least one journal".to_string()));
        }
        let publishers = venues.len();
        *self.venues.write().unwrap_or_else(PoisonError::into_inner) = venues;
        info!(publishers, "Default venue table replaced");
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: TaskEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn emit_progress(&self, task: &Task) {
        self.emit(TaskEvent::Progress {
            task_id: task.id,
            status: task.status,
            progress: task.progress,
            message: task.message.clone(),
        });
    }

    fn emit_finished(&self, task: &Task) {
        self.emit(TaskEvent::Finished {
            task_id: task.id,
            status: task.status,
            message: task.message.clone(),
        });
    }

    // ── Control surface ──────────────────────────────────────────────────────

    /// Registers a pending task and starts it in the background.
    pub fn create_task(self: &Arc<Self>, params: TaskParams) -> Result<TaskId, TaskError> {
        let resolved = params.resolve(&self.search, &self.default_venues(), Utc::now().date_naive())?;
        let id = Uuid::new_v4();
        let handle = self.registry.insert(Task::new(id, resolved))?;
        info!(task_id = %id, topic = %params.topic.trim(), "Task created");

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_task(handle).await });
        Ok(id)
    }

    pub fn status(&self, id: &TaskId) -> Result<TaskStatusView, TaskError> {
        Ok(self.registry.get(id)?.view())
    }

    pub fn list(&self) -> Vec<TaskStatusView> {
        self.registry.list()
    }

    pub fn pause(&self, id: &TaskId) -> Result<TaskStatusView, TaskError> {
        let handle = self.registry.get(id)?;
        let task = handle.update(|t| -> Result<Task, TaskError> {
            t.transition(TaskStatus::Paused)
                .map_err(|status| TaskError::InvalidState { action: "pause", status })?;
            handle.control().pause();
            t.message = "Paused".to_string();
            Ok(t.clone())
        })?;
        info!(task_id = %id, "Task paused");
        self.emit_progress(&task);
        Ok(task.view())
    }

    pub fn resume(&self, id: &TaskId) -> Result<TaskStatusView, TaskError> {
        let handle = self.registry.get(id)?;
        let task = handle.update(|t| -> Result<Task, TaskError> {
            t.transition(TaskStatus::Running)
                .map_err(|status| TaskError::InvalidState { action: "resume", status })?;
            handle.control().resume();
            t.message = "Resumed".to_string();
            Ok(t.clone())
        })?;
        info!(task_id = %id, "Task resumed");
        self.emit_progress(&task);
        Ok(task.view())
    }

    /// Cancels immediately. Units already talking to the backend finish, but
    /// their output is dropped because the record is frozen.
    pub fn cancel(&self, id: &TaskId) -> Result<TaskStatusView, TaskError> {
        let handle = self.registry.get(id)?;
        let task = handle.update(|t| {
            if !t.cancel(CANCELLED_MESSAGE) {
                return Err(TaskError::InvalidState { action: "cancel", status: t.status });
            }
            handle.control().cancel();
            Ok(t.clone())
        })?;
        info!(task_id = %id, "Task cancelled");
        self.emit_finished(&task);
        Ok(task.view())
    }

    pub fn results(&self, id: &TaskId) -> Result<TaskResults, TaskError> {
        let handle = self.registry.get(id)?;
        handle.inspect(|t| match t.status {
            TaskStatus::Completed => Ok(t.results()),
            other => Err(TaskError::NotCompleted(other)),
        })
    }

    pub fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        let task = self.registry.remove(id)?;
        debug!(task_id = %id, status = %task.status, "Task deleted");
        Ok(())
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(task_id = %handle.id()))]
    async fn run_task(self: Arc<Self>, handle: Arc<TaskHandle>) {
        let started = handle.update(|t| t.transition(TaskStatus::Running).is_ok());
        if !started {
            debug!("Task left pending state before it started");
            return;
        }
        handle.inspect(|t| self.emit_progress(t));

        let control = handle.control().clone();
        let outcome = AssertUnwindSafe(self.pipeline(&handle, &control))
            .catch_unwind()
            .await;

        let finished = match outcome {
            Ok(Ok(completed)) => completed,
            Ok(Err(Halt::Cancelled)) => handle.update(|t| t.cancel(CANCELLED_MESSAGE)),
            Ok(Err(Halt::Failed(e))) => {
                error!(error = %format!("{:#}", e), "Task failed");
                handle.update(|t| t.fail(format!("{:#}", e)))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(reason = %reason, "Task panicked");
                handle.update(|t| t.fail(format!("internal failure: {}", reason)))
            }
        };

        let task = handle.snapshot();
        if finished && task.is_terminal() {
            self.emit_finished(&task);
        }
        info!(status = %task.status, articles = task.articles.len(), "Task finished");
    }

    /// Waits at the gate, then raises progress. Errs once cancelled.
    async fn stage(
        &self,
        handle: &TaskHandle,
        control: &TaskControl,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<(), Halt> {
        control.checkpoint().await?;
        self.advance(handle, progress, message);
        Ok(())
    }

    fn advance(&self, handle: &TaskHandle, progress: u8, message: impl Into<String>) {
        let message = message.into();
        if let Some(task) = handle.update(|t| t.advance(progress, message).then(|| t.clone())) {
            self.emit_progress(&task);
        }
    }

    /// Completes the run early with an empty result set.
    async fn finish_empty(&self, handle: &TaskHandle, control: &TaskControl, message: &str) -> Result<bool, Halt> {
        control.checkpoint().await?;
        info!(reason = message, "Task completed without results");
        Ok(handle.update(|t| t.complete(message)))
    }

    /// Runs every stage. `Ok(true)` means this run moved the task to `completed`.
    async fn pipeline(&self, handle: &TaskHandle, control: &TaskControl) -> Result<bool, Halt> {
        let task_id = handle.id();
        let params = handle.inspect(|t| t.params.clone());
        let enrichment = self.enrichment.clone().with_cancellation(control.token());

        // ── 1. Expand the topic into search terms ────────────────────────────
        self.stage(handle, control, checkpoint::EXPAND, "Generating search terms").await?;
        let terms = enrichment.expand_query(&params.topic).await;
        debug!(terms = ?terms, "Search terms ready");

        // ── 2. Search and fetch records ──────────────────────────────────────
        self.stage(handle, control, checkpoint::SEARCH, format!("Searching PubMed with {} terms", terms.len())).await?;
        let ids = self.source.search(&terms, &params.range, params.max_results).await;
        if ids.is_empty() {
            return self.finish_empty(handle, control, NO_SEARCH_RESULTS).await;
        }
        let fetched = self.source.fetch_details(&ids).await;
        if fetched.is_empty() {
            warn!(ids = ids.len(), "Search returned identifiers but no records could be fetched");
            return self.finish_empty(handle, control, NO_SEARCH_RESULTS).await;
        }

        // ── 3. Venue filter ──────────────────────────────────────────────────
        self.stage(handle, control, checkpoint::FILTER, format!("Filtering {} articles by venue", fetched.len())).await?;
        let fetched_count = fetched.len();
        let articles = params.venue_filter().apply(fetched);
        info!(fetched = fetched_count, kept = articles.len(), mode = ?params.venue_mode, "Venue filter applied");
        if articles.is_empty() {
            return self.finish_empty(handle, control, NO_VENUE_MATCHES).await;
        }
        handle.update(|t| t.set_articles(articles.clone()));

        // ── 4. Concurrent summaries ──────────────────────────────────────────
        let total = articles.len();
        self.stage(handle, control, checkpoint::FANOUT_START, format!("Summarising {} articles", total)).await?;
        let summarized = summarize_all(&articles, params.max_workers, &enrichment, control, |p| {
            let article = p.article();
            let Some(summary) = article.summary.as_deref() else {
                return;
            };
            let updated = handle.update(|t| {
                t.set_summary(p.index, summary);
                let message = format!("Summarised {}/{} articles", p.completed, p.total);
                t.advance(checkpoint::fanout(p.completed, p.total), message).then(|| t.clone())
            });
            if let Some(task) = updated {
                self.emit(TaskEvent::ArticleSummarized {
                    task_id,
                    pmid: article.pmid.clone(),
                    completed: p.completed,
                    total: p.total,
                });
                self.emit_progress(&task);
            }
        })
        .await;

        // ── 5. Polish the topic ──────────────────────────────────────────────
        self.stage(handle, control, checkpoint::POLISH, "Polishing topic").await?;
        let polished = enrichment.polish_topic(&params.topic).await;

        // ── 6. Review ────────────────────────────────────────────────────────
        self.stage(handle, control, checkpoint::REVIEW, "Writing literature review").await?;
        let review = enrichment.generate_review(&summarized, &polished, &params.range).await;

        // ── 7. Persist artifacts ─────────────────────────────────────────────
        self.stage(handle, control, checkpoint::PERSIST, "Saving results").await?;
        let overview = render_overview(&summarized, &polished, &params.range);
        let artifacts = persist_artifacts(
            self.output_dir.clone(),
            task_id.to_string(),
            summarized,
            overview,
            review.clone(),
        )
        .await
        .context("failed to write result files")?;

        control.checkpoint().await?;
        Ok(handle.update(|t| {
            t.set_output(polished, review, artifacts)
                && t.complete(format!("Completed: {} articles summarised", total))
        }))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
