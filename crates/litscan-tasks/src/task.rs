//! Task record, parameters and the views handed to callers.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use litscan_config::{SearchConfig, VenueBucket};
use litscan_ingestion::export::ReportArtifacts;
use litscan_ingestion::models::{Article, DateRange};
use litscan_ingestion::venue::VenueFilter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

pub type TaskId = Uuid;

/// Upper bound on `max_results`; esearch refuses larger pages.
pub const MAX_RESULTS_LIMIT: usize = 10_000;
/// Upper bound on concurrent summaries per task.
pub const MAX_WORKERS_LIMIT: usize = 64;

/// Fixed progress values reached at each stage boundary.
pub mod checkpoint {
    pub const EXPAND: u8 = 5;
    pub const SEARCH: u8 = 10;
    pub const FILTER: u8 = 30;
    pub const FANOUT_START: u8 = 50;
    pub const FANOUT_END: u8 = 80;
    pub const POLISH: u8 = 80;
    pub const REVIEW: u8 = 88;
    pub const PERSIST: u8 = 95;
    pub const DONE: u8 = 100;

    /// Progress after `completed` of `total` summaries.
    pub fn fanout(completed: usize, total: usize) -> u8 {
        if total == 0 {
            return FANOUT_END;
        }
        let span = (FANOUT_END - FANOUT_START) as usize;
        FANOUT_START + (span * completed.min(total) / total) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending   => "pending",
            TaskStatus::Running   => "running",
            TaskStatus::Paused    => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Error     => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Error)
    }

    /// Edges of the lifecycle graph. Terminal states have no way out.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Error)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
                | (Paused, Completed)
                | (Paused, Error)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task creation request. Unset fields take the configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParams {
    pub topic: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Per-task allow-list; replaces the default buckets for this task only.
    #[serde(default)]
    pub venues: Option<Vec<VenueBucket>>,
    /// `false` lets every article through with the "Unknown" bucket.
    #[serde(default = "default_filter_venues")]
    pub filter_venues: bool,
}

fn default_filter_venues() -> bool { true }

impl TaskParams {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            start_date: None,
            end_date: None,
            max_results: None,
            max_workers: None,
            venues: None,
            filter_venues: true,
        }
    }

    /// Applies defaults and validates. `today` closes an open-ended window.
    pub fn resolve(
        &self,
        defaults: &SearchConfig,
        default_venues: &[VenueBucket],
        today: NaiveDate,
    ) -> Result<ResolvedParams, TaskError> {
        let invalid = |msg: String| TaskError::InvalidParams(msg);

        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(invalid("topic must not be empty".to_string()));
        }

        let start_raw = self.start_date.as_deref().filter(|s| !s.trim().is_empty());
        let start = DateRange::parse_date(start_raw.unwrap_or(&defaults.default_start_date))
            .map_err(|e| invalid(e.to_string()))?;
        let end = match self.end_date.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => DateRange::parse_date(s).map_err(|e| invalid(e.to_string()))?,
            None => today,
        };
        let range = DateRange::new(start, end).map_err(|e| invalid(e.to_string()))?;

        let max_results = self.max_results.unwrap_or(defaults.max_results);
        if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
            return Err(invalid(format!("max_results must be between 1 and {}", MAX_RESULTS_LIMIT)));
        }
        let max_workers = self.max_workers.unwrap_or(defaults.max_workers);
        if max_workers == 0 || max_workers > MAX_WORKERS_LIMIT {
            return Err(invalid(format!("max_workers must be between 1 and {}", MAX_WORKERS_LIMIT)));
        }

        let (venue_mode, venues) = match (&self.venues, self.filter_venues) {
            (_, false) => (VenueMode::Off, Vec::new()),
            (Some(list), true) => {
                if list.iter().all(|b| b.journals.is_empty()) {
                    return Err(invalid("venue allow-list is empty".to_string()));
                }
                (VenueMode::Explicit, list.clone())
            }
            (None, true) => (VenueMode::Default, default_venues.to_vec()),
        };

        Ok(ResolvedParams {
            topic: topic.to_string(),
            range,
            max_results,
            max_workers,
            venue_mode,
            venues,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueMode {
    Default,
    Explicit,
    Off,
}

/// Parameters after defaults are applied; fixed for the task's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedParams {
    pub topic: String,
    pub range: DateRange,
    pub max_results: usize,
    pub max_workers: usize,
    pub venue_mode: VenueMode,
    /// Buckets snapshotted at creation so later config edits do not leak in.
    pub venues: Vec<VenueBucket>,
}

impl ResolvedParams {
    pub fn venue_filter(&self) -> VenueFilter {
        match self.venue_mode {
            VenueMode::Off => VenueFilter::Off,
            VenueMode::Default | VenueMode::Explicit => VenueFilter::Buckets(self.venues.clone()),
        }
    }
}

/// The mutable record behind one task identifier.
///
/// Every mutator is a no-op once the status is terminal, which is what makes
/// `completed`, `cancelled` and `error` sticky.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub params: ResolvedParams,
    pub articles: Vec<Article>,
    pub polished_topic: Option<String>,
    pub review: Option<String>,
    pub artifacts: Option<ReportArtifacts>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, params: ResolvedParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            message: "Waiting to start".to_string(),
            params,
            articles: Vec::new(),
            polished_topic: None,
            review: None,
            artifacts: None,
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Raises progress (never lowers it) and replaces the message unless paused.
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.progress = self.progress.max(progress.min(checkpoint::DONE));
        // Work that lands after a pause still counts, but the task keeps saying it is paused
        if self.status != TaskStatus::Paused {
            self.message = message.into();
        }
        self.touch();
        true
    }

    /// Moves along a lifecycle edge; illegal edges leave the record unchanged.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TaskStatus> {
        if !self.status.can_transition_to(next) {
            return Err(self.status);
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, message: impl Into<String>) -> bool {
        if self.transition(TaskStatus::Completed).is_err() {
            return false;
        }
        self.progress = checkpoint::DONE;
        self.message = message.into();
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.transition(TaskStatus::Error).is_err() {
            return false;
        }
        let error = error.into();
        self.message = format!("Error: {}", error);
        self.error = Some(error);
        true
    }

    pub fn cancel(&mut self, message: impl Into<String>) -> bool {
        if self.transition(TaskStatus::Cancelled).is_err() {
            return false;
        }
        self.message = message.into();
        true
    }

    /// Replaces the article list. Ignored once terminal.
    pub fn set_articles(&mut self, articles: Vec<Article>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.articles = articles;
        self.touch();
        true
    }

    pub fn set_output(&mut self, polished_topic: String, review: String, artifacts: ReportArtifacts) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.polished_topic = Some(polished_topic);
        self.review = Some(review);
        self.artifacts = Some(artifacts);
        self.touch();
        true
    }

    /// Stores the summary for the article at `index` once.
    pub fn set_summary(&mut self, index: usize, summary: &str) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self.articles.get_mut(index) {
            Some(a) if a.summary.is_none() => {
                a.summary = Some(summary.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn view(&self) -> TaskStatusView {
        TaskStatusView {
            task_id: self.id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            result_count: self.articles.len(),
            error: self.error.clone(),
            params: self.params.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        }
    }

    pub fn results(&self) -> TaskResults {
        TaskResults {
            task_id: self.id,
            results: self.articles.clone(),
            files: self.artifacts.clone(),
            review_content: self.review.clone().unwrap_or_default(),
            polished_topic: self.polished_topic.clone().unwrap_or_default(),
        }
    }
}

/// Point-in-time status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub result_count: usize,
    pub error: Option<String>,
    pub params: ResolvedParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Output of a completed task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResults {
    pub task_id: TaskId,
    pub results: Vec<Article>,
    pub files: Option<ReportArtifacts>,
    pub review_content: String,
    pub polished_topic: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use litscan_config::default_venues;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn resolved() -> ResolvedParams {
        TaskParams::new("topic")
            .resolve(&SearchConfig::default(), &default_venues(), today())
            .unwrap()
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let p = resolved();
        assert_eq!(p.range.start_label(), "2025/01/01");
        assert_eq!(p.range.end_label(), "2025/06/30");
        assert_eq!(p.max_results, 30);
        assert_eq!(p.max_workers, 5);
        assert_eq!(p.venue_mode, VenueMode::Default);
        assert_eq!(p.venues.len(), 3);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let cfg = SearchConfig::default();
        let venues = default_venues();
        let check = |p: TaskParams| p.resolve(&cfg, &venues, today()).is_err();

        assert!(check(TaskParams::new("   ")));
        assert!(check(TaskParams { max_workers: Some(0), ..TaskParams::new("t") }));
        assert!(check(TaskParams { max_results: Some(0), ..TaskParams::new("t") }));
        assert!(check(TaskParams { start_date: Some("yesterday".into()), ..TaskParams::new("t") }));
        assert!(check(TaskParams {
            start_date: Some("2025/05/01".into()),
            end_date: Some("2025/01/01".into()),
            ..TaskParams::new("t")
        }));
        assert!(check(TaskParams { venues: Some(vec![]), ..TaskParams::new("t") }));
    }

    #[test]
    fn test_filter_off_ignores_allow_list() {
        let p = TaskParams {
            venues: Some(vec![VenueBucket::new("X", &["X"])]),
            filter_venues: false,
            ..TaskParams::new("t")
        }
        .resolve(&SearchConfig::default(), &default_venues(), today())
        .unwrap();
        assert_eq!(p.venue_mode, VenueMode::Off);
        assert!(matches!(p.venue_filter(), VenueFilter::Off));
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let p: TaskParams = serde_json::from_str(r#"{"topic":"ESCC","max_workers":2}"#).unwrap();
        assert_eq!(p.max_workers, Some(2));
        assert!(p.filter_venues);
        assert!(p.venues.is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut t = Task::new(Uuid::new_v4(), resolved());
        t.transition(TaskStatus::Running).unwrap();
        t.advance(30, "filtering");
        t.advance(10, "late");
        assert_eq!(t.progress, 30);
        assert_eq!(t.message, "late");
    }

    #[test]
    fn test_paused_task_keeps_message_while_progress_rises() {
        let mut t = Task::new(Uuid::new_v4(), resolved());
        t.transition(TaskStatus::Running).unwrap();
        t.advance(50, "Summarising 6 articles");
        t.transition(TaskStatus::Paused).unwrap();
        t.message = "Paused".to_string();
        assert!(t.advance(55, "Summarised 1/6 articles"));
        assert_eq!(t.progress, 55);
        assert_eq!(t.message, "Paused");
        t.transition(TaskStatus::Running).unwrap();
        t.advance(60, "Summarised 2/6 articles");
        assert_eq!(t.message, "Summarised 2/6 articles");
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut t = Task::new(Uuid::new_v4(), resolved());
        t.transition(TaskStatus::Running).unwrap();
        assert!(t.cancel("Cancelled by user"));
        assert!(!t.complete("done"));
        assert!(!t.fail("boom"));
        assert!(!t.advance(90, "more"));
        assert_eq!(t.status, TaskStatus::Cancelled);
        assert_eq!(t.message, "Cancelled by user");
        assert!(t.finished_at.is_some());
    }

    #[test]
    fn test_lifecycle_edges() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn test_summary_written_once() {
        let mut t = Task::new(Uuid::new_v4(), resolved());
        t.articles = vec![Article::new("1", "a")];
        assert!(t.set_summary(0, "first"));
        assert!(!t.set_summary(0, "second"));
        assert!(!t.set_summary(5, "missing"));
        assert_eq!(t.articles[0].summary.as_deref(), Some("first"));
    }

    #[test]
    fn test_fanout_checkpoint_scale() {
        assert_eq!(checkpoint::fanout(0, 4), 50);
        assert_eq!(checkpoint::fanout(2, 4), 65);
        assert_eq!(checkpoint::fanout(4, 4), 80);
        assert_eq!(checkpoint::fanout(0, 0), 80);
    }
}
