//! litscan-tasks — long-running literature-scan tasks.
//!
//! A task runs search, venue filter, concurrent summaries, topic polish,
//! review and export in sequence. It can be paused and cancelled at stage
//! boundaries and reports monotonic progress while it runs.

pub mod control;
pub mod error;
pub mod events;
pub mod fanout;
pub mod orchestrator;
pub mod registry;
pub mod task;

pub use error::TaskError;
pub use events::TaskEvent;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use registry::TaskRegistry;
pub use task::{TaskId, TaskParams, TaskResults, TaskStatus, TaskStatusView};
