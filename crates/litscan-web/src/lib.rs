//! litscan-web — HTTP front end for literature-scan tasks.
//! Provides:
//!   - task creation, status, results and control endpoints
//!   - per-task progress streaming over SSE
//!   - venue table inspection and replacement
//!   - artifact downloads and the static browser client
//!   - one-shot batch runs for the command line

pub mod batch;
pub mod error;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;
