//! Shared testing utilities: a scripted LLM backend, an in-memory source
//! fetcher and article fixtures.

pub mod backend;
pub mod fixtures;
pub mod source;

pub use backend::{PromptKind, ScriptedBackend};
pub use fixtures::{article, article_set, date_range};
pub use pretty_assertions;
pub use source::StaticSource;
