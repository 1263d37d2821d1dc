//! Literature source clients.

pub mod pubmed;

use async_trait::async_trait;
use crate::models::{Article, DateRange};

/// Two-step retrieval: identifiers first, then full records.
///
/// Implementations swallow their own failures. A failed search yields no
/// identifiers and a failed detail batch is skipped, so callers only ever
/// see shorter lists.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn search(&self, terms: &[String], range: &DateRange, max_results: usize) -> Vec<String>;

    async fn fetch_details(&self, ids: &[String]) -> Vec<Article>;
}
