use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use litscan_ingestion::models::{Article, DateRange};
use litscan_ingestion::sources::SourceFetcher;

/// Source fetcher serving a fixed article list.
#[derive(Clone, Default)]
pub struct StaticSource {
    articles: Vec<Article>,
    searches: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(articles: Vec<Article>) -> Self {
        Self { articles, searches: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    async fn search(&self, _terms: &[String], _range: &DateRange, max_results: usize) -> Vec<String> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.articles.iter().take(max_results).map(|a| a.pmid.clone()).collect()
    }

    async fn fetch_details(&self, ids: &[String]) -> Vec<Article> {
        ids.iter()
            .filter_map(|id| self.articles.iter().find(|a| &a.pmid == id).cloned())
            .collect()
    }
}
