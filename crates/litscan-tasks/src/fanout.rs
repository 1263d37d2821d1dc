//! Bounded concurrent summarisation of a task's articles.

use std::panic::AssertUnwindSafe;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use litscan_ingestion::models::Article;
use litscan_llm::{EnrichmentClient, SUMMARY_FAILED};
use tracing::{debug, error};

use crate::control::TaskControl;

/// Passed to the progress callback after each unit finishes.
#[derive(Debug)]
pub struct FanoutProgress<'a> {
    pub completed: usize,
    pub total: usize,
    /// Input position of the unit that just finished.
    pub index: usize,
    /// Working copy with every summary gathered so far.
    pub articles: &'a [Article],
}

impl FanoutProgress<'_> {
    pub fn article(&self) -> &Article {
        &self.articles[self.index]
    }
}

/// Summarises every article with at most `limit` calls in flight.
///
/// Each unit waits out a pause and checks cancellation before its remote
/// call, and its retries stop once the task is cancelled. A cancelled unit
/// keeps `summary == None`, even if its in-flight call later returns; a panicking unit is logged
/// and stored as `SUMMARY_FAILED`. Both still count as completed, so
/// `on_progress` runs exactly once per article. The result keeps input order.
pub async fn summarize_all<F>(
    articles: &[Article],
    limit: usize,
    enrichment: &EnrichmentClient,
    control: &TaskControl,
    mut on_progress: F,
) -> Vec<Article>
where
    F: FnMut(FanoutProgress<'_>),
{
    let total = articles.len();
    let mut out = articles.to_vec();
    let enrichment = enrichment.clone().with_cancellation(control.token());

    let units = articles.iter().cloned().enumerate().map(|(index, article)| {
        let enrichment = enrichment.clone();
        let control = control.clone();
        async move {
            let work = async {
                control.checkpoint().await.ok()?;
                let summary = enrichment
                    .summarize_article(&article.title, article.abstract_text.as_deref(), &article.pmid)
                    .await;
                if control.is_cancelled() {
                    return None;
                }
                Some(summary)
            };
            let summary = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(summary) => summary,
                Err(_) => {
                    error!(pmid = %article.pmid, "Summary unit panicked");
                    Some(SUMMARY_FAILED.to_string())
                }
            };
            (index, summary)
        }
    });

    let mut finished = stream::iter(units).buffer_unordered(limit.max(1));
    let mut completed = 0;
    while let Some((index, summary)) = finished.next().await {
        completed += 1;
        match summary {
            Some(s) => out[index].summary = Some(s),
            None => debug!(pmid = %out[index].pmid, "Summary skipped after cancellation"),
        }
        on_progress(FanoutProgress { completed, total, index, articles: &out });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use async_trait::async_trait;
    use std::time::Duration;
    use litscan_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse, RetryPolicy};
    use litscan_test_utils::ScriptedBackend;

    struct Echo;

    #[async_trait]
    impl LlmBackend for Echo {
        async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
            let text = req.text();
            if text.contains("PMID: 2\n") {
                panic!("backend exploded");
            }
            Ok(LlmResponse {
                content: "ok".to_string(),
                model: "echo".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }
        fn model_id(&self) -> &str { "echo" }
        fn is_local(&self) -> bool { true }
    }

    fn articles(n: usize) -> Vec<Article> {
        (1..=n)
            .map(|i| {
                let mut a = Article::new(i.to_string(), format!("t{}", i));
                a.abstract_text = Some("abstract".to_string());
                a
            })
            .collect()
    }

    #[tokio::test]
    async fn test_panicking_unit_is_isolated() {
        let client = EnrichmentClient::new(Arc::new(Echo), RetryPolicy::immediate(1));
        let control = TaskControl::new();
        let mut calls = 0;
        let out = summarize_all(&articles(3), 2, &client, &control, |p| {
            calls += 1;
            assert_eq!(p.completed, calls);
            assert_eq!(p.total, 3);
        })
        .await;
        assert_eq!(calls, 3);
        assert_eq!(out[0].summary.as_deref(), Some("ok"));
        assert_eq!(out[1].summary.as_deref(), Some(SUMMARY_FAILED));
        assert_eq!(out[2].summary.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_cancelled_units_still_report() {
        let client = EnrichmentClient::new(Arc::new(Echo), RetryPolicy::immediate(1));
        let control = TaskControl::new();
        control.cancel();
        let mut calls = 0;
        let out = summarize_all(&articles(4), 2, &client, &control, |_| calls += 1).await;
        assert_eq!(calls, 4);
        assert!(out.iter().all(|a| a.summary.is_none()));
    }

    #[tokio::test]
    async fn test_cancel_stops_retries_in_flight() {
        let backend = ScriptedBackend::failing().with_delay(Duration::from_millis(20));
        let retry = RetryPolicy::immediate(4).with_base_delay(Duration::from_millis(100));
        let client = EnrichmentClient::new(backend.clone().into_arc(), retry);
        let control = TaskControl::new();

        let trigger = {
            let control = control.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                control.cancel();
            })
        };
        let out = summarize_all(&articles(2), 2, &client, &control, |_| {}).await;
        trigger.await.unwrap();

        // One attempt per unit went out before the cancel
        assert_eq!(backend.calls(), 2);
        assert!(out.iter().all(|a| a.summary.is_none()));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let client = EnrichmentClient::new(Arc::new(Echo), RetryPolicy::immediate(1));
        let out = summarize_all(&[], 3, &client, &TaskControl::new(), |_| panic!("no units")).await;
        assert!(out.is_empty());
    }
}
