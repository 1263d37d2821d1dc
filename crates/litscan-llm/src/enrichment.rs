//! Enrichment client: the four generation calls the pipeline makes.
//!
//! Every call degrades instead of failing. Exhausted retries produce a
//! fallback value specific to the call, so callers never see an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use litscan_config::Config;
use litscan_ingestion::models::{Article, DateRange};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backend::{LlmBackend, LlmError, LlmRequest};
use crate::prompts;
use crate::retry::RetryPolicy;

/// Summary stored when every attempt failed.
pub const SUMMARY_FAILED: &str = "Summarization failed";
/// Summary stored for articles without an abstract; no remote call is made.
pub const NO_ABSTRACT: &str = "No abstract available";
/// Returned by `generate_review` for an empty article set.
pub const NO_ARTICLES_REVIEW: &str = "No articles were available to generate a literature review.";

const MAX_EXPANDED_TERMS: usize = 10;
const POLISH_TIMEOUT: Duration = Duration::from_secs(60);
const POLISH_MAX_TOKENS: u32 = 500;
const REVIEW_TIMEOUT: Duration = Duration::from_secs(120);
const REVIEW_MAX_TOKENS: u32 = 2000;
const REVIEW_MAX_DELAY: Duration = Duration::from_secs(30);

/// True for the sentinel summaries that mark a degraded result.
pub fn is_degraded_summary(summary: &str) -> bool {
    summary == SUMMARY_FAILED || summary == NO_ABSTRACT
}

#[derive(Clone)]
pub struct EnrichmentClient {
    backend: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
    language: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl EnrichmentClient {
    pub fn new(backend: Arc<dyn LlmBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            language: "English".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            request_timeout: Duration::from_secs(30),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &Config) -> Self {
        Self {
            backend,
            retry: RetryPolicy::from_config(&config.retry),
            language: config.output.language.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            request_timeout: Duration::from_secs(config.llm.request_timeout_secs),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Stops retrying once `cancel` fires. A cancelled call returns its
    /// usual fallback value.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    /// One completion with a hard deadline. Blank output is treated as a failure.
    async fn call(&self, prompt: &str, timeout: Duration, max_tokens: u32) -> Result<String, LlmError> {
        let req = LlmRequest::prompt(prompt)
            .with_max_tokens(max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(timeout);

        let resp = tokio::time::timeout(timeout, self.backend.complete(req))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;

        let content = resp.content.trim();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        debug!(
            model = %resp.model,
            prompt_tokens = resp.prompt_tokens,
            completion_tokens = resp.completion_tokens,
            "LLM call completed"
        );
        Ok(content.to_string())
    }

    /// Turns a free-text topic into at most ten database search terms.
    /// Falls back to the topic itself.
    #[instrument(skip(self))]
    pub async fn expand_query(&self, topic: &str) -> Vec<String> {
        let prompt = prompts::expand_query(topic);
        let terms = self
            .retry
            .run_until("expand_query", &self.cancel, || self.call(&prompt, self.request_timeout, self.max_tokens))
            .await
            .map(|text| parse_terms(&text))
            .unwrap_or_default();

        if terms.is_empty() {
            warn!("Query expansion produced no terms, searching with the raw topic");
            return vec![topic.to_string()];
        }
        info!(count = terms.len(), "Expanded search terms");
        terms
    }

    #[instrument(skip(self, title, abstract_text))]
    pub async fn summarize_article(&self, title: &str, abstract_text: Option<&str>, pmid: &str) -> String {
        let abstract_text = match abstract_text.map(str::trim) {
            Some(a) if !a.is_empty() => a,
            _ => return NO_ABSTRACT.to_string(),
        };
        let prompt = prompts::summarize_article(title, abstract_text, pmid, &self.language);
        self.retry
            .run_until("summarize_article", &self.cancel, || self.call(&prompt, self.request_timeout, self.max_tokens))
            .await
            .unwrap_or_else(|| SUMMARY_FAILED.to_string())
    }

    /// Rewrites the topic as a review title. Falls back to the topic unchanged.
    #[instrument(skip(self))]
    pub async fn polish_topic(&self, topic: &str) -> String {
        let prompt = prompts::polish_topic(topic, &self.language);
        let polished = self
            .retry
            .run_until("polish_topic", &self.cancel, || self.call(&prompt, POLISH_TIMEOUT, POLISH_MAX_TOKENS))
            .await
            .map(|text| strip_quotes(&text).to_string())
            .filter(|text| !text.is_empty());
        polished.unwrap_or_else(|| topic.to_string())
    }

    /// Writes the aggregate review. Falls back to a statistics skeleton.
    #[instrument(skip(self, articles), fields(articles = articles.len()))]
    pub async fn generate_review(&self, articles: &[Article], topic: &str, range: &DateRange) -> String {
        if articles.is_empty() {
            return NO_ARTICLES_REVIEW.to_string();
        }
        let prompt = prompts::review(articles, topic, range, &self.language);
        let policy = self.review_policy();
        match policy
            .run_until("generate_review", &self.cancel, || self.call(&prompt, REVIEW_TIMEOUT, REVIEW_MAX_TOKENS))
            .await
        {
            Some(review) => review,
            None => {
                warn!("Review generation exhausted retries, writing statistics skeleton");
                fallback_review(articles, topic, range)
            }
        }
    }

    /// The review call backs off from twice the base delay, capped at 30 s.
    fn review_policy(&self) -> RetryPolicy {
        let cap = self
            .retry
            .max_delay
            .map_or(REVIEW_MAX_DELAY, |d| d.min(REVIEW_MAX_DELAY));
        self.retry
            .with_base_delay(self.retry.base_delay.saturating_mul(2))
            .with_max_delay(cap)
    }
}

/// One term per line; headings and numbered list items are skipped.
fn parse_terms(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !is_numbered(line))
        .take(MAX_EXPANDED_TERMS)
        .map(str::to_string)
        .collect()
}

fn is_numbered(line: &str) -> bool {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with('.')
}

fn strip_quotes(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '「' | '」' | '“' | '”'))
        .trim()
}

fn fallback_review(articles: &[Article], topic: &str, range: &DateRange) -> String {
    let mut journals: HashMap<&str, usize> = HashMap::new();
    for a in articles {
        *journals.entry(a.journal.as_str()).or_default() += 1;
    }
    let mut journals: Vec<(&str, usize)> = journals.into_iter().collect();
    journals.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut out = format!(
        "# Literature review: {topic}\n\n\
         ## Overview\n\
         This review covers {n} papers on {topic} published between {start} and {end}.\n\n\
         ## Statistics\n\
         - Total articles: {n}\n\n\
         ## Journal distribution\n",
        n = articles.len(),
        start = range.start_label(),
        end = range.end_label(),
    );
    for (journal, count) in journals {
        out.push_str(&format!("- {}: {}\n", journal, count));
    }
    out
}
