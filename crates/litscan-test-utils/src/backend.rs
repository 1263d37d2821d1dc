use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use litscan_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse};

/// Which generation call a request belongs to, recognised from its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Expand,
    Summary,
    Polish,
    Review,
}

impl PromptKind {
    pub fn of(req: &LlmRequest) -> Self {
        let text = req.text();
        if text.contains("PubMed search conventions") {
            PromptKind::Expand
        } else if text.contains("## Abstract") {
            PromptKind::Summary
        } else if text.contains("Original topic:") {
            PromptKind::Polish
        } else {
            PromptKind::Review
        }
    }
}

type Responder = dyn Fn(PromptKind, &LlmRequest) -> Result<String, LlmError> + Send + Sync;

/// LLM backend answering from a closure, with optional latency and a call counter.
#[derive(Clone)]
pub struct ScriptedBackend {
    responder: Arc<Responder>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(PromptKind, &LlmRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self { responder: Arc::new(responder), delay: Duration::ZERO, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Deterministic answers for every prompt kind.
    pub fn echo() -> Self {
        Self::new(|kind, req| {
            Ok(match kind {
                PromptKind::Expand => "term one\nterm two".to_string(),
                PromptKind::Summary => format!("summary of {}", pmid_in(req).unwrap_or("?")),
                PromptKind::Polish => "\"Polished topic\"".to_string(),
                PromptKind::Review => "generated review".to_string(),
            })
        })
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self::new(|_, _| Err(LlmError::Unavailable("scripted failure".to_string())))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn LlmBackend> {
        Arc::new(self)
    }
}

/// The PMID line of a summary prompt.
pub fn pmid_in(req: &LlmRequest) -> Option<&str> {
    req.messages
        .iter()
        .flat_map(|m| m.content.lines())
        .find_map(|l| l.trim().strip_prefix("- PMID: "))
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let content = (self.responder)(PromptKind::of(&req), &req)?;
        Ok(LlmResponse {
            content,
            model: "scripted".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn model_id(&self) -> &str { "scripted" }
    fn is_local(&self) -> bool { true }
}
