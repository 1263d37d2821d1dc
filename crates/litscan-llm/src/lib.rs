//! litscan-llm — text-generation backends and the enrichment client.
//! Backends speak one wire protocol each; `EnrichmentClient` wraps whichever
//! backend is configured with prompts, timeouts and the shared retry policy.

pub mod backend;
pub mod enrichment;
pub mod prompts;
pub mod provider;
pub mod retry;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message};
pub use enrichment::{is_degraded_summary, EnrichmentClient, NO_ABSTRACT, SUMMARY_FAILED};
pub use provider::build_backend;
pub use retry::RetryPolicy;
