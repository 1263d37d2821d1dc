//! Backend selection from configuration.

use std::sync::Arc;
use std::time::Duration;

use litscan_config::{LlmConfig, LlmProvider};
use tracing::info;

use crate::backend::{
    AnthropicBackend, LlmBackend, LlmError, OllamaBackend, OpenAiCompatibleBackend,
};

/// Builds the backend named by `llm.provider`.
///
/// Anthropic requires an API key; the OpenAI-compatible backend accepts a
/// missing key so keyless local servers keep working.
pub fn build_backend(config: &LlmConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let backend: Arc<dyn LlmBackend> = match config.provider {
        LlmProvider::OpenaiCompatible => Arc::new(
            OpenAiCompatibleBackend::new(&config.base_url, &config.model, config.api_key.clone())
                .with_client(client),
        ),
        LlmProvider::Ollama => Arc::new(
            OllamaBackend::new(&config.base_url, &config.model).with_client(client),
        ),
        LlmProvider::Anthropic => {
            let key = config.api_key.clone().ok_or_else(|| {
                LlmError::Unavailable(
                    "Anthropic backend needs llm.api_key or LITSCAN_LLM_API_KEY".to_string(),
                )
            })?;
            Arc::new(
                AnthropicBackend::new(key, &config.model)
                    .with_base_url(&config.base_url)
                    .with_client(client),
            )
        }
    };

    info!(
        model = backend.model_id(),
        is_local = backend.is_local(),
        "LLM backend configured"
    );
    Ok(backend)
}
