//! Configuration loading for litscan.
//! Reads litscan.toml from the current directory or the path in LITSCAN_CONFIG.

pub mod venues;

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use venues::{default_venues, VenueBucket};

const DEFAULT_CONFIG_FILE: &str = "litscan.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pubmed: PubMedConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default = "default_venues")]
    pub venues: Vec<VenueBucket>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            pubmed: PubMedConfig::default(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
            tasks: TaskConfig::default(),
            venues: default_venues(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_bind()       -> String { "0.0.0.0:5000".to_string() }
fn default_static_dir() -> String { "crates/litscan-web/static".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), static_dir: default_static_dir() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any server speaking the OpenAI chat-completions dialect (DeepSeek, vLLM, OpenAI itself).
    #[default]
    OpenaiCompatible,
    Ollama,
    Anthropic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Falls back to LITSCAN_LLM_API_KEY when absent.
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_llm_base_url() -> String { "https://api.deepseek.com".to_string() }
fn default_llm_model()    -> String { "deepseek-chat".to_string() }
fn default_temperature()  -> f32    { 0.7 }
fn default_max_tokens()   -> u32    { 1000 }
fn default_request_timeout() -> u64 { 30 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PubMedConfig {
    #[serde(default = "default_eutils_base")]
    pub base_url: String,
    /// Sent as the NCBI `email` courtesy parameter.
    #[serde(default)]
    pub email: Option<String>,
    /// Falls back to LITSCAN_PUBMED_API_KEY when absent.
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_eutils_base()    -> String { "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string() }
fn default_batch_size()     -> usize  { 100 }
fn default_batch_delay_ms() -> u64    { 1000 }

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_eutils_base(),
            email: None,
            api_key: None,
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_start_date")]
    pub default_start_date: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_start_date()  -> String { "2025/01/01".to_string() }
fn default_max_results() -> usize  { 30 }
fn default_max_workers() -> usize  { 5 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_start_date: default_start_date(),
            max_results: default_max_results(),
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

fn default_max_attempts()  -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 1000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    /// Language the summaries and the review are written in.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_output_dir() -> String { "output".to_string() }
fn default_language()   -> String { "English".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir(), language: default_language() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// How long a finished task stays queryable.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

fn default_ttl_secs()      -> u64 { 86_400 }
fn default_reap_interval() -> u64 { 300 }

impl Default for TaskConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl_secs(), reap_interval_secs: default_reap_interval() }
    }
}

mod tests;

impl Config {
    /// Load configuration from litscan.toml.
    /// Checks LITSCAN_CONFIG first, then the current directory. Without either
    /// the built-in defaults are used.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var("LITSCAN_CONFIG").ok().map(PathBuf::from);
        Self::load_from(explicit.as_deref())
    }

    /// Like `load`, but an explicit path replaces the LITSCAN_CONFIG lookup
    /// and must exist.
    pub fn load_from(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::from_path(path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_path(DEFAULT_CONFIG_FILE)?
            }
            None => {
                info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Fill secrets and the bind address from the environment.
    /// Values already present in the file win over the environment for secrets;
    /// LITSCAN_BIND always overrides the bind address.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.llm.api_key.is_none() {
            self.llm.api_key = non_empty("LITSCAN_LLM_API_KEY").map(SecretString::from);
        }
        if self.pubmed.api_key.is_none() {
            self.pubmed.api_key = non_empty("LITSCAN_PUBMED_API_KEY").map(SecretString::from);
        }
        if let Some(bind) = non_empty("LITSCAN_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search.max_workers == 0 {
            anyhow::bail!("search.max_workers must be at least 1");
        }
        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.pubmed.batch_size == 0 {
            anyhow::bail!("pubmed.batch_size must be at least 1");
        }
        Ok(())
    }
}
