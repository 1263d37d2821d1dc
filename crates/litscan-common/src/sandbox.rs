use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::LitscanError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client that only issues requests to approved hosts.
/// Every outbound literature request goes through this client so a
/// misconfigured base URL cannot leak queries to an arbitrary server.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist (NCBI E-utilities plus loopback).
    pub fn new() -> Result<Self, LitscanError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LitscanError> {
        let allowlist = [
            "eutils.ncbi.nlm.nih.gov", // PubMed
            "localhost",
            "127.0.0.1",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("litscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LitscanError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        // Exact match or a subdomain of an allowed host
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, LitscanError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, LitscanError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<(), LitscanError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(LitscanError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )))
        }
    }
}
