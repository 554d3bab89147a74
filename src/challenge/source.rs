//! Results page source: matchlink validation and page fetching
//!
//! A matchlink is only ever fetched after it has been pinned to the trusted
//! results host over https. Fetching itself sits behind [`PageFetcher`] so
//! callers and tests can supply their own transport.

use crate::challenge::parser::parse_challenge;
use crate::config::SourceSettings;
use crate::error::{LadderError, Result};
use crate::types::MatchReport;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Check that a matchlink points at the trusted results host over https
pub fn validate_source_url(matchlink: &str, trusted_host: &str) -> Result<Url> {
    let untrusted = |reason: &str| LadderError::UntrustedSource {
        url: matchlink.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(matchlink.trim()).map_err(|e| untrusted(&format!("not a URL ({})", e)))?;
    if url.scheme() != "https" {
        return Err(untrusted("scheme must be https").into());
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(untrusted("credentials are not allowed").into());
    }
    if url.port().is_some() {
        return Err(untrusted("explicit ports are not allowed").into());
    }
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case(trusted_host) => {}
        _ => return Err(untrusted(&format!("host must be {}", trusted_host)).into()),
    }
    // The parsed URL forgets a default port written out as ":443"
    if !raw_authority(matchlink).eq_ignore_ascii_case(trusted_host) {
        return Err(untrusted(&format!("network location must be exactly {}", trusted_host)).into());
    }
    Ok(url)
}

/// Authority text of a link exactly as written, between "://" and the path
fn raw_authority(matchlink: &str) -> &str {
    matchlink
        .trim()
        .split_once("://")
        .and_then(|(_, rest)| rest.split(['/', '?', '#']).next())
        .unwrap_or_default()
}

/// Transport used to retrieve a results page
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the full document text behind an already validated URL
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// HTTP page fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .user_agent(settings.user_agent.clone())
            .https_only(true)
            .build()
            .map_err(|e| LadderError::ConfigurationError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let fetch_failed = |message: String| LadderError::FetchFailed {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP status {}", status)).into());
        }
        let body = response
            .text()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Validates, fetches and parses friend challenge matchlinks
#[derive(Clone)]
pub struct ChallengeSource {
    fetcher: Arc<dyn PageFetcher>,
    trusted_host: String,
}

impl ChallengeSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, trusted_host: impl Into<String>) -> Self {
        Self {
            fetcher,
            trusted_host: trusted_host.into(),
        }
    }

    pub fn trusted_host(&self) -> &str {
        &self.trusted_host
    }

    /// Load the report behind a matchlink; nothing is fetched unless the link is trusted
    pub async fn load(&self, matchlink: &str) -> Result<MatchReport> {
        let url = validate_source_url(matchlink, &self.trusted_host).map_err(|e| {
            warn!("Refusing matchlink '{}': {}", matchlink, e);
            e
        })?;

        info!("Fetching friend challenge from {}", url);
        let document = self.fetcher.fetch(&url).await?;
        parse_challenge(&document)
    }
}
