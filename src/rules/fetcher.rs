//! HTTP fetching of remote rule documents
//!
//! Remote rule and hash documents are only ever fetched over HTTPS, with a
//! bounded timeout per request. Fetching sits behind the [`RuleFetcher`]
//! trait so the resolver can be driven by other transports in tests.

use crate::rules::RuleSourceError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Connect timeout, capped by the overall request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a document by URL
#[async_trait]
pub trait RuleFetcher: Send + Sync {
    /// Fetches the body of `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RuleSourceError>;
}

/// Builds the HTTP client used for rule sources
///
/// # Example
///
/// ```no_run
/// use linkscrub::rules::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .https_only(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`RuleFetcher`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with an HTTPS-only client
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RuleFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RuleSourceError> {
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuleSourceError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(url, e))?;
        Ok(body.to_vec())
    }
}

fn classify(url: &str, error: reqwest::Error) -> RuleSourceError {
    if error.is_timeout() {
        RuleSourceError::Timeout(url.to_string())
    } else {
        RuleSourceError::Request(error)
    }
}
