use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a page could not be retrieved. Never fatal: the URL is dropped for
/// this crawl and the crawl goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("http status {0}")]
    Http(u16),
    #[error("timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Anything that can hand back the raw content behind a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(12),
            user_agent: "search-engine-rs-bot/0.1 (+https://example.com/bot)".to_string(),
            max_redirects: 5,
        }
    }
}

/// Single GET per page with a bounded timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let resp = self.client.get(url.clone()).send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = resp.url().clone();
        let body = resp.bytes().await.map_err(classify)?;
        Ok(FetchedPage { url: final_url, content_type, body: body.to_vec() })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = e.status() {
        FetchError::Http(status.as_u16())
    } else {
        FetchError::NetworkUnreachable(e.to_string())
    }
}
