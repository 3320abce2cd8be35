use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sleuth_common::{Result, SearchResult, SleuthError};
use tracing::{info, warn};

// --- WebSearcher trait ---

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Ranked organic results. An empty result set is `NoSearchResults`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SleuthError::Config(format!("Failed to build HTTP client: {e}")))
}

fn check_search_status(provider: &str, status: reqwest::StatusCode) -> Result<()> {
    match status.as_u16() {
        401 | 403 => Err(SleuthError::InvalidSearchKey(format!(
            "{provider} returned {status}"
        ))),
        _ if !status.is_success() => Err(SleuthError::Anyhow(anyhow::anyhow!(
            "{provider} search failed with {status}"
        ))),
        _ => Ok(()),
    }
}

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: http_client(Duration::from_secs(30))?,
        })
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        info!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Serper API request failed: {e}"))?;
        check_search_status("Serper", resp.status())?;

        let data: SerperResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Serper response: {e}"))?;

        let results: Vec<SearchResult> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| SearchResult {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect();

        info!(query, count = results.len(), "Serper search complete");
        if results.is_empty() {
            return Err(SleuthError::NoSearchResults(query.to_string()));
        }
        Ok(results)
    }
}

// --- Google Custom Search ---

const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
/// The Custom Search API rejects `num` above 10.
const GOOGLE_MAX_NUM: usize = 10;

pub struct GoogleSearcher {
    api_key: String,
    engine_id: String,
    client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, serde::Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl GoogleSearcher {
    pub fn new(api_key: &str, engine_id: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
            client: http_client(Duration::from_secs(30))?,
        })
    }
}

#[async_trait]
impl WebSearcher for GoogleSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        info!(query, max_results, "Google Custom Search");

        let num = max_results.clamp(1, GOOGLE_MAX_NUM).to_string();
        let resp = self
            .client
            .get(GOOGLE_CSE_ENDPOINT)
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Google search request failed: {e}"))?;
        check_search_status("Google", resp.status())?;

        let data: GoogleResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Google search response: {e}"))?;

        let results: Vec<SearchResult> = data
            .items
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| SearchResult {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect();

        info!(query, count = results.len(), "Google search complete");
        if results.is_empty() {
            return Err(SleuthError::NoSearchResults(query.to_string()));
        }
        Ok(results)
    }
}

// --- PageFetcher trait ---

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw HTML for `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
    fn name(&self) -> &str;
}

fn check_scheme(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| SleuthError::FetchFailure {
        url: url.to_string(),
        message: format!("Invalid URL: {e}"),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SleuthError::FetchFailure {
            url: url.to_string(),
            message: format!("Only http/https URLs are allowed, got: {}", parsed.scheme()),
        });
    }
    Ok(())
}

// --- Browserless (rendered HTML) ---

pub struct BrowserlessFetcher {
    client: browserless_client::BrowserlessClient,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        info!(base_url, "Using BrowserlessFetcher");
        let client = browserless_client::BrowserlessClient::new(base_url, token)
            .map_err(|e| SleuthError::Config(format!("Browserless client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        check_scheme(url)?;
        info!(url, fetcher = "browserless", "Fetching URL");

        let html = self
            .client
            .content(url)
            .await
            .map_err(|e| SleuthError::FetchFailure {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        info!(url, fetcher = "browserless", bytes = html.len(), "Fetched");
        Ok(html)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// --- Direct HTTP ---

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Plain GET with a rotating desktop User-Agent. No JavaScript rendering.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(60))?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        check_scheme(url)?;
        let user_agent = USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())];
        info!(url, fetcher = "http", "Fetching URL");

        let failure = |message: String| SleuthError::FetchFailure {
            url: url.to_string(),
            message,
        };

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(failure(format!("HTTP {status}")));
        }

        let html = resp.text().await.map_err(|e| failure(e.to_string()))?;
        info!(url, fetcher = "http", bytes = html.len(), "Fetched");
        Ok(html)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// --- Retry wrapper ---

/// Attempt count and backoff between attempts.
///
/// The wait after attempt `n` (0-based) is `base * multiplier^n` plus a
/// random jitter of up to the same amount again.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            ..Self::default()
        }
    }

    /// Retries immediately. For tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base: Duration::ZERO,
            multiplier: 1,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self.base * self.multiplier.saturating_pow(attempt);
        let max_jitter = backoff.as_millis() as u64;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::rng().random_range(0..max_jitter)
        };
        backoff + Duration::from_millis(jitter)
    }
}

/// Retries a fetcher on failure. Once every attempt has failed the last
/// error is returned as a `FetchFailure`.
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: PageFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String> {
        // Bad URLs will not get better.
        check_scheme(url)?;

        let mut last_error = String::new();
        for attempt in 0..self.policy.attempts {
            match self.inner.fetch(url).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    last_error = match &e {
                        SleuthError::FetchFailure { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    if attempt + 1 < self.policy.attempts {
                        let wait = self.policy.backoff(attempt);
                        warn!(
                            url,
                            fetcher = self.inner.name(),
                            attempt = attempt + 1,
                            backoff_ms = wait.as_millis() as u64,
                            error = %e,
                            "Fetch failed, retrying after backoff"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        warn!(url, attempts = self.policy.attempts, "Fetch failed, retries exhausted");
        Err(SleuthError::FetchFailure {
            url: url.to_string(),
            message: format!(
                "failed after {} attempts: {last_error}",
                self.policy.attempts
            ),
        })
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[test]
    fn backoff_grows_and_jitter_is_bounded() {
        let policy = RetryPolicy {
            attempts: 3,
            base: Duration::from_millis(100),
            multiplier: 3,
        };
        let first = policy.backoff(0);
        let second = policy.backoff(1);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(200));
        assert!(second >= Duration::from_millis(300) && second < Duration::from_millis(600));
        assert_eq!(RetryPolicy::immediate(2).backoff(5), Duration::ZERO);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let mock = MockFetcher::new()
            .on_page("https://a.example", "<p>hello</p>")
            .failing_first(2);
        let fetcher = RetryingFetcher::new(mock.clone(), RetryPolicy::immediate(3));

        assert_eq!(fetcher.fetch("https://a.example").await.unwrap(), "<p>hello</p>");
        assert_eq!(mock.fetch_count("https://a.example"), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_are_a_fetch_failure() {
        let mock = MockFetcher::new();
        let fetcher = RetryingFetcher::new(mock.clone(), RetryPolicy::immediate(3));

        let err = fetcher.fetch("https://missing.example").await.unwrap_err();
        assert!(matches!(err, SleuthError::FetchFailure { .. }));
        assert!(err.to_string().contains("failed after 3 attempts"));
        assert_eq!(mock.fetch_count("https://missing.example"), 3);
    }

    #[tokio::test]
    async fn non_http_urls_are_rejected_without_fetching() {
        let mock = MockFetcher::new().on_page("ftp://files.example", "data");
        let fetcher = RetryingFetcher::new(mock.clone(), RetryPolicy::immediate(3));

        assert!(fetcher.fetch("ftp://files.example").await.is_err());
        assert!(fetcher.fetch("not a url").await.is_err());
        assert_eq!(mock.fetch_count("ftp://files.example"), 0);
    }
}
