pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn content_endpoint(&self) -> String {
        match self.token {
            Some(ref token) => format!("{}/content?token={token}", self.base_url),
            None => format!("{}/content", self.base_url),
        }
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    ///
    /// Waits for the network to go idle so script-built pages are complete.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({
            "url": url,
            "gotoOptions": { "waitUntil": "networkidle2" },
        });

        tracing::debug!(url, "Browserless content request");

        let resp = self
            .client
            .post(self.content_endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
