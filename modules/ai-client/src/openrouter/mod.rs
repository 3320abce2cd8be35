mod client;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::openai::types::{ChatRequest, WireMessage};
use crate::traits::ChatModel;
use client::OpenRouterClient;

#[derive(Clone)]
pub struct OpenRouter {
    api_key: String,
    model: String,
    app_name: Option<String>,
    site_url: Option<String>,
    http: reqwest::Client,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            app_name: None,
            site_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenRouterClient {
        let mut client = OpenRouterClient::new(&self.api_key, self.http.clone());
        if let Some(ref name) = self.app_name {
            client = client.with_app_name(name);
        }
        if let Some(ref url) = self.site_url {
            client = client.with_site_url(url);
        }
        client
    }
}

#[async_trait]
impl ChatModel for OpenRouter {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .message(WireMessage::system(system))
            .message(WireMessage::user(user))
            .max_tokens(4096)
            .temperature(0.0);

        let response = self.client().chat(&request).await?;

        response
            .into_text()
            .ok_or_else(|| anyhow!("No response from OpenRouter"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openrouter_builder() {
        let ai = OpenRouter::new("or-test", "google/gemma-3-12b-it").with_app_name("sleuth");
        assert_eq!(ai.model(), "google/gemma-3-12b-it");
        assert_eq!(ai.app_name.as_deref(), Some("sleuth"));
        assert_eq!(ai.name(), "openrouter");
    }
}
