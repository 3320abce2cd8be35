mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::ChatModel;
use client::OpenAiClient;

// =============================================================================
// OpenAi
// =============================================================================

/// Client for OpenAI and any server speaking the same `/chat/completions`
/// protocol (llama.cpp `server`, Ollama, vLLM).
#[derive(Clone)]
pub struct OpenAi {
    api_key: Option<String>,
    pub(crate) model: String,
    base_url: Option<String>,
    label: String,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: model.into(),
            base_url: None,
            label: "openai".to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// A keyless OpenAI-compatible server, e.g. `http://localhost:8080/v1`.
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: Some(base_url.into()),
            label: "local".to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(self.api_key.as_deref(), self.http.clone());
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAi {
    fn name(&self) -> &str {
        &self.label
    }

    async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
        let mut request = types::ChatRequest::new(&self.model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user));

        if types::uses_max_completion_tokens(&self.model) {
            request = request.max_completion_tokens(4096);
        } else {
            request = request.max_tokens(4096).temperature(0.0);
        }

        let response = self.client().chat(&request).await?;

        response
            .into_text()
            .ok_or_else(|| anyhow!("No response from {}", self.label))
    }
}
