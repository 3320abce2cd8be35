// Oracle client: one injectable handle over an ordered chain of chat backends.
//
// Every component that needs language generation receives an `Arc<Oracle>`.
// Backends are tried in configuration order; a failing or slow backend is
// logged and the next one is asked. There is no retry of the same backend.

use std::sync::Arc;
use std::time::Duration;

use ai_client::util::{extract_json_object, strip_code_blocks};
use ai_client::{ChatModel, Claude, OpenAi, OpenRouter, StructuredOutput};
use serde::de::DeserializeOwned;
use sleuth_common::{Config, OracleBackend};
use thiserror::Error;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "\
You are a careful research assistant. Follow the requested output format exactly. \
When asked for JSON, reply with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no oracle backend available: {0}")]
    Unavailable(String),

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed structured response ({message})")]
    Parse { raw: String, message: String },
}

/// A typed oracle reply with a documented value to use when the reply
/// cannot be obtained or does not validate.
pub trait ResponseSchema: StructuredOutput {
    fn fallback() -> Self;
}

pub struct Oracle {
    backends: Vec<Arc<dyn ChatModel>>,
    timeout: Duration,
}

impl Oracle {
    pub fn new(backends: Vec<Arc<dyn ChatModel>>, timeout: Duration) -> Self {
        Self { backends, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        let backends = config
            .oracle_backends
            .iter()
            .map(|backend| -> Arc<dyn ChatModel> {
                match backend {
                    OracleBackend::Anthropic { api_key, model } => {
                        Arc::new(Claude::new(api_key, model))
                    }
                    OracleBackend::OpenAi { api_key, model } => {
                        Arc::new(OpenAi::new(api_key, model))
                    }
                    OracleBackend::OpenRouter { api_key, model } => {
                        Arc::new(OpenRouter::new(api_key, model).with_app_name("sleuth"))
                    }
                    OracleBackend::Local { base_url, model } => {
                        Arc::new(OpenAi::local(base_url, model))
                    }
                }
            })
            .collect();

        Self::new(backends, config.oracle_timeout)
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Free-text answer from the first backend that responds in time.
    pub async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        if self.backends.is_empty() {
            return Err(OracleError::Unavailable(
                "no backends configured".to_string(),
            ));
        }

        let mut last_error = None;

        for (position, backend) in self.backends.iter().enumerate() {
            let call = backend.chat_completion(SYSTEM_PROMPT, prompt);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(text)) => {
                    debug!(backend = backend.name(), chars = text.len(), "Oracle answered");
                    return Ok(text.trim().to_string());
                }
                Ok(Err(e)) => {
                    warn!(
                        backend = backend.name(),
                        position,
                        error = %e,
                        "Oracle backend failed, falling back"
                    );
                    last_error = Some(OracleError::Unavailable(format!(
                        "{}: {e}",
                        backend.name()
                    )));
                }
                Err(_) => {
                    warn!(
                        backend = backend.name(),
                        position,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "Oracle backend timed out, falling back"
                    );
                    last_error = Some(OracleError::Timeout(self.timeout));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| OracleError::Unavailable("no backend answered".into())))
    }

    /// Ask for JSON shaped like `T`. The schema is appended to the prompt and
    /// the reply is validated by deserializing it.
    pub async fn ask_json<T: StructuredOutput>(&self, prompt: &str) -> Result<T, OracleError> {
        let schema = serde_json::to_string(&<T as StructuredOutput>::json_schema()).unwrap_or_default();
        let prompt = format!(
            "{prompt}\n\nRespond with a single JSON object that matches this JSON schema:\n{schema}"
        );
        let raw = self.ask(&prompt).await?;
        parse_json(&raw)
    }

    /// `ask_json`, falling back to `T::fallback()` on any failure.
    pub async fn ask_or_fallback<T: ResponseSchema>(&self, purpose: &str, prompt: &str) -> T {
        match self.ask_json::<T>(prompt).await {
            Ok(value) => value,
            Err(e) => {
                warn!(purpose, error = %e, "Oracle reply unusable, using fallback");
                T::fallback()
            }
        }
    }
}

/// Parse a model reply as JSON, tolerating code fences and surrounding prose.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    let candidate = extract_json_object(raw).unwrap_or_else(|| strip_code_blocks(raw));
    serde_json::from_str(candidate).map_err(|e| OracleError::Parse {
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Answer {
        value: u32,
    }

    impl ResponseSchema for Answer {
        fn fallback() -> Self {
            Answer { value: 0 }
        }
    }

    fn oracle(models: Vec<ScriptedModel>) -> Oracle {
        Oracle::new(
            models
                .into_iter()
                .map(|m| Arc::new(m) as Arc<dyn ChatModel>)
                .collect(),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn empty_chain_is_unavailable() {
        let err = oracle(vec![]).ask("hi").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }

    #[tokio::test]
    async fn falls_back_to_next_backend() {
        let first = ScriptedModel::failing("primary");
        let second = ScriptedModel::new().named("secondary").with_default("pong");
        let oracle = oracle(vec![first, second]);

        assert_eq!(oracle.ask("ping").await.unwrap(), "pong");
        assert_eq!(oracle.backend_names(), vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let slow = ScriptedModel::new()
            .with_default("late")
            .with_latency(Duration::from_secs(5));
        let err = oracle(vec![slow]).ask("ping").await.unwrap_err();
        assert!(matches!(err, OracleError::Timeout(_)));
    }

    #[tokio::test]
    async fn ask_json_appends_schema_and_parses() {
        let model = ScriptedModel::new().with_default("```json\n{\"value\": 7}\n```");
        let oracle = oracle(vec![model.clone()]);

        let answer: Answer = oracle.ask_json("give me a number").await.unwrap();
        assert_eq!(answer.value, 7);
        assert!(model.prompts()[0].contains("JSON schema"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error_and_falls_back() {
        let oracle = oracle(vec![ScriptedModel::new().with_default("value is seven")]);

        let err = oracle.ask_json::<Answer>("number?").await.unwrap_err();
        assert!(matches!(err, OracleError::Parse { .. }));

        let answer: Answer = oracle.ask_or_fallback("test", "number?").await;
        assert_eq!(answer.value, 0);
    }

    #[test]
    fn parse_json_reads_object_inside_prose() {
        let answer: Answer = parse_json("Here you go: {\"value\": 3}. Anything else?").unwrap();
        assert_eq!(answer.value, 3);
    }
}
