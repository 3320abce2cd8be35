use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// ChatModel Trait
// =============================================================================

/// A backend that turns a system + user prompt into a single text reply.
///
/// Implementations hold configuration only (keys, model, base URL) and are
/// safe to share across concurrent callers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short backend label used in logs, e.g. `"anthropic"`.
    fn name(&self) -> &str;

    async fn chat_completion(&self, system: &str, user: &str) -> Result<String>;

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat_completion("You are a helpful assistant.", prompt)
            .await
    }
}
