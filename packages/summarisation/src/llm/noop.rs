//! Provider used when no model access is configured.

use async_trait::async_trait;

use crate::error::{LlmError, LlmResult};
use crate::llm::{JsonCompletion, LlmProvider};

/// Fails with a clear message when a summary is requested without an LLM.
///
/// Lets read-only commands construct a service without credentials.
pub struct NoopProvider;

#[async_trait]
impl LlmProvider for NoopProvider {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
    ) -> LlmResult<JsonCompletion> {
        Err(LlmError::NotConfigured(
            "LLM provider is not configured. Set OPENAI_API_KEY to generate summaries."
                .to_string(),
        ))
    }
}
