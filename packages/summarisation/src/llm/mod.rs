//! Model provider abstraction and implementations.
//!
//! Providers wrap one chat-completions endpoint behind [`LlmProvider`] and
//! return parsed JSON payloads plus token usage. The pipeline never touches
//! HTTP details; the factory picks the implementation from settings.

pub mod azure;
pub mod noop;
pub mod openai;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::types::config::Settings;
use crate::types::summary::LlmUsage;

pub use azure::AzureOpenAiProvider;
pub use noop::NoopProvider;
pub use openai::OpenAiProvider;

/// Parsed JSON payload and token accounting for one model call.
#[derive(Debug, Clone)]
pub struct JsonCompletion {
    /// The model's JSON object output (empty object when unparseable)
    pub payload: Value,

    /// Token usage reported by the provider
    pub usage: LlmUsage,
}

/// A model provider capable of JSON-constrained chat completions.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute one model call and return structured JSON plus token usage.
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> LlmResult<JsonCompletion>;
}

/// Create a provider from settings.
///
/// With `require_llm = false` a no-op provider is returned so read-only
/// commands never need credentials.
pub fn build_provider(
    settings: &Settings,
    require_llm: bool,
) -> LlmResult<Box<dyn LlmProvider>> {
    if !require_llm {
        return Ok(Box::new(NoopProvider));
    }

    match settings.llm_provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(
            &settings.openai_api_key,
            &settings.openai_model,
            settings.openai_base_url.as_deref(),
            settings.llm_timeout_seconds,
            settings.llm_max_retries,
        )?)),
        "azure" => Ok(Box::new(AzureOpenAiProvider::new(
            &settings.azure_openai_endpoint,
            &settings.azure_openai_deployment,
            &settings.azure_openai_api_version,
            &settings.azure_openai_api_key,
            settings.llm_timeout_seconds,
            settings.llm_max_retries,
        )?)),
        other => Err(LlmError::NotConfigured(format!(
            "unsupported LLM_PROVIDER: {other}"
        ))),
    }
}

/// Best-effort parser for model output that should be a JSON object.
///
/// Falls back to the outermost `{...}` span when the raw text does not
/// parse; anything unrecoverable becomes an empty object so reconciliation
/// can degrade instead of failing.
pub(crate) fn extract_json_object(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Object(Default::default());
    }

    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Value::Object(map);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            if let Ok(Value::Object(map)) = serde_json::from_str(&trimmed[start..=end]) {
                return Value::Object(map);
            }
        }
    }

    Value::Object(Default::default())
}

/// Pull payload and usage out of a chat-completions response body.
///
/// Both providers speak the same response shape.
pub(crate) fn parse_chat_completion(response: &Value) -> LlmResult<JsonCompletion> {
    let content = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| {
            LlmError::InvalidResponse("response did not contain choices".to_string())
        })?;

    let usage = response.get("usage");
    let input_tokens = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let output_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(JsonCompletion {
        payload: extract_json_object(content),
        usage: LlmUsage {
            input_tokens,
            output_tokens,
        },
    })
}

/// Whether an HTTP status is worth retrying.
pub(crate) fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Linear backoff delay before the given retry attempt (zero-based).
pub(crate) fn backoff_delay(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(1500 * (attempt as u64 + 1))
}
