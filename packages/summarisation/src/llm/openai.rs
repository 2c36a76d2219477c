//! OpenAI implementation of the provider trait.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::llm::{
    backoff_delay, is_transient_status, parse_chat_completion, JsonCompletion, LlmProvider,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for the public OpenAI API (or a compatible
/// endpoint via `base_url`).
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAiProvider {
    /// Create a client; fails when the API key is missing.
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<&str>,
        timeout_seconds: u64,
        max_retries: u32,
    ) -> LlmResult<Self> {
        if api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OPENAI_API_KEY is not set. Add it to your .env file.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds.max(30)))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            max_retries,
        })
    }

    async fn post_chat(&self, body: &Value) -> LlmResult<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        return resp.json::<Value>().await.map_err(LlmError::Network);
                    }

                    let text = resp.text().await.unwrap_or_default();
                    if is_transient_status(status) && attempt < self.max_retries {
                        debug!(status, attempt, "retrying transient OpenAI error");
                        last_error = format!("HTTP {status}");
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    return Err(LlmError::Http { status, body: text });
                }
                Err(err) if attempt < self.max_retries => {
                    debug!(attempt, error = %err, "retrying OpenAI network error");
                    last_error = err.to_string();
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(err) => return Err(LlmError::Network(err)),
            }
        }

        Err(LlmError::Exhausted {
            attempts: self.max_retries + 1,
            reason: last_error,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> LlmResult<JsonCompletion> {
        let body = json!({
            "model": self.model,
            "temperature": temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        let response = self.post_chat(&body).await?;
        parse_chat_completion(&response)
    }
}
