//! Azure OpenAI implementation of the provider trait.
//!
//! Api-key authentication against a deployment-scoped chat-completions
//! endpoint. The request/response shapes match the public OpenAI API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::llm::{
    backoff_delay, is_transient_status, parse_chat_completion, JsonCompletion, LlmProvider,
};

/// Chat-completions client for an Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    client: Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
    max_retries: u32,
}

impl AzureOpenAiProvider {
    /// Create a client; fails when endpoint, deployment, or key is missing.
    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: &str,
        timeout_seconds: u64,
        max_retries: u32,
    ) -> LlmResult<Self> {
        if endpoint.is_empty() || deployment.is_empty() {
            return Err(LlmError::NotConfigured(
                "AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_DEPLOYMENT must be set.".to_string(),
            ));
        }
        if api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "AZURE_OPENAI_API_KEY is not set.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds.max(30)))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: deployment.to_string(),
            api_version: api_version.to_string(),
            api_key: api_key.to_string(),
            max_retries,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    async fn post_chat(&self, body: &Value) -> LlmResult<Value> {
        let url = self.url();
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            let response = self
                .client
                .post(&url)
                .header("api-key", &self.api_key)
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
                        debug!(status, attempt, "retrying transient Azure OpenAI error");
                        last_error = format!("HTTP {status}");
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    return Err(LlmError::Http { status, body: text });
                }
                Err(err) if attempt < self.max_retries => {
                    debug!(attempt, error = %err, "retrying Azure OpenAI network error");
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
impl LlmProvider for AzureOpenAiProvider {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> LlmResult<JsonCompletion> {
        let body = json!({
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
