//! Testing utilities including mock providers.
//!
//! Useful for exercising the pipeline without real model or network calls.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{LlmError, LlmResult};
use crate::llm::{JsonCompletion, LlmProvider};
use crate::types::record::ResponseRecord;
use crate::types::summary::LlmUsage;

/// Build a response record with test defaults for the fields the pipeline
/// does not inspect.
pub fn record(
    record_id: &str,
    response_id: &str,
    organisation_name: &str,
    question_id: &str,
    choice_value: Option<&str>,
    answer_text: &str,
) -> ResponseRecord {
    ResponseRecord {
        record_id: record_id.to_string(),
        response_id: response_id.to_string(),
        organisation_name: organisation_name.to_string(),
        organisation_type: "Test organisation".to_string(),
        region: "Test region".to_string(),
        question_id: question_id.to_string(),
        question_text: format!("Question {question_id}"),
        section: "General".to_string(),
        choice_value: choice_value.map(str::to_string),
        answer_text: answer_text.to_string(),
        excerpt: answer_text.chars().take(280).collect(),
    }
}

/// Record of one call made to [`MockProvider`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// A mock provider returning deterministic JSON payloads.
///
/// Scripted responses (FIFO) take precedence; otherwise a default payload
/// is synthesized from the prompt shape, citing record IDs scraped from the
/// prompt so evidence validation has something real to keep.
#[derive(Default)]
pub struct MockProvider {
    scripted: Mutex<Vec<Value>>,
    calls: Mutex<Vec<RecordedCall>>,
    usage: LlmUsage,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            usage: LlmUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            ..Default::default()
        }
    }

    /// Queue an explicit payload; consumed before default synthesis.
    pub fn with_response(self, payload: Value) -> Self {
        self.scripted.lock().unwrap().push(payload);
        self
    }

    /// All calls made to this mock.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn default_payload(&self, user_prompt: &str) -> Value {
        let record_ids = extract_record_ids(user_prompt);
        let first = record_ids.first().cloned().unwrap_or_default();
        let second = record_ids.get(1).cloned().unwrap_or_else(|| first.clone());

        if user_prompt.contains("main_points") && user_prompt.contains("Section:") {
            json!({
                "main_points": [{"text": "Main point", "evidence_ids": [first]}],
                "concerns": [{"text": "Concern point", "evidence_ids": [second]}],
                "asks": [{"text": "Ask point", "evidence_ids": [first]}],
                "nuances": [{"text": "Nuance point", "evidence_ids": [second]}],
            })
        } else if user_prompt.contains("hybrid organisation summary") {
            json!({
                "overall_stance": "mixed",
                "key_supports": [{"text": "Support", "evidence_ids": [first]}],
                "key_concerns": [{"text": "Concern", "evidence_ids": [second]}],
                "asks_or_recommendations": [{"text": "Recommendation", "evidence_ids": [first]}],
            })
        } else {
            json!({
                "headline": "Question headline",
                "narrative": "Question narrative",
                // Evidence IDs deliberately omitted to exercise the
                // reconciliation fallback tiers.
                "majority_view": [{"text": "Majority support for proposed approach"}],
                "minority_view": [{"text": "Minority concern around implementation risk"}],
                "key_arguments_for": [{"text": "Benefits of the proposal"}],
                "key_arguments_against": [{"text": "Potential downside and risk"}],
                "mainstream_clusters": [{
                    "cluster_id": "C1",
                    "label": "Mainstream cluster",
                    "stance": "support",
                    "member_record_ids": [],
                    "evidence_ids": [],
                    "significance": "",
                }],
                "minority_clusters": [{
                    "cluster_id": "M1",
                    "label": "Minority cluster",
                    "stance": "concern",
                    "member_record_ids": [],
                    "evidence_ids": [],
                    "significance": "",
                }],
            })
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> LlmResult<JsonCompletion> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature,
        });

        let scripted = {
            let mut queue = self.scripted.lock().unwrap();
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        };

        let payload = scripted.unwrap_or_else(|| self.default_payload(user_prompt));
        Ok(JsonCompletion {
            payload,
            usage: self.usage,
        })
    }
}

/// A provider whose calls always fail, for resilience tests.
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
    ) -> LlmResult<JsonCompletion> {
        Err(LlmError::Exhausted {
            attempts: 1,
            reason: "simulated timeout".to_string(),
        })
    }
}

/// Scrape `<response>:<Qnn>` record IDs out of a prompt, in order.
fn extract_record_ids(prompt: &str) -> Vec<String> {
    let mut ids = Vec::new();

    for token in prompt.split(|c: char| c.is_whitespace() || c == '|' || c == '"' || c == ',') {
        let Some((response, question)) = token.rsplit_once(':') else {
            continue;
        };
        let mut chars = question.chars();
        let is_question = chars.next() == Some('Q')
            && question.len() > 1
            && chars.all(|c| c.is_ascii_digit());

        if is_question && !response.is_empty() && !ids.contains(&token.to_string()) {
            ids.push(token.to_string());
        }
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_record_ids() {
        let prompt = "R1:Q01 | Org A | text\nR2:Q01 | Org B | more\nR1:Q01 | repeat";
        assert_eq!(
            extract_record_ids(prompt),
            vec!["R1:Q01".to_string(), "R2:Q01".to_string()]
        );
    }

    #[tokio::test]
    async fn test_scripted_responses_take_precedence() {
        let provider = MockProvider::new().with_response(json!({"scripted": true}));

        let first = provider.complete_json("s", "u", 0.1).await.unwrap();
        assert_eq!(first.payload, json!({"scripted": true}));

        let second = provider.complete_json("s", "u", 0.1).await.unwrap();
        assert!(second.payload.get("scripted").is_none());
        assert_eq!(provider.calls().len(), 2);
    }
}
