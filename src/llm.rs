//! Language model access: `spec.md` §4.4's `Completion` interface.
//!
//! A single Gemini-backed implementation, reached through its
//! OpenAI-compatible endpoint. Retries transient failures with exponential
//! backoff; does not retry 4xx responses other than 429.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionFailure;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Produces a completion for a prompt, optionally steered by a system
/// message.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionFailure>;
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Gemini reached through the OpenAI-compatible chat completions endpoint.
pub struct GeminiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiCompletion {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self { client, api_key: api_key.into(), model: model.into(), base_url: GEMINI_BASE_URL.to_string() }
    }

    fn build_request(&self, prompt: &str, system: Option<&str>) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ApiMessage { role: "system", content: system.to_string() });
        }
        messages.push(ApiMessage { role: "user", content: prompt.to_string() });

        ChatCompletionRequest { model: self.model.clone(), messages }
    }

    async fn execute_with_retry(&self, request: &ChatCompletionRequest) -> Result<String, CompletionFailure> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut attempt = 0u32;

        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: ChatCompletionResponse = resp
                            .json()
                            .await
                            .map_err(|e| CompletionFailure(format!("malformed completion response: {e}")))?;
                        let text = parsed
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content)
                            .ok_or_else(|| CompletionFailure("completion response had no choices".to_string()))?;
                        return Ok(text);
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt >= MAX_RETRIES {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(CompletionFailure(format!("completion request failed with {status}: {body}")));
                    }
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(CompletionFailure(format!("completion request failed: {e}")));
                    }
                }
            }

            attempt += 1;
            let backoff = std::time::Duration::from_secs(2u64.pow(attempt));
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl Completion for GeminiCompletion {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionFailure> {
        let request = self.build_request(prompt, system);
        self.execute_with_retry(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_includes_system_message_when_given() {
        let provider = GeminiCompletion::new("key", "gemini-2.5-flash");
        let request = provider.build_request("hello", Some("be terse"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
    }

    #[test]
    fn build_request_omits_system_message_when_absent() {
        let provider = GeminiCompletion::new("key", "gemini-2.5-flash");
        let request = provider.build_request("hello", None);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }
}
