//! Chat-completion client for inferring missing field values

use super::prompt::{build_user_prompt, missing_fields, SYSTEM_PROMPT};
use super::CompletionError;
use crate::config::LlmConfig;
use crate::form::{Completions, FormSchema, SubmissionValues};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest error body kept from a failed response
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for an OpenAI-compatible chat-completion endpoint
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            timeout: config.timeout,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// Ask the model for values of the still-empty text fields.
    ///
    /// Transport failures, timeouts, 429 and 5xx responses are retried up to
    /// `max_retries` times with exponential backoff.
    pub async fn complete(
        &self,
        api_key: &str,
        schema: &FormSchema,
        values: &SubmissionValues,
    ) -> Result<Completions, CompletionError> {
        if missing_fields(schema, values).is_empty() {
            tracing::debug!("No empty fields, skipping completion request");
            return Ok(Completions::new());
        }

        let user_prompt = build_user_prompt(schema, values);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut attempt = 0;
        let content = loop {
            match self.send_once(api_key, &request).await {
                Ok(content) => break content,
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        let completions = parse_completions(&content)?;
        tracing::info!(proposed = completions.len(), "Received field completions");
        Ok(completions)
    }

    async fn send_once(
        &self,
        api_key: &str,
        request: &ChatRequest<'_>,
    ) -> Result<String, CompletionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout.as_secs())
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            let cut = (0..=MAX_ERROR_BODY.min(body.len()))
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            body.truncate(cut);
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout.as_secs())
            } else {
                CompletionError::MalformedResponse(e.to_string())
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("response has no content".into()))
    }
}

/// Parse the model's message into field values.
///
/// Accepts a bare JSON object or one wrapped in a Markdown code fence.
/// Strings are kept, numbers and booleans are stringified, everything else
/// (and empty strings) is dropped.
pub fn parse_completions(content: &str) -> Result<Completions, CompletionError> {
    let body = strip_code_fence(content);

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let serde_json::Value::Object(object) = value else {
        return Err(CompletionError::MalformedResponse(
            "expected a JSON object".into(),
        ));
    };

    let completions = object
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            let text = text.trim().to_string();
            (!text.is_empty()).then_some((key, text))
        })
        .collect();

    Ok(completions)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
