//! Extraction through a local Ollama server.
//!
//! Calls `POST {api_url}/api/chat` with `format: "json"` and
//! `stream: false` using [`reqwest`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use procura_core::error::CoreError;
use procura_core::requirements::{Measure, Requirements};

use super::{cut_json_object, ExtractionCapability};

/// Model used when `OLLAMA_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "tinyllama";

/// Server used when `OLLAMA_URL` is unset.
pub const DEFAULT_URL: &str = "http://localhost:11434";

const RFP_SYSTEM_PROMPT: &str = "You are a procurement analyst. Reply with one JSON object only.";

const PROPOSAL_SYSTEM_PROMPT: &str =
    "You read vendor proposals and reply with one JSON object only.";

/// HTTP client for one Ollama instance.
pub struct OllamaCapability {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

/// Errors from the Ollama HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    /// The HTTP request itself failed (connect, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Ollama returned a non-2xx status code.
    #[error("Ollama API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl From<OllamaError> for CoreError {
    fn from(err: OllamaError) -> Self {
        CoreError::DependencyUnavailable {
            dependency: "ollama",
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    format: &'static str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

impl OllamaCapability {
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:11434`.
    pub fn new(api_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, model)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One non-streaming chat turn; returns the assistant's content.
    async fn chat(&self, system: &str, prompt: &str) -> Result<String, OllamaError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            format: "json",
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.api_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        let reply: ChatResponse = response.json().await?;
        Ok(reply.message.content)
    }
}

#[async_trait]
impl ExtractionCapability for OllamaCapability {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn extract_rfp(&self, text: &str) -> Result<Value, CoreError> {
        let reply = self.chat(RFP_SYSTEM_PROMPT, &rfp_prompt(text)).await?;
        tracing::debug!(model = %self.model, reply_len = reply.len(), "Ollama RFP reply");
        Ok(cut_json_object(&reply))
    }

    async fn extract_proposal(
        &self,
        text: &str,
        requirements: &Requirements,
    ) -> Result<Value, CoreError> {
        let prompt = proposal_prompt(text, requirements);
        let reply = self.chat(PROPOSAL_SYSTEM_PROMPT, &prompt).await?;
        tracing::debug!(model = %self.model, reply_len = reply.len(), "Ollama proposal reply");
        Ok(cut_json_object(&reply))
    }
}

fn rfp_prompt(text: &str) -> String {
    format!(
        r#"Turn this procurement request into a structured RFP.

Request:
{text}

Use null for anything the request does not state. Do not invent values.
Return exactly this JSON shape:
{{
  "title": "short title",
  "description": "one paragraph summary of the need",
  "requirements": {{
    "items": [{{"name": "laptop", "quantity": 50, "specifications": "16GB RAM"}}],
    "delivery_timeline": "30 days",
    "payment_terms": "net 30",
    "warranty": "1 year"
  }},
  "budget": 100000,
  "deadline": "YYYY-MM-DD"
}}"#
    )
}

fn proposal_prompt(text: &str, requirements: &Requirements) -> String {
    let keys: Vec<&str> = requirements
        .criteria
        .iter()
        .filter_map(|c| match &c.measure {
            Measure::Specification { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect();
    let spec_hint = if keys.is_empty() {
        String::new()
    } else {
        format!("\nUnder \"specifications\", report these keys if stated: {}.\n", keys.join(", "))
    };

    format!(
        r#"Extract the offer from this vendor proposal.

Proposal:
{text}
{spec_hint}
Use null for anything the proposal does not state. Do not invent values.
Return exactly this JSON shape:
{{
  "price": 12500,
  "price_currency": "USD",
  "delivery_time": "14 days",
  "warranty": "2 years",
  "payment_terms": "net 30",
  "specifications": {{"key": "value"}},
  "special_conditions": "notes"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use procura_core::requirements::Criterion;

    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let cap = OllamaCapability::new("http://ollama:11434/", DEFAULT_MODEL);
        assert_eq!(cap.api_url, "http://ollama:11434");
        assert_eq!(cap.model(), "tinyllama");
    }

    #[test]
    fn proposal_prompt_names_specification_keys() {
        let requirements = Requirements {
            criteria: vec![Criterion::new(
                "ram",
                None,
                Measure::Specification {
                    key: "ram".into(),
                    expected: "16GB".into(),
                },
            )],
            items: Vec::new(),
        };
        let prompt = proposal_prompt("We offer laptops.", &requirements);
        assert!(prompt.contains("report these keys if stated: ram."));
        assert!(prompt.contains("We offer laptops."));
    }

    #[test]
    fn chat_request_serializes_non_streaming_json_mode() {
        let body = ChatRequest {
            model: "tinyllama",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            format: "json",
            stream: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], "json");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn unreachable_server_is_dependency_unavailable() {
        let cap = OllamaCapability::new("http://127.0.0.1:9", DEFAULT_MODEL);
        let err = cap.extract_rfp("Need 10 laptops").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::DependencyUnavailable {
                dependency: "ollama",
                ..
            }
        ));
    }
}
