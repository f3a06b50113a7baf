use std::time::Duration;

use loa_core::domain::ConversationTurn;
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{ChatCompletion, ChatModel};

/// HTTP client for an OpenAI-style chat completions endpoint. The timeout
/// doubles as the request's soft deadline: when it elapses the call is
/// given up on and the error surfaces to the caller.
#[derive(Debug, Clone)]
pub struct HttpChatModel {
    url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpChatModel {
    pub fn new(url: &str, api_key: &str, model: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

impl ChatModel for HttpChatModel {
    fn complete(
        &self,
        system: &str,
        messages: &[ConversationTurn],
    ) -> Result<ChatCompletion, AppError> {
        let mut wire: Vec<WireMessage<'_>> = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: system,
        });
        for turn in messages {
            wire.push(WireMessage {
                role: turn.role.as_str(),
                content: &turn.content,
            });
        }

        let req = ChatRequest {
            model: &self.model,
            messages: wire,
        };
        let resp = ureq::post(&self.url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send_json(serde_json::to_value(&req).map_err(|e| {
                AppError::new("AI_COMPLETION_FAILED", "Failed to encode completion request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: ChatResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_COMPLETION_FAILED", "Failed to decode completion response")
                        .with_details(e.to_string())
                })?;
                let text = v
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(AppError::new(
                        "AI_COMPLETION_FAILED",
                        "Completion response was empty",
                    ));
                }
                Ok(ChatCompletion {
                    text,
                    tokens_used: v.usage.map(|u| u.total_tokens).unwrap_or(0),
                })
            }
            Ok(r) => {
                let status = r.status();
                Err(
                    AppError::new("AI_COMPLETION_FAILED", "Completion request failed")
                        .with_details(format!("status={status}"))
                        .with_retryable(status == 429 || status >= 500),
                )
            }
            Err(ureq::Error::Status(status, _)) => Err(AppError::new(
                "AI_COMPLETION_FAILED",
                "Completion request failed",
            )
            .with_details(format!("status={status}"))
            .with_retryable(status == 429 || status >= 500)),
            Err(e) => Err(
                AppError::new("AI_COMPLETION_FAILED", "Failed to call completion endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
