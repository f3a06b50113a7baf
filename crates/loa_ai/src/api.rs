use loa_core::domain::{ConversationTurn, Role};
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::assistant::{AssistantResponse, Citation};

/// Query-endpoint request body. The transport layer is external; this
/// module owns only the shape and its validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<WireTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireTurn {
    pub role: String,
    pub content: String,
}

impl WireTurn {
    pub fn into_turn(self) -> Result<ConversationTurn, AppError> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => {
                return Err(AppError::invalid_input(
                    "INPUT_ROLE_INVALID",
                    "Conversation roles must be \"user\" or \"assistant\"",
                )
                .with_details(format!("role={other}")))
            }
        };
        Ok(ConversationTurn {
            role,
            content: self.content,
        })
    }
}

impl QueryRequest {
    pub fn history(&self) -> Result<Vec<ConversationTurn>, AppError> {
        self.conversation_history
            .iter()
            .cloned()
            .map(WireTurn::into_turn)
            .collect()
    }
}

/// Query-endpoint response body. Field names are contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub response: String,
    pub tokens_used: u32,
    pub rag_enabled: bool,
    pub sources_used: usize,
    pub sources: Vec<Citation>,
}

impl QueryResponse {
    pub fn from_assistant(resp: &AssistantResponse) -> Self {
        Self {
            response: resp.text.clone(),
            tokens_used: resp.tokens_used,
            rag_enabled: resp.rag_enabled,
            sources_used: resp.sources.len(),
            sources: resp.sources.clone(),
        }
    }
}
