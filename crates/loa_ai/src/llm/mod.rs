use loa_core::domain::ConversationTurn;
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

pub mod http_chat;

pub use http_chat::HttpChatModel;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompletion {
    pub text: String,
    pub tokens_used: u32,
}

/// Seam over the language model. Implementations receive the system prompt
/// separately from the conversation; the current user turn is already the
/// last message.
pub trait ChatModel: Send + Sync {
    fn complete(
        &self,
        system: &str,
        messages: &[ConversationTurn],
    ) -> Result<ChatCompletion, AppError>;
}
