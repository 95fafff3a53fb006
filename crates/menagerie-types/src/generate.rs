//! Reply generator request/response types.
//!
//! The reply generator is an external collaborator: given an effective
//! system prompt and windowed turn history, it returns reply text plus
//! usage metadata. These types model that boundary.

use serde::{Deserialize, Serialize};

use crate::conversation::TurnRole;

/// One prior exchange handed to the generator as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: TurnRole,
    pub content: String,
}

/// A request to the reply generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRequest {
    /// The compiled effective system prompt.
    pub system_prompt: String,
    /// Bounded window of prior turns, oldest first.
    pub history: Vec<HistoryMessage>,
    /// The new user message.
    pub message: String,
}

/// What the generator hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyOutput {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Wall-clock generation time as measured by the adapter.
    pub processing_ms: u64,
}

impl ReplyOutput {
    pub fn tokens_used(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Errors from reply generator adapters.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generator error: {0}")]
    Provider(String),

    #[error("generator returned malformed payload: {0}")]
    Deserialization(String),

    #[error("generator authentication failed")]
    AuthenticationFailed,

    #[error("generator unreachable: {0}")]
    Unreachable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_used_sums_both_directions() {
        let output = ReplyOutput {
            content: "Quills are modified hairs!".to_string(),
            model: "ambassador-large".to_string(),
            input_tokens: 120,
            output_tokens: 35,
            processing_ms: 240,
        };
        assert_eq!(output.tokens_used(), 155);
    }

    #[test]
    fn test_reply_request_serde_roundtrip() {
        let req = ReplyRequest {
            system_prompt: "<personality>...</personality>".to_string(),
            history: vec![HistoryMessage {
                role: TurnRole::User,
                content: "Hello!".to_string(),
            }],
            message: "Tell me about quills".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let parsed: ReplyRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.history.len(), 1);
        assert_eq!(parsed.message, "Tell me about quills");
    }
}
