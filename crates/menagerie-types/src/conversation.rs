//! Conversation session and turn types.
//!
//! A session is the ordered sequence of turns between one visitor and one
//! animal ambassador. Turns are immutable once written; a user turn and its
//! paired assistant turn are always persisted together or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animal::AnimalId;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TurnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// A conversation between one visitor and one animal ambassador.
///
/// A session row exists only once its first turn pair is committed; there
/// is no "closed" state -- sessions accumulate turns until deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,
    /// Visitor identifier supplied by the caller (opaque to the engine).
    pub user_id: String,
    pub animal_id: AnimalId,
    /// Animal display name, denormalized at session creation.
    pub animal_name: String,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    /// Total turns persisted (always even under normal execution).
    pub message_count: i64,
}

/// Generator metadata recorded on assistant-authored turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub model: String,
    pub tokens_used: u32,
    pub processing_ms: u64,
}

/// A single persisted turn.
///
/// `seq` is assigned inside the pair-write transaction and is strictly
/// increasing within a session; readers order by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub seq: i64,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Present on assistant-authored turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal_name: Option<String>,
    /// Present on assistant-authored turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
}

/// A turn request entering the conversation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTurnRequest {
    /// Existing session to continue; a new session is created when absent.
    pub session_id: Option<SessionId>,
    pub animal_id: AnimalId,
    pub user_id: String,
    pub message: String,
    /// How many prior turns to send to the generator (default 10).
    pub context_turns: Option<u32>,
    /// Optional client-generated idempotency key. A resubmission with the
    /// same key returns the original receipt without generating again.
    pub request_id: Option<String>,
}

/// What `post_turn` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReceipt {
    pub reply: String,
    pub session_id: SessionId,
    /// Id of the assistant-authored turn.
    pub turn_id: TurnId,
    /// Sequence number of the assistant-authored turn within the session.
    pub seq: i64,
    pub timestamp: DateTime<Utc>,
    pub metadata: TurnMetadata,
}

/// Scope selector for history retrieval and deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryFilter {
    Session(SessionId),
    Animal(AnimalId),
    User(String),
}

impl fmt::Display for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryFilter::Session(id) => write!(f, "session:{id}"),
            HistoryFilter::Animal(id) => write!(f, "animal:{id}"),
            HistoryFilter::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// A session envelope plus its ordered turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session: ConversationSession,
    pub turns: Vec<ConversationTurn>,
}

/// Administrative projection over a session. `duration_seconds` and the
/// preview are derived at read time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: ConversationSession,
    pub duration_seconds: i64,
    /// First user message, truncated for listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_role_roundtrip() {
        for role in [TurnRole::User, TurnRole::Assistant] {
            let parsed: TurnRole = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_turn_serde_omits_empty_metadata() {
        let turn = ConversationTurn {
            id: TurnId::new(),
            session_id: SessionId::new(),
            seq: 1,
            role: TurnRole::User,
            content: "Hello!".to_string(),
            created_at: Utc::now(),
            animal_name: None,
            metadata: None,
        };
        let json = serde_json::to_string(&turn).unwrap();
        assert!(!json.contains("metadata"));
        assert!(!json.contains("animal_name"));
    }

    #[test]
    fn test_assistant_turn_carries_metadata() {
        let turn = ConversationTurn {
            id: TurnId::new(),
            session_id: SessionId::new(),
            seq: 2,
            role: TurnRole::Assistant,
            content: "Hi there, I'm Bella!".to_string(),
            created_at: Utc::now(),
            animal_name: Some("Bella".to_string()),
            metadata: Some(TurnMetadata {
                model: "ambassador-large".to_string(),
                tokens_used: 42,
                processing_ms: 180,
            }),
        };
        let json = serde_json::to_string(&turn).unwrap();
        let parsed: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.metadata.unwrap().tokens_used, 42);
        assert_eq!(parsed.animal_name.as_deref(), Some("Bella"));
    }

    #[test]
    fn test_history_filter_display() {
        let f = HistoryFilter::User("visitor-7".to_string());
        assert_eq!(f.to_string(), "user:visitor-7");
    }
}
