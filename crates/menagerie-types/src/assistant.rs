use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animal::AnimalId;
use crate::guardrail::GuardrailId;
use crate::personality::PersonalityId;

use std::fmt;
use std::str::FromStr;

/// Maximum number of knowledge references an assistant may carry.
pub const MAX_KNOWLEDGE_REFS: usize = 50;

/// Unique identifier for a production assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssistantId(pub Uuid);

impl AssistantId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AssistantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssistantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssistantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle states of a production assistant.
///
/// - Active: serves conversation traffic
/// - Inactive: paused by an operator, configuration preserved
/// - Error: last lazy recompilation failed (dangling personality/guardrail)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantStatus {
    Active,
    Inactive,
    Error,
}

impl fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistantStatus::Active => write!(f, "active"),
            AssistantStatus::Inactive => write!(f, "inactive"),
            AssistantStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for AssistantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AssistantStatus::Active),
            "inactive" => Ok(AssistantStatus::Inactive),
            "error" => Ok(AssistantStatus::Error),
            other => Err(format!("invalid assistant status: '{other}'")),
        }
    }
}

impl Default for AssistantStatus {
    fn default() -> Self {
        AssistantStatus::Active
    }
}

/// The live behavioral configuration for one animal ambassador.
///
/// At most one assistant exists per animal (UNIQUE constraint on
/// `animal_id`). Conversation traffic reads assistants but never writes
/// them; the only writers are the assistant manager and sandbox promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: AssistantId,
    /// The animal this assistant speaks for. Immutable after creation.
    pub animal_id: AnimalId,
    pub personality_id: PersonalityId,
    pub guardrail_id: GuardrailId,
    /// External knowledge reference identifiers, at most
    /// [`MAX_KNOWLEDGE_REFS`]. Content is fetched by the reply generator.
    pub knowledge_ref_ids: Vec<String>,
    pub status: AssistantStatus,
    /// Hash of the inputs the current compiled prompt was built from.
    /// Compared against a freshly computed hash on every prompt read.
    pub compiled_prompt_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to configure an animal's assistant for the first time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssistantRequest {
    pub animal_id: AnimalId,
    pub personality_id: PersonalityId,
    pub guardrail_id: GuardrailId,
    #[serde(default)]
    pub knowledge_ref_ids: Vec<String>,
}

/// Partial update to an assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAssistantRequest {
    /// Accepted only when it matches the existing assignment; assistants
    /// cannot be reassigned to a different animal.
    pub animal_id: Option<AnimalId>,
    pub personality_id: Option<PersonalityId>,
    pub guardrail_id: Option<GuardrailId>,
    pub knowledge_ref_ids: Option<Vec<String>>,
    pub status: Option<AssistantStatus>,
}

impl UpdateAssistantRequest {
    /// Whether this update swaps any prompt-affecting component.
    pub fn changes_configuration(&self) -> bool {
        self.personality_id.is_some()
            || self.guardrail_id.is_some()
            || self.knowledge_ref_ids.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_status_roundtrip() {
        for status in [
            AssistantStatus::Active,
            AssistantStatus::Inactive,
            AssistantStatus::Error,
        ] {
            let parsed: AssistantStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_update_request_configuration_change_detection() {
        let status_only = UpdateAssistantRequest {
            status: Some(AssistantStatus::Inactive),
            ..Default::default()
        };
        assert!(!status_only.changes_configuration());

        let swap = UpdateAssistantRequest {
            personality_id: Some(PersonalityId::new()),
            ..Default::default()
        };
        assert!(swap.changes_configuration());
    }

    #[test]
    fn test_create_request_defaults_empty_refs() {
        let json = format!(
            r#"{{"animal_id":"{}","personality_id":"{}","guardrail_id":"{}"}}"#,
            AnimalId::new(),
            PersonalityId::new(),
            GuardrailId::new()
        );
        let req: CreateAssistantRequest = serde_json::from_str(&json).unwrap();
        assert!(req.knowledge_ref_ids.is_empty());
    }
}
