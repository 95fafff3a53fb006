use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animal::AnimalId;
use crate::guardrail::GuardrailId;
use crate::personality::PersonalityId;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a sandbox assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxId(pub Uuid);

impl SandboxId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SandboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SandboxId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Sandbox lifecycle states.
///
/// `Draft --(confirm after >=1 trial turn)--> Tested --(promote)--> Promoted`;
/// `Draft|Tested --(TTL elapsed)--> Expired`. Promoted and Expired are
/// terminal and non-resumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Draft,
    Tested,
    Promoted,
    Expired,
}

impl SandboxStatus {
    /// Whether a sandbox in this state can still run trial turns.
    pub fn is_usable(&self) -> bool {
        matches!(self, SandboxStatus::Draft | SandboxStatus::Tested)
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxStatus::Draft => write!(f, "draft"),
            SandboxStatus::Tested => write!(f, "tested"),
            SandboxStatus::Promoted => write!(f, "promoted"),
            SandboxStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for SandboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(SandboxStatus::Draft),
            "tested" => Ok(SandboxStatus::Tested),
            "promoted" => Ok(SandboxStatus::Promoted),
            "expired" => Ok(SandboxStatus::Expired),
            other => Err(format!("invalid sandbox status: '{other}'")),
        }
    }
}

/// An ephemeral, TTL-bound draft configuration for one animal.
///
/// Sandboxes let an editor trial a new personality/guardrail/knowledge
/// combination against the live generator without touching the production
/// assistant. Expiry is a check-on-access invariant: any lifecycle call
/// after `expires_at` transitions the row to Expired and fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxAssistant {
    pub id: SandboxId,
    /// The animal whose production assistant a promotion would replace.
    pub animal_id: AnimalId,
    pub personality_id: PersonalityId,
    pub guardrail_id: GuardrailId,
    pub knowledge_ref_ids: Vec<String>,
    pub status: SandboxStatus,
    /// Number of successful trial turns run against this sandbox.
    pub trial_turn_count: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SandboxAssistant {
    /// Whether the TTL has elapsed at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Request to open a sandbox for an animal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSandboxRequest {
    pub animal_id: AnimalId,
    pub personality_id: PersonalityId,
    pub guardrail_id: GuardrailId,
    #[serde(default)]
    pub knowledge_ref_ids: Vec<String>,
}
