use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonalityId(pub Uuid);

impl PersonalityId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for PersonalityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PersonalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PersonalityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A reusable personality definition shared across assistants.
///
/// The `version` counter is bumped on every replace-in-place edit. Compiled
/// prompt hashes embed `id@version`, so an edit makes every cached prompt
/// referencing this personality stale on its next read -- no fan-out
/// invalidation is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    pub id: PersonalityId,
    /// Short display name (e.g. "gentle-storyteller").
    pub name: String,
    /// Freeform description injected into the effective prompt.
    pub description: String,
    /// Monotonically increasing edit counter, starts at 1.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a personality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePersonalityRequest {
    pub name: String,
    pub description: String,
}

/// Request to edit a personality in place. Bumps the version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePersonalityRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}
