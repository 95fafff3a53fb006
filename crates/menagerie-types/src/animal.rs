use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for an animal ambassador, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimalId(pub Uuid);

impl AnimalId {
    /// Create a new AnimalId using UUID v7 (time-sortable).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AnimalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnimalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An animal ambassador in the zoo directory.
///
/// Animals are directory entities: the engine reads them to validate that
/// an assistant's target exists and is active, and to denormalize the
/// display name onto sessions. Conversation traffic never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    /// Display name shown to visitors (e.g. "Bella").
    pub name: String,
    /// Species label (e.g. "African crested porcupine").
    pub species: String,
    /// Inactive animals cannot receive new assistants or conversations.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new animal in the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnimalRequest {
    pub name: String,
    pub species: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
