use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a guardrail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuardrailId(pub Uuid);

impl GuardrailId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for GuardrailId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GuardrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GuardrailId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How strictly a guardrail's rules are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailSeverity {
    Relaxed,
    Standard,
    Strict,
}

impl fmt::Display for GuardrailSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardrailSeverity::Relaxed => write!(f, "relaxed"),
            GuardrailSeverity::Standard => write!(f, "standard"),
            GuardrailSeverity::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for GuardrailSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relaxed" => Ok(GuardrailSeverity::Relaxed),
            "standard" => Ok(GuardrailSeverity::Standard),
            "strict" => Ok(GuardrailSeverity::Strict),
            other => Err(format!("invalid guardrail severity: '{other}'")),
        }
    }
}

impl Default for GuardrailSeverity {
    fn default() -> Self {
        GuardrailSeverity::Standard
    }
}

/// A safety guardrail: an ordered sequence of rule texts plus a severity.
///
/// Rules keep their stored order when compiled into the effective prompt.
/// Versioning works like [`crate::personality::Personality`]: edits bump
/// `version` and stale compiled prompts are caught by hash comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardrail {
    pub id: GuardrailId,
    /// Short display name (e.g. "family-strict").
    pub name: String,
    /// Ordered rule texts, one behavioral constraint per entry.
    pub rules: Vec<String>,
    pub severity: GuardrailSeverity,
    /// Monotonically increasing edit counter, starts at 1.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a guardrail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGuardrailRequest {
    pub name: String,
    pub rules: Vec<String>,
    #[serde(default)]
    pub severity: GuardrailSeverity,
}

/// Request to edit a guardrail in place. Bumps the version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGuardrailRequest {
    pub name: Option<String>,
    pub rules: Option<Vec<String>>,
    pub severity: Option<GuardrailSeverity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_roundtrip() {
        for severity in [
            GuardrailSeverity::Relaxed,
            GuardrailSeverity::Standard,
            GuardrailSeverity::Strict,
        ] {
            let s = severity.to_string();
            let parsed: GuardrailSeverity = s.parse().unwrap();
            assert_eq!(severity, parsed);
        }
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&GuardrailSeverity::Strict).unwrap();
        assert_eq!(json, "\"strict\"");
    }

    #[test]
    fn test_guardrail_rules_preserve_order() {
        let g = Guardrail {
            id: GuardrailId::new(),
            name: "family-strict".to_string(),
            rules: vec![
                "No scary stories".to_string(),
                "Redirect off-topic questions to animal facts".to_string(),
            ],
            severity: GuardrailSeverity::Strict,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&g).unwrap();
        let parsed: Guardrail = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rules[0], "No scary stories");
        assert_eq!(parsed.rules.len(), 2);
    }
}
