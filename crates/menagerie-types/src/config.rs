//! Global configuration shape, loaded from `config.toml` in the data
//! directory by menagerie-infra.

use serde::{Deserialize, Serialize};

/// Platform-wide configuration with conservative defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Prior turns sent to the generator when the caller does not override.
    #[serde(default = "default_context_turns")]
    pub default_context_turns: u32,
    /// Timeout applied around every reply generator call.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Reply generator endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Base URL of the reply generator service.
    #[serde(default = "default_generator_url")]
    pub base_url: String,
    /// Model identifier forwarded with each request.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_context_turns() -> u32 {
    10
}

fn default_reply_timeout_ms() -> u64 {
    30_000
}

fn default_generator_url() -> String {
    "http://localhost:8089".to_string()
}

fn default_model() -> String {
    "ambassador-large".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_context_turns: default_context_turns(),
            reply_timeout_ms: default_reply_timeout_ms(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}
