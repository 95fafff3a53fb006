//! Conversation session engine.

pub mod service;

pub use service::ConversationService;

use std::time::Duration;

use menagerie_types::config::GlobalConfig;

/// Tunables for the conversation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Prior turns sent to the generator when the caller does not override.
    pub default_context_turns: u32,
    /// Timeout applied around every reply generator call.
    pub reply_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_context_turns: 10,
            reply_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&GlobalConfig> for EngineConfig {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            default_context_turns: config.default_context_turns,
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
        }
    }
}
