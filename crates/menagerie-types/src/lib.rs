//! Shared domain types for Menagerie.
//!
//! This crate contains the core domain types used across the Menagerie
//! platform: Animal, Personality, Guardrail, Assistant, SandboxAssistant,
//! ConversationSession, ConversationTurn, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod animal;
pub mod assistant;
pub mod config;
pub mod conversation;
pub mod error;
pub mod generate;
pub mod guardrail;
pub mod personality;
pub mod sandbox;
