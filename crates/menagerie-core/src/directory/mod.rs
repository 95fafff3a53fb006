//! Directory management: personalities, guardrails, and the animal roster.

pub mod service;

pub use service::DirectoryService;
