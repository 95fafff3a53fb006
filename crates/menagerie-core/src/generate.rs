//! ReplyGenerator trait definition.
//!
//! The reply generator is the external collaborator that turns an
//! effective system prompt plus windowed history into reply text. The
//! engine never calls a model directly; it goes through this port.
//! Implementations live in menagerie-infra (e.g., `HttpReplyGenerator`).

use menagerie_types::generate::{GenerateError, ReplyOutput, ReplyRequest};

/// Trait for reply generator backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition) consistent
/// with all async traits in this project. Callers are expected to wrap
/// `generate` in a timeout; adapters do not enforce one themselves.
pub trait ReplyGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "http", "scripted").
    fn name(&self) -> &str;

    /// Produce a reply for the given prompt, history, and user message.
    fn generate(
        &self,
        request: &ReplyRequest,
    ) -> impl std::future::Future<Output = Result<ReplyOutput, GenerateError>> + Send;
}
