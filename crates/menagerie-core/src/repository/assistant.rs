//! Assistant repository trait definition.

use menagerie_types::animal::AnimalId;
use menagerie_types::assistant::{Assistant, AssistantId};
use menagerie_types::error::RepositoryError;

/// Repository trait for production assistant persistence.
///
/// Implementations live in menagerie-infra (e.g., `SqliteAssistantRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait AssistantRepository: Send + Sync {
    /// Conditionally create an assistant.
    ///
    /// The store enforces at-most-one assistant per animal; a concurrent
    /// or repeated create for the same `animal_id` fails with
    /// `RepositoryError::Conflict` and leaves the existing row untouched.
    fn create(
        &self,
        assistant: &Assistant,
    ) -> impl std::future::Future<Output = Result<Assistant, RepositoryError>> + Send;

    /// Get an assistant by its unique ID.
    fn get_by_id(
        &self,
        id: &AssistantId,
    ) -> impl std::future::Future<Output = Result<Option<Assistant>, RepositoryError>> + Send;

    /// Get the assistant configured for an animal, if any.
    fn get_by_animal(
        &self,
        animal_id: &AnimalId,
    ) -> impl std::future::Future<Output = Result<Option<Assistant>, RepositoryError>> + Send;

    /// List all assistants, newest first.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Assistant>, RepositoryError>> + Send;

    /// Update an existing assistant (component swap, status, prompt hash).
    fn update(
        &self,
        assistant: &Assistant,
    ) -> impl std::future::Future<Output = Result<Assistant, RepositoryError>> + Send;

    /// Permanently delete an assistant. Conversation history is NOT
    /// cascaded; history deletion is a separate explicit operation.
    fn delete(
        &self,
        id: &AssistantId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
