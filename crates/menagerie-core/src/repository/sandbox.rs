//! Sandbox repository trait definition.

use menagerie_types::assistant::Assistant;
use menagerie_types::error::RepositoryError;
use menagerie_types::sandbox::{SandboxAssistant, SandboxId};

/// Repository trait for sandbox assistant persistence.
///
/// Implementations live in menagerie-infra (e.g., `SqliteSandboxRepository`).
pub trait SandboxRepository: Send + Sync {
    /// Persist a new sandbox in Draft state.
    fn create(
        &self,
        sandbox: &SandboxAssistant,
    ) -> impl std::future::Future<Output = Result<SandboxAssistant, RepositoryError>> + Send;

    /// Get a sandbox by ID. Promoted sandboxes are deleted on promotion,
    /// so this returns `None` for them.
    fn get(
        &self,
        id: &SandboxId,
    ) -> impl std::future::Future<Output = Result<Option<SandboxAssistant>, RepositoryError>> + Send;

    /// List all sandbox rows, newest first (administrative browsing).
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SandboxAssistant>, RepositoryError>> + Send;

    /// Update a sandbox (status transition, trial counter).
    fn update(
        &self,
        sandbox: &SandboxAssistant,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Atomically apply a promotion: upsert the production assistant for
    /// the sandbox's animal and delete the sandbox row, as one storage
    /// transaction. No reader of the assistant table ever observes a
    /// half-updated record. Returns the assistant as stored (the existing
    /// assistant ID is preserved when the animal already had one).
    fn promote(
        &self,
        sandbox_id: &SandboxId,
        assistant: &Assistant,
    ) -> impl std::future::Future<Output = Result<Assistant, RepositoryError>> + Send;

    /// Delete a sandbox row (expiry reaping).
    fn delete(
        &self,
        id: &SandboxId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
