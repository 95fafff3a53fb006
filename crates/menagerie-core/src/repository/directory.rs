//! Directory repository trait definition.
//!
//! The directory holds the shared configuration components (personalities,
//! guardrails) and the animal roster that assistants are assembled from.
//! Grouped into one trait because all three are small read-mostly tables
//! accessed together on every prompt compilation.

use menagerie_types::animal::{Animal, AnimalId};
use menagerie_types::error::RepositoryError;
use menagerie_types::guardrail::{Guardrail, GuardrailId};
use menagerie_types::personality::{Personality, PersonalityId};

/// Repository trait for directory entities.
///
/// Implementations live in menagerie-infra (e.g., `SqliteDirectoryRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait DirectoryRepository: Send + Sync {
    // --- Personalities ---

    fn create_personality(
        &self,
        personality: &Personality,
    ) -> impl std::future::Future<Output = Result<Personality, RepositoryError>> + Send;

    fn get_personality(
        &self,
        id: &PersonalityId,
    ) -> impl std::future::Future<Output = Result<Option<Personality>, RepositoryError>> + Send;

    fn list_personalities(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Personality>, RepositoryError>> + Send;

    /// Replace a personality in place. The caller is responsible for
    /// bumping `version` before persisting.
    fn update_personality(
        &self,
        personality: &Personality,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // --- Guardrails ---

    fn create_guardrail(
        &self,
        guardrail: &Guardrail,
    ) -> impl std::future::Future<Output = Result<Guardrail, RepositoryError>> + Send;

    fn get_guardrail(
        &self,
        id: &GuardrailId,
    ) -> impl std::future::Future<Output = Result<Option<Guardrail>, RepositoryError>> + Send;

    fn list_guardrails(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Guardrail>, RepositoryError>> + Send;

    /// Replace a guardrail in place. The caller bumps `version` first.
    fn update_guardrail(
        &self,
        guardrail: &Guardrail,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // --- Animals ---

    fn create_animal(
        &self,
        animal: &Animal,
    ) -> impl std::future::Future<Output = Result<Animal, RepositoryError>> + Send;

    fn get_animal(
        &self,
        id: &AnimalId,
    ) -> impl std::future::Future<Output = Result<Option<Animal>, RepositoryError>> + Send;

    fn list_animals(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Animal>, RepositoryError>> + Send;

    /// Flip an animal's active flag.
    fn set_animal_active(
        &self,
        id: &AnimalId,
        active: bool,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
