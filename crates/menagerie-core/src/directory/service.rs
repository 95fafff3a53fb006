//! Directory service for the shared configuration components.
//!
//! Personalities and guardrails are replace-in-place entities: every edit
//! bumps `version`, which is the marker the prompt input hash embeds.
//! Stale compiled prompts are then caught lazily by hash comparison --
//! there is no reverse-reference tracking or fan-out invalidation.

use chrono::Utc;
use tracing::info;

use menagerie_types::animal::{Animal, AnimalId, CreateAnimalRequest};
use menagerie_types::error::RepositoryError;
use menagerie_types::guardrail::{
    CreateGuardrailRequest, Guardrail, GuardrailId, UpdateGuardrailRequest,
};
use menagerie_types::personality::{
    CreatePersonalityRequest, Personality, PersonalityId, UpdatePersonalityRequest,
};

use crate::repository::directory::DirectoryRepository;

/// Orchestrates directory entity lifecycles.
pub struct DirectoryService<D: DirectoryRepository> {
    repo: D,
}

impl<D: DirectoryRepository> DirectoryService<D> {
    pub fn new(repo: D) -> Self {
        Self { repo }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &D {
        &self.repo
    }

    // --- Personalities ---

    pub async fn create_personality(
        &self,
        request: CreatePersonalityRequest,
    ) -> Result<Personality, RepositoryError> {
        let now = Utc::now();
        let personality = Personality {
            id: PersonalityId::new(),
            name: request.name,
            description: request.description,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_personality(&personality).await
    }

    pub async fn get_personality(
        &self,
        id: &PersonalityId,
    ) -> Result<Option<Personality>, RepositoryError> {
        self.repo.get_personality(id).await
    }

    pub async fn list_personalities(&self) -> Result<Vec<Personality>, RepositoryError> {
        self.repo.list_personalities().await
    }

    /// Edit a personality in place, bumping its version.
    pub async fn update_personality(
        &self,
        id: &PersonalityId,
        request: UpdatePersonalityRequest,
    ) -> Result<Personality, RepositoryError> {
        let mut personality = self
            .repo
            .get_personality(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if let Some(name) = request.name {
            personality.name = name;
        }
        if let Some(description) = request.description {
            personality.description = description;
        }
        personality.version += 1;
        personality.updated_at = Utc::now();

        self.repo.update_personality(&personality).await?;
        info!(personality_id = %id, version = personality.version, "Personality updated");
        Ok(personality)
    }

    // --- Guardrails ---

    pub async fn create_guardrail(
        &self,
        request: CreateGuardrailRequest,
    ) -> Result<Guardrail, RepositoryError> {
        let now = Utc::now();
        let guardrail = Guardrail {
            id: GuardrailId::new(),
            name: request.name,
            rules: request.rules,
            severity: request.severity,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_guardrail(&guardrail).await
    }

    pub async fn get_guardrail(
        &self,
        id: &GuardrailId,
    ) -> Result<Option<Guardrail>, RepositoryError> {
        self.repo.get_guardrail(id).await
    }

    pub async fn list_guardrails(&self) -> Result<Vec<Guardrail>, RepositoryError> {
        self.repo.list_guardrails().await
    }

    /// Edit a guardrail in place, bumping its version.
    pub async fn update_guardrail(
        &self,
        id: &GuardrailId,
        request: UpdateGuardrailRequest,
    ) -> Result<Guardrail, RepositoryError> {
        let mut guardrail = self
            .repo
            .get_guardrail(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if let Some(name) = request.name {
            guardrail.name = name;
        }
        if let Some(rules) = request.rules {
            guardrail.rules = rules;
        }
        if let Some(severity) = request.severity {
            guardrail.severity = severity;
        }
        guardrail.version += 1;
        guardrail.updated_at = Utc::now();

        self.repo.update_guardrail(&guardrail).await?;
        info!(guardrail_id = %id, version = guardrail.version, "Guardrail updated");
        Ok(guardrail)
    }

    // --- Animals ---

    pub async fn create_animal(
        &self,
        request: CreateAnimalRequest,
    ) -> Result<Animal, RepositoryError> {
        let animal = Animal {
            id: AnimalId::new(),
            name: request.name,
            species: request.species,
            active: request.active,
            created_at: Utc::now(),
        };
        self.repo.create_animal(&animal).await
    }

    pub async fn get_animal(&self, id: &AnimalId) -> Result<Option<Animal>, RepositoryError> {
        self.repo.get_animal(id).await
    }

    pub async fn list_animals(&self) -> Result<Vec<Animal>, RepositoryError> {
        self.repo.list_animals().await
    }

    pub async fn set_animal_active(
        &self,
        id: &AnimalId,
        active: bool,
    ) -> Result<(), RepositoryError> {
        self.repo.set_animal_active(id, active).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MemoryDirectory;
    use menagerie_types::guardrail::GuardrailSeverity;

    fn service() -> DirectoryService<MemoryDirectory> {
        DirectoryService::new(MemoryDirectory::default())
    }

    #[tokio::test]
    async fn test_personality_update_bumps_version() {
        let svc = service();
        let p = svc
            .create_personality(CreatePersonalityRequest {
                name: "gentle-storyteller".to_string(),
                description: "Warm and patient".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(p.version, 1);

        let updated = svc
            .update_personality(
                &p.id,
                UpdatePersonalityRequest {
                    name: None,
                    description: Some("Warm, patient, loves a tale".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.name, "gentle-storyteller");
    }

    #[tokio::test]
    async fn test_guardrail_update_missing_fails_not_found() {
        let svc = service();
        let err = svc
            .update_guardrail(
                &GuardrailId::new(),
                UpdateGuardrailRequest {
                    name: None,
                    rules: None,
                    severity: Some(GuardrailSeverity::Strict),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
