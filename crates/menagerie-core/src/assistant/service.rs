//! Assistant management service.
//!
//! Owns the lifecycle of production assistants: one per animal, created
//! when an animal's chatbot behavior is first configured, mutated on
//! component swap or status change, and never written by conversation
//! traffic.
//!
//! Compiled prompts are cached in-process but the cache is an optimization
//! only: every read recomputes the input hash from current directory state
//! and a mismatch forces recompilation. Losing the cache is always safe.

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};

use menagerie_types::animal::{Animal, AnimalId};
use menagerie_types::assistant::{
    Assistant, AssistantId, AssistantStatus, CreateAssistantRequest, MAX_KNOWLEDGE_REFS,
    UpdateAssistantRequest,
};
use menagerie_types::error::{AssistantError, PromptError, RepositoryError};
use menagerie_types::guardrail::Guardrail;
use menagerie_types::personality::Personality;

use crate::hash::ContentHasher;
use crate::prompt::{self, CompiledPrompt};
use crate::repository::assistant::AssistantRepository;
use crate::repository::directory::DirectoryRepository;

/// Upper bound on cached compiled prompts. The cache is cleared wholesale
/// when full; correctness never depends on what it holds.
const PROMPT_CACHE_CAPACITY: usize = 256;

/// Service orchestrating the production assistant lifecycle.
///
/// Generic over repository and hasher traits to maintain clean
/// architecture -- menagerie-core never depends on menagerie-infra.
pub struct AssistantService<A: AssistantRepository, D: DirectoryRepository, H: ContentHasher> {
    assistants: A,
    directory: D,
    hasher: H,
    prompt_cache: DashMap<AssistantId, CompiledPrompt>,
}

impl<A: AssistantRepository, D: DirectoryRepository, H: ContentHasher> AssistantService<A, D, H> {
    pub fn new(assistants: A, directory: D, hasher: H) -> Self {
        Self {
            assistants,
            directory,
            hasher,
            prompt_cache: DashMap::new(),
        }
    }

    /// Access the directory repository (animal lookups for session
    /// creation live here too).
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Configure an animal's assistant for the first time.
    ///
    /// Fails with `DuplicateAssistant` if the animal already has one (the
    /// store's conditional create makes this race-safe), `InvalidAnimal`
    /// if the animal is unknown or inactive, and `TooManyKnowledgeRefs`
    /// above the cap. Nothing is persisted when compilation fails.
    pub async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> Result<Assistant, AssistantError> {
        validate_knowledge_refs(&request.knowledge_ref_ids)?;

        let animal = self
            .directory
            .get_animal(&request.animal_id)
            .await
            .map_err(storage)?
            .filter(|a| a.active)
            .ok_or_else(|| AssistantError::InvalidAnimal(request.animal_id.to_string()))?;

        let (personality, guardrail) = self
            .resolve_components(&request)
            .await
            .map_err(AssistantError::Compile)?;

        let compiled = prompt::compile(
            &personality,
            &guardrail,
            &request.knowledge_ref_ids,
            &self.hasher,
        );

        let now = Utc::now();
        let assistant = Assistant {
            id: AssistantId::new(),
            animal_id: request.animal_id,
            personality_id: request.personality_id,
            guardrail_id: request.guardrail_id,
            knowledge_ref_ids: request.knowledge_ref_ids,
            status: AssistantStatus::Active,
            compiled_prompt_hash: compiled.input_hash.clone(),
            created_at: now,
            updated_at: now,
        };

        let assistant = self.assistants.create(&assistant).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                AssistantError::DuplicateAssistant(request.animal_id.to_string())
            }
            other => AssistantError::Storage(other.to_string()),
        })?;

        self.cache_prompt(assistant.id, compiled);
        info!(assistant_id = %assistant.id, animal = %animal.name, "Assistant created");
        Ok(assistant)
    }

    pub async fn get_assistant(&self, id: &AssistantId) -> Result<Assistant, AssistantError> {
        self.assistants
            .get_by_id(id)
            .await
            .map_err(storage)?
            .ok_or(AssistantError::NotFound)
    }

    /// The assistant configured for an animal, if any.
    pub async fn assistant_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<Option<Assistant>, AssistantError> {
        self.assistants.get_by_animal(animal_id).await.map_err(storage)
    }

    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, AssistantError> {
        self.assistants.list().await.map_err(storage)
    }

    /// Apply a partial update.
    ///
    /// `animal_id` is immutable post-creation; a differing value is
    /// rejected. Component swaps trigger recompilation; a status flip
    /// alone does not.
    pub async fn update_assistant(
        &self,
        id: &AssistantId,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant, AssistantError> {
        let mut assistant = self.get_assistant(id).await?;

        if let Some(animal_id) = request.animal_id {
            if animal_id != assistant.animal_id {
                return Err(AssistantError::AnimalReassignmentForbidden);
            }
        }

        if request.changes_configuration() {
            if let Some(personality_id) = request.personality_id {
                assistant.personality_id = personality_id;
            }
            if let Some(guardrail_id) = request.guardrail_id {
                assistant.guardrail_id = guardrail_id;
            }
            if let Some(knowledge_ref_ids) = request.knowledge_ref_ids {
                validate_knowledge_refs(&knowledge_ref_ids)?;
                assistant.knowledge_ref_ids = knowledge_ref_ids;
            }

            let (personality, guardrail) = self
                .resolve_pair(&assistant.personality_id, &assistant.guardrail_id)
                .await
                .map_err(AssistantError::Compile)?;
            let compiled = prompt::compile(
                &personality,
                &guardrail,
                &assistant.knowledge_ref_ids,
                &self.hasher,
            );
            assistant.compiled_prompt_hash = compiled.input_hash.clone();
            self.cache_prompt(assistant.id, compiled);
        }

        if let Some(status) = request.status {
            assistant.status = status;
        }
        assistant.updated_at = Utc::now();

        let assistant = self.assistants.update(&assistant).await.map_err(storage)?;
        info!(assistant_id = %id, status = %assistant.status, "Assistant updated");
        Ok(assistant)
    }

    /// The current effective prompt for an assistant.
    ///
    /// Recomputes the input hash from the directory's current state on
    /// every call and serves the cached text only when it matches. A
    /// mismatch (someone edited the shared personality or guardrail)
    /// recompiles, persists the refreshed hash, and re-caches. When the
    /// components no longer resolve the assistant is flipped to `Error`
    /// and the failure surfaces to the caller.
    pub async fn get_effective_prompt(
        &self,
        id: &AssistantId,
    ) -> Result<CompiledPrompt, AssistantError> {
        let assistant = self.get_assistant(id).await?;
        self.effective_prompt_for(&assistant).await
    }

    /// Like [`get_effective_prompt`] but for an already-loaded record
    /// (the conversation engine resolves the assistant itself first).
    ///
    /// [`get_effective_prompt`]: Self::get_effective_prompt
    pub async fn effective_prompt_for(
        &self,
        assistant: &Assistant,
    ) -> Result<CompiledPrompt, AssistantError> {
        let pair = self
            .resolve_pair(&assistant.personality_id, &assistant.guardrail_id)
            .await;

        let (personality, guardrail) = match pair {
            Ok(pair) => pair,
            Err(e) => {
                // Dangling reference: park the assistant in Error state so
                // operators can see it, then surface the failure.
                warn!(assistant_id = %assistant.id, error = %e, "Prompt compilation failed");
                let mut broken = assistant.clone();
                broken.status = AssistantStatus::Error;
                broken.updated_at = Utc::now();
                if let Err(update_err) = self.assistants.update(&broken).await {
                    warn!(assistant_id = %assistant.id, error = %update_err,
                        "Failed to record assistant error status");
                }
                return Err(AssistantError::Compile(e));
            }
        };

        let fresh_hash = prompt::input_hash(
            &personality,
            &guardrail,
            &assistant.knowledge_ref_ids,
            &self.hasher,
        );

        if assistant.compiled_prompt_hash == fresh_hash {
            if let Some(cached) = self.prompt_cache.get(&assistant.id) {
                if cached.input_hash == fresh_hash {
                    return Ok(cached.clone());
                }
            }
        }

        let compiled = prompt::compile(
            &personality,
            &guardrail,
            &assistant.knowledge_ref_ids,
            &self.hasher,
        );

        if assistant.compiled_prompt_hash != fresh_hash {
            let mut refreshed = assistant.clone();
            refreshed.compiled_prompt_hash = fresh_hash;
            refreshed.updated_at = Utc::now();
            self.assistants.update(&refreshed).await.map_err(storage)?;
            info!(assistant_id = %assistant.id, "Compiled prompt refreshed after component edit");
        }

        self.cache_prompt(assistant.id, compiled.clone());
        Ok(compiled)
    }

    /// Hard delete. Conversation history is untouched; deleting it is a
    /// separate, explicit operation on the conversation engine.
    pub async fn delete_assistant(&self, id: &AssistantId) -> Result<(), AssistantError> {
        self.assistants.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => AssistantError::NotFound,
            other => AssistantError::Storage(other.to_string()),
        })?;
        self.prompt_cache.remove(id);
        info!(assistant_id = %id, "Assistant deleted");
        Ok(())
    }

    /// Resolve an animal for session bootstrapping.
    pub async fn animal(&self, id: &AnimalId) -> Result<Option<Animal>, AssistantError> {
        self.directory.get_animal(id).await.map_err(storage)
    }

    async fn resolve_components(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<(Personality, Guardrail), PromptError> {
        self.resolve_pair(&request.personality_id, &request.guardrail_id)
            .await
    }

    async fn resolve_pair(
        &self,
        personality_id: &menagerie_types::personality::PersonalityId,
        guardrail_id: &menagerie_types::guardrail::GuardrailId,
    ) -> Result<(Personality, Guardrail), PromptError> {
        let personality = self
            .directory
            .get_personality(personality_id)
            .await
            .map_err(|e| PromptError::ConfigurationUnresolved(e.to_string()))?
            .ok_or_else(|| {
                PromptError::ConfigurationUnresolved(format!("personality {personality_id}"))
            })?;
        let guardrail = self
            .directory
            .get_guardrail(guardrail_id)
            .await
            .map_err(|e| PromptError::ConfigurationUnresolved(e.to_string()))?
            .ok_or_else(|| {
                PromptError::ConfigurationUnresolved(format!("guardrail {guardrail_id}"))
            })?;
        Ok((personality, guardrail))
    }

    fn cache_prompt(&self, id: AssistantId, compiled: CompiledPrompt) {
        if self.prompt_cache.len() >= PROMPT_CACHE_CAPACITY && !self.prompt_cache.contains_key(&id)
        {
            self.prompt_cache.clear();
        }
        self.prompt_cache.insert(id, compiled);
    }
}

fn validate_knowledge_refs(refs: &[String]) -> Result<(), AssistantError> {
    if refs.len() > MAX_KNOWLEDGE_REFS {
        return Err(AssistantError::TooManyKnowledgeRefs {
            count: refs.len(),
            max: MAX_KNOWLEDGE_REFS,
        });
    }
    Ok(())
}

fn storage(e: RepositoryError) -> AssistantError {
    AssistantError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{
        seeded_directory, MemoryAssistants, MemoryDirectory, TestHasher,
    };
    use menagerie_types::guardrail::UpdateGuardrailRequest;

    fn service(
        directory: MemoryDirectory,
    ) -> AssistantService<MemoryAssistants, MemoryDirectory, TestHasher> {
        AssistantService::new(MemoryAssistants::default(), directory, TestHasher)
    }

    fn create_request(
        directory: &crate::test_util::SeededDirectory,
    ) -> CreateAssistantRequest {
        CreateAssistantRequest {
            animal_id: directory.animal_id,
            personality_id: directory.personality_id,
            guardrail_id: directory.guardrail_id,
            knowledge_ref_ids: vec!["kb-quills".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_assistant_happy_path() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());

        let assistant = svc.create_assistant(create_request(&seeded)).await.unwrap();
        assert_eq!(assistant.status, AssistantStatus::Active);
        assert!(!assistant.compiled_prompt_hash.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_assistant_rejected() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());

        svc.create_assistant(create_request(&seeded)).await.unwrap();
        let err = svc.create_assistant(create_request(&seeded)).await.unwrap_err();
        assert!(matches!(err, AssistantError::DuplicateAssistant(_)));
    }

    #[tokio::test]
    async fn test_inactive_animal_rejected() {
        let seeded = seeded_directory();
        seeded.directory.deactivate_animal(&seeded.animal_id);
        let svc = service(seeded.directory.clone());

        let err = svc.create_assistant(create_request(&seeded)).await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidAnimal(_)));
    }

    #[tokio::test]
    async fn test_too_many_knowledge_refs_rejected() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());

        let mut request = create_request(&seeded);
        request.knowledge_ref_ids = (0..=MAX_KNOWLEDGE_REFS)
            .map(|i| format!("kb-{i}"))
            .collect();
        let err = svc.create_assistant(request).await.unwrap_err();
        assert!(matches!(err, AssistantError::TooManyKnowledgeRefs { count: 51, max: 50 }));
    }

    #[tokio::test]
    async fn test_dangling_personality_fails_without_persisting() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());

        let mut request = create_request(&seeded);
        request.personality_id = menagerie_types::personality::PersonalityId::new();
        let err = svc.create_assistant(request).await.unwrap_err();
        assert!(matches!(err, AssistantError::Compile(_)));
        assert!(svc
            .assistant_for_animal(&seeded.animal_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_animal_reassignment_forbidden() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());
        let assistant = svc.create_assistant(create_request(&seeded)).await.unwrap();

        let err = svc
            .update_assistant(
                &assistant.id,
                UpdateAssistantRequest {
                    animal_id: Some(AnimalId::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::AnimalReassignmentForbidden));
    }

    #[tokio::test]
    async fn test_status_flip_does_not_change_hash() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());
        let assistant = svc.create_assistant(create_request(&seeded)).await.unwrap();
        let original_hash = assistant.compiled_prompt_hash.clone();

        let updated = svc
            .update_assistant(
                &assistant.id,
                UpdateAssistantRequest {
                    status: Some(AssistantStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, AssistantStatus::Inactive);
        assert_eq!(updated.compiled_prompt_hash, original_hash);
    }

    #[tokio::test]
    async fn test_effective_prompt_refreshes_after_guardrail_edit() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());
        let assistant = svc.create_assistant(create_request(&seeded)).await.unwrap();
        let before = svc.get_effective_prompt(&assistant.id).await.unwrap();

        // Edit the shared guardrail through the directory service so the
        // version bumps; the assistant's stored hash is now stale.
        let dir_svc = crate::directory::DirectoryService::new(seeded.directory.clone());
        dir_svc
            .update_guardrail(
                &seeded.guardrail_id,
                UpdateGuardrailRequest {
                    name: None,
                    rules: Some(vec!["Absolutely no scary stories".to_string()]),
                    severity: None,
                },
            )
            .await
            .unwrap();

        let after = svc.get_effective_prompt(&assistant.id).await.unwrap();
        assert_ne!(before.input_hash, after.input_hash);
        assert!(after.text.contains("Absolutely no scary stories"));

        // The refreshed hash is persisted on the assistant record.
        let reloaded = svc.get_assistant(&assistant.id).await.unwrap();
        assert_eq!(reloaded.compiled_prompt_hash, after.input_hash);

        // A second read is a cache hit and stays stable.
        let again = svc.get_effective_prompt(&assistant.id).await.unwrap();
        assert_eq!(again, after);
    }

    #[tokio::test]
    async fn test_dangling_reference_parks_assistant_in_error() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());
        let assistant = svc.create_assistant(create_request(&seeded)).await.unwrap();

        seeded.directory.remove_personality(&seeded.personality_id);

        let err = svc.get_effective_prompt(&assistant.id).await.unwrap_err();
        assert!(matches!(err, AssistantError::Compile(_)));
        let reloaded = svc.get_assistant(&assistant.id).await.unwrap();
        assert_eq!(reloaded.status, AssistantStatus::Error);
    }

    #[tokio::test]
    async fn test_delete_assistant() {
        let seeded = seeded_directory();
        let svc = service(seeded.directory.clone());
        let assistant = svc.create_assistant(create_request(&seeded)).await.unwrap();

        svc.delete_assistant(&assistant.id).await.unwrap();
        let err = svc.get_assistant(&assistant.id).await.unwrap_err();
        assert!(matches!(err, AssistantError::NotFound));
    }
}
