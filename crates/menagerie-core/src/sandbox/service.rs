//! Sandbox lifecycle service.
//!
//! Sandboxes are TTL-bound draft configurations: created in Draft, trialed
//! any number of times, confirmed to Tested, and either promoted into the
//! production assistant or left to expire. Expiry is enforced lazily on
//! every access -- there is no timer, and a promoted or expired sandbox is
//! never usable again regardless of how it is reached.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use menagerie_types::assistant::{Assistant, AssistantId, AssistantStatus, MAX_KNOWLEDGE_REFS};
use menagerie_types::error::{PromptError, RepositoryError, SandboxError};
use menagerie_types::generate::{HistoryMessage, ReplyOutput, ReplyRequest};
use menagerie_types::guardrail::{Guardrail, GuardrailId};
use menagerie_types::personality::{Personality, PersonalityId};
use menagerie_types::sandbox::{
    CreateSandboxRequest, SandboxAssistant, SandboxId, SandboxStatus,
};

use crate::generate::ReplyGenerator;
use crate::hash::ContentHasher;
use crate::prompt::{self, CompiledPrompt};
use crate::repository::directory::DirectoryRepository;
use crate::repository::sandbox::SandboxRepository;

/// How long a sandbox stays usable after creation.
const SANDBOX_TTL_MINUTES: i64 = 30;

/// Service orchestrating the sandbox lifecycle.
pub struct SandboxService<S, D, H, G>
where
    S: SandboxRepository,
    D: DirectoryRepository,
    H: ContentHasher,
    G: ReplyGenerator,
{
    sandboxes: S,
    directory: D,
    hasher: H,
    generator: G,
    reply_timeout: Duration,
}

impl<S, D, H, G> SandboxService<S, D, H, G>
where
    S: SandboxRepository,
    D: DirectoryRepository,
    H: ContentHasher,
    G: ReplyGenerator,
{
    pub fn new(sandboxes: S, directory: D, hasher: H, generator: G, reply_timeout: Duration) -> Self {
        Self {
            sandboxes,
            directory,
            hasher,
            generator,
            reply_timeout,
        }
    }

    /// Open a sandbox for an animal.
    ///
    /// The trial prompt is compiled up front so a dangling component fails
    /// here, before anything persists.
    pub async fn create_sandbox(
        &self,
        request: CreateSandboxRequest,
    ) -> Result<SandboxAssistant, SandboxError> {
        if request.knowledge_ref_ids.len() > MAX_KNOWLEDGE_REFS {
            return Err(SandboxError::TooManyKnowledgeRefs {
                count: request.knowledge_ref_ids.len(),
                max: MAX_KNOWLEDGE_REFS,
            });
        }

        self.directory
            .get_animal(&request.animal_id)
            .await
            .map_err(storage)?
            .filter(|a| a.active)
            .ok_or_else(|| SandboxError::InvalidAnimal(request.animal_id.to_string()))?;

        // Compile once to validate; the text is recompiled per trial turn
        // so later directory edits show up in trials immediately.
        self.compile(&request.personality_id, &request.guardrail_id, &request.knowledge_ref_ids)
            .await?;

        let now = Utc::now();
        let sandbox = SandboxAssistant {
            id: SandboxId::new(),
            animal_id: request.animal_id,
            personality_id: request.personality_id,
            guardrail_id: request.guardrail_id,
            knowledge_ref_ids: request.knowledge_ref_ids,
            status: SandboxStatus::Draft,
            trial_turn_count: 0,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(SANDBOX_TTL_MINUTES),
        };

        let sandbox = self.sandboxes.create(&sandbox).await.map_err(storage)?;
        info!(sandbox_id = %sandbox.id, animal_id = %sandbox.animal_id, "Sandbox created");
        Ok(sandbox)
    }

    /// Get a sandbox, applying the lazy expiry transition first.
    pub async fn get_sandbox(&self, id: &SandboxId) -> Result<SandboxAssistant, SandboxError> {
        let sandbox = self.load(id).await?;
        match self.expire_if_due(sandbox).await? {
            Expiry::Live(sandbox) | Expiry::Expired(sandbox) => Ok(sandbox),
        }
    }

    pub async fn list_sandboxes(&self) -> Result<Vec<SandboxAssistant>, SandboxError> {
        self.sandboxes.list().await.map_err(storage)
    }

    /// Run one trial exchange against the sandbox configuration.
    ///
    /// Trial turns are ephemeral: nothing is persisted as conversation
    /// history. The caller carries prior trial messages itself and passes
    /// them back as `history` for multi-turn trials.
    pub async fn trial_turn(
        &self,
        id: &SandboxId,
        message: &str,
        history: Vec<HistoryMessage>,
    ) -> Result<ReplyOutput, SandboxError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SandboxError::InvalidRequest("message is required".to_string()));
        }

        let mut sandbox = self.usable(id).await?;

        let compiled = self
            .compile(&sandbox.personality_id, &sandbox.guardrail_id, &sandbox.knowledge_ref_ids)
            .await?;

        let request = ReplyRequest {
            system_prompt: compiled.text,
            history,
            message: message.to_string(),
        };

        let output = match tokio::time::timeout(self.reply_timeout, self.generator.generate(&request))
            .await
        {
            Err(_) => return Err(SandboxError::GenerateTimeout),
            Ok(Err(e)) => return Err(SandboxError::Generate(e.to_string())),
            Ok(Ok(output)) => output,
        };

        sandbox.trial_turn_count += 1;
        self.sandboxes.update(&sandbox).await.map_err(storage)?;
        Ok(output)
    }

    /// Confirm a sandbox as tested. Requires at least one successful trial
    /// turn; calling it again on an already-Tested sandbox is a no-op.
    pub async fn mark_tested(&self, id: &SandboxId) -> Result<SandboxAssistant, SandboxError> {
        let mut sandbox = self.usable(id).await?;

        if sandbox.status == SandboxStatus::Tested {
            return Ok(sandbox);
        }
        if sandbox.trial_turn_count < 1 {
            return Err(SandboxError::NotYetTrialed);
        }

        sandbox.status = SandboxStatus::Tested;
        self.sandboxes.update(&sandbox).await.map_err(storage)?;
        info!(sandbox_id = %id, "Sandbox marked tested");
        Ok(sandbox)
    }

    /// Promote a tested sandbox into the production assistant.
    ///
    /// The capability token is an external grant; this service only
    /// enforces that one was presented. The assistant upsert and sandbox
    /// delete are one storage transaction, so a retried promote finds the
    /// sandbox gone and fails with `NotFound` without touching the
    /// already-promoted assistant.
    pub async fn promote(
        &self,
        id: &SandboxId,
        capability_token: &str,
    ) -> Result<Assistant, SandboxError> {
        if capability_token.trim().is_empty() {
            return Err(SandboxError::Unauthorized);
        }

        let sandbox = self.usable(id).await?;
        if sandbox.status != SandboxStatus::Tested {
            return Err(SandboxError::NotTested);
        }

        let compiled = self
            .compile(&sandbox.personality_id, &sandbox.guardrail_id, &sandbox.knowledge_ref_ids)
            .await?;

        let now = Utc::now();
        let assistant = Assistant {
            id: AssistantId::new(),
            animal_id: sandbox.animal_id,
            personality_id: sandbox.personality_id,
            guardrail_id: sandbox.guardrail_id,
            knowledge_ref_ids: sandbox.knowledge_ref_ids.clone(),
            status: AssistantStatus::Active,
            compiled_prompt_hash: compiled.input_hash,
            created_at: now,
            updated_at: now,
        };

        let promoted = self.sandboxes.promote(id, &assistant).await.map_err(storage)?;
        info!(
            sandbox_id = %id,
            assistant_id = %promoted.id,
            animal_id = %promoted.animal_id,
            "Sandbox promoted to production"
        );
        Ok(promoted)
    }

    /// Optional storage-hygiene sweep: transition every overdue Draft or
    /// Tested sandbox to Expired. Correctness never depends on this
    /// running; expiry is re-checked on every access.
    pub async fn reap_expired(&self) -> Result<u64, SandboxError> {
        let now = Utc::now();
        let mut reaped = 0;
        for sandbox in self.sandboxes.list().await.map_err(storage)? {
            if sandbox.status.is_usable() && sandbox.is_expired_at(now) {
                let mut expired = sandbox;
                expired.status = SandboxStatus::Expired;
                if let Err(e) = self.sandboxes.update(&expired).await {
                    warn!(sandbox_id = %expired.id, error = %e, "Failed to reap sandbox");
                } else {
                    reaped += 1;
                }
            }
        }
        Ok(reaped)
    }

    /// Load a sandbox and verify it is still usable: Draft or Tested and
    /// within its TTL. Overdue sandboxes transition to Expired here.
    async fn usable(&self, id: &SandboxId) -> Result<SandboxAssistant, SandboxError> {
        let sandbox = self.load(id).await?;
        if !sandbox.status.is_usable() {
            return Err(SandboxError::Expired);
        }
        match self.expire_if_due(sandbox).await? {
            Expiry::Live(sandbox) => Ok(sandbox),
            Expiry::Expired(_) => Err(SandboxError::Expired),
        }
    }

    async fn load(&self, id: &SandboxId) -> Result<SandboxAssistant, SandboxError> {
        self.sandboxes
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(SandboxError::NotFound)
    }

    async fn expire_if_due(
        &self,
        mut sandbox: SandboxAssistant,
    ) -> Result<Expiry, SandboxError> {
        if sandbox.status.is_usable() && sandbox.is_expired_at(Utc::now()) {
            sandbox.status = SandboxStatus::Expired;
            self.sandboxes.update(&sandbox).await.map_err(storage)?;
            info!(sandbox_id = %sandbox.id, "Sandbox expired on access");
            return Ok(Expiry::Expired(sandbox));
        }
        Ok(Expiry::Live(sandbox))
    }

    async fn compile(
        &self,
        personality_id: &PersonalityId,
        guardrail_id: &GuardrailId,
        knowledge_ref_ids: &[String],
    ) -> Result<CompiledPrompt, SandboxError> {
        let (personality, guardrail) = self.resolve(personality_id, guardrail_id).await?;
        Ok(prompt::compile(&personality, &guardrail, knowledge_ref_ids, &self.hasher))
    }

    async fn resolve(
        &self,
        personality_id: &PersonalityId,
        guardrail_id: &GuardrailId,
    ) -> Result<(Personality, Guardrail), SandboxError> {
        let personality = self
            .directory
            .get_personality(personality_id)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                SandboxError::Compile(PromptError::ConfigurationUnresolved(format!(
                    "personality {personality_id}"
                )))
            })?;
        let guardrail = self
            .directory
            .get_guardrail(guardrail_id)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                SandboxError::Compile(PromptError::ConfigurationUnresolved(format!(
                    "guardrail {guardrail_id}"
                )))
            })?;
        Ok((personality, guardrail))
    }
}

enum Expiry {
    Live(SandboxAssistant),
    Expired(SandboxAssistant),
}

fn storage(e: RepositoryError) -> SandboxError {
    match e {
        RepositoryError::NotFound => SandboxError::NotFound,
        other => SandboxError::Storage(other.to_string()),
    }
}
