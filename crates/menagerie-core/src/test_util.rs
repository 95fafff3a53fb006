//! In-memory fakes for service tests.
//!
//! These implement the repository ports over `Arc<Mutex<..>>` maps so the
//! services can be exercised without a database. Pair-write semantics
//! (seq assignment, request-id conflicts, session-gone failures) mirror
//! the SQLite implementation's contract.

use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use menagerie_types::animal::{Animal, AnimalId};
use menagerie_types::assistant::{Assistant, AssistantId};
use menagerie_types::conversation::{ConversationSession, ConversationTurn, SessionId};
use menagerie_types::error::RepositoryError;
use menagerie_types::generate::{GenerateError, ReplyOutput, ReplyRequest};
use menagerie_types::guardrail::{Guardrail, GuardrailId, GuardrailSeverity};
use menagerie_types::personality::{Personality, PersonalityId};
use menagerie_types::sandbox::{SandboxAssistant, SandboxId};

use crate::generate::ReplyGenerator;
use crate::hash::ContentHasher;
use crate::repository::assistant::AssistantRepository;
use crate::repository::conversation::{
    ConversationRepository, SessionTarget, TurnDraft,
};
use crate::repository::directory::DirectoryRepository;
use crate::repository::sandbox::SandboxRepository;

// ---------------------------------------------------------------------------
// Hasher
// ---------------------------------------------------------------------------

/// Deterministic non-cryptographic hasher for tests.
pub struct TestHasher;

impl ContentHasher for TestHasher {
    fn compute_hash(&self, content: &str) -> String {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_personality(name: &str) -> Personality {
    let now = Utc::now();
    Personality {
        id: PersonalityId::new(),
        name: name.to_string(),
        description: "Warm, patient, loves a good tale.".to_string(),
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_guardrail(name: &str) -> Guardrail {
    let now = Utc::now();
    Guardrail {
        id: GuardrailId::new(),
        name: name.to_string(),
        rules: vec![
            "No scary stories".to_string(),
            "Redirect off-topic questions to animal facts".to_string(),
        ],
        severity: GuardrailSeverity::Strict,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_animal(name: &str) -> Animal {
    Animal {
        id: AnimalId::new(),
        name: name.to_string(),
        species: "African crested porcupine".to_string(),
        active: true,
        created_at: Utc::now(),
    }
}

/// A directory pre-loaded with one animal, personality, and guardrail.
pub struct SeededDirectory {
    pub directory: MemoryDirectory,
    pub animal_id: AnimalId,
    pub personality_id: PersonalityId,
    pub guardrail_id: GuardrailId,
}

pub fn seeded_directory() -> SeededDirectory {
    let directory = MemoryDirectory::default();
    let animal = test_animal("Bella");
    let personality = test_personality("gentle-storyteller");
    let guardrail = test_guardrail("family-strict");

    let animal_id = animal.id;
    let personality_id = personality.id;
    let guardrail_id = guardrail.id;

    {
        let mut inner = directory.inner.lock().unwrap();
        inner.animals.insert(animal.id.0, animal);
        inner.personalities.insert(personality.id.0, personality);
        inner.guardrails.insert(guardrail.id.0, guardrail);
    }

    SeededDirectory {
        directory,
        animal_id,
        personality_id,
        guardrail_id,
    }
}

// ---------------------------------------------------------------------------
// Directory fake
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DirectoryInner {
    personalities: HashMap<Uuid, Personality>,
    guardrails: HashMap<Uuid, Guardrail>,
    animals: HashMap<Uuid, Animal>,
}

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<DirectoryInner>>,
}

impl MemoryDirectory {
    pub fn deactivate_animal(&self, id: &AnimalId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(animal) = inner.animals.get_mut(&id.0) {
            animal.active = false;
        }
    }

    pub fn remove_personality(&self, id: &PersonalityId) {
        self.inner.lock().unwrap().personalities.remove(&id.0);
    }
}

impl DirectoryRepository for MemoryDirectory {
    async fn create_personality(
        &self,
        personality: &Personality,
    ) -> Result<Personality, RepositoryError> {
        self.inner
            .lock()
            .unwrap()
            .personalities
            .insert(personality.id.0, personality.clone());
        Ok(personality.clone())
    }

    async fn get_personality(
        &self,
        id: &PersonalityId,
    ) -> Result<Option<Personality>, RepositoryError> {
        Ok(self.inner.lock().unwrap().personalities.get(&id.0).cloned())
    }

    async fn list_personalities(&self) -> Result<Vec<Personality>, RepositoryError> {
        Ok(self.inner.lock().unwrap().personalities.values().cloned().collect())
    }

    async fn update_personality(&self, personality: &Personality) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.personalities.contains_key(&personality.id.0) {
            return Err(RepositoryError::NotFound);
        }
        inner.personalities.insert(personality.id.0, personality.clone());
        Ok(())
    }

    async fn create_guardrail(&self, guardrail: &Guardrail) -> Result<Guardrail, RepositoryError> {
        self.inner
            .lock()
            .unwrap()
            .guardrails
            .insert(guardrail.id.0, guardrail.clone());
        Ok(guardrail.clone())
    }

    async fn get_guardrail(&self, id: &GuardrailId) -> Result<Option<Guardrail>, RepositoryError> {
        Ok(self.inner.lock().unwrap().guardrails.get(&id.0).cloned())
    }

    async fn list_guardrails(&self) -> Result<Vec<Guardrail>, RepositoryError> {
        Ok(self.inner.lock().unwrap().guardrails.values().cloned().collect())
    }

    async fn update_guardrail(&self, guardrail: &Guardrail) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.guardrails.contains_key(&guardrail.id.0) {
            return Err(RepositoryError::NotFound);
        }
        inner.guardrails.insert(guardrail.id.0, guardrail.clone());
        Ok(())
    }

    async fn create_animal(&self, animal: &Animal) -> Result<Animal, RepositoryError> {
        self.inner.lock().unwrap().animals.insert(animal.id.0, animal.clone());
        Ok(animal.clone())
    }

    async fn get_animal(&self, id: &AnimalId) -> Result<Option<Animal>, RepositoryError> {
        Ok(self.inner.lock().unwrap().animals.get(&id.0).cloned())
    }

    async fn list_animals(&self) -> Result<Vec<Animal>, RepositoryError> {
        Ok(self.inner.lock().unwrap().animals.values().cloned().collect())
    }

    async fn set_animal_active(&self, id: &AnimalId, active: bool) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let animal = inner.animals.get_mut(&id.0).ok_or(RepositoryError::NotFound)?;
        animal.active = active;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assistant fake
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryAssistants {
    inner: Arc<Mutex<HashMap<Uuid, Assistant>>>,
}

impl AssistantRepository for MemoryAssistants {
    async fn create(&self, assistant: &Assistant) -> Result<Assistant, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.values().any(|a| a.animal_id == assistant.animal_id) {
            return Err(RepositoryError::Conflict(format!(
                "animal '{}' already has an assistant",
                assistant.animal_id
            )));
        }
        inner.insert(assistant.id.0, assistant.clone());
        Ok(assistant.clone())
    }

    async fn get_by_id(&self, id: &AssistantId) -> Result<Option<Assistant>, RepositoryError> {
        Ok(self.inner.lock().unwrap().get(&id.0).cloned())
    }

    async fn get_by_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<Option<Assistant>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .find(|a| a.animal_id == *animal_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Assistant>, RepositoryError> {
        Ok(self.inner.lock().unwrap().values().cloned().collect())
    }

    async fn update(&self, assistant: &Assistant) -> Result<Assistant, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.contains_key(&assistant.id.0) {
            return Err(RepositoryError::NotFound);
        }
        inner.insert(assistant.id.0, assistant.clone());
        Ok(assistant.clone())
    }

    async fn delete(&self, id: &AssistantId) -> Result<(), RepositoryError> {
        self.inner
            .lock()
            .unwrap()
            .remove(&id.0)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Sandbox fake
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemorySandboxes {
    sandboxes: Arc<Mutex<HashMap<Uuid, SandboxAssistant>>>,
    assistants: MemoryAssistants,
}

impl MemorySandboxes {
    /// Share the assistant store with a service under test so promotion
    /// lands where the test can observe it.
    pub fn with_assistants(assistants: MemoryAssistants) -> Self {
        Self {
            sandboxes: Arc::default(),
            assistants,
        }
    }
}

impl SandboxRepository for MemorySandboxes {
    async fn create(&self, sandbox: &SandboxAssistant) -> Result<SandboxAssistant, RepositoryError> {
        self.sandboxes
            .lock()
            .unwrap()
            .insert(sandbox.id.0, sandbox.clone());
        Ok(sandbox.clone())
    }

    async fn get(&self, id: &SandboxId) -> Result<Option<SandboxAssistant>, RepositoryError> {
        Ok(self.sandboxes.lock().unwrap().get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<SandboxAssistant>, RepositoryError> {
        Ok(self.sandboxes.lock().unwrap().values().cloned().collect())
    }

    async fn update(&self, sandbox: &SandboxAssistant) -> Result<(), RepositoryError> {
        let mut inner = self.sandboxes.lock().unwrap();
        if !inner.contains_key(&sandbox.id.0) {
            return Err(RepositoryError::NotFound);
        }
        inner.insert(sandbox.id.0, sandbox.clone());
        Ok(())
    }

    async fn promote(
        &self,
        sandbox_id: &SandboxId,
        assistant: &Assistant,
    ) -> Result<Assistant, RepositoryError> {
        // Same all-or-nothing contract as the SQLite transaction.
        let mut sandboxes = self.sandboxes.lock().unwrap();
        if !sandboxes.contains_key(&sandbox_id.0) {
            return Err(RepositoryError::NotFound);
        }
        let mut assistants = self.assistants.inner.lock().unwrap();
        let stored = match assistants
            .values()
            .find(|a| a.animal_id == assistant.animal_id)
            .map(|a| a.id)
        {
            Some(existing_id) => {
                let mut upserted = assistant.clone();
                upserted.id = existing_id;
                assistants.insert(existing_id.0, upserted.clone());
                upserted
            }
            None => {
                assistants.insert(assistant.id.0, assistant.clone());
                assistant.clone()
            }
        };
        sandboxes.remove(&sandbox_id.0);
        Ok(stored)
    }

    async fn delete(&self, id: &SandboxId) -> Result<(), RepositoryError> {
        self.sandboxes
            .lock()
            .unwrap()
            .remove(&id.0)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Conversation fake
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConversationInner {
    sessions: HashMap<Uuid, ConversationSession>,
    turns: Vec<ConversationTurn>,
    request_ids: HashMap<(Uuid, String), Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryConversations {
    inner: Arc<Mutex<ConversationInner>>,
}

impl MemoryConversations {
    pub fn turn_count(&self, session_id: &SessionId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .turns
            .iter()
            .filter(|t| t.session_id == *session_id)
            .count()
    }
}

impl ConversationRepository for MemoryConversations {
    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        Ok(self.inner.lock().unwrap().sessions.get(&session_id.0).cloned())
    }

    async fn list_sessions(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<_> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        let offset = offset.unwrap_or(0).max(0) as usize;
        let sessions: Vec<_> = sessions.into_iter().skip(offset).collect();
        Ok(match limit {
            Some(limit) => sessions.into_iter().take(limit.max(0) as usize).collect(),
            None => sessions,
        })
    }

    async fn sessions_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<_> = inner
            .sessions
            .values()
            .filter(|s| s.animal_id == *animal_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(sessions)
    }

    async fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<_> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(sessions)
    }

    async fn append_turn_pair(
        &self,
        target: SessionTarget,
        user_turn: TurnDraft,
        assistant_turn: TurnDraft,
        request_id: Option<&str>,
    ) -> Result<(ConversationTurn, ConversationTurn), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();

        let session_id = match &target {
            SessionTarget::Existing(id) => {
                if !inner.sessions.contains_key(&id.0) {
                    return Err(RepositoryError::NotFound);
                }
                *id
            }
            SessionTarget::Create(session) => {
                inner.sessions.insert(session.id.0, session.clone());
                session.id
            }
        };

        if let Some(rid) = request_id {
            let key = (session_id.0, rid.to_string());
            if inner.request_ids.contains_key(&key) {
                // Roll back a session created in this call, mirroring the
                // SQLite transaction abort.
                if let SessionTarget::Create(session) = &target {
                    inner.sessions.remove(&session.id.0);
                }
                return Err(RepositoryError::Conflict(format!(
                    "request '{rid}' already persisted"
                )));
            }
            inner.request_ids.insert(key, assistant_turn.id.0);
        }

        let next_seq = inner
            .turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .map(|t| t.seq)
            .max()
            .unwrap_or(0);

        let user = ConversationTurn {
            id: user_turn.id,
            session_id,
            seq: next_seq + 1,
            role: user_turn.role,
            content: user_turn.content,
            created_at: user_turn.created_at,
            animal_name: user_turn.animal_name,
            metadata: user_turn.metadata,
        };
        let assistant = ConversationTurn {
            id: assistant_turn.id,
            session_id,
            seq: next_seq + 2,
            role: assistant_turn.role,
            content: assistant_turn.content,
            created_at: assistant_turn.created_at,
            animal_name: assistant_turn.animal_name,
            metadata: assistant_turn.metadata,
        };
        inner.turns.push(user.clone());
        inner.turns.push(assistant.clone());

        let last_message_at = assistant.created_at;
        let session = inner.sessions.get_mut(&session_id.0).unwrap();
        session.message_count += 2;
        session.last_message_at = last_message_at;

        Ok((user, assistant))
    }

    async fn get_turns(
        &self,
        session_id: &SessionId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        let mut turns: Vec<_> = inner
            .turns
            .iter()
            .filter(|t| t.session_id == *session_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.seq);
        let offset = offset.unwrap_or(0).max(0) as usize;
        let turns: Vec<_> = turns.into_iter().skip(offset).collect();
        Ok(match limit {
            Some(limit) => turns.into_iter().take(limit.max(0) as usize).collect(),
            None => turns,
        })
    }

    async fn last_turns(
        &self,
        session_id: &SessionId,
        window: i64,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let all = self.get_turns(session_id, None, None).await?;
        let skip = all.len().saturating_sub(window.max(0) as usize);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn find_turn_by_request_id(
        &self,
        session_id: &SessionId,
        request_id: &str,
    ) -> Result<Option<ConversationTurn>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        let turn_id = inner
            .request_ids
            .get(&(session_id.0, request_id.to_string()))
            .copied();
        Ok(turn_id.and_then(|id| inner.turns.iter().find(|t| t.id.0 == id).cloned()))
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.sessions.remove(&session_id.0).is_some();
        if removed {
            inner.turns.retain(|t| t.session_id != *session_id);
            inner.request_ids.retain(|(sid, _), _| *sid != session_id.0);
        }
        Ok(removed as u64)
    }

    async fn delete_sessions_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<SessionId> = self
            .sessions_for_animal(animal_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let mut deleted = 0;
        for id in ids {
            deleted += self.delete_session(&id).await?;
        }
        Ok(deleted)
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let ids: Vec<SessionId> = self
            .sessions_for_user(user_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let mut deleted = 0;
        for id in ids {
            deleted += self.delete_session(&id).await?;
        }
        Ok(deleted)
    }
}

// ---------------------------------------------------------------------------
// Generator fakes
// ---------------------------------------------------------------------------

/// Scripted generator: pops queued outcomes, or echoes when empty.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<VecDeque<Result<ReplyOutput, GenerateError>>>>,
    /// Artificial latency, for timeout tests.
    pub delay: Option<std::time::Duration>,
}

impl ScriptedGenerator {
    pub fn push(&self, outcome: Result<ReplyOutput, GenerateError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            script: Arc::default(),
            delay: Some(delay),
        }
    }

    pub fn echo_reply(message: &str) -> ReplyOutput {
        ReplyOutput {
            content: format!("echo: {message}"),
            model: "scripted".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            processing_ms: 1,
        }
    }
}

impl ReplyGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<ReplyOutput, GenerateError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.script.lock().unwrap().pop_front();
        match queued {
            Some(outcome) => outcome,
            None => Ok(Self::echo_reply(&request.message)),
        }
    }
}
