//! SQLite sandbox repository implementation.
//!
//! Promotion is the one multi-table operation here: the assistant upsert
//! and the sandbox delete run in a single transaction on the writer
//! connection, so no reader ever observes a half-applied promotion and a
//! retried promote finds the sandbox row already gone.

use sqlx::Row;

use menagerie_core::repository::sandbox::SandboxRepository;
use menagerie_types::animal::AnimalId;
use menagerie_types::assistant::Assistant;
use menagerie_types::error::RepositoryError;
use menagerie_types::guardrail::GuardrailId;
use menagerie_types::personality::PersonalityId;
use menagerie_types::sandbox::{SandboxAssistant, SandboxId, SandboxStatus};

use super::assistant::AssistantRow;
use super::directory::{format_datetime, parse_datetime, parse_uuid};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SandboxRepository`.
pub struct SqliteSandboxRepository {
    pool: DatabasePool,
}

impl SqliteSandboxRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct SandboxRow {
    id: String,
    animal_id: String,
    personality_id: String,
    guardrail_id: String,
    knowledge_ref_ids: String,
    status: String,
    trial_turn_count: i64,
    created_at: String,
    expires_at: String,
}

impl SandboxRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            animal_id: row.try_get("animal_id")?,
            personality_id: row.try_get("personality_id")?,
            guardrail_id: row.try_get("guardrail_id")?,
            knowledge_ref_ids: row.try_get("knowledge_ref_ids")?,
            status: row.try_get("status")?,
            trial_turn_count: row.try_get("trial_turn_count")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_sandbox(self) -> Result<SandboxAssistant, RepositoryError> {
        let knowledge_ref_ids: Vec<String> = serde_json::from_str(&self.knowledge_ref_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid knowledge refs json: {e}")))?;
        let status: SandboxStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(SandboxAssistant {
            id: SandboxId(parse_uuid(&self.id, "sandbox id")?),
            animal_id: AnimalId(parse_uuid(&self.animal_id, "animal_id")?),
            personality_id: PersonalityId(parse_uuid(&self.personality_id, "personality_id")?),
            guardrail_id: GuardrailId(parse_uuid(&self.guardrail_id, "guardrail_id")?),
            knowledge_ref_ids,
            status,
            trial_turn_count: self.trial_turn_count as i32,
            created_at: parse_datetime(&self.created_at)?,
            expires_at: parse_datetime(&self.expires_at)?,
        })
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// SandboxRepository implementation
// ---------------------------------------------------------------------------

impl SandboxRepository for SqliteSandboxRepository {
    async fn create(&self, sandbox: &SandboxAssistant) -> Result<SandboxAssistant, RepositoryError> {
        let refs_json = serde_json::to_string(&sandbox.knowledge_ref_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO sandbox_assistants (id, animal_id, personality_id, guardrail_id, knowledge_ref_ids, status, trial_turn_count, created_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(sandbox.id.to_string())
        .bind(sandbox.animal_id.to_string())
        .bind(sandbox.personality_id.to_string())
        .bind(sandbox.guardrail_id.to_string())
        .bind(&refs_json)
        .bind(sandbox.status.to_string())
        .bind(sandbox.trial_turn_count as i64)
        .bind(format_datetime(&sandbox.created_at))
        .bind(format_datetime(&sandbox.expires_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(sandbox.clone())
    }

    async fn get(&self, id: &SandboxId) -> Result<Option<SandboxAssistant>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sandbox_assistants WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let sandbox_row = SandboxRow::from_row(&row).map_err(query_err)?;
                Ok(Some(sandbox_row.into_sandbox()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<SandboxAssistant>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM sandbox_assistants ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut sandboxes = Vec::with_capacity(rows.len());
        for row in &rows {
            let sandbox_row = SandboxRow::from_row(row).map_err(query_err)?;
            sandboxes.push(sandbox_row.into_sandbox()?);
        }
        Ok(sandboxes)
    }

    async fn update(&self, sandbox: &SandboxAssistant) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sandbox_assistants
               SET status = ?, trial_turn_count = ?
               WHERE id = ?"#,
        )
        .bind(sandbox.status.to_string())
        .bind(sandbox.trial_turn_count as i64)
        .bind(sandbox.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn promote(
        &self,
        sandbox_id: &SandboxId,
        assistant: &Assistant,
    ) -> Result<Assistant, RepositoryError> {
        let refs_json = serde_json::to_string(&assistant.knowledge_ref_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        // The sandbox must still exist inside the transaction; a retried
        // promote aborts here without touching the assistant.
        let exists = sqlx::query("SELECT 1 FROM sandbox_assistants WHERE id = ?")
            .bind(sandbox_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r#"INSERT INTO assistants (id, animal_id, personality_id, guardrail_id, knowledge_ref_ids, status, compiled_prompt_hash, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (animal_id) DO UPDATE SET
                   personality_id = excluded.personality_id,
                   guardrail_id = excluded.guardrail_id,
                   knowledge_ref_ids = excluded.knowledge_ref_ids,
                   status = excluded.status,
                   compiled_prompt_hash = excluded.compiled_prompt_hash,
                   updated_at = excluded.updated_at"#,
        )
        .bind(assistant.id.to_string())
        .bind(assistant.animal_id.to_string())
        .bind(assistant.personality_id.to_string())
        .bind(assistant.guardrail_id.to_string())
        .bind(&refs_json)
        .bind(assistant.status.to_string())
        .bind(&assistant.compiled_prompt_hash)
        .bind(format_datetime(&assistant.created_at))
        .bind(format_datetime(&assistant.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        sqlx::query("DELETE FROM sandbox_assistants WHERE id = ?")
            .bind(sandbox_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let row = sqlx::query("SELECT * FROM assistants WHERE animal_id = ?")
            .bind(assistant.animal_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(query_err)?;
        let stored = AssistantRow::from_row(&row)
            .map_err(query_err)?
            .into_assistant()?;

        tx.commit().await.map_err(query_err)?;
        Ok(stored)
    }

    async fn delete(&self, id: &SandboxId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM sandbox_assistants WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::temp_pool;
    use chrono::{Duration, Utc};
    use menagerie_core::repository::assistant::AssistantRepository;
    use menagerie_types::assistant::{AssistantId, AssistantStatus};

    fn make_sandbox(animal_id: AnimalId) -> SandboxAssistant {
        let now = Utc::now();
        SandboxAssistant {
            id: SandboxId::new(),
            animal_id,
            personality_id: PersonalityId::new(),
            guardrail_id: GuardrailId::new(),
            knowledge_ref_ids: vec![],
            status: SandboxStatus::Draft,
            trial_turn_count: 0,
            created_at: now,
            expires_at: now + Duration::minutes(30),
        }
    }

    fn assistant_from(sandbox: &SandboxAssistant) -> Assistant {
        let now = Utc::now();
        Assistant {
            id: AssistantId::new(),
            animal_id: sandbox.animal_id,
            personality_id: sandbox.personality_id,
            guardrail_id: sandbox.guardrail_id,
            knowledge_ref_ids: sandbox.knowledge_ref_ids.clone(),
            status: AssistantStatus::Active,
            compiled_prompt_hash: "hash-after-promotion".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_update_roundtrip() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteSandboxRepository::new(pool);

        let mut sandbox = make_sandbox(AnimalId::new());
        repo.create(&sandbox).await.unwrap();

        sandbox.status = SandboxStatus::Tested;
        sandbox.trial_turn_count = 3;
        repo.update(&sandbox).await.unwrap();

        let loaded = repo.get(&sandbox.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SandboxStatus::Tested);
        assert_eq!(loaded.trial_turn_count, 3);
    }

    #[tokio::test]
    async fn test_promote_upserts_assistant_and_deletes_sandbox() {
        let (_dir, pool) = temp_pool().await;
        let sandbox_repo = SqliteSandboxRepository::new(pool.clone());
        let assistant_repo = crate::sqlite::assistant::SqliteAssistantRepository::new(pool);

        let sandbox = make_sandbox(AnimalId::new());
        sandbox_repo.create(&sandbox).await.unwrap();

        let promoted = sandbox_repo
            .promote(&sandbox.id, &assistant_from(&sandbox))
            .await
            .unwrap();
        assert_eq!(promoted.animal_id, sandbox.animal_id);

        assert!(sandbox_repo.get(&sandbox.id).await.unwrap().is_none());
        assert!(assistant_repo
            .get_by_animal(&sandbox.animal_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_promote_preserves_existing_assistant_id() {
        let (_dir, pool) = temp_pool().await;
        let sandbox_repo = SqliteSandboxRepository::new(pool.clone());
        let assistant_repo = crate::sqlite::assistant::SqliteAssistantRepository::new(pool);

        let animal_id = AnimalId::new();
        let sandbox = make_sandbox(animal_id);
        sandbox_repo.create(&sandbox).await.unwrap();

        let existing = assistant_from(&sandbox);
        assistant_repo.create(&existing).await.unwrap();

        let replacement = assistant_from(&sandbox);
        let promoted = sandbox_repo.promote(&sandbox.id, &replacement).await.unwrap();

        // ON CONFLICT keeps the original row id.
        assert_eq!(promoted.id, existing.id);
        assert_ne!(promoted.id, replacement.id);
    }

    #[tokio::test]
    async fn test_promote_retry_fails_not_found_without_touching_assistant() {
        let (_dir, pool) = temp_pool().await;
        let sandbox_repo = SqliteSandboxRepository::new(pool.clone());
        let assistant_repo = crate::sqlite::assistant::SqliteAssistantRepository::new(pool);

        let sandbox = make_sandbox(AnimalId::new());
        sandbox_repo.create(&sandbox).await.unwrap();
        let promoted = sandbox_repo
            .promote(&sandbox.id, &assistant_from(&sandbox))
            .await
            .unwrap();

        let err = sandbox_repo
            .promote(&sandbox.id, &assistant_from(&sandbox))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let stored = assistant_repo
            .get_by_animal(&sandbox.animal_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.updated_at, promoted.updated_at);
    }
}
