//! SQLite assistant repository implementation.
//!
//! The UNIQUE constraint on `animal_id` is what makes assistant creation a
//! conditional write: two racing creates for the same animal serialize on
//! the single writer connection and the loser maps to `Conflict`.

use sqlx::Row;

use menagerie_core::repository::assistant::AssistantRepository;
use menagerie_types::animal::AnimalId;
use menagerie_types::assistant::{Assistant, AssistantId, AssistantStatus};
use menagerie_types::error::RepositoryError;
use menagerie_types::guardrail::GuardrailId;
use menagerie_types::personality::PersonalityId;

use super::directory::{format_datetime, parse_datetime, parse_uuid};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `AssistantRepository`.
pub struct SqliteAssistantRepository {
    pool: DatabasePool,
}

impl SqliteAssistantRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(crate) struct AssistantRow {
    id: String,
    animal_id: String,
    personality_id: String,
    guardrail_id: String,
    knowledge_ref_ids: String,
    status: String,
    compiled_prompt_hash: String,
    created_at: String,
    updated_at: String,
}

impl AssistantRow {
    pub(crate) fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            animal_id: row.try_get("animal_id")?,
            personality_id: row.try_get("personality_id")?,
            guardrail_id: row.try_get("guardrail_id")?,
            knowledge_ref_ids: row.try_get("knowledge_ref_ids")?,
            status: row.try_get("status")?,
            compiled_prompt_hash: row.try_get("compiled_prompt_hash")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub(crate) fn into_assistant(self) -> Result<Assistant, RepositoryError> {
        let knowledge_ref_ids: Vec<String> = serde_json::from_str(&self.knowledge_ref_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid knowledge refs json: {e}")))?;
        let status: AssistantStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Assistant {
            id: AssistantId(parse_uuid(&self.id, "assistant id")?),
            animal_id: AnimalId(parse_uuid(&self.animal_id, "animal_id")?),
            personality_id: PersonalityId(parse_uuid(&self.personality_id, "personality_id")?),
            guardrail_id: GuardrailId(parse_uuid(&self.guardrail_id, "guardrail_id")?),
            knowledge_ref_ids,
            status,
            compiled_prompt_hash: self.compiled_prompt_hash,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// AssistantRepository implementation
// ---------------------------------------------------------------------------

impl AssistantRepository for SqliteAssistantRepository {
    async fn create(&self, assistant: &Assistant) -> Result<Assistant, RepositoryError> {
        let refs_json = serde_json::to_string(&assistant.knowledge_ref_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"INSERT INTO assistants (id, animal_id, personality_id, guardrail_id, knowledge_ref_ids, status, compiled_prompt_hash, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
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
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(assistant.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "animal '{}' already has an assistant",
                    assistant.animal_id
                )))
            }
            Err(e) => Err(query_err(e)),
        }
    }

    async fn get_by_id(&self, id: &AssistantId) -> Result<Option<Assistant>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM assistants WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let assistant_row = AssistantRow::from_row(&row).map_err(query_err)?;
                Ok(Some(assistant_row.into_assistant()?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<Option<Assistant>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM assistants WHERE animal_id = ?")
            .bind(animal_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let assistant_row = AssistantRow::from_row(&row).map_err(query_err)?;
                Ok(Some(assistant_row.into_assistant()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Assistant>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM assistants ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut assistants = Vec::with_capacity(rows.len());
        for row in &rows {
            let assistant_row = AssistantRow::from_row(row).map_err(query_err)?;
            assistants.push(assistant_row.into_assistant()?);
        }
        Ok(assistants)
    }

    async fn update(&self, assistant: &Assistant) -> Result<Assistant, RepositoryError> {
        let refs_json = serde_json::to_string(&assistant.knowledge_ref_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE assistants
               SET personality_id = ?, guardrail_id = ?, knowledge_ref_ids = ?,
                   status = ?, compiled_prompt_hash = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(assistant.personality_id.to_string())
        .bind(assistant.guardrail_id.to_string())
        .bind(&refs_json)
        .bind(assistant.status.to_string())
        .bind(&assistant.compiled_prompt_hash)
        .bind(format_datetime(&assistant.updated_at))
        .bind(assistant.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(assistant.clone())
    }

    async fn delete(&self, id: &AssistantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM assistants WHERE id = ?")
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
    use chrono::Utc;

    fn make_assistant(animal_id: AnimalId) -> Assistant {
        let now = Utc::now();
        Assistant {
            id: AssistantId::new(),
            animal_id,
            personality_id: PersonalityId::new(),
            guardrail_id: GuardrailId::new(),
            knowledge_ref_ids: vec!["kb-quills".to_string()],
            status: AssistantStatus::Active,
            compiled_prompt_hash: "abc123".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAssistantRepository::new(pool);

        let assistant = make_assistant(AnimalId::new());
        repo.create(&assistant).await.unwrap();

        let loaded = repo.get_by_id(&assistant.id).await.unwrap().unwrap();
        assert_eq!(loaded.knowledge_ref_ids, vec!["kb-quills"]);
        assert_eq!(loaded.status, AssistantStatus::Active);

        let by_animal = repo.get_by_animal(&assistant.animal_id).await.unwrap().unwrap();
        assert_eq!(by_animal.id, assistant.id);
    }

    #[tokio::test]
    async fn test_second_create_for_same_animal_conflicts() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAssistantRepository::new(pool);

        let animal_id = AnimalId::new();
        repo.create(&make_assistant(animal_id)).await.unwrap();

        let err = repo.create(&make_assistant(animal_id)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // The original row is untouched.
        assert!(repo.get_by_animal(&animal_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_refreshes_hash_and_status() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAssistantRepository::new(pool);

        let mut assistant = make_assistant(AnimalId::new());
        repo.create(&assistant).await.unwrap();

        assistant.status = AssistantStatus::Inactive;
        assistant.compiled_prompt_hash = "def456".to_string();
        repo.update(&assistant).await.unwrap();

        let loaded = repo.get_by_id(&assistant.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AssistantStatus::Inactive);
        assert_eq!(loaded.compiled_prompt_hash, "def456");
    }

    #[tokio::test]
    async fn test_delete_missing_fails_not_found() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAssistantRepository::new(pool);

        let err = repo.delete(&AssistantId::new()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
