//! SQLite directory repository implementation.
//!
//! Implements `DirectoryRepository` from `menagerie-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, RFC 3339
//! datetimes. Guardrail rules are stored as a JSON array column so their
//! order survives round-trips.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use menagerie_core::repository::directory::DirectoryRepository;
use menagerie_types::animal::{Animal, AnimalId};
use menagerie_types::error::RepositoryError;
use menagerie_types::guardrail::{Guardrail, GuardrailId, GuardrailSeverity};
use menagerie_types::personality::{Personality, PersonalityId};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DirectoryRepository`.
pub struct SqliteDirectoryRepository {
    pool: DatabasePool,
}

impl SqliteDirectoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct PersonalityRow {
    id: String,
    name: String,
    description: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl PersonalityRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_personality(self) -> Result<Personality, RepositoryError> {
        Ok(Personality {
            id: PersonalityId(parse_uuid(&self.id, "personality id")?),
            name: self.name,
            description: self.description,
            version: self.version as i32,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct GuardrailRow {
    id: String,
    name: String,
    rules: String,
    severity: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl GuardrailRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            rules: row.try_get("rules")?,
            severity: row.try_get("severity")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_guardrail(self) -> Result<Guardrail, RepositoryError> {
        let rules: Vec<String> = serde_json::from_str(&self.rules)
            .map_err(|e| RepositoryError::Query(format!("invalid rules json: {e}")))?;
        let severity: GuardrailSeverity = self
            .severity
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Guardrail {
            id: GuardrailId(parse_uuid(&self.id, "guardrail id")?),
            name: self.name,
            rules,
            severity,
            version: self.version as i32,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct AnimalRow {
    id: String,
    name: String,
    species: String,
    active: i64,
    created_at: String,
}

impl AnimalRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            species: row.try_get("species")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_animal(self) -> Result<Animal, RepositoryError> {
        Ok(Animal {
            id: AnimalId(parse_uuid(&self.id, "animal id")?),
            name: self.name,
            species: self.species,
            active: self.active != 0,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// DirectoryRepository implementation
// ---------------------------------------------------------------------------

impl DirectoryRepository for SqliteDirectoryRepository {
    async fn create_personality(
        &self,
        personality: &Personality,
    ) -> Result<Personality, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO personalities (id, name, description, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(personality.id.to_string())
        .bind(&personality.name)
        .bind(&personality.description)
        .bind(personality.version as i64)
        .bind(format_datetime(&personality.created_at))
        .bind(format_datetime(&personality.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(personality.clone())
    }

    async fn get_personality(
        &self,
        id: &PersonalityId,
    ) -> Result<Option<Personality>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM personalities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let personality_row = PersonalityRow::from_row(&row).map_err(query_err)?;
                Ok(Some(personality_row.into_personality()?))
            }
            None => Ok(None),
        }
    }

    async fn list_personalities(&self) -> Result<Vec<Personality>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM personalities ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut personalities = Vec::with_capacity(rows.len());
        for row in &rows {
            let personality_row = PersonalityRow::from_row(row).map_err(query_err)?;
            personalities.push(personality_row.into_personality()?);
        }
        Ok(personalities)
    }

    async fn update_personality(&self, personality: &Personality) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE personalities
               SET name = ?, description = ?, version = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&personality.name)
        .bind(&personality.description)
        .bind(personality.version as i64)
        .bind(format_datetime(&personality.updated_at))
        .bind(personality.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_guardrail(&self, guardrail: &Guardrail) -> Result<Guardrail, RepositoryError> {
        let rules_json = serde_json::to_string(&guardrail.rules)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO guardrails (id, name, rules, severity, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(guardrail.id.to_string())
        .bind(&guardrail.name)
        .bind(&rules_json)
        .bind(guardrail.severity.to_string())
        .bind(guardrail.version as i64)
        .bind(format_datetime(&guardrail.created_at))
        .bind(format_datetime(&guardrail.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(guardrail.clone())
    }

    async fn get_guardrail(&self, id: &GuardrailId) -> Result<Option<Guardrail>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM guardrails WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let guardrail_row = GuardrailRow::from_row(&row).map_err(query_err)?;
                Ok(Some(guardrail_row.into_guardrail()?))
            }
            None => Ok(None),
        }
    }

    async fn list_guardrails(&self) -> Result<Vec<Guardrail>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM guardrails ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut guardrails = Vec::with_capacity(rows.len());
        for row in &rows {
            let guardrail_row = GuardrailRow::from_row(row).map_err(query_err)?;
            guardrails.push(guardrail_row.into_guardrail()?);
        }
        Ok(guardrails)
    }

    async fn update_guardrail(&self, guardrail: &Guardrail) -> Result<(), RepositoryError> {
        let rules_json = serde_json::to_string(&guardrail.rules)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE guardrails
               SET name = ?, rules = ?, severity = ?, version = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&guardrail.name)
        .bind(&rules_json)
        .bind(guardrail.severity.to_string())
        .bind(guardrail.version as i64)
        .bind(format_datetime(&guardrail.updated_at))
        .bind(guardrail.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_animal(&self, animal: &Animal) -> Result<Animal, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO animals (id, name, species, active, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(animal.id.to_string())
        .bind(&animal.name)
        .bind(&animal.species)
        .bind(animal.active as i64)
        .bind(format_datetime(&animal.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(animal.clone())
    }

    async fn get_animal(&self, id: &AnimalId) -> Result<Option<Animal>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM animals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let animal_row = AnimalRow::from_row(&row).map_err(query_err)?;
                Ok(Some(animal_row.into_animal()?))
            }
            None => Ok(None),
        }
    }

    async fn list_animals(&self) -> Result<Vec<Animal>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM animals ORDER BY name ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut animals = Vec::with_capacity(rows.len());
        for row in &rows {
            let animal_row = AnimalRow::from_row(row).map_err(query_err)?;
            animals.push(animal_row.into_animal()?);
        }
        Ok(animals)
    }

    async fn set_animal_active(&self, id: &AnimalId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE animals SET active = ? WHERE id = ?")
            .bind(active as i64)
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
    use menagerie_types::guardrail::GuardrailSeverity;

    fn make_personality(name: &str) -> Personality {
        let now = Utc::now();
        Personality {
            id: PersonalityId::new(),
            name: name.to_string(),
            description: "Warm and patient.".to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_guardrail(name: &str) -> Guardrail {
        let now = Utc::now();
        Guardrail {
            id: GuardrailId::new(),
            name: name.to_string(),
            rules: vec!["No scary stories".to_string(), "Stay on topic".to_string()],
            severity: GuardrailSeverity::Strict,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_personality_roundtrip_and_version_update() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteDirectoryRepository::new(pool);

        let mut personality = make_personality("gentle-storyteller");
        repo.create_personality(&personality).await.unwrap();

        personality.version = 2;
        personality.description = "Edited".to_string();
        repo.update_personality(&personality).await.unwrap();

        let loaded = repo.get_personality(&personality.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.description, "Edited");
    }

    #[tokio::test]
    async fn test_guardrail_rules_preserve_order() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteDirectoryRepository::new(pool);

        let guardrail = make_guardrail("family-strict");
        repo.create_guardrail(&guardrail).await.unwrap();

        let loaded = repo.get_guardrail(&guardrail.id).await.unwrap().unwrap();
        assert_eq!(loaded.rules, guardrail.rules);
        assert_eq!(loaded.severity, GuardrailSeverity::Strict);
    }

    #[tokio::test]
    async fn test_animal_active_flag() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteDirectoryRepository::new(pool);

        let animal = Animal {
            id: AnimalId::new(),
            name: "Bella".to_string(),
            species: "African crested porcupine".to_string(),
            active: true,
            created_at: Utc::now(),
        };
        repo.create_animal(&animal).await.unwrap();

        repo.set_animal_active(&animal.id, false).await.unwrap();
        let loaded = repo.get_animal(&animal.id).await.unwrap().unwrap();
        assert!(!loaded.active);
    }

    #[tokio::test]
    async fn test_update_missing_personality_fails_not_found() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteDirectoryRepository::new(pool);

        let err = repo
            .update_personality(&make_personality("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
