//! SQLite conversation repository implementation.
//!
//! The turn pair-write is one transaction on the single writer connection:
//! session existence check (or creation), seq assignment, both turn
//! inserts, and the session counters bump all commit together or not at
//! all. Turn deletion cascades from sessions via the FK, so removing a
//! session row removes its transcript in the same statement.

use sqlx::Row;

use menagerie_core::repository::conversation::{
    ConversationRepository, SessionTarget, TurnDraft,
};
use menagerie_types::animal::AnimalId;
use menagerie_types::conversation::{
    ConversationSession, ConversationTurn, SessionId, TurnId, TurnMetadata, TurnRole,
};
use menagerie_types::error::RepositoryError;

use super::directory::{format_datetime, parse_datetime, parse_uuid};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    user_id: String,
    animal_id: String,
    animal_name: String,
    started_at: String,
    last_message_at: String,
    message_count: i64,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            animal_id: row.try_get("animal_id")?,
            animal_name: row.try_get("animal_name")?,
            started_at: row.try_get("started_at")?,
            last_message_at: row.try_get("last_message_at")?,
            message_count: row.try_get("message_count")?,
        })
    }

    fn into_session(self) -> Result<ConversationSession, RepositoryError> {
        Ok(ConversationSession {
            id: SessionId(parse_uuid(&self.id, "session id")?),
            user_id: self.user_id,
            animal_id: AnimalId(parse_uuid(&self.animal_id, "animal_id")?),
            animal_name: self.animal_name,
            started_at: parse_datetime(&self.started_at)?,
            last_message_at: parse_datetime(&self.last_message_at)?,
            message_count: self.message_count,
        })
    }
}

struct TurnRow {
    id: String,
    session_id: String,
    seq: i64,
    role: String,
    content: String,
    created_at: String,
    animal_name: Option<String>,
    model: Option<String>,
    tokens_used: Option<i64>,
    processing_ms: Option<i64>,
}

impl TurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            seq: row.try_get("seq")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            animal_name: row.try_get("animal_name")?,
            model: row.try_get("model")?,
            tokens_used: row.try_get("tokens_used")?,
            processing_ms: row.try_get("processing_ms")?,
        })
    }

    fn into_turn(self) -> Result<ConversationTurn, RepositoryError> {
        let role: TurnRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let metadata = match (self.model, self.tokens_used, self.processing_ms) {
            (Some(model), Some(tokens_used), Some(processing_ms)) => Some(TurnMetadata {
                model,
                tokens_used: tokens_used as u32,
                processing_ms: processing_ms as u64,
            }),
            _ => None,
        };

        Ok(ConversationTurn {
            id: TurnId(parse_uuid(&self.id, "turn id")?),
            session_id: SessionId(parse_uuid(&self.session_id, "session_id")?),
            seq: self.seq,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
            animal_name: self.animal_name,
            metadata,
        })
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn completed(draft: TurnDraft, session_id: SessionId, seq: i64) -> ConversationTurn {
    ConversationTurn {
        id: draft.id,
        session_id,
        seq,
        role: draft.role,
        content: draft.content,
        created_at: draft.created_at,
        animal_name: draft.animal_name,
        metadata: draft.metadata,
    }
}

async fn insert_turn(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    turn: &ConversationTurn,
    request_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO conversation_turns (id, session_id, seq, role, content, created_at, animal_name, model, tokens_used, processing_ms, request_id)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(turn.id.to_string())
    .bind(turn.session_id.to_string())
    .bind(turn.seq)
    .bind(turn.role.to_string())
    .bind(&turn.content)
    .bind(format_datetime(&turn.created_at))
    .bind(&turn.animal_name)
    .bind(turn.metadata.as_ref().map(|m| m.model.clone()))
    .bind(turn.metadata.as_ref().map(|m| m.tokens_used as i64))
    .bind(turn.metadata.as_ref().map(|m| m.processing_ms as i64))
    .bind(request_id)
    .execute(&mut **tx)
    .await
    .map(|_| ())
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversation_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row).map_err(query_err)?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn list_sessions(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let mut sql =
            String::from("SELECT * FROM conversation_sessions ORDER BY last_message_at DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = SessionRow::from_row(row).map_err(query_err)?;
            sessions.push(session_row.into_session()?);
        }
        Ok(sessions)
    }

    async fn sessions_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_sessions WHERE animal_id = ? ORDER BY last_message_at DESC",
        )
        .bind(animal_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = SessionRow::from_row(row).map_err(query_err)?;
            sessions.push(session_row.into_session()?);
        }
        Ok(sessions)
    }

    async fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_sessions WHERE user_id = ? ORDER BY last_message_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = SessionRow::from_row(row).map_err(query_err)?;
            sessions.push(session_row.into_session()?);
        }
        Ok(sessions)
    }

    async fn append_turn_pair(
        &self,
        target: SessionTarget,
        user_turn: TurnDraft,
        assistant_turn: TurnDraft,
        request_id: Option<&str>,
    ) -> Result<(ConversationTurn, ConversationTurn), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let session_id = match &target {
            SessionTarget::Existing(id) => {
                let exists = sqlx::query("SELECT 1 FROM conversation_sessions WHERE id = ?")
                    .bind(id.to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(query_err)?;
                if exists.is_none() {
                    return Err(RepositoryError::NotFound);
                }
                *id
            }
            SessionTarget::Create(session) => {
                sqlx::query(
                    r#"INSERT INTO conversation_sessions (id, user_id, animal_id, animal_name, started_at, last_message_at, message_count)
                       VALUES (?, ?, ?, ?, ?, ?, 0)"#,
                )
                .bind(session.id.to_string())
                .bind(&session.user_id)
                .bind(session.animal_id.to_string())
                .bind(&session.animal_name)
                .bind(format_datetime(&session.started_at))
                .bind(format_datetime(&session.last_message_at))
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
                session.id
            }
        };

        let row = sqlx::query(
            "SELECT COALESCE(MAX(seq), 0) AS max_seq FROM conversation_turns WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(query_err)?;
        let max_seq: i64 = row.try_get("max_seq").map_err(query_err)?;

        let user = completed(user_turn, session_id, max_seq + 1);
        let assistant = completed(assistant_turn, session_id, max_seq + 2);

        // The request_id rides on the assistant turn; its partial unique
        // index is what turns a duplicate resubmission into a Conflict
        // that aborts the whole transaction.
        insert_turn(&mut tx, &user, None).await.map_err(query_err)?;
        match insert_turn(&mut tx, &assistant, request_id).await {
            Ok(()) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                return Err(RepositoryError::Conflict(format!(
                    "request '{}' already persisted",
                    request_id.unwrap_or_default()
                )));
            }
            Err(e) => return Err(query_err(e)),
        }

        sqlx::query(
            r#"UPDATE conversation_sessions
               SET message_count = message_count + 2, last_message_at = ?
               WHERE id = ?"#,
        )
        .bind(format_datetime(&assistant.created_at))
        .bind(session_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        Ok((user, assistant))
    }

    async fn get_turns(
        &self,
        session_id: &SessionId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let mut sql =
            String::from("SELECT * FROM conversation_turns WHERE session_id = ? ORDER BY seq ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let rows = sqlx::query(&sql)
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            let turn_row = TurnRow::from_row(row).map_err(query_err)?;
            turns.push(turn_row.into_turn()?);
        }
        Ok(turns)
    }

    async fn last_turns(
        &self,
        session_id: &SessionId,
        window: i64,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM conversation_turns WHERE session_id = ? ORDER BY seq DESC LIMIT ?
               ) ORDER BY seq ASC"#,
        )
        .bind(session_id.to_string())
        .bind(window.max(0))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            let turn_row = TurnRow::from_row(row).map_err(query_err)?;
            turns.push(turn_row.into_turn()?);
        }
        Ok(turns)
    }

    async fn find_turn_by_request_id(
        &self,
        session_id: &SessionId,
        request_id: &str,
    ) -> Result<Option<ConversationTurn>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM conversation_turns WHERE session_id = ? AND request_id = ?",
        )
        .bind(session_id.to_string())
        .bind(request_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => {
                let turn_row = TurnRow::from_row(&row).map_err(query_err)?;
                Ok(Some(turn_row.into_turn()?))
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_sessions_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_sessions WHERE animal_id = ?")
            .bind(animal_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::temp_pool;
    use chrono::Utc;

    fn make_session(user_id: &str, animal_id: AnimalId) -> ConversationSession {
        let now = Utc::now();
        ConversationSession {
            id: SessionId::new(),
            user_id: user_id.to_string(),
            animal_id,
            animal_name: "Bella".to_string(),
            started_at: now,
            last_message_at: now,
            message_count: 0,
        }
    }

    fn user_draft(content: &str) -> TurnDraft {
        TurnDraft {
            id: TurnId::new(),
            role: TurnRole::User,
            content: content.to_string(),
            created_at: Utc::now(),
            animal_name: None,
            metadata: None,
        }
    }

    fn assistant_draft(content: &str) -> TurnDraft {
        TurnDraft {
            id: TurnId::new(),
            role: TurnRole::Assistant,
            content: content.to_string(),
            created_at: Utc::now(),
            animal_name: Some("Bella".to_string()),
            metadata: Some(TurnMetadata {
                model: "ambassador-large".to_string(),
                tokens_used: 42,
                processing_ms: 120,
            }),
        }
    }

    async fn seed_session(
        repo: &SqliteConversationRepository,
        user_id: &str,
        animal_id: AnimalId,
    ) -> SessionId {
        let session = make_session(user_id, animal_id);
        let (_, assistant) = repo
            .append_turn_pair(
                SessionTarget::Create(session),
                user_draft("Hello!"),
                assistant_draft("Hi, I'm Bella!"),
                None,
            )
            .await
            .unwrap();
        assistant.session_id
    }

    #[tokio::test]
    async fn test_pair_write_creates_session_with_counters() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let session_id = seed_session(&repo, "visitor-7", AnimalId::new()).await;

        let session = repo.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.message_count, 2);

        let turns = repo.get_turns(&session_id, None, None).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].seq, 1);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].seq, 2);
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].metadata.as_ref().unwrap().tokens_used, 42);
    }

    #[tokio::test]
    async fn test_seq_strictly_increases_across_pairs() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = seed_session(&repo, "visitor-7", AnimalId::new()).await;

        for content in ["two", "three"] {
            repo.append_turn_pair(
                SessionTarget::Existing(session_id),
                user_draft(content),
                assistant_draft(content),
                None,
            )
            .await
            .unwrap();
        }

        let turns = repo.get_turns(&session_id, None, None).await.unwrap();
        let seqs: Vec<i64> = turns.iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_pair_into_missing_session_fails_and_writes_nothing() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());

        let ghost = SessionId::new();
        let err = repo
            .append_turn_pair(
                SessionTarget::Existing(ghost),
                user_draft("anyone?"),
                assistant_draft("..."),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversation_turns")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_duplicate_request_id_conflicts_and_rolls_back() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = seed_session(&repo, "visitor-7", AnimalId::new()).await;

        repo.append_turn_pair(
            SessionTarget::Existing(session_id),
            user_draft("quills?"),
            assistant_draft("Quills are modified hairs!"),
            Some("req-42"),
        )
        .await
        .unwrap();

        let err = repo
            .append_turn_pair(
                SessionTarget::Existing(session_id),
                user_draft("quills?"),
                assistant_draft("different text"),
                Some("req-42"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // The failed pair left no partial writes behind.
        let turns = repo.get_turns(&session_id, None, None).await.unwrap();
        assert_eq!(turns.len(), 4);
        let session = repo.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.message_count, 4);

        let original = repo
            .find_turn_by_request_id(&session_id, "req-42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(original.content, "Quills are modified hairs!");
    }

    #[tokio::test]
    async fn test_last_turns_window_in_ascending_order() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = seed_session(&repo, "visitor-7", AnimalId::new()).await;
        for content in ["two", "three", "four"] {
            repo.append_turn_pair(
                SessionTarget::Existing(session_id),
                user_draft(content),
                assistant_draft(content),
                None,
            )
            .await
            .unwrap();
        }

        let window = repo.last_turns(&session_id, 3).await.unwrap();
        let seqs: Vec<i64> = window.iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![6, 7, 8]);
    }

    #[tokio::test]
    async fn test_delete_session_cascades_to_turns() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let animal_id = AnimalId::new();
        let session_id = seed_session(&repo, "visitor-7", animal_id).await;
        let other_session = seed_session(&repo, "visitor-7", animal_id).await;

        assert_eq!(repo.delete_session(&session_id).await.unwrap(), 1);

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversation_turns WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&pool.reader)
        .await
        .unwrap();
        assert_eq!(count.0, 0);

        // The other session for the same user/animal is untouched.
        assert_eq!(
            repo.get_turns(&other_session, None, None).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_by_user_spans_animals() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        seed_session(&repo, "visitor-7", AnimalId::new()).await;
        seed_session(&repo, "visitor-7", AnimalId::new()).await;
        let other = seed_session(&repo, "visitor-8", AnimalId::new()).await;

        assert_eq!(repo.delete_sessions_for_user("visitor-7").await.unwrap(), 2);
        assert!(repo.sessions_for_user("visitor-7").await.unwrap().is_empty());
        assert!(repo.get_session(&other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_session_is_zero_not_error() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        assert_eq!(repo.delete_session(&SessionId::new()).await.unwrap(), 0);
    }
}
