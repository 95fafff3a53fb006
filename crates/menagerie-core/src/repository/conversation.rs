//! Conversation repository trait definition.
//!
//! Covers sessions and turns together: the pair-write that creates a turn
//! spans both tables and must be a single storage transaction.

use chrono::{DateTime, Utc};
use menagerie_types::animal::AnimalId;
use menagerie_types::conversation::{
    ConversationSession, ConversationTurn, SessionId, TurnId, TurnMetadata, TurnRole,
};
use menagerie_types::error::RepositoryError;

/// A turn to be persisted. `seq` is assigned by the repository inside the
/// pair-write transaction, never by the caller.
#[derive(Debug, Clone)]
pub struct TurnDraft {
    pub id: TurnId,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub animal_name: Option<String>,
    pub metadata: Option<TurnMetadata>,
}

/// Where a turn pair lands.
#[derive(Debug, Clone)]
pub enum SessionTarget {
    /// Append to an existing session. Fails with `NotFound` if the session
    /// was deleted after the caller resolved it (deletion wins over
    /// in-flight turns).
    Existing(SessionId),
    /// Create the session in the same transaction as its first pair, so a
    /// session only ever exists with at least one complete turn pair.
    Create(ConversationSession),
}

/// Repository trait for conversation session and turn persistence.
///
/// Implementations live in menagerie-infra (e.g., `SqliteConversationRepository`).
pub trait ConversationRepository: Send + Sync {
    /// Get a session by its unique ID.
    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<ConversationSession>, RepositoryError>> + Send;

    /// List all sessions, most recent activity first.
    fn list_sessions(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSession>, RepositoryError>> + Send;

    /// Sessions for one animal, most recent activity first.
    fn sessions_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSession>, RepositoryError>> + Send;

    /// Sessions for one user, most recent activity first.
    fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSession>, RepositoryError>> + Send;

    /// Atomically persist a user+assistant turn pair.
    ///
    /// In one transaction: create the session if `target` is `Create`,
    /// assign the next two `seq` values, insert both turns, and bump the
    /// session's `last_message_at`/`message_count`. Either every write
    /// commits or none does. A duplicate `request_id` within the session
    /// fails with `Conflict` and persists nothing.
    fn append_turn_pair(
        &self,
        target: SessionTarget,
        user_turn: TurnDraft,
        assistant_turn: TurnDraft,
        request_id: Option<&str>,
    ) -> impl std::future::Future<
        Output = Result<(ConversationTurn, ConversationTurn), RepositoryError>,
    > + Send;

    /// Turns for a session in ascending `seq` order.
    fn get_turns(
        &self,
        session_id: &SessionId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationTurn>, RepositoryError>> + Send;

    /// The last `window` turns of a session, still in ascending order.
    fn last_turns(
        &self,
        session_id: &SessionId,
        window: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationTurn>, RepositoryError>> + Send;

    /// The assistant turn of the pair persisted under a client-supplied
    /// request ID, if one exists (idempotent resubmission lookup).
    fn find_turn_by_request_id(
        &self,
        session_id: &SessionId,
        request_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationTurn>, RepositoryError>> + Send;

    /// Delete one session and (cascading) its turns. Returns the number of
    /// sessions removed (0 or 1).
    fn delete_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete every session for an animal. Returns sessions removed.
    fn delete_sessions_for_animal(
        &self,
        animal_id: &AnimalId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete every session for a user, across animals. Returns sessions
    /// removed. The GDPR confirmation gate lives in the service layer;
    /// this method unconditionally deletes.
    fn delete_sessions_for_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
