use thiserror::Error;

/// Errors from repository operations (used by trait definitions in
/// menagerie-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from prompt compilation.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("configuration unresolved: {0}")]
    ConfigurationUnresolved(String),
}

/// Errors related to assistant lifecycle operations.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant not found")]
    NotFound,

    #[error("animal '{0}' already has an assistant")]
    DuplicateAssistant(String),

    #[error("animal '{0}' does not exist or is inactive")]
    InvalidAnimal(String),

    #[error("too many knowledge refs: {count} (max {max})")]
    TooManyKnowledgeRefs { count: usize, max: usize },

    #[error("assistants cannot be reassigned to a different animal")]
    AnimalReassignmentForbidden,

    #[error(transparent)]
    Compile(#[from] PromptError),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors related to sandbox lifecycle operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("sandbox not found")]
    NotFound,

    #[error("animal '{0}' does not exist or is inactive")]
    InvalidAnimal(String),

    #[error("sandbox expired")]
    Expired,

    #[error("sandbox has no successful trial turn yet")]
    NotYetTrialed,

    #[error("sandbox is not in tested state")]
    NotTested,

    #[error("promotion requires a capability token")]
    Unauthorized,

    #[error("too many knowledge refs: {count} (max {max})")]
    TooManyKnowledgeRefs { count: usize, max: usize },

    #[error(transparent)]
    Compile(#[from] PromptError),

    #[error("generator error: {0}")]
    Generate(String),

    #[error("generator timed out")]
    GenerateTimeout,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors related to conversation session operations.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session does not belong to the given user/animal")]
    SessionMismatch,

    #[error("animal '{0}' has no active assistant configured")]
    AssistantNotConfigured(String),

    #[error("configuration unresolved: {0}")]
    ConfigurationUnresolved(String),

    #[error("not found")]
    NotFound,

    #[error("deleting by user requires GDPR confirmation and an audit reason")]
    GdprConfirmationRequired,

    #[error("reply generator timed out")]
    ReplyGeneratorTimeout,

    #[error("reply generator error: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for AssistantError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AssistantError::NotFound,
            other => AssistantError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for SandboxError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => SandboxError::NotFound,
            other => SandboxError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ConversationError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => ConversationError::NotFound,
            other => ConversationError::Storage(other.to_string()),
        }
    }
}
