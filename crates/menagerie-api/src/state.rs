//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and
//! REST API. Services are generic over repository/hasher/generator
//! traits, but AppState pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use menagerie_core::assistant::AssistantService;
use menagerie_core::conversation::{ConversationService, EngineConfig};
use menagerie_core::directory::DirectoryService;
use menagerie_core::sandbox::SandboxService;
use menagerie_infra::config::load_global_config;
use menagerie_infra::crypto::hash::Sha256ContentHasher;
use menagerie_infra::generate::HttpReplyGenerator;
use menagerie_infra::resolve_data_dir;
use menagerie_infra::sqlite::assistant::SqliteAssistantRepository;
use menagerie_infra::sqlite::conversation::SqliteConversationRepository;
use menagerie_infra::sqlite::directory::SqliteDirectoryRepository;
use menagerie_infra::sqlite::pool::DatabasePool;
use menagerie_infra::sqlite::sandbox::SqliteSandboxRepository;
use menagerie_types::config::GlobalConfig;

/// Concrete type aliases for the service generics pinned to infra
/// implementations.
pub type ConcreteDirectoryService = DirectoryService<SqliteDirectoryRepository>;

pub type ConcreteAssistantService =
    AssistantService<SqliteAssistantRepository, SqliteDirectoryRepository, Sha256ContentHasher>;

pub type ConcreteSandboxService = SandboxService<
    SqliteSandboxRepository,
    SqliteDirectoryRepository,
    Sha256ContentHasher,
    HttpReplyGenerator,
>;

pub type ConcreteConversationService = ConversationService<
    SqliteConversationRepository,
    SqliteAssistantRepository,
    SqliteDirectoryRepository,
    Sha256ContentHasher,
    HttpReplyGenerator,
>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory_service: Arc<ConcreteDirectoryService>,
    pub assistant_service: Arc<ConcreteAssistantService>,
    pub sandbox_service: Arc<ConcreteSandboxService>,
    pub conversation_service: Arc<ConcreteConversationService>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("menagerie.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let config = load_global_config(&data_dir).await;
        let engine_config = EngineConfig::from(&config);

        let directory_service =
            DirectoryService::new(SqliteDirectoryRepository::new(db_pool.clone()));

        let assistant_service = AssistantService::new(
            SqliteAssistantRepository::new(db_pool.clone()),
            SqliteDirectoryRepository::new(db_pool.clone()),
            Sha256ContentHasher::new(),
        );

        let sandbox_service = SandboxService::new(
            SqliteSandboxRepository::new(db_pool.clone()),
            SqliteDirectoryRepository::new(db_pool.clone()),
            Sha256ContentHasher::new(),
            HttpReplyGenerator::new(&config.generator)
                .map_err(|e| anyhow::anyhow!("generator setup failed: {e}"))?,
            engine_config.reply_timeout,
        );

        // The conversation engine owns its own assistant service instance
        // (cheap: repositories share the pool); the API-facing one above
        // serves assistant CRUD.
        let conversation_service = ConversationService::new(
            SqliteConversationRepository::new(db_pool.clone()),
            AssistantService::new(
                SqliteAssistantRepository::new(db_pool.clone()),
                SqliteDirectoryRepository::new(db_pool.clone()),
                Sha256ContentHasher::new(),
            ),
            HttpReplyGenerator::new(&config.generator)
                .map_err(|e| anyhow::anyhow!("generator setup failed: {e}"))?,
            engine_config,
        );

        Ok(Self {
            directory_service: Arc::new(directory_service),
            assistant_service: Arc::new(assistant_service),
            sandbox_service: Arc::new(sandbox_service),
            conversation_service: Arc::new(conversation_service),
            config,
            data_dir,
            db_pool,
        })
    }
}
