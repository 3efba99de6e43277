pub mod chats;
pub mod concepts;
pub mod models;
pub mod projects;
pub mod token_ledger;
pub mod token_packs;
pub mod updates;
pub mod users;

pub use chats::ChatRepository;
pub use concepts::ConceptRepository;
pub use models::{
    Assistant, Chat, ChatGroup, ChatMessage, Concept, ConceptMetadata, MessageRole, Project,
    ProjectMetadata, TokenBalances, TokenPack, TokenTransaction, TokenUsageLog, Update, User,
    UserMetadata,
};
pub use projects::ProjectRepository;
pub use token_ledger::{NewTransaction, NewUsage, TokenLedgerRepository};
pub use token_packs::TokenPackRepository;
pub use updates::UpdateRepository;
pub use users::UserRepository;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;

/// Opens the pool and applies pending migrations.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let db = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    Ok(db)
}
