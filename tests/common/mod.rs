#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use project_dashboard::ai::{AiModel, GenerationProvider};
use project_dashboard::api::AppState;
use project_dashboard::billing::StripeClient;
use project_dashboard::config::Config;
use project_dashboard::db::{
    Project, ProjectMetadata, ProjectRepository, TokenBalances, TokenPack, TokenPackRepository,
    User, UserRepository,
};
use project_dashboard::error::AppError;

pub const JWT_SECRET: &str = "test-jwt-secret";

/// Fresh in-memory database with all migrations applied.
pub async fn test_pool() -> Pool<Sqlite> {
    // One connection: every connection to `sqlite::memory:` is its own database.
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("migrations");

    db
}

/// File-backed database shared by several connections, for concurrency tests.
pub async fn file_pool(path: &std::path::Path, max_connections: u32) -> Pool<Sqlite> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let db = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("file database");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("migrations");

    db
}

pub async fn seed_user(db: &Pool<Sqlite>, id: &str) -> User {
    UserRepository::upsert(db, id, &format!("{}@example.com", id))
        .await
        .expect("seed user")
}

pub async fn seed_project(db: &Pool<Sqlite>, owner_id: &str, name: &str) -> Project {
    ProjectRepository::create(db, owner_id, name, None, &ProjectMetadata::default())
        .await
        .expect("seed project")
}

pub async fn seed_pack(
    db: &Pool<Sqlite>,
    project_id: &str,
    model: AiModel,
    tokens: i64,
    expires_at: i64,
) -> TokenPack {
    let mut conn = db.acquire().await.expect("connection");
    let balances = TokenBalances::from([(model.as_str().to_string(), tokens)]);
    TokenPackRepository::create(&mut conn, project_id, &balances, 100, expires_at)
        .await
        .expect("seed pack")
}

pub fn in_a_year() -> i64 {
    chrono::Utc::now().timestamp() + 365 * 86_400
}

/// Generation backend that returns a fixed reply and counts its calls.
pub struct FakeGenerator {
    pub reply: String,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for FakeGenerator {
    async fn generate(
        &self,
        _system_instruction: &str,
        _prompt: &str,
        _model: AiModel,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Generation backend whose upstream always fails.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn generate(
        &self,
        _system_instruction: &str,
        _prompt: &str,
        _model: AiModel,
    ) -> Result<String, AppError> {
        Err(AppError::Generation("upstream unavailable".to_string()))
    }
}

pub fn test_config(stripe_api_base: &str) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        db_min_connections: 1,
        request_timeout_secs: 30,
        rate_limit_per_minute: 1000,
        supabase_jwt_secret: JWT_SECRET.to_string(),
        supabase_storage_url: "https://storage.example.com/storage/v1".to_string(),
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_api_base: stripe_api_base.to_string(),
        app_base_url: "http://localhost:3000".to_string(),
        gemini_api_key: "test-key".to_string(),
        gemini_api_base: "http://127.0.0.1:9".to_string(),
        token_buffer: 500,
        token_pack_validity_days: 365,
    }
}

pub fn test_state(db: Pool<Sqlite>, generator: Arc<FakeGenerator>, stripe_api_base: &str) -> AppState {
    let config = test_config(stripe_api_base);
    let stripe = StripeClient::new(config.stripe_secret_key.clone(), stripe_api_base);

    AppState {
        db,
        config: Arc::new(config),
        generator,
        stripe: Arc::new(stripe),
    }
}

/// Signs an access token shaped like the ones Supabase Auth issues.
pub fn access_token(user_id: &str) -> String {
    let claims = serde_json::json!({
        "sub": user_id,
        "email": format!("{}@example.com", user_id),
        "aud": "authenticated",
        "role": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("sign token")
}
