use sqlx::{Pool, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::db::models::{TokenTransaction, TokenUsageLog};
use crate::error::AppError;

pub struct NewTransaction<'a> {
    pub project_id: &'a str,
    pub user_id: &'a str,
    pub pack_id: &'a str,
    pub stripe_session_id: &'a str,
    pub model: &'a str,
    pub tokens: i64,
    pub amount_cents: i64,
}

pub struct NewUsage<'a> {
    pub project_id: &'a str,
    pub user_id: &'a str,
    pub chat_id: &'a str,
    pub assistant: &'a str,
    pub model: &'a str,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

pub struct TokenLedgerRepository;

impl TokenLedgerRepository {
    pub async fn find_by_session(
        conn: &mut SqliteConnection,
        stripe_session_id: &str,
    ) -> Result<Option<TokenTransaction>, AppError> {
        let tx = sqlx::query_as::<_, TokenTransaction>(
            "SELECT * FROM token_transactions WHERE stripe_session_id = ?",
        )
        .bind(stripe_session_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(tx)
    }

    pub async fn record_purchase(
        conn: &mut SqliteConnection,
        new: NewTransaction<'_>,
    ) -> Result<TokenTransaction, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();

        let tx = sqlx::query_as::<_, TokenTransaction>(
            r#"
INSERT INTO token_transactions
    (id, project_id, user_id, pack_id, stripe_session_id, model, tokens, amount_cents, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(new.project_id)
        .bind(new.user_id)
        .bind(new.pack_id)
        .bind(new.stripe_session_id)
        .bind(new.model)
        .bind(new.tokens)
        .bind(new.amount_cents)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(tx)
    }

    pub async fn list_purchases(
        pool: &Pool<Sqlite>,
        project_id: &str,
    ) -> Result<Vec<TokenTransaction>, AppError> {
        let rows = sqlx::query_as::<_, TokenTransaction>(
            "SELECT * FROM token_transactions WHERE project_id = ? ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn record_usage(
        pool: &Pool<Sqlite>,
        new: NewUsage<'_>,
    ) -> Result<TokenUsageLog, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();

        let log = sqlx::query_as::<_, TokenUsageLog>(
            r#"
INSERT INTO token_usage_logs
    (id, project_id, user_id, chat_id, assistant, model, input_tokens, output_tokens, total_tokens, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(new.project_id)
        .bind(new.user_id)
        .bind(new.chat_id)
        .bind(new.assistant)
        .bind(new.model)
        .bind(new.input_tokens)
        .bind(new.output_tokens)
        .bind(new.input_tokens + new.output_tokens)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(log)
    }

    pub async fn list_usage(
        pool: &Pool<Sqlite>,
        project_id: &str,
        limit: i64,
    ) -> Result<Vec<TokenUsageLog>, AppError> {
        let rows = sqlx::query_as::<_, TokenUsageLog>(
            "SELECT * FROM token_usage_logs WHERE project_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
