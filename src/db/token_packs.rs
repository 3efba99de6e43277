use sqlx::types::Json;
use sqlx::{Pool, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::db::models::{TokenBalances, TokenPack};
use crate::error::AppError;

pub struct TokenPackRepository;

/// JSON path addressing one model's entry in a balance map.
fn model_path(model: &str) -> String {
    format!("$.\"{}\"", model.replace('"', ""))
}

impl TokenPackRepository {
    /// The newest non-expired pack of a project.
    pub async fn active_for_project(
        pool: &Pool<Sqlite>,
        project_id: &str,
    ) -> Result<Option<TokenPack>, AppError> {
        let mut conn = pool.acquire().await?;
        Self::active_for_project_conn(&mut conn, project_id).await
    }

    pub async fn active_for_project_conn(
        conn: &mut SqliteConnection,
        project_id: &str,
    ) -> Result<Option<TokenPack>, AppError> {
        let now = chrono::Utc::now().timestamp();

        let pack = sqlx::query_as::<_, TokenPack>(
            r#"
SELECT * FROM token_packs
WHERE project_id = ? AND expires_at > ?
ORDER BY created_at DESC, rowid DESC
LIMIT 1
            "#,
        )
        .bind(project_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(pack)
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        project_id: &str,
        balances: &TokenBalances,
        price_paid: i64,
        expires_at: i64,
    ) -> Result<TokenPack, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();

        let pack = sqlx::query_as::<_, TokenPack>(
            r#"
INSERT INTO token_packs (id, project_id, tokens_purchased, remaining_tokens, price_paid, expires_at, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(project_id)
        .bind(Json(balances))
        .bind(Json(balances))
        .bind(price_paid)
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(pack)
    }

    /// Adds purchased tokens for one model to an existing pack.
    pub async fn credit(
        conn: &mut SqliteConnection,
        pack_id: &str,
        model: &str,
        tokens: i64,
        price_paid: i64,
    ) -> Result<TokenPack, AppError> {
        let path = model_path(model);

        let pack = sqlx::query_as::<_, TokenPack>(
            r#"
UPDATE token_packs
SET tokens_purchased = json_set(tokens_purchased, ?, COALESCE(json_extract(tokens_purchased, ?), 0) + ?),
    remaining_tokens = json_set(remaining_tokens, ?, COALESCE(json_extract(remaining_tokens, ?), 0) + ?),
    price_paid = price_paid + ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(&path)
        .bind(&path)
        .bind(tokens)
        .bind(&path)
        .bind(&path)
        .bind(tokens)
        .bind(price_paid)
        .bind(pack_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Token pack not found".to_string()))?;

        Ok(pack)
    }

    /// Subtracts `cost` from one model's remaining balance, flooring at zero.
    ///
    /// The arithmetic happens inside a single UPDATE, so concurrent callers
    /// never overwrite each other's decrement.
    pub async fn deduct(
        pool: &Pool<Sqlite>,
        pack_id: &str,
        model: &str,
        cost: i64,
    ) -> Result<TokenPack, AppError> {
        let path = model_path(model);

        let pack = sqlx::query_as::<_, TokenPack>(
            r#"
UPDATE token_packs
SET remaining_tokens = json_set(
    remaining_tokens, ?,
    MAX(COALESCE(json_extract(remaining_tokens, ?), 0) - ?, 0)
)
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(&path)
        .bind(&path)
        .bind(cost)
        .bind(pack_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Token pack not found".to_string()))?;

        Ok(pack)
    }
}
