use sqlx::types::Json;
use sqlx::{Pool, Sqlite};

use crate::db::models::{User, UserMetadata};
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    /// Inserts the user on first sight and keeps the email in sync afterwards.
    pub async fn upsert(
        pool: &Pool<Sqlite>,
        id: &str,
        email: &str,
    ) -> Result<User, AppError> {
        let now = chrono::Utc::now().timestamp();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (id, email, metadata, created_at, updated_at)
VALUES (?, ?, '{}', ?, ?)
ON CONFLICT(id) DO UPDATE SET email = excluded.email
RETURNING *
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn update_profile(
        pool: &Pool<Sqlite>,
        id: &str,
        name: Option<&str>,
        surname: Option<&str>,
    ) -> Result<User, AppError> {
        let now = chrono::Utc::now().timestamp();

        let user = sqlx::query_as::<_, User>(
            r#"
UPDATE users
SET name = COALESCE(?, name), surname = COALESCE(?, surname), updated_at = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(name)
        .bind(surname)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    pub async fn update_metadata(
        pool: &Pool<Sqlite>,
        id: &str,
        metadata: &UserMetadata,
    ) -> Result<User, AppError> {
        let now = chrono::Utc::now().timestamp();

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET metadata = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(Json(metadata))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    pub async fn set_stripe_customer(
        pool: &Pool<Sqlite>,
        id: &str,
        customer_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET stripe_customer_id = ?, updated_at = ? WHERE id = ?")
            .bind(customer_id)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
