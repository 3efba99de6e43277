use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::Update;
use crate::error::AppError;

pub struct UpdateRepository;

impl UpdateRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        author_id: &str,
        title: &str,
        content: &str,
        tag: &str,
        version: Option<&str>,
    ) -> Result<Update, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();

        let update = sqlx::query_as::<_, Update>(
            r#"
INSERT INTO updates (id, author_id, title, content, tag, version, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(author_id)
        .bind(title)
        .bind(content)
        .bind(tag)
        .bind(version)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(update)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Update>, AppError> {
        let update = sqlx::query_as::<_, Update>("SELECT * FROM updates WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(update)
    }

    pub async fn list_recent(
        pool: &Pool<Sqlite>,
        tag: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Update>, AppError> {
        let updates = sqlx::query_as::<_, Update>(
            r#"
SELECT * FROM updates
WHERE (? IS NULL OR tag = ?)
ORDER BY created_at DESC, rowid DESC
LIMIT ?
            "#,
        )
        .bind(tag)
        .bind(tag)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(updates)
    }
}
