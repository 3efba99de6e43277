use sqlx::types::Json;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{Concept, ConceptMetadata};
use crate::error::AppError;

pub struct ConceptRepository;

impl ConceptRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        project_id: &str,
        created_by: &str,
        title: &str,
        description: Option<&str>,
        metadata: &ConceptMetadata,
        scheduled_at: Option<i64>,
    ) -> Result<Concept, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let concept = sqlx::query_as::<_, Concept>(
            r#"
INSERT INTO concepts (id, project_id, created_by, title, description, metadata, scheduled_at, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(project_id)
        .bind(created_by)
        .bind(title)
        .bind(description)
        .bind(Json(metadata))
        .bind(scheduled_at)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(concept)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Concept>, AppError> {
        let concept = sqlx::query_as::<_, Concept>("SELECT * FROM concepts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(concept)
    }

    /// Concepts of a project, optionally limited to `[from, to)` on `scheduled_at`.
    pub async fn list_for_project(
        pool: &Pool<Sqlite>,
        project_id: &str,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<Concept>, AppError> {
        let concepts = match range {
            Some((from, to)) => {
                sqlx::query_as::<_, Concept>(
                    r#"
SELECT * FROM concepts
WHERE project_id = ? AND scheduled_at >= ? AND scheduled_at < ?
ORDER BY scheduled_at ASC
                    "#,
                )
                .bind(project_id)
                .bind(from)
                .bind(to)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Concept>(
                    "SELECT * FROM concepts WHERE project_id = ? ORDER BY created_at DESC",
                )
                .bind(project_id)
                .fetch_all(pool)
                .await?
            }
        };

        Ok(concepts)
    }

    pub async fn update(
        pool: &Pool<Sqlite>,
        id: &str,
        title: &str,
        description: Option<&str>,
        metadata: &ConceptMetadata,
        scheduled_at: Option<i64>,
    ) -> Result<Concept, AppError> {
        let concept = sqlx::query_as::<_, Concept>(
            r#"
UPDATE concepts
SET title = ?, description = ?, metadata = ?, scheduled_at = ?, updated_at = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(Json(metadata))
        .bind(scheduled_at)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Concept not found".to_string()))?;

        Ok(concept)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM concepts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
