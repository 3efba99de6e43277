use sqlx::types::Json;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{Project, ProjectMetadata};
use crate::error::AppError;

pub struct ProjectRepository;

impl ProjectRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
        metadata: &ProjectMetadata,
    ) -> Result<Project, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let project = sqlx::query_as::<_, Project>(
            r#"
INSERT INTO projects (id, owner_id, name, description, metadata, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(Json(metadata))
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(project)
    }

    /// Fetches a project and checks that `user_id` owns it.
    pub async fn get_owned(
        pool: &Pool<Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Project, AppError> {
        let project = Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        if project.owner_id != user_id {
            return Err(AppError::Forbidden("Project belongs to another user".to_string()));
        }

        Ok(project)
    }

    pub async fn list_for_owner(
        pool: &Pool<Sqlite>,
        owner_id: &str,
    ) -> Result<Vec<Project>, AppError> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE owner_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    pub async fn update(
        pool: &Pool<Sqlite>,
        id: &str,
        name: Option<&str>,
        description: Option<Option<&str>>,
        metadata: Option<&ProjectMetadata>,
    ) -> Result<Project, AppError> {
        let now = chrono::Utc::now().timestamp();

        let project = sqlx::query_as::<_, Project>(
            r#"
UPDATE projects
SET name = COALESCE(?, name),
    description = CASE WHEN ? THEN ? ELSE description END,
    metadata = COALESCE(?, metadata),
    updated_at = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(name)
        .bind(description.is_some())
        .bind(description.flatten())
        .bind(metadata.map(Json))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        Ok(project)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
