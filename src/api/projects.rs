use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::api::double_option;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{Project, ProjectMetadata, ProjectRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: ProjectMetadata,
}

/// `description: null` clears the description.
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub metadata: Option<ProjectMetadata>,
}

fn validate_name(name: &str) -> Result<&str, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 100 {
        return Err(AppError::Validation("Project name must be 1-100 characters".to_string()));
    }
    Ok(trimmed)
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = ProjectRepository::list_for_owner(&state.db, &user.id).await?;
    Ok(Json(projects))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let name = validate_name(&req.name)?;

    let project = ProjectRepository::create(
        &state.db,
        &user.id,
        name,
        req.description.as_deref(),
        &req.metadata,
    )
    .await?;

    tracing::info!("Project {} created by {}", project.id, user.id);
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, AppError> {
    let project = ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;
    Ok(Json(project))
}

/// PATCH /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;

    let name = req.name.as_deref().map(validate_name).transpose()?;

    let project = ProjectRepository::update(
        &state.db,
        &project_id,
        name,
        req.description.as_ref().map(|d| d.as_deref()),
        req.metadata.as_ref(),
    )
    .await?;

    Ok(Json(project))
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<StatusCode, AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;
    ProjectRepository::delete(&state.db, &project_id).await?;

    tracing::info!("Project {} deleted by {}", project_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}
