use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{Update, UpdateRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListUpdatesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub tag: Option<String>,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CreateUpdateRequest {
    pub title: String,
    pub content: String,
    pub tag: String,
    pub version: Option<String>,
}

/// GET /api/updates
pub async fn list_updates(
    State(state): State<AppState>,
    Query(query): Query<ListUpdatesQuery>,
) -> Result<Json<Vec<Update>>, AppError> {
    let limit = query.limit.clamp(1, 100);

    let updates = UpdateRepository::list_recent(&state.db, query.tag.as_deref(), limit).await?;
    Ok(Json(updates))
}

/// GET /api/updates/:id
pub async fn get_update(
    State(state): State<AppState>,
    Path(update_id): Path<String>,
) -> Result<Json<Update>, AppError> {
    let update = UpdateRepository::get_by_id(&state.db, &update_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Update not found".to_string()))?;
    Ok(Json(update))
}

/// POST /api/updates
pub async fn create_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateUpdateRequest>,
) -> Result<(StatusCode, Json<Update>), AppError> {
    let title = req.title.trim();
    let tag = req.tag.trim();
    if title.is_empty() || req.content.trim().is_empty() || tag.is_empty() {
        return Err(AppError::Validation("title, content and tag are required".to_string()));
    }

    let update = UpdateRepository::create(
        &state.db,
        &user.id,
        title,
        &req.content,
        tag,
        req.version.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(update)))
}
