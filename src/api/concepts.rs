use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;

use crate::api::double_option;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{Concept, ConceptMetadata, ConceptRepository, ProjectRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ConceptRangeQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateConceptRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub scheduled_at: Option<i64>,
}

/// `null` clears `description` or takes the concept off the calendar.
#[derive(Debug, Deserialize)]
pub struct UpdateConceptRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_at: Option<Option<i64>>,
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 200 {
        return Err(AppError::Validation("Concept title must be 1-200 characters".to_string()));
    }
    Ok(trimmed.to_string())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Loads a concept whose project is owned by `user_id`.
async fn owned_concept(
    db: &Pool<Sqlite>,
    concept_id: &str,
    user_id: &str,
) -> Result<Concept, AppError> {
    let concept = ConceptRepository::get_by_id(db, concept_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Concept not found".to_string()))?;
    ProjectRepository::get_owned(db, &concept.project_id, user_id).await?;
    Ok(concept)
}

/// GET /api/projects/:id/concepts?from=&to=
pub async fn list_concepts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Query(query): Query<ConceptRangeQuery>,
) -> Result<Json<Vec<Concept>>, AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;

    let range = match (query.from, query.to) {
        (Some(from), Some(to)) if from < to => Some((from, to)),
        (None, None) => None,
        _ => return Err(AppError::Validation("from and to must form a range".to_string())),
    };

    let concepts = ConceptRepository::list_for_project(&state.db, &project_id, range).await?;
    Ok(Json(concepts))
}

/// POST /api/projects/:id/concepts
pub async fn create_concept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(req): Json<CreateConceptRequest>,
) -> Result<(StatusCode, Json<Concept>), AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;
    let title = validate_title(&req.title)?;

    let metadata = ConceptMetadata {
        tags: clean_tags(req.tags),
        completed: false,
    };

    let concept = ConceptRepository::create(
        &state.db,
        &project_id,
        &user.id,
        &title,
        req.description.as_deref(),
        &metadata,
        req.scheduled_at,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(concept)))
}

/// PATCH /api/concepts/:id
pub async fn update_concept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(concept_id): Path<String>,
    Json(req): Json<UpdateConceptRequest>,
) -> Result<Json<Concept>, AppError> {
    let current = owned_concept(&state.db, &concept_id, &user.id).await?;

    let title = match req.title.as_deref() {
        Some(title) => validate_title(title)?,
        None => current.title,
    };
    let mut metadata = current.metadata.0;
    if let Some(tags) = req.tags {
        metadata.tags = clean_tags(tags);
    }
    let description = req.description.unwrap_or(current.description);
    let scheduled_at = req.scheduled_at.unwrap_or(current.scheduled_at);

    let concept = ConceptRepository::update(
        &state.db,
        &concept_id,
        &title,
        description.as_deref(),
        &metadata,
        scheduled_at,
    )
    .await?;

    Ok(Json(concept))
}

/// POST /api/concepts/:id/toggle
pub async fn toggle_completed(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(concept_id): Path<String>,
) -> Result<Json<Concept>, AppError> {
    let current = owned_concept(&state.db, &concept_id, &user.id).await?;

    let mut metadata = current.metadata.0;
    metadata.completed = !metadata.completed;

    let concept = ConceptRepository::update(
        &state.db,
        &concept_id,
        &current.title,
        current.description.as_deref(),
        &metadata,
        current.scheduled_at,
    )
    .await?;

    Ok(Json(concept))
}

/// DELETE /api/concepts/:id
pub async fn delete_concept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(concept_id): Path<String>,
) -> Result<StatusCode, AppError> {
    owned_concept(&state.db, &concept_id, &user.id).await?;
    ConceptRepository::delete(&state.db, &concept_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::clean_tags;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = clean_tags(vec![
            " design ".to_string(),
            "design".to_string(),
            "".to_string(),
            "launch".to_string(),
            "design".to_string(),
        ]);
        assert_eq!(tags, vec!["design".to_string(), "launch".to_string()]);
    }
}
