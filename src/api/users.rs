use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{User, UserMetadata, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetAvatarRequest {
    pub avatar_url: Option<String>,
}

fn clean_name(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    match value {
        Some(v) => {
            let trimmed = v.trim();
            if trimmed.is_empty() || trimmed.chars().count() > 64 {
                return Err(AppError::Validation(format!("{} must be 1-64 characters", field)));
            }
            Ok(Some(trimmed.to_string()))
        }
        None => Ok(None),
    }
}

/// GET /api/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::get_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// PATCH /api/me
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let name = clean_name(req.name, "name")?;
    let surname = clean_name(req.surname, "surname")?;

    let user =
        UserRepository::update_profile(&state.db, &user.id, name.as_deref(), surname.as_deref())
            .await?;

    Ok(Json(user))
}

/// PUT /api/me/avatar
///
/// The image itself is uploaded to the `avatars` bucket by the client; only
/// URLs inside that bucket are accepted here. `null` clears the avatar.
pub async fn set_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SetAvatarRequest>,
) -> Result<Json<User>, AppError> {
    if let Some(url) = req.avatar_url.as_deref() {
        let bucket = state.config.avatar_bucket_url();
        if !state.config.supabase_storage_url.is_empty() && !url.starts_with(&bucket) {
            return Err(AppError::Validation(format!("Avatar URL must start with {}", bucket)));
        }
    }

    let current = UserRepository::get_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut metadata: UserMetadata = current.metadata.0;
    metadata.avatar_url = req.avatar_url;
    let user = UserRepository::update_metadata(&state.db, &user.id, &metadata).await?;

    Ok(Json(user))
}
