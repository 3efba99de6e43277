use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::ai::AiModel;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::billing::purchases::{self, PurchaseVerification, TokenBalance};
use crate::billing::CheckoutLink;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct TokenCheckoutRequest {
    pub model: AiModel,
    pub tokens: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPurchaseRequest {
    pub session_id: String,
}

/// GET /api/projects/:id/tokens
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<TokenBalance>, AppError> {
    let balance = purchases::get_token_balance(&state.db, &user.id, &project_id).await?;
    Ok(Json(balance))
}

/// POST /api/projects/:id/tokens/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(req): Json<TokenCheckoutRequest>,
) -> Result<Json<CheckoutLink>, AppError> {
    let link = purchases::create_token_checkout(
        &state.db,
        &state.stripe,
        &state.config.app_base_url,
        &user.id,
        &project_id,
        req.model,
        req.tokens,
    )
    .await?;

    Ok(Json(link))
}

/// POST /api/tokens/verify
pub async fn verify_purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<VerifyPurchaseRequest>,
) -> Result<Json<PurchaseVerification>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id is required".to_string()));
    }

    let verification = purchases::verify_token_purchase(
        &state.db,
        &state.stripe,
        state.config.token_pack_validity_days,
        &user.id,
        req.session_id.trim(),
    )
    .await?;

    Ok(Json(verification))
}
