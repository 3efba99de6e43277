use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::billing::stripe::StripeInvoice;
use crate::billing::subscriptions::{
    self, PlanChangePreview, PriceOption, SubscriptionSummary,
};
use crate::billing::CheckoutLink;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub price_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelAtPeriodEndRequest {
    pub cancel: bool,
}

/// GET /api/billing/prices
pub async fn list_prices(
    State(state): State<AppState>,
) -> Result<Json<Vec<PriceOption>>, AppError> {
    Ok(Json(subscriptions::list_prices(&state.stripe).await?))
}

/// GET /api/billing/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<SubscriptionSummary>>, AppError> {
    let summary = subscriptions::get_subscription(&state.db, &state.stripe, &user.id).await?;
    Ok(Json(summary))
}

/// POST /api/billing/subscription/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<CheckoutLink>, AppError> {
    let link = subscriptions::create_subscription_checkout(
        &state.db,
        &state.stripe,
        &state.config.app_base_url,
        &user.id,
        &req.price_id,
    )
    .await?;

    Ok(Json(link))
}

/// POST /api/billing/subscription/cancel-at-period-end
pub async fn set_cancel_at_period_end(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CancelAtPeriodEndRequest>,
) -> Result<Json<SubscriptionSummary>, AppError> {
    let summary =
        subscriptions::set_cancel_at_period_end(&state.db, &state.stripe, &user.id, req.cancel)
            .await?;
    Ok(Json(summary))
}

/// POST /api/billing/subscription/preview
pub async fn preview_change(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<PlanChangePreview>, AppError> {
    let preview =
        subscriptions::preview_plan_change(&state.db, &state.stripe, &user.id, &req.price_id)
            .await?;
    Ok(Json(preview))
}

/// POST /api/billing/subscription/change
pub async fn change_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<SubscriptionSummary>, AppError> {
    let summary =
        subscriptions::change_plan(&state.db, &state.stripe, &user.id, &req.price_id).await?;
    Ok(Json(summary))
}

/// GET /api/billing/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<StripeInvoice>>, AppError> {
    let invoices = subscriptions::list_invoices(&state.db, &state.stripe, &user.id).await?;
    Ok(Json(invoices))
}
