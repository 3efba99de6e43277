pub mod billing;
pub mod chat;
pub mod concepts;
pub mod middleware;
pub mod projects;
pub mod state;
pub mod tokens;
pub mod updates;
pub mod users;

pub use middleware::{AuthUser, RateLimiter};
pub use state::AppState;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState, rate_limiter: Arc<RateLimiter>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let protected = Router::new()
        // Profile
        .route("/api/me", get(users::me).patch(users::update_profile))
        .route("/api/me/avatar", put(users::set_avatar))
        // Projects
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        // Token packs
        .route("/api/projects/:id/tokens", get(tokens::get_balance))
        .route("/api/projects/:id/tokens/checkout", post(tokens::create_checkout))
        .route("/api/tokens/verify", post(tokens::verify_purchase))
        // Assistants
        .route(
            "/api/projects/:id/assistants/:assistant/generate",
            post(chat::generate),
        )
        .route(
            "/api/projects/:id/assistants/:assistant/chats",
            get(chat::list_chats),
        )
        .route(
            "/api/projects/:id/assistants/:assistant/groups",
            get(chat::list_groups).post(chat::create_group),
        )
        .route(
            "/api/assistants/:assistant/groups/:group_id",
            patch(chat::rename_group).delete(chat::delete_group),
        )
        .route(
            "/api/assistants/:assistant/chats/:chat_id",
            patch(chat::update_chat).delete(chat::delete_chat),
        )
        .route(
            "/api/assistants/:assistant/chats/:chat_id/messages",
            get(chat::get_messages),
        )
        // Concepts
        .route(
            "/api/projects/:id/concepts",
            get(concepts::list_concepts).post(concepts::create_concept),
        )
        .route(
            "/api/concepts/:id",
            patch(concepts::update_concept).delete(concepts::delete_concept),
        )
        .route("/api/concepts/:id/toggle", post(concepts::toggle_completed))
        // Updates
        .route(
            "/api/updates",
            get(updates::list_updates).post(updates::create_update),
        )
        .route("/api/updates/:id", get(updates::get_update))
        // Billing
        .route("/api/billing/prices", get(billing::list_prices))
        .route("/api/billing/subscription", get(billing::get_subscription))
        .route(
            "/api/billing/subscription/checkout",
            post(billing::create_checkout),
        )
        .route(
            "/api/billing/subscription/cancel-at-period-end",
            post(billing::set_cancel_at_period_end),
        )
        .route(
            "/api/billing/subscription/preview",
            post(billing::preview_change),
        )
        .route("/api/billing/subscription/change", post(billing::change_plan))
        .route("/api/billing/invoices", get(billing::list_invoices))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health))
        .merge(protected)
        .layer(axum_middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_middleware(limiter, req, next)
        }))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
