pub mod purchases;
pub mod stripe;
pub mod subscriptions;

pub use stripe::StripeClient;

use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::db::UserRepository;
use crate::error::AppError;

/// A hosted Stripe Checkout page the client should redirect to.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutLink {
    pub session_id: String,
    pub url: Option<String>,
}

/// Stripe customer id of a user, creating the customer on first use.
pub async fn ensure_customer(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
) -> Result<String, AppError> {
    let user = UserRepository::get_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if let Some(customer_id) = user.stripe_customer_id {
        return Ok(customer_id);
    }

    let full_name = match (user.name.as_deref(), user.surname.as_deref()) {
        (Some(name), Some(surname)) => Some(format!("{} {}", name, surname)),
        (Some(name), None) => Some(name.to_string()),
        (None, Some(surname)) => Some(surname.to_string()),
        (None, None) => None,
    };

    let customer = stripe
        .create_customer(&user.email, full_name.as_deref(), &user.id)
        .await?;
    UserRepository::set_stripe_customer(db, &user.id, &customer.id).await?;

    tracing::info!("Created Stripe customer {} for user {}", customer.id, user.id);
    Ok(customer.id)
}
