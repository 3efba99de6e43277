//! Token-pack purchases through Stripe Checkout.
//!
//! There is no webhook: the client returns from Checkout with the session
//! id and asks for verification. Crediting is keyed on the session id, so
//! repeated verification of the same session credits the pack once.

use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

use super::stripe::{CheckoutLineItem, CreateCheckoutSessionParams, StripeClient};
use super::{ensure_customer, CheckoutLink};
use crate::ai::AiModel;
use crate::db::{
    NewTransaction, ProjectRepository, TokenBalances, TokenLedgerRepository, TokenPack,
    TokenPackRepository, TokenTransaction, TokenUsageLog,
};
use crate::error::AppError;

pub const PACK_SIZES: [i64; 3] = [100_000, 500_000, 1_000_000];

const CURRENCY: &str = "usd";
const RECENT_USAGE_ROWS: i64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseVerification {
    pub already_credited: bool,
    pub transaction: TokenTransaction,
    pub pack: Option<TokenPack>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    pub pack: Option<TokenPack>,
    pub remaining: TokenBalances,
    pub purchases: Vec<TokenTransaction>,
    pub recent_usage: Vec<TokenUsageLog>,
}

pub fn pack_price_cents(model: AiModel, tokens: i64) -> i64 {
    tokens / 1000 * model.cents_per_thousand()
}

pub async fn create_token_checkout(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    app_base_url: &str,
    user_id: &str,
    project_id: &str,
    model: AiModel,
    tokens: i64,
) -> Result<CheckoutLink, AppError> {
    if !PACK_SIZES.contains(&tokens) {
        return Err(AppError::Validation(format!(
            "Token pack size must be one of {:?}",
            PACK_SIZES
        )));
    }

    let project = ProjectRepository::get_owned(db, project_id, user_id).await?;
    let customer_id = ensure_customer(db, stripe, user_id).await?;
    let base = app_base_url.trim_end_matches('/');

    let metadata = HashMap::from([
        ("project_id".to_string(), project.id.clone()),
        ("user_id".to_string(), user_id.to_string()),
        ("model".to_string(), model.as_str().to_string()),
        ("tokens".to_string(), tokens.to_string()),
    ]);

    let session = stripe
        .create_checkout_session(CreateCheckoutSessionParams {
            customer_id,
            line_item: CheckoutLineItem::Inline {
                name: format!("{} tokens for {} ({})", tokens, model, project.name),
                unit_amount: pack_price_cents(model, tokens),
                currency: CURRENCY.to_string(),
            },
            success_url: format!(
                "{}/projects/{}/tokens?session_id={{CHECKOUT_SESSION_ID}}",
                base, project.id
            ),
            cancel_url: format!("{}/projects/{}/tokens", base, project.id),
            metadata,
        })
        .await?;

    tracing::info!(
        "Created token checkout {} for project {} ({} {} tokens)",
        session.id,
        project.id,
        tokens,
        model
    );

    Ok(CheckoutLink {
        session_id: session.id,
        url: session.url,
    })
}

fn metadata_field<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Result<&'a str, AppError> {
    metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| AppError::Validation(format!("Checkout session is missing {}", key)))
}

pub async fn verify_token_purchase(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    validity_days: i64,
    user_id: &str,
    session_id: &str,
) -> Result<PurchaseVerification, AppError> {
    let session = stripe.get_checkout_session(session_id).await?;

    if session.mode != "payment" {
        return Err(AppError::Validation("Not a token purchase session".to_string()));
    }
    if session.payment_status != "paid" {
        return Err(AppError::Validation(format!(
            "Payment not completed (status: {})",
            session.payment_status
        )));
    }

    if metadata_field(&session.metadata, "user_id")? != user_id {
        return Err(AppError::Forbidden("Checkout session belongs to another user".to_string()));
    }
    let project_id = metadata_field(&session.metadata, "project_id")?;
    let model: AiModel = metadata_field(&session.metadata, "model")?.parse()?;
    let tokens: i64 = metadata_field(&session.metadata, "tokens")?
        .parse()
        .map_err(|_| AppError::Validation("Invalid token count in session".to_string()))?;

    ProjectRepository::get_owned(db, project_id, user_id).await?;

    let amount_cents = session
        .amount_total
        .unwrap_or_else(|| pack_price_cents(model, tokens));

    let mut tx = db.begin().await?;

    let existing = TokenLedgerRepository::find_by_session(&mut tx, &session.id).await?;
    if let Some(existing) = existing {
        tx.rollback().await?;
        return already_credited(db, existing).await;
    }

    let active = TokenPackRepository::active_for_project_conn(&mut tx, project_id).await?;
    let pack = match active {
        Some(pack) => {
            TokenPackRepository::credit(&mut tx, &pack.id, model.as_str(), tokens, amount_cents)
                .await?
        }
        None => {
            let balances = TokenBalances::from([(model.as_str().to_string(), tokens)]);
            let expires_at = chrono::Utc::now().timestamp() + validity_days * 86_400;
            TokenPackRepository::create(&mut tx, project_id, &balances, amount_cents, expires_at)
                .await?
        }
    };

    let recorded = TokenLedgerRepository::record_purchase(
        &mut tx,
        NewTransaction {
            project_id,
            user_id,
            pack_id: &pack.id,
            stripe_session_id: &session.id,
            model: model.as_str(),
            tokens,
            amount_cents,
        },
    )
    .await;

    let transaction = match recorded {
        Ok(transaction) => transaction,
        Err(AppError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
            // Lost a race with a concurrent verification of the same session.
            tx.rollback().await?;
            let mut conn = db.acquire().await?;
            let existing = TokenLedgerRepository::find_by_session(&mut conn, &session.id)
                .await?
                .ok_or_else(|| AppError::Internal("Purchase record vanished".to_string()))?;
            return already_credited(db, existing).await;
        }
        Err(e) => return Err(e),
    };

    tx.commit().await?;

    tracing::info!(
        "Credited {} {} tokens to project {} (session {})",
        tokens,
        model,
        project_id,
        session.id
    );

    Ok(PurchaseVerification {
        already_credited: false,
        transaction,
        pack: Some(pack),
    })
}

async fn already_credited(
    db: &Pool<Sqlite>,
    transaction: TokenTransaction,
) -> Result<PurchaseVerification, AppError> {
    tracing::debug!("Session {} already credited", transaction.stripe_session_id);
    let pack = TokenPackRepository::active_for_project(db, &transaction.project_id).await?;

    Ok(PurchaseVerification {
        already_credited: true,
        transaction,
        pack,
    })
}

pub async fn get_token_balance(
    db: &Pool<Sqlite>,
    user_id: &str,
    project_id: &str,
) -> Result<TokenBalance, AppError> {
    ProjectRepository::get_owned(db, project_id, user_id).await?;

    let pack = TokenPackRepository::active_for_project(db, project_id).await?;
    let remaining = pack
        .as_ref()
        .map(|p| p.remaining_tokens.0.clone())
        .unwrap_or_default();
    let purchases = TokenLedgerRepository::list_purchases(db, project_id).await?;
    let recent_usage = TokenLedgerRepository::list_usage(db, project_id, RECENT_USAGE_ROWS).await?;

    Ok(TokenBalance {
        pack,
        remaining,
        purchases,
        recent_usage,
    })
}
