use serde::Serialize;
use sqlx::{Pool, Sqlite};

use super::stripe::{
    CheckoutLineItem, CreateCheckoutSessionParams, StripeClient, StripeInvoice, StripePrice,
    StripeProductRef, StripeSubscription, StripeSubscriptionStatus,
};
use super::{ensure_customer, CheckoutLink};
use crate::db::UserRepository;
use crate::error::AppError;

const INVOICE_LIMIT: u32 = 24;

#[derive(Debug, Clone, Serialize)]
pub struct PriceOption {
    pub id: String,
    pub product_name: String,
    pub description: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub plan_name: String,
    pub price_id: String,
    pub status: StripeSubscriptionStatus,
    pub amount: Option<i64>,
    pub currency: String,
    pub interval: Option<String>,
    pub renews_at: Option<i64>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanChangePreview {
    pub new_price_id: String,
    pub amount_due: i64,
    pub currency: String,
    pub proration_amount: i64,
    pub proration_date: i64,
}

pub async fn list_prices(stripe: &StripeClient) -> Result<Vec<PriceOption>, AppError> {
    let mut options: Vec<PriceOption> = stripe
        .list_prices()
        .await?
        .into_iter()
        .filter(|p| p.active)
        .map(|p| {
            let (product_name, description) = match &p.product {
                StripeProductRef::Expanded(product) => {
                    (product.name.clone(), product.description.clone())
                }
                StripeProductRef::Id(id) => (p.nickname.clone().unwrap_or_else(|| id.clone()), None),
            };
            PriceOption {
                id: p.id,
                product_name,
                description,
                unit_amount: p.unit_amount,
                currency: p.currency,
                interval: p.recurring.map(|r| r.interval),
            }
        })
        .collect();

    options.sort_by_key(|o| o.unit_amount.unwrap_or(0));
    Ok(options)
}

async fn plan_name(stripe: &StripeClient, price: &StripePrice) -> Result<String, AppError> {
    if let Some(nickname) = &price.nickname {
        return Ok(nickname.clone());
    }
    match &price.product {
        StripeProductRef::Expanded(product) => Ok(product.name.clone()),
        StripeProductRef::Id(id) => Ok(stripe.get_product(id).await?.name),
    }
}

async fn summarize(
    stripe: &StripeClient,
    subscription: StripeSubscription,
) -> Result<SubscriptionSummary, AppError> {
    let renews_at = subscription.renews_at();
    let item = subscription
        .items
        .data
        .first()
        .ok_or_else(|| AppError::Stripe("Subscription has no items".to_string()))?;

    Ok(SubscriptionSummary {
        plan_name: plan_name(stripe, &item.price).await?,
        price_id: item.price.id.clone(),
        amount: item.price.unit_amount.map(|a| a * i64::from(item.quantity)),
        currency: item.price.currency.clone(),
        interval: item.price.recurring.as_ref().map(|r| r.interval.clone()),
        id: subscription.id,
        status: subscription.status,
        renews_at,
        cancel_at_period_end: subscription.cancel_at_period_end,
    })
}

/// The customer's live subscription, ignoring ended ones.
async fn current_subscription(
    stripe: &StripeClient,
    customer_id: &str,
) -> Result<Option<StripeSubscription>, AppError> {
    let subscription = stripe
        .list_subscriptions(customer_id)
        .await?
        .into_iter()
        .find(|s| {
            !matches!(
                s.status,
                StripeSubscriptionStatus::Canceled | StripeSubscriptionStatus::IncompleteExpired
            )
        });

    Ok(subscription)
}

async fn customer_of(db: &Pool<Sqlite>, user_id: &str) -> Result<Option<String>, AppError> {
    let user = UserRepository::get_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(user.stripe_customer_id)
}

async fn require_subscription(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
) -> Result<(String, StripeSubscription), AppError> {
    let customer_id = customer_of(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;
    let subscription = current_subscription(stripe, &customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;
    Ok((customer_id, subscription))
}

pub async fn get_subscription(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
) -> Result<Option<SubscriptionSummary>, AppError> {
    let Some(customer_id) = customer_of(db, user_id).await? else {
        return Ok(None);
    };

    match current_subscription(stripe, &customer_id).await? {
        Some(subscription) => Ok(Some(summarize(stripe, subscription).await?)),
        None => Ok(None),
    }
}

pub async fn create_subscription_checkout(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    app_base_url: &str,
    user_id: &str,
    price_id: &str,
) -> Result<CheckoutLink, AppError> {
    if price_id.trim().is_empty() {
        return Err(AppError::Validation("price_id is required".to_string()));
    }

    let customer_id = ensure_customer(db, stripe, user_id).await?;
    let base = app_base_url.trim_end_matches('/');

    let session = stripe
        .create_checkout_session(CreateCheckoutSessionParams {
            customer_id,
            line_item: CheckoutLineItem::Price(price_id.to_string()),
            success_url: format!("{}/settings/billing?session_id={{CHECKOUT_SESSION_ID}}", base),
            cancel_url: format!("{}/settings/billing", base),
            metadata: [("user_id".to_string(), user_id.to_string())].into(),
        })
        .await?;

    Ok(CheckoutLink {
        session_id: session.id,
        url: session.url,
    })
}

pub async fn set_cancel_at_period_end(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
    cancel: bool,
) -> Result<SubscriptionSummary, AppError> {
    let (_, subscription) = require_subscription(db, stripe, user_id).await?;

    let updated = stripe.set_cancel_at_period_end(&subscription.id, cancel).await?;
    tracing::info!(
        "Subscription {} cancel_at_period_end set to {}",
        updated.id,
        updated.cancel_at_period_end
    );

    summarize(stripe, updated).await
}

pub async fn preview_plan_change(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
    new_price_id: &str,
) -> Result<PlanChangePreview, AppError> {
    let (customer_id, subscription) = require_subscription(db, stripe, user_id).await?;
    let item = subscription
        .items
        .data
        .first()
        .ok_or_else(|| AppError::Stripe("Subscription has no items".to_string()))?;

    let proration_date = chrono::Utc::now().timestamp();
    let invoice = stripe
        .preview_upcoming_invoice(
            &customer_id,
            &subscription.id,
            &item.id,
            new_price_id,
            proration_date,
        )
        .await?;

    let proration_amount = invoice
        .lines
        .data
        .iter()
        .filter(|line| line.proration)
        .map(|line| line.amount)
        .sum();

    Ok(PlanChangePreview {
        new_price_id: new_price_id.to_string(),
        amount_due: invoice.amount_due,
        currency: invoice.currency,
        proration_amount,
        proration_date,
    })
}

pub async fn change_plan(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
    new_price_id: &str,
) -> Result<SubscriptionSummary, AppError> {
    let (_, subscription) = require_subscription(db, stripe, user_id).await?;
    let item_id = subscription
        .items
        .data
        .first()
        .map(|item| item.id.clone())
        .ok_or_else(|| AppError::Stripe("Subscription has no items".to_string()))?;

    let updated = stripe
        .update_subscription_price(&subscription.id, &item_id, new_price_id)
        .await?;
    tracing::info!("Subscription {} moved to price {}", updated.id, new_price_id);

    summarize(stripe, updated).await
}

pub async fn list_invoices(
    db: &Pool<Sqlite>,
    stripe: &StripeClient,
    user_id: &str,
) -> Result<Vec<StripeInvoice>, AppError> {
    match customer_of(db, user_id).await? {
        Some(customer_id) => stripe.list_invoices(&customer_id, INVOICE_LIMIT).await,
        None => Ok(Vec::new()),
    }
}
