use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct StripeClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// A price's `product` field: an id, or the full object when expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StripeProductRef {
    Expanded(StripeProduct),
    Id(String),
}

impl StripeProductRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Expanded(p) => &p.id,
            Self::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePriceRecurring {
    pub interval: String,
    #[serde(default = "one")]
    pub interval_count: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: StripeProductRef,
    pub nickname: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub recurring: Option<StripePriceRecurring>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: StripePrice,
    #[serde(default = "one")]
    pub quantity: u32,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StripeSubscriptionStatus {
    Active,
    Canceled,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Paused,
    Trialing,
    Unpaid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: StripeSubscriptionStatus,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub items: StripeSubscriptionItems,
}

impl StripeSubscription {
    /// Renewal timestamp. Newer API versions only report it per item.
    pub fn renews_at(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.items.data.first().and_then(|i| i.current_period_end))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StripeInvoiceStatus {
    Draft,
    Open,
    Paid,
    Uncollectible,
    Void,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub number: Option<String>,
    pub customer: String,
    pub status: Option<StripeInvoiceStatus>,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub currency: String,
    pub created: i64,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoiceLine {
    pub amount: i64,
    pub description: Option<String>,
    #[serde(default)]
    pub proration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoiceLines {
    pub data: Vec<StripeInvoiceLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeUpcomingInvoice {
    pub amount_due: i64,
    pub currency: String,
    pub lines: StripeInvoiceLines,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub status: Option<String>,
    pub mode: String,
    pub payment_status: String,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum CheckoutLineItem {
    /// A one-off charge described inline.
    Inline {
        name: String,
        unit_amount: i64,
        currency: String,
    },
    /// A recurring price that starts a subscription.
    Price(String),
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionParams {
    pub customer_id: String,
    pub line_item: CheckoutLineItem,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

impl StripeClient {
    pub fn new(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: &str,
    ) -> Result<StripeCustomer, AppError> {
        let mut form: Vec<(String, String)> = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];

        if let Some(name) = name {
            form.push(("name".to_string(), name.to_string()));
        }

        let request = self.client.post(format!("{}/customers", self.base_url)).form(&form);
        self.send(request).await
    }

    pub async fn create_checkout_session(
        &self,
        params: CreateCheckoutSessionParams,
    ) -> Result<StripeCheckoutSession, AppError> {
        let mut form: Vec<(String, String)> = vec![
            ("customer".to_string(), params.customer_id),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        match params.line_item {
            CheckoutLineItem::Inline { name, unit_amount, currency } => {
                form.push(("mode".to_string(), "payment".to_string()));
                form.push(("line_items[0][price_data][currency]".to_string(), currency));
                form.push((
                    "line_items[0][price_data][unit_amount]".to_string(),
                    unit_amount.to_string(),
                ));
                form.push(("line_items[0][price_data][product_data][name]".to_string(), name));
            }
            CheckoutLineItem::Price(price_id) => {
                form.push(("mode".to_string(), "subscription".to_string()));
                form.push(("line_items[0][price]".to_string(), price_id));
            }
        }

        for (key, value) in params.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let request = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .form(&form);
        self.send(request).await
    }

    pub async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<StripeCheckoutSession, AppError> {
        let request = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.base_url, session_id));
        self.send(request).await
    }

    pub async fn get_product(&self, product_id: &str) -> Result<StripeProduct, AppError> {
        let request = self
            .client
            .get(format!("{}/products/{}", self.base_url, product_id));
        self.send(request).await
    }

    pub async fn list_prices(&self) -> Result<Vec<StripePrice>, AppError> {
        let request = self
            .client
            .get(format!("{}/prices", self.base_url))
            .query(&[
                ("active", "true"),
                ("type", "recurring"),
                ("expand[]", "data.product"),
                ("limit", "100"),
            ]);

        let list: StripeList<StripePrice> = self.send(request).await?;
        Ok(list.data)
    }

    pub async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<StripeSubscription>, AppError> {
        let request = self
            .client
            .get(format!("{}/subscriptions", self.base_url))
            .query(&[("customer", customer_id), ("status", "all"), ("limit", "10")]);

        let list: StripeList<StripeSubscription> = self.send(request).await?;
        Ok(list.data)
    }

    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<StripeSubscription, AppError> {
        let form = [("cancel_at_period_end", if cancel { "true" } else { "false" })];

        let request = self
            .client
            .post(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .form(&form);
        self.send(request).await
    }

    pub async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        new_price_id: &str,
    ) -> Result<StripeSubscription, AppError> {
        let form = [
            ("items[0][id]", item_id),
            ("items[0][price]", new_price_id),
            ("proration_behavior", "create_prorations"),
        ];

        let request = self
            .client
            .post(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .form(&form);
        self.send(request).await
    }

    /// Previews the next invoice as if the subscription item used `new_price_id`.
    pub async fn preview_upcoming_invoice(
        &self,
        customer_id: &str,
        subscription_id: &str,
        item_id: &str,
        new_price_id: &str,
        proration_date: i64,
    ) -> Result<StripeUpcomingInvoice, AppError> {
        let proration_date = proration_date.to_string();

        let request = self
            .client
            .get(format!("{}/invoices/upcoming", self.base_url))
            .query(&[
                ("customer", customer_id),
                ("subscription", subscription_id),
                ("subscription_items[0][id]", item_id),
                ("subscription_items[0][price]", new_price_id),
                ("subscription_proration_date", proration_date.as_str()),
            ]);
        self.send(request).await
    }

    pub async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, AppError> {
        let limit = limit.to_string();

        let request = self
            .client
            .get(format!("{}/invoices", self.base_url))
            .query(&[("customer", customer_id), ("limit", limit.as_str())]);

        let list: StripeList<StripeInvoice> = self.send(request).await?;
        Ok(list.data)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        let response = request
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Stripe request failed: {}", e);
                AppError::Stripe(format!("Network error: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Stripe(format!("Network error: {}", e)))?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct StripeApiError {
                error: StripeApiErrorDetail,
            }

            #[derive(Deserialize)]
            struct StripeApiErrorDetail {
                message: String,
            }

            let message = serde_json::from_str::<StripeApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
            tracing::error!("Stripe API error {}: {}", status, message);
            return Err(AppError::Stripe(message));
        }

        serde_json::from_str(&body).map_err(|e| AppError::Stripe(format!("Parse error: {}", e)))
    }
}
