mod common;

use common::*;
use mockito::Matcher;
use project_dashboard::billing::subscriptions;
use project_dashboard::billing::StripeClient;
use project_dashboard::db::UserRepository;
use project_dashboard::error::AppError;
use serde_json::{json, Value};

const PERIOD_END: i64 = 1_767_225_600;

fn subscription(cancel_at_period_end: bool) -> Value {
    json!({
        "id": "sub_1",
        "object": "subscription",
        "customer": "cus_123",
        "status": "active",
        "current_period_end": PERIOD_END,
        "cancel_at_period_end": cancel_at_period_end,
        "items": {
            "object": "list",
            "data": [{
                "id": "si_1",
                "quantity": 1,
                "price": {
                    "id": "price_basic",
                    "product": "prod_basic",
                    "nickname": "Basic",
                    "unit_amount": 900,
                    "currency": "usd",
                    "recurring": { "interval": "month", "interval_count": 1 },
                    "active": true
                }
            }]
        }
    })
}

async fn customer_with_subscription(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/subscriptions")
        .match_query(Matcher::UrlEncoded("customer".into(), "cus_123".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "object": "list", "data": [subscription(false)] }).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn cancel_and_resume_keep_the_renewal_date() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;
    UserRepository::set_stripe_customer(&db, "alice", "cus_123").await.unwrap();

    let mut server = mockito::Server::new_async().await;
    customer_with_subscription(&mut server).await;
    server
        .mock("POST", "/subscriptions/sub_1")
        .match_body(Matcher::UrlEncoded("cancel_at_period_end".into(), "true".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(subscription(true).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/subscriptions/sub_1")
        .match_body(Matcher::UrlEncoded("cancel_at_period_end".into(), "false".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(subscription(false).to_string())
        .create_async()
        .await;
    let stripe = StripeClient::new("sk_test_123".to_string(), &server.url());

    let cancelled = subscriptions::set_cancel_at_period_end(&db, &stripe, "alice", true)
        .await
        .unwrap();
    assert!(cancelled.cancel_at_period_end);
    assert_eq!(cancelled.renews_at, Some(PERIOD_END));
    assert_eq!(cancelled.plan_name, "Basic");

    let resumed = subscriptions::set_cancel_at_period_end(&db, &stripe, "alice", false)
        .await
        .unwrap();
    assert!(!resumed.cancel_at_period_end);
    assert_eq!(resumed.renews_at, cancelled.renews_at);
}

#[tokio::test]
async fn preview_sums_proration_lines() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;
    UserRepository::set_stripe_customer(&db, "alice", "cus_123").await.unwrap();

    let mut server = mockito::Server::new_async().await;
    customer_with_subscription(&mut server).await;
    server
        .mock("GET", "/invoices/upcoming")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("subscription".into(), "sub_1".into()),
            Matcher::UrlEncoded("subscription_items[0][id]".into(), "si_1".into()),
            Matcher::UrlEncoded("subscription_items[0][price]".into(), "price_pro".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "amount_due": 3400,
                "currency": "usd",
                "lines": {
                    "data": [
                        { "amount": -450, "description": "Unused time on Basic", "proration": true },
                        { "amount": 1450, "description": "Remaining time on Pro", "proration": true },
                        { "amount": 2400, "description": "Pro", "proration": false }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let stripe = StripeClient::new("sk_test_123".to_string(), &server.url());

    let preview = subscriptions::preview_plan_change(&db, &stripe, "alice", "price_pro")
        .await
        .unwrap();

    assert_eq!(preview.new_price_id, "price_pro");
    assert_eq!(preview.proration_amount, 1000);
    assert_eq!(preview.amount_due, 3400);
    assert_eq!(preview.currency, "usd");
}

#[tokio::test]
async fn change_plan_swaps_the_item_price() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;
    UserRepository::set_stripe_customer(&db, "alice", "cus_123").await.unwrap();

    let mut changed = subscription(false);
    changed["items"]["data"][0]["price"]["id"] = json!("price_pro");
    changed["items"]["data"][0]["price"]["nickname"] = json!("Pro");
    changed["items"]["data"][0]["price"]["unit_amount"] = json!(2400);

    let mut server = mockito::Server::new_async().await;
    customer_with_subscription(&mut server).await;
    let update = server
        .mock("POST", "/subscriptions/sub_1")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("items[0][id]".into(), "si_1".into()),
            Matcher::UrlEncoded("items[0][price]".into(), "price_pro".into()),
            Matcher::UrlEncoded("proration_behavior".into(), "create_prorations".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(changed.to_string())
        .create_async()
        .await;
    let stripe = StripeClient::new("sk_test_123".to_string(), &server.url());

    let summary = subscriptions::change_plan(&db, &stripe, "alice", "price_pro")
        .await
        .unwrap();

    assert_eq!(summary.price_id, "price_pro");
    assert_eq!(summary.plan_name, "Pro");
    assert_eq!(summary.amount, Some(2400));
    update.assert_async().await;
}

#[tokio::test]
async fn user_without_customer_has_no_subscription_or_invoices() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;

    // Never contacted
    let stripe = StripeClient::new("sk_test_123".to_string(), "http://127.0.0.1:9");

    let summary = subscriptions::get_subscription(&db, &stripe, "alice").await.unwrap();
    assert!(summary.is_none());

    let invoices = subscriptions::list_invoices(&db, &stripe, "alice").await.unwrap();
    assert!(invoices.is_empty());

    let err = subscriptions::set_cancel_at_period_end(&db, &stripe, "alice", true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn prices_are_sorted_by_amount() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/prices")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "object": "list",
                "data": [
                    {
                        "id": "price_pro",
                        "product": { "id": "prod_pro", "name": "Pro", "description": "For teams" },
                        "nickname": null,
                        "unit_amount": 2400,
                        "currency": "usd",
                        "recurring": { "interval": "month" },
                        "active": true
                    },
                    {
                        "id": "price_basic",
                        "product": { "id": "prod_basic", "name": "Basic", "description": null },
                        "nickname": null,
                        "unit_amount": 900,
                        "currency": "usd",
                        "recurring": { "interval": "month" },
                        "active": true
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let stripe = StripeClient::new("sk_test_123".to_string(), &server.url());

    let prices = subscriptions::list_prices(&stripe).await.unwrap();

    let names: Vec<&str> = prices.iter().map(|p| p.product_name.as_str()).collect();
    assert_eq!(names, vec!["Basic", "Pro"]);
    assert_eq!(prices[1].description.as_deref(), Some("For teams"));
    assert_eq!(prices[0].interval.as_deref(), Some("month"));
}
