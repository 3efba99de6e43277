mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use project_dashboard::ai::AiModel;
use project_dashboard::api::{create_router, RateLimiter};
use project_dashboard::db::UpdateRepository;

async fn app_with_limit(limit: u32) -> (Router, sqlx::Pool<sqlx::Sqlite>, Arc<FakeGenerator>) {
    let db = test_pool().await;
    let generator = Arc::new(FakeGenerator::new("Here is your answer."));
    let state = test_state(db.clone(), generator.clone(), "http://127.0.0.1:9");
    let router = create_router(state, Arc::new(RateLimiter::new(limit, 60)));
    (router, db, generator)
}

async fn app() -> (Router, sqlx::Pool<sqlx::Sqlite>, Arc<FakeGenerator>) {
    app_with_limit(1000).await
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", access_token(user)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _, _) = app().await;

    let response = app
        .oneshot(request(Method::GET, "/api/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (app, _, _) = app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/projects", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = Request::builder()
        .uri("/api/projects")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn first_request_creates_the_user() {
    let (app, _, _) = app().await;

    let response = app
        .oneshot(request(Method::GET, "/api/me", Some("alice"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["id"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("stripe_customer_id").is_none());
}

#[tokio::test]
async fn project_lifecycle() {
    let (app, _, _) = app().await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/projects",
            Some("alice"),
            Some(json!({ "name": "Apollo", "description": "Moonshot" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let project = json_body(response).await;
    let id = project["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/projects/{}", id),
            Some("alice"),
            Some(json!({ "name": "Artemis" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["name"], "Artemis");
    assert_eq!(updated["description"], "Moonshot");

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/api/projects/{}", id), Some("mallory"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(request(Method::DELETE, &format!("/api/projects/{}", id), Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(Method::GET, "/api/projects", Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn generate_without_tokens_is_payment_required() {
    let (app, db, generator) = app().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;

    let response = app
        .oneshot(request(
            Method::POST,
            &format!("/api/projects/{}/assistants/sql/generate", project.id),
            Some("alice"),
            Some(json!({ "prompt": "count users", "model": "gemini-2.0-flash" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["available"], 0);
    assert_eq!(body["required"], 503);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generate_then_browse_the_chat() {
    let (app, db, generator) = app().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;
    seed_pack(&db, &project.id, AiModel::Gemini20Flash, 10_000, in_a_year()).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/projects/{}/assistants/ai/generate", project.id),
            Some("alice"),
            Some(json!({ "prompt": "Plan the launch", "model": "gemini-2.0-flash" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    let chat_id = result["chat_id"].as_str().unwrap().to_string();
    assert_eq!(generator.calls(), 1);

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/assistants/ai/chats/{}/messages", chat_id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let messages = json_body(response).await;
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(messages[1]["content"], "Here is your answer.");

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/projects/{}/tokens", project.id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    let balance = json_body(response).await;
    let used = result["tokens_used"].as_i64().unwrap();
    assert_eq!(balance["remaining"]["gemini-2.0-flash"], 10_000 - used);
    assert_eq!(balance["recent_usage"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let (app, _, _) = app_with_limit(2).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(request(Method::GET, "/api/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

async fn create_concept(app: &Router, project_id: &str, title: &str, scheduled_at: Option<i64>) -> Value {
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/projects/{}/concepts", project_id),
            Some("alice"),
            Some(json!({ "title": title, "tags": ["launch"], "scheduled_at": scheduled_at })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

fn titles(concepts: &Value) -> Vec<&str> {
    concepts
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn concept_range_is_half_open() {
    let (app, db, _) = app().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;

    create_concept(&app, &project.id, "kickoff", Some(100)).await;
    create_concept(&app, &project.id, "review", Some(200)).await;
    create_concept(&app, &project.id, "launch", Some(300)).await;
    create_concept(&app, &project.id, "someday", None).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/projects/{}/concepts?from=100&to=300", project.id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(titles(&json_body(response).await), vec!["kickoff", "review"]);

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/projects/{}/concepts", project.id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 4);

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/projects/{}/concepts?from=100", project.id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concept_toggle_and_unschedule() {
    let (app, db, _) = app().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;

    let concept = create_concept(&app, &project.id, "kickoff", Some(100)).await;
    let id = concept["id"].as_str().unwrap().to_string();
    assert_eq!(concept["metadata"]["completed"], false);

    let toggle = format!("/api/concepts/{}/toggle", id);
    let response = app
        .clone()
        .oneshot(request(Method::POST, &toggle, Some("alice"), None))
        .await
        .unwrap();
    let toggled = json_body(response).await;
    assert_eq!(toggled["metadata"]["completed"], true);
    assert_eq!(toggled["metadata"]["tags"], json!(["launch"]));

    let response = app
        .clone()
        .oneshot(request(Method::POST, &toggle, Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["metadata"]["completed"], false);

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/concepts/{}", id),
            Some("alice"),
            Some(json!({ "scheduled_at": null })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert!(updated["scheduled_at"].is_null());
    assert_eq!(updated["title"], "kickoff");

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/projects/{}/concepts?from=0&to=1000", project.id),
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn updates_limit_and_tag_filter() {
    let (app, db, _) = app().await;
    seed_user(&db, "alice").await;
    for i in 0..105 {
        let tag = if i % 2 == 0 { "feature" } else { "fix" };
        UpdateRepository::create(&db, "alice", &format!("Update {}", i), "Details", tag, None)
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/updates", Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 20);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/updates?limit=500", Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 100);

    let response = app
        .oneshot(request(Method::GET, "/api/updates?tag=fix&limit=100", Some("alice"), None))
        .await
        .unwrap();
    let fixes = json_body(response).await;
    let fixes = fixes.as_array().unwrap();
    assert_eq!(fixes.len(), 52);
    assert!(fixes.iter().all(|u| u["tag"] == "fix"));
}

#[tokio::test]
async fn avatar_must_live_in_the_avatars_bucket() {
    let (app, _, _) = app().await;

    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            "/api/me/avatar",
            Some("alice"),
            Some(json!({ "avatar_url": "https://evil.example.com/me.png" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let url = "https://storage.example.com/storage/v1/object/public/avatars/alice.png";
    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            "/api/me/avatar",
            Some("alice"),
            Some(json!({ "avatar_url": url })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["metadata"]["avatar_url"], url);

    let response = app
        .oneshot(request(
            Method::PUT,
            "/api/me/avatar",
            Some("alice"),
            Some(json!({ "avatar_url": null })),
        ))
        .await
        .unwrap();
    assert!(json_body(response).await["metadata"]["avatar_url"].is_null());
}

#[tokio::test]
async fn project_description_can_be_cleared() {
    let (app, db, _) = app().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;
    let uri = format!("/api/projects/{}", project.id);

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &uri,
            Some("alice"),
            Some(json!({ "description": "Moonshot" })),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["description"], "Moonshot");

    let response = app
        .oneshot(request(
            Method::PATCH,
            &uri,
            Some("alice"),
            Some(json!({ "description": null })),
        ))
        .await
        .unwrap();
    let updated = json_body(response).await;
    assert!(updated["description"].is_null());
    assert_eq!(updated["name"], "Apollo");
}
