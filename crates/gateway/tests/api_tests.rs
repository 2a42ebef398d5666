use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use helpmate_auth::Authenticator;
use helpmate_chats::ConversationStore;
use helpmate_config::AppConfig;
use helpmate_database::MIGRATOR;
use helpmate_gateway::{build_router, AppState};
use helpmate_knowledge::{ContextAssembler, KnowledgeError, PageFetcher};
use helpmate_orchestrator::test_support::ScriptedProvider;
use helpmate_orchestrator::Orchestrator;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct OfflineFetcher;

#[async_trait]
impl PageFetcher for OfflineFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, KnowledgeError> {
        Err(KnowledgeError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    provider: ScriptedProvider,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_url = format!("sqlite://{}", temp_dir.path().join("gateway.sqlite").display());
        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        let mut config = AppConfig::default();
        config.widget.asset_dir = temp_dir.path().display().to_string();
        std::fs::write(temp_dir.path().join("widget.js"), "window.HelpMate = {};")?;

        let provider = ScriptedProvider::new("Thanks for reaching out!");
        let orchestrator =
            Arc::new(Orchestrator::new(&config).with_provider(Arc::new(provider.clone())));
        let assembler = Arc::new(ContextAssembler::new(
            config.knowledge.clone(),
            Arc::new(OfflineFetcher),
        ));
        let state = AppState::new(
            &config,
            pool.clone(),
            Authenticator::new(pool.clone(), config.auth.clone()),
            orchestrator,
            assembler,
            ConversationStore::new(Duration::from_secs(3600), 20),
        );

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            provider,
            state,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> TestResult<(StatusCode, Value)> {
        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)?
        };
        Ok((status, payload))
    }

    async fn register(&self, email: &str) -> TestResult<String> {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                json!({ "name": "Asha", "email": email, "password": "secret123" }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        Ok(body["token"].as_str().ok_or("missing token")?.to_string())
    }
}

fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> TestResult<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(serde_json::to_vec(&body)?))?)
}

fn get_request(uri: &str, token: Option<&str>) -> TestResult<Request<Body>> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

#[tokio::test]
async fn health_reports_ok() -> TestResult {
    let ctx = TestContext::new().await?;
    let (status, body) = ctx.send(get_request("/health", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn register_login_and_profile() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("asha@example.com").await?;

    let (status, profile) = ctx.send(get_request("/api/auth/user", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "asha@example.com");
    assert_eq!(profile["subscriptionActive"], false);

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "asha@example.com", "password": "wrong-password" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "name": "Asha", "email": "ASHA@example.com", "password": "secret123" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_token() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("asha@example.com").await?;

    let (status, _) = ctx
        .send(json_request(Method::POST, "/api/auth/logout", Some(&token), json!({}))?)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.send(get_request("/api/auth/user", Some(&token))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> TestResult {
    let ctx = TestContext::new().await?;
    let (status, body) = ctx.send(get_request("/api/integration", None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn integration_lifecycle_and_widget_chat() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("owner@example.com").await?;

    let (status, created) = ctx
        .send(json_request(
            Method::POST,
            "/api/integration",
            Some(&token),
            json!({ "name": "Shop", "domain": "https://Shop.Example.com/" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let integration_id = created["data"]["id"].as_str().ok_or("missing id")?.to_string();
    let api_key = created["data"]["apiKey"].as_str().ok_or("missing key")?.to_string();
    assert_eq!(created["data"]["domain"], "shop.example.com");

    let (status, code) = ctx
        .send(get_request(
            &format!("/api/integration/{integration_id}/widget-code"),
            Some(&token),
        )?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(code["widgetCode"].as_str().unwrap_or_default().contains(&api_key));

    ctx.provider.push_reply("We are open 9 to 5.");
    let (status, reply) = ctx
        .send(json_request(
            Method::POST,
            "/api/integration/chat",
            None,
            json!({ "apiKey": api_key, "message": "When are you open?", "visitorId": "v-1" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["response"], "We are open 9 to 5.");
    assert!(reply["chatId"].is_string());

    let (status, history) = ctx.send(get_request("/api/chat/history", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["title"], "Website Chat - shop.example.com");

    let (status, rotated) = ctx
        .send(json_request(
            Method::POST,
            &format!("/api/integration/{integration_id}/generate-key"),
            Some(&token),
            json!({}),
        )?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["apiKey"], api_key.as_str());

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            "/api/integration/chat",
            None,
            json!({ "apiKey": api_key, "message": "Hello again" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or inactive API key");
    Ok(())
}

#[tokio::test]
async fn knowledge_urls_are_validated() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("owner@example.com").await?;
    let (_, created) = ctx
        .send(json_request(
            Method::POST,
            "/api/integration",
            Some(&token),
            json!({ "name": "Shop", "domain": "shop.example.com" }),
        )?)
        .await?;
    let integration_id = created["data"]["id"].as_str().ok_or("missing id")?.to_string();
    let uri = format!("/api/integration/{integration_id}/knowledge/url");

    let (status, body) = ctx
        .send(json_request(Method::POST, &uri, Some(&token), json!({ "url": "" }))?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL is required");

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            &uri,
            Some(&token),
            json!({ "url": "https://shop.example.com/faq" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["urls"], json!(["https://shop.example.com/faq"]));

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            &format!("/api/integration/{integration_id}/knowledge/document"),
            Some(&token),
            json!({ "content": "Refunds within 30 days" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Document name is required");
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_reported_as_bad_requests() -> TestResult {
    let ctx = TestContext::new().await?;

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": "owner@example.com", "password": "secret123" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please add a name");

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "owner@example.com" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please provide an email and password");

    let token = ctx.register("owner@example.com").await?;
    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            "/api/integration",
            Some(&token),
            json!({ "domain": "shop.example.com" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Integration name is required");
    Ok(())
}

#[tokio::test]
async fn guests_can_chat_without_persistence() -> TestResult {
    let ctx = TestContext::new().await?;
    let (status, reply) = ctx
        .send(json_request(
            Method::POST,
            "/api/chat/send",
            None,
            json!({ "message": "Hi there" }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"], "Thanks for reaching out!");
    assert!(reply["chatId"].is_null());

    let (status, body) = ctx
        .send(json_request(Method::POST, "/api/chat/send", None, json!({}))?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");
    Ok(())
}

#[tokio::test]
async fn feedback_rating_is_validated() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("owner@example.com").await?;

    let (status, body) = ctx
        .send(json_request(
            Method::POST,
            "/api/chat/feedback",
            Some(&token),
            json!({ "rating": 5 }),
        )?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ChatId and rating are required");
    Ok(())
}

#[tokio::test]
async fn subscription_trial_flow() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("owner@example.com").await?;

    let (status, plans) = ctx.send(get_request("/api/subscription/plans", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plans["data"].as_array().map(Vec::len), Some(2));

    let (status, _) = ctx.send(get_request("/api/subscription", Some(&token))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, trial) = ctx
        .send(json_request(Method::POST, "/api/subscription/trial", Some(&token), json!({}))?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trial["data"]["status"], "trial");

    let (_, profile) = ctx.send(get_request("/api/auth/user", Some(&token))?).await?;
    assert_eq!(profile["subscriptionActive"], true);
    assert_eq!(profile["subscriptionPlan"], "basic");

    let (status, body) = ctx
        .send(json_request(Method::POST, "/api/subscription/trial", Some(&token), json!({}))?)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already used your free trial");
    Ok(())
}

#[tokio::test]
async fn admin_dashboard_requires_admin() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.register("owner@example.com").await?;

    let (status, _) = ctx.send(get_request("/api/admin/dashboard", Some(&token))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    sqlx::query("UPDATE users SET is_admin = 1 WHERE email = ?")
        .bind("owner@example.com")
        .execute(&ctx.pool)
        .await?;
    let (status, stats) = ctx.send(get_request("/api/admin/dashboard", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["users"], 1);
    assert_eq!(stats["data"]["chats"], 0);
    Ok(())
}

#[tokio::test]
async fn widget_script_is_served() -> TestResult {
    let ctx = TestContext::new().await?;
    let response = ctx.router().oneshot(get_request("/widget.js", None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await?.to_bytes();
    assert_eq!(&body[..], b"window.HelpMate = {};");
    Ok(())
}

#[tokio::test]
async fn cors_allows_any_origin() -> TestResult {
    let ctx = TestContext::new().await?;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/integration/chat")
        .header(ORIGIN, "https://tenant.example.org")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())?;

    let response = ctx.router().oneshot(request).await?;
    let allow_origin = response
        .headers()
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert_eq!(allow_origin, "*");
    Ok(())
}

#[cfg(debug_assertions)]
#[tokio::test]
async fn openapi_document_is_published() -> TestResult {
    let ctx = TestContext::new().await?;
    let (status, document) = ctx.send(get_request("/api-docs/openapi.json", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(document["paths"]["/api/integration/chat"].is_object());
    Ok(())
}
