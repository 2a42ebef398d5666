//! # HelpMate Gateway Crate
//!
//! The axum REST surface of the HelpMate backend: tenant authentication,
//! dashboard chat, website integrations, the widget chat endpoint,
//! subscriptions and the admin dashboard.

mod docs;
mod error;
mod state;
mod util;

pub mod middleware;
pub mod routes;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeFile,
};

pub fn build_router(state: AppState) -> Router {
    let widget_script = ServeFile::new(state.widget_script());

    let mut router = Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/user", get(routes::auth::current_user))
        .route("/api/auth/logout", post(routes::auth::logout))
        // Dashboard chat
        .route("/api/chat/send", post(routes::chat::send_message))
        .route("/api/chat/history", get(routes::chat::chat_history))
        .route("/api/chat/feedback", post(routes::chat::submit_feedback))
        .route("/api/chat/escalate", post(routes::chat::escalate))
        .route("/api/chat/analytics", get(routes::chat::analytics))
        .route("/api/chat/:chat_id", delete(routes::chat::delete_chat))
        // Integrations
        .route(
            "/api/integration",
            get(routes::integrations::list_integrations)
                .post(routes::integrations::create_integration),
        )
        .route("/api/integration/chat", post(routes::integrations::external_chat))
        .route(
            "/api/integration/:integration_id",
            get(routes::integrations::get_integration)
                .put(routes::integrations::update_integration)
                .delete(routes::integrations::delete_integration),
        )
        .route(
            "/api/integration/:integration_id/generate-key",
            post(routes::integrations::generate_key),
        )
        .route(
            "/api/integration/:integration_id/widget-code",
            get(routes::integrations::widget_code),
        )
        .route(
            "/api/integration/:integration_id/knowledge/url",
            post(routes::integrations::add_knowledge_url)
                .delete(routes::integrations::remove_knowledge_url),
        )
        .route(
            "/api/integration/:integration_id/knowledge/document",
            post(routes::integrations::add_knowledge_document),
        )
        .route(
            "/api/integration/:integration_id/knowledge/document/:document_id",
            delete(routes::integrations::remove_knowledge_document),
        )
        // Subscriptions
        .route("/api/subscription", get(routes::subscriptions::current_subscription))
        .route("/api/subscription/plans", get(routes::subscriptions::list_plans))
        .route("/api/subscription/trial", post(routes::subscriptions::start_trial))
        .route("/api/subscription/cancel", post(routes::subscriptions::cancel_subscription))
        // Admin
        .route("/api/admin/dashboard", get(routes::admin::dashboard))
        // Widget bundle
        .route_service("/widget.js", widget_script);

    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .with_state(state)
        .layer(cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}

/// The widget runs on arbitrary tenant origins.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
