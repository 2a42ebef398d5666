use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::current_user,
        crate::routes::auth::logout,
        crate::routes::chat::send_message,
        crate::routes::chat::chat_history,
        crate::routes::chat::submit_feedback,
        crate::routes::chat::escalate,
        crate::routes::chat::delete_chat,
        crate::routes::chat::analytics,
        crate::routes::integrations::create_integration,
        crate::routes::integrations::list_integrations,
        crate::routes::integrations::get_integration,
        crate::routes::integrations::update_integration,
        crate::routes::integrations::delete_integration,
        crate::routes::integrations::generate_key,
        crate::routes::integrations::widget_code,
        crate::routes::integrations::add_knowledge_url,
        crate::routes::integrations::remove_knowledge_url,
        crate::routes::integrations::add_knowledge_document,
        crate::routes::integrations::remove_knowledge_document,
        crate::routes::integrations::external_chat,
        crate::routes::subscriptions::list_plans,
        crate::routes::subscriptions::current_subscription,
        crate::routes::subscriptions::start_trial,
        crate::routes::subscriptions::cancel_subscription,
        crate::routes::admin::dashboard
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::MessageResponse,
            crate::routes::health::HealthResponse,
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::UserResponse,
            crate::routes::auth::SessionResponse,
            crate::routes::auth::ProfileResponse,
            crate::routes::chat::EscalateRequest,
            crate::routes::integrations::KnowledgeUrlRequest,
            crate::routes::integrations::UrlsResponse,
            crate::routes::integrations::ApiKeyResponse,
            crate::routes::integrations::WidgetCodeResponse,
            crate::routes::admin::DashboardStats
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Chat", description = "Dashboard conversations, feedback and analytics"),
        (name = "Integrations", description = "Website integrations and knowledge bases"),
        (name = "Widget", description = "Chat endpoint used by the embeddable widget"),
        (name = "Subscriptions", description = "Plans, trials and chat quotas"),
        (name = "Admin", description = "Platform administration")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
