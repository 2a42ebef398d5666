use axum::{extract::State, http::HeaderMap, Json};
use helpmate_database::{ChatRepository, IntegrationRepository, SubscriptionRepository};
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::DataResponse;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: i64,
    pub integrations: i64,
    pub chats: i64,
    pub messages: i64,
    pub active_subscriptions: i64,
}

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "Admin",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Platform-wide totals"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = crate::error::ErrorResponse)
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DataResponse<DashboardStats>>, ApiError> {
    let user = state.current_user(&headers).await?;
    if !user.is_admin {
        return Err(ApiError::forbidden("Not authorized as an admin"));
    }

    let pool = state.pool().clone();
    let chats = ChatRepository::new(pool.clone());
    let stats = DashboardStats {
        users: state.authenticator().user_count().await?,
        integrations: IntegrationRepository::new(pool.clone()).count().await?,
        chats: chats.count().await?,
        messages: chats.count_messages().await?,
        active_subscriptions: SubscriptionRepository::new(pool).count_current().await?,
    };

    Ok(Json(DataResponse::new(stats)))
}
