use axum::{extract::State, http::HeaderMap, Json};
use helpmate_chats::{plans, PlanDetails, SubscriptionView};
use serde::Serialize;

use crate::routes::DataResponse;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct SubscriptionChangeResponse {
    pub success: bool,
    pub data: SubscriptionView,
    pub message: String,
}

impl SubscriptionChangeResponse {
    fn new(data: SubscriptionView, message: &str) -> Self {
        Self {
            success: true,
            data,
            message: message.to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/subscription/plans",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Plan catalogue with prices in paise")
    )
)]
pub async fn list_plans() -> Json<DataResponse<Vec<PlanDetails>>> {
    Json(DataResponse::new(plans()))
}

#[utoipa::path(
    get,
    path = "/api/subscription",
    tag = "Subscriptions",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current subscription with plan details"),
        (status = 404, description = "No subscription found", body = crate::error::ErrorResponse)
    )
)]
pub async fn current_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DataResponse<SubscriptionView>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let subscription = state.subscriptions().current(user.id).await?;
    Ok(Json(DataResponse::new(subscription)))
}

#[utoipa::path(
    post,
    path = "/api/subscription/trial",
    tag = "Subscriptions",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Fourteen day basic trial started"),
        (
            status = 400,
            description = "Trial already used or subscription active",
            body = crate::error::ErrorResponse
        )
    )
)]
pub async fn start_trial(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionChangeResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let subscription = state.subscriptions().start_trial(user.id).await?;
    Ok(Json(SubscriptionChangeResponse::new(
        subscription,
        "Free trial started successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/subscription/cancel",
    tag = "Subscriptions",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Subscription cancelled"),
        (
            status = 400,
            description = "Subscription is not active",
            body = crate::error::ErrorResponse
        ),
        (status = 404, description = "No subscription found", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionChangeResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let subscription = state.subscriptions().cancel(user.id).await?;
    Ok(Json(SubscriptionChangeResponse::new(
        subscription,
        "Subscription cancelled successfully",
    )))
}
