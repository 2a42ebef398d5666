use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use helpmate_chats::{
    AnalyticsQuery, ChatAnalytics, ChatHistory, ChatReply, FeedbackRequest, SendMessageRequest,
};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::routes::MessageResponse;
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub chat_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EscalateRequest {
    pub chat_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/chat/send",
    tag = "Chat",
    responses(
        (status = 200, description = "Assistant reply; `chatId` is null for guests"),
        (status = 400, description = "Message missing", body = crate::error::ErrorResponse),
        (
            status = 403,
            description = "Monthly chat limit reached",
            body = crate::error::ErrorResponse
        ),
        (
            status = 404,
            description = "Chat or integration not found",
            body = crate::error::ErrorResponse
        ),
        (status = 502, description = "Completion failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let user = state.optional_user(&headers).await;
    let reply = state
        .chats()
        .send_message(user.map(|user| user.id), payload)
        .await?;
    Ok(Json(reply))
}

#[utoipa::path(
    get,
    path = "/api/chat/history",
    tag = "Chat",
    security(("bearerAuth" = [])),
    params(HistoryParams),
    responses(
        (status = 200, description = "All chats without messages, or one chat with its transcript"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn chat_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ChatHistory>, ApiError> {
    let user = state.current_user(&headers).await?;
    let history = state
        .chats()
        .history(user.id, params.chat_id.as_deref())
        .await?;
    Ok(Json(history))
}

#[utoipa::path(
    post,
    path = "/api/chat/feedback",
    tag = "Chat",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Feedback stored", body = MessageResponse),
        (
            status = 400,
            description = "Missing chat id or rating outside 1-5",
            body = crate::error::ErrorResponse
        ),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    state.chats().submit_feedback(user.id, payload).await?;
    Ok(Json(MessageResponse::new("Feedback submitted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/chat/escalate",
    tag = "Chat",
    security(("bearerAuth" = [])),
    request_body = EscalateRequest,
    responses(
        (status = 200, description = "Chat handed to a human agent", body = MessageResponse),
        (status = 400, description = "Missing chat id", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn escalate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EscalateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    state.chats().escalate(user.id, payload.chat_id.as_deref()).await?;
    info!(user = %user.public_id, "chat escalated to a human agent");
    Ok(Json(MessageResponse::new(
        "Chat escalated to human agent successfully",
    )))
}

#[utoipa::path(
    delete,
    path = "/api/chat/{chat_id}",
    tag = "Chat",
    security(("bearerAuth" = [])),
    params(("chat_id" = String, Path, description = "Chat identifier")),
    responses(
        (status = 200, description = "Chat deleted", body = MessageResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    state.chats().delete_chat(user.id, &chat_id).await?;
    Ok(Json(MessageResponse::new("Chat deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/chat/analytics",
    tag = "Chat",
    security(("bearerAuth" = [])),
    params(AnalyticsParams),
    responses(
        (status = 200, description = "Chat totals, ratings and daily volume for the window"),
        (status = 400, description = "Invalid date window", body = crate::error::ErrorResponse)
    )
)]
pub async fn analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<ChatAnalytics>, ApiError> {
    let user = state.current_user(&headers).await?;
    let query = AnalyticsQuery {
        start_date: params.start_date,
        end_date: params.end_date,
    };
    let analytics = state.chats().analytics(user.id, &query).await?;
    Ok(Json(analytics))
}
