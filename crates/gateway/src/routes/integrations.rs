use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use helpmate_chats::{ChatReply, ExternalChatRequest};
use helpmate_integrations::{
    CreateIntegration, DocumentView, IntegrationView, NewDocument, UpdateIntegration,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::routes::{DataResponse, MessageResponse};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct KnowledgeUrlRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UrlsResponse {
    pub success: bool,
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub success: bool,
    pub api_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WidgetCodeResponse {
    pub success: bool,
    pub widget_code: String,
}

#[utoipa::path(
    post,
    path = "/api/integration",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    responses(
        (status = 201, description = "Integration created with a fresh API key"),
        (
            status = 400,
            description = "Invalid name, domain or widget settings",
            body = crate::error::ErrorResponse
        )
    )
)]
pub async fn create_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateIntegration>,
) -> Result<(StatusCode, Json<DataResponse<IntegrationView>>), ApiError> {
    let user = state.current_user(&headers).await?;
    let integration = state.integrations().create(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(integration))))
}

#[utoipa::path(
    get,
    path = "/api/integration",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The caller's integrations"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_integrations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DataResponse<Vec<IntegrationView>>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let integrations = state.integrations().list(user.id).await?;
    Ok(Json(DataResponse::new(integrations)))
}

#[utoipa::path(
    get,
    path = "/api/integration/{integration_id}",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    responses(
        (status = 200, description = "Integration details"),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
) -> Result<Json<DataResponse<IntegrationView>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let integration = state.integrations().get(user.id, &integration_id).await?;
    Ok(Json(DataResponse::new(integration)))
}

#[utoipa::path(
    put,
    path = "/api/integration/{integration_id}",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    responses(
        (status = 200, description = "Updated integration"),
        (status = 400, description = "Invalid update", body = crate::error::ErrorResponse),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
    Json(payload): Json<UpdateIntegration>,
) -> Result<Json<DataResponse<IntegrationView>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let integration = state
        .integrations()
        .update(user.id, &integration_id, payload)
        .await?;
    Ok(Json(DataResponse::new(integration)))
}

#[utoipa::path(
    delete,
    path = "/api/integration/{integration_id}",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    responses(
        (status = 200, description = "Integration removed", body = MessageResponse),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    state.integrations().delete(user.id, &integration_id).await?;
    Ok(Json(MessageResponse::new("Integration deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/integration/{integration_id}/generate-key",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    responses(
        (
            status = 200,
            description = "New API key; the previous key stops working",
            body = ApiKeyResponse
        ),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn generate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let api_key = state
        .integrations()
        .regenerate_key(user.id, &integration_id)
        .await?;
    Ok(Json(ApiKeyResponse {
        success: true,
        api_key,
    }))
}

#[utoipa::path(
    get,
    path = "/api/integration/{integration_id}/widget-code",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    responses(
        (status = 200, description = "Embeddable script snippet", body = WidgetCodeResponse),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn widget_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
) -> Result<Json<WidgetCodeResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let widget_code = state
        .integrations()
        .widget_code(user.id, &integration_id)
        .await?;
    Ok(Json(WidgetCodeResponse {
        success: true,
        widget_code,
    }))
}

#[utoipa::path(
    post,
    path = "/api/integration/{integration_id}/knowledge/url",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    request_body = KnowledgeUrlRequest,
    responses(
        (status = 200, description = "Knowledge URLs after the addition", body = UrlsResponse),
        (
            status = 400,
            description = "URL missing or not http(s)",
            body = crate::error::ErrorResponse
        ),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_knowledge_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
    Json(payload): Json<KnowledgeUrlRequest>,
) -> Result<Json<UrlsResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let urls = state
        .integrations()
        .add_url(user.id, &integration_id, &payload.url)
        .await?;
    Ok(Json(UrlsResponse { success: true, urls }))
}

#[utoipa::path(
    delete,
    path = "/api/integration/{integration_id}/knowledge/url",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    request_body = KnowledgeUrlRequest,
    responses(
        (status = 200, description = "Knowledge URLs after the removal", body = UrlsResponse),
        (status = 400, description = "URL missing", body = crate::error::ErrorResponse),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_knowledge_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
    Json(payload): Json<KnowledgeUrlRequest>,
) -> Result<Json<UrlsResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let urls = state
        .integrations()
        .remove_url(user.id, &integration_id, &payload.url)
        .await?;
    Ok(Json(UrlsResponse { success: true, urls }))
}

#[utoipa::path(
    post,
    path = "/api/integration/{integration_id}/knowledge/document",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(("integration_id" = String, Path, description = "Integration identifier")),
    responses(
        (status = 201, description = "Document stored in the knowledge base"),
        (status = 400, description = "Name or content missing", body = crate::error::ErrorResponse),
        (status = 404, description = "Integration not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_knowledge_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
    Json(payload): Json<NewDocument>,
) -> Result<(StatusCode, Json<DataResponse<DocumentView>>), ApiError> {
    let user = state.current_user(&headers).await?;
    let document = state
        .integrations()
        .add_document(user.id, &integration_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(document))))
}

#[utoipa::path(
    delete,
    path = "/api/integration/{integration_id}/knowledge/document/{document_id}",
    tag = "Integrations",
    security(("bearerAuth" = [])),
    params(
        ("integration_id" = String, Path, description = "Integration identifier"),
        ("document_id" = String, Path, description = "Document identifier")
    ),
    responses(
        (status = 200, description = "Document removed", body = MessageResponse),
        (
            status = 404,
            description = "Integration or document not found",
            body = crate::error::ErrorResponse
        )
    )
)]
pub async fn remove_knowledge_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((integration_id, document_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    state
        .integrations()
        .remove_document(user.id, &integration_id, &document_id)
        .await?;
    Ok(Json(MessageResponse::new("Document removed successfully")))
}

#[utoipa::path(
    post,
    path = "/api/integration/chat",
    tag = "Widget",
    responses(
        (status = 200, description = "Assistant reply and the session's `chatId`"),
        (
            status = 400,
            description = "API key or message missing",
            body = crate::error::ErrorResponse
        ),
        (
            status = 401,
            description = "Invalid or inactive API key",
            body = crate::error::ErrorResponse
        ),
        (
            status = 403,
            description = "Owner's monthly chat limit reached",
            body = crate::error::ErrorResponse
        ),
        (status = 502, description = "Completion failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn external_chat(
    State(state): State<AppState>,
    Json(payload): Json<ExternalChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let reply = state.external_chat().process(payload).await?;
    Ok(Json(reply))
}
