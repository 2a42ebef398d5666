use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use helpmate_auth::{NewAccount, User, UserProfile};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::routes::MessageResponse;
use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            business_name: user.business_name,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub subscription_active: bool,
    pub subscription_plan: Option<String>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            user: profile.user.into(),
            subscription_active: profile.subscription_active,
            subscription_plan: profile.subscription_plan.map(|plan| plan.as_str().to_string()),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = SessionResponse),
        (
            status = 400,
            description = "Invalid registration or email taken",
            body = crate::error::ErrorResponse
        )
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let (user, session) = state
        .authenticator()
        .register(NewAccount {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            phone: payload.phone,
            business_name: payload.business_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: session.token,
            user: user.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (user, session) = state
        .authenticator()
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(SessionResponse {
        token: session.token,
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/user",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (
            status = 200,
            description = "Current user with subscription status",
            body = ProfileResponse
        ),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let profile = state.authenticator().user_profile(user.id).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token).await?;
    state.authenticator().logout(&token).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}
