use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::ApiError;

pub fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no token"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("Not authorized, invalid scheme"));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("Not authorized, no token"));
    }

    Ok(token.to_string())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .contains_key(AUTHORIZATION)
        .then(|| require_bearer(headers).ok())
        .flatten()
}
