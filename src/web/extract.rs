use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{StatusCode, header, request::Parts};
use axum::Json;
use cookie::Cookie;
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::core::db::{SessionRepository, User};
use crate::validate::ValidationError;

pub const SESSION_COOKIE: &str = "spotter_session";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);
pub type ApiResult<T> = Result<T, ApiError>;

fn body(msg: impl Into<String>) -> Json<ErrorBody> {
    Json(ErrorBody { error: msg.into() })
}

pub fn invalid(err: ValidationError) -> ApiError {
    (StatusCode::UNPROCESSABLE_ENTITY, body(err.to_string()))
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, body(msg))
}

pub fn unauthorized(msg: impl Into<String>) -> ApiError {
    (StatusCode::UNAUTHORIZED, body(msg))
}

pub fn not_found(msg: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, body(msg))
}

pub fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %format!("{err:#}"), "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        body("internal server error"),
    )
}

/// Pull the session token out of the Cookie header, if any.
pub fn session_token(parts: &Parts) -> Option<Uuid> {
    let raw = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

/// The authenticated user behind the request's session cookie. Rejects
/// with 401 when the cookie is missing, malformed or expired.
pub struct CurrentUser {
    pub user: User,
    pub token: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            session_token(parts).ok_or_else(|| unauthorized("authentication required"))?;
        let user = state
            .db
            .get_session_user(token)
            .await
            .map_err(internal)?
            .ok_or_else(|| unauthorized("session expired, log in again"))?;
        Ok(CurrentUser { user, token })
    }
}
