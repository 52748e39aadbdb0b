//! Registration, login and logout.
//!
//! POST /auth/register, POST /auth/login, POST /auth/logout
//!
//! Register and login answer `{ "success": true, "userId": "..." }` and set
//! the `session` cookie. Logout only expires the cookie on the client; the
//! token itself stays valid until it expires.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use serde::Serialize;
use serde_json::json;

use parley_core::auth::session::SESSION_COOKIE;
use parley_types::identity::{Credentials, IdentityId};

use super::json_body;
use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: IdentityId,
}

/// `Set-Cookie` value carrying a fresh session token for `identity`.
fn session_cookie(state: &AppState, identity: IdentityId) -> Result<String, AppError> {
    let token = state
        .sessions
        .issue(identity)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // Plain HTTP on localhost needs the Secure flag off in development.
    let secure_flag = if state.config.production { " Secure;" } else { "" };
    Ok(format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax;{secure_flag} Max-Age={}",
        state.sessions.ttl().as_secs()
    ))
}

fn clear_cookie(state: &AppState) -> String {
    let secure_flag = if state.config.production { " Secure;" } else { "" };
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax;{secure_flag} Max-Age=0")
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let credentials = json_body(body)?;
    let identity = state.identity_service.register(&credentials).await?;
    let cookie = session_cookie(&state, identity.id)?;

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(AuthResponse {
            success: true,
            user_id: identity.id,
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let credentials = json_body(body)?;
    let identity = state.identity_service.authenticate(&credentials).await?;
    let cookie = session_cookie(&state, identity.id)?;

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(AuthResponse {
            success: true,
            user_id: identity.id,
        }),
    ))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_cookie(&state))]),
        Json(json!({ "success": true })),
    )
}
