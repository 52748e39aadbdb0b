//! Session gateway middleware.
//!
//! Every request outside the public allow-list must carry a valid `session`
//! cookie. The verified identity is inserted into request extensions as
//! [`CurrentIdentity`]; handlers read it through the extractor and never look
//! at the cookie themselves.
//!
//! Unauthenticated browser navigations are redirected to `/login`; everything
//! else gets a 401.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{ACCEPT, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use parley_core::auth::session::SESSION_COOKIE;
use parley_types::identity::IdentityId;

use crate::http::error::AppError;
use crate::state::AppState;

const PUBLIC_PATHS: &[&str] = &[
    "/login",
    "/auth/login",
    "/auth/register",
    "/health",
    "/favicon.ico",
];

const PUBLIC_PREFIXES: &[&str] = &["/static/"];

/// The identity that owns the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentIdentity(pub IdentityId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// The `session` cookie value, searching every `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| token_from_cookie_header(h, SESSION_COOKIE))
        .filter(|t| !t.is_empty())
}

fn is_browser_navigation(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::GET
        && headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
}

/// Middleware enforcing a valid session on non-public routes.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_public_path(req.uri().path()) {
        return next.run(req).await;
    }

    let identity = session_token(req.headers()).and_then(|token| state.sessions.verify(token));

    match identity {
        Some(identity) => {
            req.extensions_mut().insert(CurrentIdentity(identity));
            next.run(req).await
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "request without a valid session");
            if is_browser_navigation(req.method(), req.headers()) {
                Redirect::to("/login").into_response()
            } else {
                AppError::Unauthorized.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn allow_list() {
        assert!(is_public_path("/login"));
        assert!(is_public_path("/auth/register"));
        assert!(is_public_path("/static/app.js"));
        assert!(is_public_path("/health"));
        assert!(!is_public_path("/chat"));
        assert!(!is_public_path("/auth/logout"));
        assert!(!is_public_path("/staticfile"));
        assert!(!is_public_path("/login/extra"));
    }

    #[test]
    fn cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=abc.def.ghi; x=1"));
        assert_eq!(session_token(&headers), Some("abc.def.ghi"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionid=nope"));
        assert_eq!(session_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cookie_found_in_second_header() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("session=tok"));
        assert_eq!(session_token(&headers), Some("tok"));
    }

    #[test]
    fn browser_navigation_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        assert!(is_browser_navigation(&Method::GET, &headers));
        assert!(!is_browser_navigation(&Method::POST, &headers));

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!is_browser_navigation(&Method::GET, &headers));
    }
}
