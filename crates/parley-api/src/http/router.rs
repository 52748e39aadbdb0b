//! Axum router configuration with middleware.
//!
//! Middleware: session gateway, CORS, tracing.
//!
//! When `web_dir` is configured, the login page and static assets are served
//! from it. API routes take priority; unknown paths fall through to the
//! directory's `index.html`. If the directory does not exist, only the API is
//! served.

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::gateway::require_session;
use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/conversations",
            get(handlers::conversations::list_conversations)
                .delete(handlers::conversations::delete_conversation),
        )
        .route(
            "/chat",
            get(handlers::chat::get_transcript).post(handlers::chat::post_chat),
        )
        .route("/health", get(health_check));

    if let Some(web_dir) = state.config.web_dir.as_deref() {
        if std::path::Path::new(web_dir).exists() {
            let index_path = format!("{web_dir}/index.html");
            let serve_dir = ServeDir::new(web_dir).fallback(ServeFile::new(index_path));
            router = router.fallback_service(serve_dir);
            tracing::info!(path = %web_dir, "static file serving enabled");
        } else {
            tracing::warn!(path = %web_dir, "web_dir does not exist, serving API only");
        }
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
