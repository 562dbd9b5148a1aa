//! API layer - HTTP handlers and routing
//!
//! Server-rendered pages plus a small JSON surface under `/api/v1`:
//! - Account pages (sign-in, sign-up, password reset, email verification)
//! - Signed-in pages and the profile editor
//! - Public profile pages
//! - Sitemap, robots and web manifest
//! - Embedded static assets

pub mod auth;
pub mod common;
pub mod middleware;
pub mod pages;
pub mod profile;
pub mod public;
pub mod seo;
pub mod static_files;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, Backends, CurrentSession, MaybeSession};

/// JSON routes mounted under `/api/v1`
pub fn build_api_router() -> Router<AppState> {
    let protected_routes = profile::api_router()
        .route_layer(axum_middleware::from_fn(middleware::require_api_session));

    Router::new().merge(public::api_router()).merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let protected_pages = Router::new()
        .merge(pages::protected_router())
        .merge(profile::router())
        .route_layer(axum_middleware::from_fn(middleware::require_session));

    Router::new()
        .merge(auth::router())
        .merge(public::router())
        .merge(seo::router())
        .merge(protected_pages)
        .nest("/api/v1", build_api_router())
        .route("/static/{*path}", get(static_files::serve_static))
        .fallback(pages::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_session,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
