//! Signed-in pages and the 404 fallback

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::Response,
    routing::get,
    Router,
};

use crate::api::common::{HtmlPage, IncomingFlash};
use crate::api::middleware::{AppState, CurrentSession, MaybeSession};
use crate::services::PageMeta;

/// Routes behind the session guard
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/dashboard", get(home))
        .route("/business", get(business))
}

/// Welcome page
async fn home(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    IncomingFlash(flash): IncomingFlash,
    uri: Uri,
) -> Response {
    let meta = PageMeta::page(state.base_url(), uri.path(), Some("Dashboard")).private();
    HtmlPage::new("home.html", meta)
        .insert("greeting", &session.greeting_name())
        .render(&state, Some(&session), flash)
}

/// Google Business Profile placeholder
async fn business(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    let meta = PageMeta::page(state.base_url(), "/business", Some("Business Profile")).private();
    HtmlPage::new("business.html", meta).render(&state, Some(&session), flash)
}

/// Fallback for unknown routes
pub async fn not_found(State(state): State<AppState>, MaybeSession(session): MaybeSession, uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "No route");
    let meta = PageMeta::page(state.base_url(), uri.path(), Some("Page Not Found"));
    HtmlPage::new("not_found.html", meta)
        .status(StatusCode::NOT_FOUND)
        .render(&state, session.as_ref(), None)
}
