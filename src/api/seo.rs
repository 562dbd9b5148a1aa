//! Crawler and install metadata

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;

use crate::api::middleware::AppState;
use crate::services::seo::{robots_txt, sitemap_xml, web_manifest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots))
        .route("/manifest.webmanifest", get(manifest))
}

async fn sitemap(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        sitemap_xml(state.base_url(), Utc::now()),
    )
        .into_response()
}

async fn robots(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        robots_txt(state.base_url()),
    )
        .into_response()
}

async fn manifest() -> Response {
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        web_manifest().to_string(),
    )
        .into_response()
}
