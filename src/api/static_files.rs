//! Embedded static assets

use axum::{
    body::Body,
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Stylesheets and icons shipped with the binary
#[derive(RustEmbed)]
#[folder = "static/"]
struct StaticAssets;

/// `GET /static/{*path}`
pub async fn serve_static(Path(path): Path<String>) -> Response {
    let decoded = urlencoding::decode(&path).map(|p| p.into_owned()).unwrap_or(path);
    let asset_path = decoded.trim_start_matches('/');

    if asset_path.split('/').any(|segment| segment == "..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    match StaticAssets::get(asset_path) {
        Some(content) => build_response(asset_path, &content.data),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn build_response(path: &str, data: &[u8]) -> Response {
    let content_type = get_content_type(path);
    let cache_control = if path.starts_with("icons/") {
        "public, max-age=604800"
    } else {
        "public, max-age=3600"
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, cache_control)],
        Body::from(data.to_vec()),
    )
        .into_response()
}

fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css",
        "js" => "application/javascript",
        "json" | "webmanifest" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
