//! Public profile pages and reference data

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use crate::api::common::{HtmlPage, IncomingFlash};
use crate::api::middleware::{ApiError, AppState, MaybeSession};
use crate::models::reference::{RefOption, PROFESSIONS, QUALIFICATIONS};
use crate::services::seo::{json_ld_script, person_json_ld};
use crate::services::{PageMeta, ProfileError, PublicProfileView};

pub fn router() -> Router<AppState> {
    Router::new().route("/user/{slug}", get(profile_page))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/users/slug/{slug}", get(get_public_profile))
        .route("/reference/qualifications", get(list_qualifications))
        .route("/reference/professions", get(list_professions))
}

/// `GET /user/{slug}`
async fn profile_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    IncomingFlash(flash): IncomingFlash,
    Path(slug): Path<String>,
) -> Response {
    match state.profiles.public_profile(&slug).await {
        Ok(record) => {
            let view = PublicProfileView::from_record(&record, &slug);
            let json_ld = json_ld_script(&person_json_ld(state.base_url(), &view));
            HtmlPage::new("public_profile.html", PageMeta::profile(state.base_url(), &view))
                .insert("profile", &view)
                .insert("json_ld", &json_ld)
                .render(&state, session.as_ref(), flash)
        }
        Err(e) => {
            let status = if e.is_not_found() {
                StatusCode::NOT_FOUND
            } else {
                tracing::warn!(slug = %slug, "Public profile fetch failed: {}", e);
                StatusCode::BAD_GATEWAY
            };
            let message = match &e {
                ProfileError::Api(api) => api.to_string(),
                _ => "Could not find user.".to_string(),
            };
            let path = format!("/user/{}", urlencoding::encode(&slug));
            let meta = PageMeta::page(state.base_url(), &path, Some("User not found")).private();
            HtmlPage::new("profile_error.html", meta)
                .insert("message", &message)
                .status(status)
                .render(&state, session.as_ref(), flash)
        }
    }
}

/// `GET /api/v1/users/slug/{slug}`
async fn get_public_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicProfileView>, ApiError> {
    let record = state.profiles.public_profile(&slug).await?;
    Ok(Json(PublicProfileView::from_record(&record, &slug)))
}

async fn list_qualifications() -> Json<&'static [RefOption]> {
    Json(QUALIFICATIONS)
}

async fn list_professions() -> Json<&'static [RefOption]> {
    Json(PROFESSIONS)
}
