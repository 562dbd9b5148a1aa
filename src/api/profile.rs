//! Profile editor
//!
//! `GET|POST /profile` render and save the editor form. The JSON routes under
//! `/api/v1` expose the same operations.

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;

use crate::api::common::{redirect_with_flash, Flash, HtmlPage, IncomingFlash};
use crate::api::middleware::{ApiError, AppState, CurrentSession};
use crate::models::reference::{PROFESSIONS, QUALIFICATIONS};
use crate::models::Session;
use crate::services::profile::CONFIRMATION_TEXT;
use crate::services::social::initials;
use crate::services::{EditorView, FieldErrors, PageMeta, ProfileError, ProfileForm, SyncOutcome};

const SAVED_MESSAGE: &str = "Your information has been saved successfully.";
const SAVE_FAILED: &str = "Could not save your changes.";

/// HTML routes behind the session guard
pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(editor_page).post(save_profile))
}

/// JSON routes behind the API session guard
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/account/sync", post(sync_account))
}

/// Editor state when the record could not be fetched
fn fallback_editor(session: &Session) -> EditorView {
    let name = session.display_name.clone().unwrap_or_default();
    EditorView {
        initials: initials(Some(&name)).unwrap_or_else(|| "..".to_string()),
        name,
        email: session.email.clone(),
        ..Default::default()
    }
}

fn editor_html(state: &AppState, editor: &EditorView) -> HtmlPage {
    let meta = PageMeta::page(state.base_url(), "/profile", Some("Edit profile")).private();
    HtmlPage::new("profile.html", meta)
        .insert("editor", editor)
        .insert("qualification_options", QUALIFICATIONS)
        .insert("profession_options", PROFESSIONS)
        .insert("confirmation_text", CONFIRMATION_TEXT)
        .insert("errors", &FieldErrors::new())
        .insert("form_error", &None::<String>)
}

async fn editor_page(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    match state.profiles.load_editor(&session.uid).await {
        Ok(editor) => editor_html(&state, &editor).render(&state, Some(&session), flash),
        Err(e) => {
            tracing::warn!(uid = %session.uid, "Could not load profile: {}", e);
            let message = match &e {
                ProfileError::InternalError(_) => SAVE_FAILED.to_string(),
                other => other.to_string(),
            };
            editor_html(&state, &fallback_editor(&session))
                .insert("form_error", &Some(message))
                .render(&state, Some(&session), flash)
        }
    }
}

async fn save_profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let form = ProfileForm::from_pairs(&pairs);

    match state.profiles.save(&session.uid, form.clone()).await {
        Ok(_) => redirect_with_flash("/profile", Flash::success("Profile Updated", SAVED_MESSAGE)),
        Err(e) => {
            let base = match state.profiles.load_editor(&session.uid).await {
                Ok(editor) => editor,
                Err(_) => fallback_editor(&session),
            };
            let page = editor_html(&state, &form.to_editor(&base));

            let page = if e.is_validation() {
                let mut errors = FieldErrors::new();
                let field = match e {
                    ProfileError::UnknownQualification(_) => "qualification",
                    ProfileError::UnknownProfession(_) => "profession",
                    _ => "confirmed",
                };
                errors.add(field, &e.to_string());
                page.status(StatusCode::BAD_REQUEST).insert("errors", &errors)
            } else {
                tracing::warn!(uid = %session.uid, "Profile save failed: {}", e);
                let message = match &e {
                    ProfileError::Api(api) => api.to_string(),
                    _ => SAVE_FAILED.to_string(),
                };
                page.status(StatusCode::BAD_GATEWAY)
                    .insert("form_error", &Some(message))
            };
            page.render(&state, Some(&session), None)
        }
    }
}

// ============================================================================
// JSON
// ============================================================================

impl From<ProfileError> for ApiError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::ConfirmationRequired => ApiError::validation_error(e.to_string()),
            ProfileError::UnknownQualification(ref value) => {
                ApiError::with_details("VALIDATION_ERROR", e.to_string(), serde_json::json!({ "qualification": value }))
            }
            ProfileError::UnknownProfession(ref value) => {
                ApiError::with_details("VALIDATION_ERROR", e.to_string(), serde_json::json!({ "profession": value }))
            }
            ProfileError::Api(api) if api.is_not_found() => ApiError::not_found(api.to_string()),
            ProfileError::Api(api) => ApiError::upstream_error(api.to_string()),
            ProfileError::InternalError(e) => {
                tracing::error!("Profile operation failed: {}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

async fn get_profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<EditorView>, ApiError> {
    Ok(Json(state.profiles.load_editor(&session.uid).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(form): Json<ProfileForm>,
) -> Result<Json<EditorView>, ApiError> {
    Ok(Json(state.profiles.save(&session.uid, form).await?))
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    outcome: SyncOutcome,
}

async fn sync_account(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<SyncResponse>, ApiError> {
    let outcome = state.profiles.sync_account(&session).await?;
    Ok(Json(SyncResponse { outcome }))
}
