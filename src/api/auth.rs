//! Account pages
//!
//! Sign-in, sign-up, password reset and email verification. Every form
//! posts back to its own route; failures re-render the form with messages.
//! Google sign-in leaves through `/auth/google` and returns to
//! `/auth/google/callback`.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::common::{
    clear_oauth_state_cookie, clear_session_cookie, get_cookie, message_page, oauth_state_cookie,
    redirect_with_flash, session_cookie, with_cookie, Flash, HtmlPage, IncomingFlash, OAUTH_STATE_COOKIE,
};
use crate::api::middleware::{extract_ip_address, AppState, MaybeSession};
use crate::services::auth::{
    ACCOUNT_CREATED, EMAIL_NOT_VERIFIED, EMAIL_VERIFIED, INVALID_ACTION, PASSWORD_RESET_DONE, RESEND_FAILED,
    RESET_LINK_MISSING, SOCIAL_SIGN_IN_FAILED, VERIFICATION_SENT,
};
use crate::services::validation::{ForgotPasswordForm, LoginForm, ResetPasswordForm, SignupForm};
use crate::services::{ActionOutcome, AuthError, FieldErrors, PageMeta, ResendOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/signup", get(signup_page).post(signup))
        .route("/forgot-password", get(forgot_password_page).post(forgot_password))
        .route("/verify-email", get(verify_email_page))
        .route("/verify-email/resend", post(resend_verification))
        .route("/action", get(action))
        .route("/action/reset-password", post(reset_password))
        .route("/logout", post(logout))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(rename = "oobCode", default)]
    pub oob_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleStartQuery {
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleCallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Set by Google when the user backs out of the consent screen
    #[serde(default)]
    pub error: Option<String>,
}

fn verify_email_path(email: &str) -> String {
    format!("/verify-email?email={}", urlencoding::encode(email))
}

/// Form state after a failed submission
struct FormFailure {
    status: StatusCode,
    errors: FieldErrors,
    message: Option<String>,
}

impl FormFailure {
    fn from_error(error: AuthError, fallback: &str) -> Self {
        match error {
            AuthError::Validation(errors) => Self {
                status: StatusCode::BAD_REQUEST,
                errors,
                message: None,
            },
            AuthError::RateLimited => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                errors: FieldErrors::new(),
                message: Some(error.to_string()),
            },
            AuthError::Failed(message) => Self {
                status: StatusCode::UNAUTHORIZED,
                errors: FieldErrors::new(),
                message: Some(message.to_string()),
            },
            AuthError::EmailNotVerified { .. } => Self {
                status: StatusCode::FORBIDDEN,
                errors: FieldErrors::new(),
                message: Some(EMAIL_NOT_VERIFIED.to_string()),
            },
            AuthError::InternalError(e) => {
                tracing::error!("Account flow failed: {}", e);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    errors: FieldErrors::new(),
                    message: Some(fallback.to_string()),
                }
            }
        }
    }

    fn apply(self, page: HtmlPage) -> HtmlPage {
        page.status(self.status)
            .insert("errors", &self.errors)
            .insert("form_error", &self.message)
    }
}

fn auth_page(state: &AppState, template: &'static str, path: &str, title: &str) -> HtmlPage {
    HtmlPage::new(template, PageMeta::page(state.base_url(), path, Some(title)))
        .insert("errors", &FieldErrors::new())
        .insert("form_error", &None::<String>)
        .insert("google_enabled", &state.auth.google_enabled())
}

// ============================================================================
// Sign in / sign up / sign out
// ============================================================================

async fn login_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<EmailQuery>,
) -> Response {
    if session.is_some() {
        return Redirect::to("/").into_response();
    }
    auth_page(&state, "login.html", "/login", "Sign in")
        .insert("email", &query.email.unwrap_or_default())
        .render(&state, None, flash)
}

async fn login(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<LoginForm>) -> Response {
    match state.auth.login(&form, extract_ip_address(&headers)).await {
        Ok(session) => with_cookie(
            Redirect::to("/").into_response(),
            &session_cookie(&state.config.session, &session.id),
        ),
        Err(AuthError::EmailNotVerified { email }) => {
            redirect_with_flash(&verify_email_path(&email), Flash::error("Email Not Verified", EMAIL_NOT_VERIFIED))
        }
        Err(e) => {
            let failure = FormFailure::from_error(e, crate::services::auth::SIGN_IN_FAILED);
            failure
                .apply(auth_page(&state, "login.html", "/login", "Sign in"))
                .insert("email", form.email.trim())
                .render(&state, None, None)
        }
    }
}

async fn signup_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if session.is_some() {
        return Redirect::to("/").into_response();
    }
    auth_page(&state, "signup.html", "/signup", "Create an account")
        .insert("name", "")
        .insert("email", "")
        .render(&state, None, flash)
}

async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> Response {
    match state.auth.signup(&form).await {
        Ok(session) => {
            let response = redirect_with_flash(
                &verify_email_path(&session.email),
                Flash::success("Account created", ACCOUNT_CREATED),
            );
            with_cookie(response, &session_cookie(&state.config.session, &session.id))
        }
        Err(e) => {
            let failure = FormFailure::from_error(e, crate::services::auth::SIGN_UP_FAILED);
            failure
                .apply(auth_page(&state, "signup.html", "/signup", "Create an account"))
                .insert("name", &form.name)
                .insert("email", form.email.trim())
                .render(&state, None, None)
        }
    }
}

async fn logout(State(state): State<AppState>, MaybeSession(session): MaybeSession) -> Response {
    if let Some(session) = session {
        if let Err(e) = state.auth.logout(&session.id).await {
            tracing::error!("Sign-out failed: {}", e);
        }
        tracing::info!(uid = %session.uid, "User signed out");
    }
    with_cookie(
        Redirect::to("/login").into_response(),
        &clear_session_cookie(&state.config.session),
    )
}

// ============================================================================
// Google sign-in
// ============================================================================

/// Page a Google sign-in started from; failures go back there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GoogleIntent {
    Login,
    Signup,
}

impl GoogleIntent {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("signup") => GoogleIntent::Signup,
            _ => GoogleIntent::Login,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            GoogleIntent::Login => "login",
            GoogleIntent::Signup => "signup",
        }
    }

    fn page(self) -> &'static str {
        match self {
            GoogleIntent::Login => "/login",
            GoogleIntent::Signup => "/signup",
        }
    }

    fn error_title(self) -> &'static str {
        match self {
            GoogleIntent::Login => "Error signing in",
            GoogleIntent::Signup => "Error signing up",
        }
    }
}

async fn google_start(State(state): State<AppState>, Query(query): Query<GoogleStartQuery>) -> Response {
    let intent = GoogleIntent::parse(query.intent.as_deref());
    let nonce = Uuid::new_v4().simple().to_string();

    let Some(url) = state.auth.google_authorize_url(&nonce) else {
        return redirect_with_flash(intent.page(), Flash::error(intent.error_title(), SOCIAL_SIGN_IN_FAILED));
    };
    let cookie = oauth_state_cookie(&format!("{}.{}", nonce, intent.as_str()), state.config.session.secure_cookie);
    with_cookie(Redirect::to(&url).into_response(), &cookie)
}

async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    let stored = get_cookie(&headers, OAUTH_STATE_COOKIE).filter(|v| !v.is_empty());
    let (expected, intent) = match stored.as_deref().and_then(|v| v.split_once('.')) {
        Some((nonce, intent)) => (Some(nonce), GoogleIntent::parse(Some(intent))),
        None => (None, GoogleIntent::Login),
    };

    let result = match (query.code.as_deref(), query.state.as_deref(), expected) {
        _ if query.error.is_some() => {
            tracing::info!(error = ?query.error, "Google sign-in abandoned");
            Err(AuthError::Failed(SOCIAL_SIGN_IN_FAILED))
        }
        (Some(code), Some(returned), Some(expected)) if returned == expected => state.auth.google_sign_in(code).await,
        _ => {
            tracing::warn!("Google callback state mismatch");
            Err(AuthError::Failed(SOCIAL_SIGN_IN_FAILED))
        }
    };

    let response = match result {
        Ok(session) => with_cookie(
            Redirect::to("/").into_response(),
            &session_cookie(&state.config.session, &session.id),
        ),
        Err(e) => {
            let message = match e {
                AuthError::Failed(message) => message,
                other => {
                    tracing::error!("Google sign-in failed: {}", other);
                    SOCIAL_SIGN_IN_FAILED
                }
            };
            redirect_with_flash(intent.page(), Flash::error(intent.error_title(), message))
        }
    };
    with_cookie(response, &clear_oauth_state_cookie(state.config.session.secure_cookie))
}

// ============================================================================
// Password reset
// ============================================================================

async fn forgot_password_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<EmailQuery>,
) -> Response {
    auth_page(&state, "forgot_password.html", "/forgot-password", "Forgot password")
        .insert("sent", &false)
        .insert("email", &query.email.unwrap_or_default())
        .render(&state, session.as_ref(), flash)
}

async fn forgot_password(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let page = auth_page(&state, "forgot_password.html", "/forgot-password", "Forgot password")
        .insert("email", form.email.trim());
    let page = match state.auth.forgot_password(&form).await {
        Ok(()) => page.insert("sent", &true),
        Err(e) => FormFailure::from_error(e, crate::services::auth::RESET_EMAIL_FAILED)
            .apply(page)
            .insert("sent", &false),
    };
    page.render(&state, session.as_ref(), None)
}

async fn reset_password(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    match state.auth.reset_password(&form).await {
        Ok(()) => redirect_with_flash("/login", Flash::success("Password Reset Successful", PASSWORD_RESET_DONE)),
        Err(AuthError::Failed(RESET_LINK_MISSING)) => invalid_reset_link(&state, session.as_ref()),
        Err(e) => FormFailure::from_error(e, crate::services::auth::RESET_FAILED)
            .apply(auth_page(&state, "reset_password.html", "/action", "Reset password"))
            .insert("oob_code", &form.oob_code)
            .render(&state, session.as_ref(), None),
    }
}

fn invalid_reset_link(state: &AppState, session: Option<&crate::models::Session>) -> Response {
    message_page(state, "/action", "Invalid Link", RESET_LINK_MISSING)
        .insert("is_error", &true)
        .insert("link_href", "/forgot-password")
        .insert("link_text", "Request a new link")
        .status(StatusCode::BAD_REQUEST)
        .render(state, session, None)
}

// ============================================================================
// Email verification and action links
// ============================================================================

async fn verify_email_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<EmailQuery>,
) -> Response {
    if session.as_ref().is_some_and(|s| s.email_verified) {
        return Redirect::to("/").into_response();
    }
    let email = query
        .email
        .filter(|e| !e.is_empty())
        .or_else(|| session.as_ref().map(|s| s.email.clone()))
        .unwrap_or_default();

    auth_page(&state, "verify_email.html", "/verify-email", "Verify your email")
        .insert("email", &email)
        .insert("can_resend", &session.is_some())
        .render(&state, session.as_ref(), flash)
}

async fn resend_verification(State(state): State<AppState>, MaybeSession(session): MaybeSession) -> Response {
    let Some(session) = session else {
        return Redirect::to("/login").into_response();
    };

    match state.auth.resend_verification(&session).await {
        Ok(ResendOutcome::Sent) => redirect_with_flash(
            &verify_email_path(&session.email),
            Flash::success("Verification email sent", VERIFICATION_SENT),
        ),
        Ok(ResendOutcome::AlreadyVerified) => Redirect::to("/").into_response(),
        Err(e) => {
            tracing::warn!(uid = %session.uid, "Resend failed: {}", e);
            redirect_with_flash(
                &verify_email_path(&session.email),
                Flash::error("Error sending verification", RESEND_FAILED),
            )
        }
    }
}

/// Target of the links in provider emails
async fn action(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(query): Query<ActionQuery>,
) -> Response {
    let outcome = state
        .auth
        .handle_action(query.mode.as_deref(), query.oob_code.as_deref())
        .await;

    match outcome {
        ActionOutcome::ResetPassword { oob_code } => {
            auth_page(&state, "reset_password.html", "/action", "Reset password")
                .insert("oob_code", &oob_code)
                .render(&state, session.as_ref(), None)
        }
        ActionOutcome::ResetLinkMissing => invalid_reset_link(&state, session.as_ref()),
        ActionOutcome::EmailVerified => {
            if let Some(session) = &session {
                if let Err(e) = state.auth.refresh_session(session).await {
                    tracing::warn!(uid = %session.uid, "Could not refresh session after verification: {}", e);
                }
            }
            redirect_with_flash("/login", Flash::success("Email Verified", EMAIL_VERIFIED))
        }
        ActionOutcome::VerificationFailed(message) => message_page(&state, "/action", "Verification Failed", message)
            .insert("is_error", &true)
            .insert("link_href", "/login")
            .insert("link_text", "Back to sign in")
            .status(StatusCode::BAD_REQUEST)
            .render(&state, session.as_ref(), None),
        ActionOutcome::InvalidAction => message_page(&state, "/action", "Invalid Action", INVALID_ACTION)
            .insert("is_error", &true)
            .insert("link_href", "/")
            .insert("link_text", "Go back home")
            .status(StatusCode::BAD_REQUEST)
            .render(&state, session.as_ref(), None),
    }
}
