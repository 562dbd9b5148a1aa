//! Common API utilities and shared types
//!
//! Cookies, one-shot flash messages and HTML page rendering shared by the
//! page handlers.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tera::Context;

use crate::api::middleware::AppState;
use crate::config::SessionConfig;
use crate::models::Session;
use crate::services::social::initials;
use crate::services::PageMeta;

pub const FLASH_COOKIE: &str = "flash";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Flash cookies expire quickly if never shown
const FLASH_MAX_AGE: u64 = 60;

/// Time allowed on the Google consent screen
const OAUTH_STATE_MAX_AGE: u64 = 600;

// ============================================================================
// Cookies
// ============================================================================

/// Value of the first cookie called `name`
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

fn cookie_attributes(max_age: u64, secure: bool) -> String {
    let mut attrs = format!("Path=/; HttpOnly; SameSite=Lax; Max-Age={}", max_age);
    if secure {
        attrs.push_str("; Secure");
    }
    attrs
}

pub fn session_cookie(config: &SessionConfig, session_id: &str) -> String {
    format!(
        "{}={}; {}",
        config.cookie_name,
        session_id,
        cookie_attributes(config.ttl_seconds, config.secure_cookie)
    )
}

pub fn clear_session_cookie(config: &SessionConfig) -> String {
    format!("{}=; {}", config.cookie_name, cookie_attributes(0, config.secure_cookie))
}

/// Anti-forgery state for the Google redirect, checked on the callback
pub fn oauth_state_cookie(value: &str, secure: bool) -> String {
    format!(
        "{}={}; {}",
        OAUTH_STATE_COOKIE,
        value,
        cookie_attributes(OAUTH_STATE_MAX_AGE, secure)
    )
}

pub fn clear_oauth_state_cookie(secure: bool) -> String {
    format!("{}=; {}", OAUTH_STATE_COOKIE, cookie_attributes(0, secure))
}

// ============================================================================
// Flash messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// Message shown once on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub title: String,
    pub message: String,
}

impl Flash {
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            kind: FlashKind::Success,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            kind: FlashKind::Error,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn to_cookie(&self) -> String {
        let value = serde_json::to_string(self).unwrap_or_default();
        format!(
            "{}={}; {}",
            FLASH_COOKIE,
            urlencoding::encode(&value),
            cookie_attributes(FLASH_MAX_AGE, false)
        )
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = get_cookie(headers, FLASH_COOKIE)?;
        let decoded = urlencoding::decode(&raw).ok()?;
        serde_json::from_str(&decoded).ok()
    }
}

fn clear_flash_cookie() -> String {
    format!("{}=; {}", FLASH_COOKIE, cookie_attributes(0, false))
}

/// Flash message carried by the request, if any
#[derive(Debug, Clone, Default)]
pub struct IncomingFlash(pub Option<Flash>);

impl<S> FromRequestParts<S> for IncomingFlash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(Flash::from_headers(&parts.headers)))
    }
}

/// Append a `Set-Cookie` header
pub fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// 303 redirect carrying a flash message
pub fn redirect_with_flash(to: &str, flash: Flash) -> Response {
    with_cookie(Redirect::to(to).into_response(), &flash.to_cookie())
}

// ============================================================================
// Page rendering
// ============================================================================

/// Account fields the page chrome needs
#[derive(Debug, Clone, Serialize)]
struct Viewer {
    greeting: String,
    email: String,
    email_verified: bool,
    initials: String,
    photo_url: Option<String>,
}

impl Viewer {
    fn from_session(session: &Session) -> Self {
        Self {
            greeting: session.greeting_name(),
            email: session.email.clone(),
            email_verified: session.email_verified,
            initials: initials(Some(&session.email)).unwrap_or_else(|| "U".to_string()),
            photo_url: session.photo_url.clone(),
        }
    }
}

/// An HTML page about to be rendered
pub struct HtmlPage {
    template: &'static str,
    context: Context,
    status: StatusCode,
}

impl HtmlPage {
    pub fn new(template: &'static str, meta: PageMeta) -> Self {
        let mut context = Context::new();
        context.insert("meta", &meta);
        Self {
            template,
            context,
            status: StatusCode::OK,
        }
    }

    pub fn insert<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        self.context.insert(key, value);
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Render with the page chrome; a shown flash is cleared
    pub fn render(mut self, state: &AppState, session: Option<&Session>, flash: Option<Flash>) -> Response {
        if let Some(session) = session {
            self.context.insert("viewer", &Viewer::from_session(session));
        }
        let had_flash = flash.is_some();
        if let Some(flash) = flash {
            self.context.insert("flash", &flash);
        }

        let response = match state.views.render(self.template, &self.context) {
            Ok(html) => (self.status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("{}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        };

        if had_flash {
            with_cookie(response, &clear_flash_cookie())
        } else {
            response
        }
    }
}

/// Generic message page (`message.html`)
pub fn message_page(state: &AppState, path: &str, title: &str, message: &str) -> HtmlPage {
    HtmlPage::new("message.html", PageMeta::page(state.base_url(), path, Some(title)))
        .insert("title", title)
        .insert("message", message)
}
