//! API middleware
//!
//! Contains middleware for:
//! - Session loading from the session cookie (or a Bearer token)
//! - Page guards that redirect to `/login`
//! - JSON guards that answer 401

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::Arc;

use crate::cache::{create_cache, create_session_cache};
use crate::config::Config;
use crate::identity::{GoogleOAuth, IdentityProvider};
use crate::models::Session;
use crate::services::{AuthService, LoginRateLimiter, ProfileService, SessionStore};
use crate::users_api::UserDirectory;
use crate::views::ViewEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
    pub views: Arc<ViewEngine>,
    pub config: Arc<Config>,
}

/// Remote systems and shared pieces the services are built over
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
    pub google: Option<Arc<dyn GoogleOAuth>>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub views: Arc<ViewEngine>,
}

impl AppState {
    /// Wire the services. Sessions and profiles get separate caches.
    pub fn new(config: Arc<Config>, backends: Backends) -> Self {
        let profile_cache = create_cache(&config.cache);
        let session_cache = create_session_cache(&config.session);

        let profiles = Arc::new(ProfileService::new(
            backends.users,
            profile_cache,
            config.cache.profile_ttl_seconds,
        ));
        let sessions = Arc::new(SessionStore::new(session_cache, config.session.ttl_seconds));
        let mut auth = AuthService::new(
            backends.identity,
            sessions,
            profiles.clone(),
            backends.rate_limiter,
            config.server.base_url(),
        );
        if let Some(google) = backends.google {
            auth = auth.with_google(google);
        }

        Self {
            auth: Arc::new(auth),
            profiles,
            views: backends.views,
            config,
        }
    }

    pub fn base_url(&self) -> &str {
        self.config.server.base_url()
    }
}

/// Session of the signed-in user, placed in request extensions
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// The signed-in session when there is one
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(
            parts.extensions.get::<CurrentSession>().map(|s| s.0.clone()),
        ))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn upstream_error(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Extract session token from a Bearer header or the session cookie
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    crate::api::common::get_cookie(headers, cookie_name).filter(|t| !t.is_empty())
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = ip.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Resolve the session cookie for every request
pub async fn load_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = extract_session_token(request.headers(), &state.config.session.cookie_name) {
        match state.auth.session(&token).await {
            Ok(Some(session)) => {
                request.extensions_mut().insert(CurrentSession(session));
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Page guard: without a session, redirect to the sign-in page
pub async fn require_session(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentSession>().is_none() {
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// JSON guard: without a session, answer 401
pub async fn require_api_session(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<CurrentSession>().is_none() {
        return Err(ApiError::unauthorized("Authentication required"));
    }
    Ok(next.run(request).await)
}
