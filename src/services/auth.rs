//! Authentication service
//!
//! Implements the account flows on top of the identity provider:
//! - Sign in (verified email required), sign up, sign out
//! - Password reset request and confirmation
//! - Email verification links and resends
//! - Google sign-in through the OAuth consent redirect
//!
//! Every failure carries the message shown to the user. Calls made with a
//! session's ID token renew it first when it is stale.

use chrono::{Duration, Utc};
use std::net::IpAddr;
use std::sync::Arc;

use crate::identity::{AccountInfo, GoogleOAuth, IdentityError, IdentityProvider};
use crate::models::Session;
use crate::services::profile::ProfileService;
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::session::SessionStore;
use crate::services::validation::{
    FieldErrors, ForgotPasswordForm, LoginForm, ResetPasswordForm, SignupForm,
};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const SIGN_IN_FAILED: &str = "Failed to sign in. Please try again.";
pub const EMAIL_NOT_VERIFIED: &str = "Please verify your email address before signing in.";
pub const EMAIL_ALREADY_REGISTERED: &str = "This email is already registered. Please sign in.";
pub const SIGN_UP_FAILED: &str = "Failed to create an account. Please try again.";
pub const RESET_EMAIL_FAILED: &str = "Failed to send password reset email. Please try again.";
pub const RESET_LINK_MISSING: &str = "The password reset link is missing or invalid.";
pub const RESET_LINK_EXPIRED: &str = "The password reset link has expired. Please request a new one.";
pub const RESET_LINK_INVALID: &str = "The password reset link is invalid. It may have already been used.";
pub const RESET_FAILED: &str = "Failed to reset password. The link may have expired.";
pub const VERIFY_LINK_MISSING: &str = "Invalid verification link.";
pub const VERIFY_LINK_EXPIRED: &str = "The verification link has expired. Please request a new one.";
pub const VERIFY_LINK_INVALID: &str = "The verification link is invalid. It may have already been used.";
pub const VERIFY_FAILED: &str = "Failed to verify email. The link may be invalid or expired.";
pub const RESEND_FAILED: &str = "Failed to send a new verification email. Please try again.";
pub const TOO_MANY_ATTEMPTS: &str = "Too many sign-in attempts. Please try again later.";
pub const INVALID_ACTION: &str = "The link is invalid or has expired.";
pub const SOCIAL_SIGN_IN_FAILED: &str = "Failed to sign in with social provider. Please try again.";
pub const ACCOUNT_EXISTS_WITH_OTHER_METHOD: &str = "An account already exists with the same email address but different sign-in credentials. Please sign in using the original method.";

pub const ACCOUNT_CREATED: &str = "We've sent you an email verification link.";
pub const EMAIL_VERIFIED: &str = "Your email has been successfully verified. You can now log in.";
pub const PASSWORD_RESET_DONE: &str = "You can now sign in with your new password.";
pub const VERIFICATION_SENT: &str = "A new verification link has been sent to your email address.";

/// Error types for authentication flows
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Form input rejected; messages per field
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("{}", TOO_MANY_ATTEMPTS)]
    RateLimited,

    /// Credentials were fine but the address is not verified yet
    #[error("{}", EMAIL_NOT_VERIFIED)]
    EmailNotVerified { email: String },

    /// A flow failed; the message is user-facing
    #[error("{0}")]
    Failed(&'static str),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What an email action link resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Show the new-password form for this code
    ResetPassword { oob_code: String },
    /// A reset link without a code
    ResetLinkMissing,
    EmailVerified,
    VerificationFailed(&'static str),
    /// Unknown or missing mode
    InvalidAction,
}

/// Result of a verification resend request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    AlreadyVerified,
}

fn resend_failed(e: impl std::fmt::Display) -> AuthError {
    tracing::warn!("Resending verification email failed: {}", e);
    AuthError::Failed(RESEND_FAILED)
}

/// Authentication service
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    sessions: Arc<SessionStore>,
    profiles: Arc<ProfileService>,
    rate_limiter: Arc<LoginRateLimiter>,
    google: Option<Arc<dyn GoogleOAuth>>,
    base_url: String,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sessions: Arc<SessionStore>,
        profiles: Arc<ProfileService>,
        rate_limiter: Arc<LoginRateLimiter>,
        base_url: &str,
    ) -> Self {
        Self {
            identity,
            sessions,
            profiles,
            rate_limiter,
            google: None,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Enable Google sign-in
    pub fn with_google(mut self, google: Arc<dyn GoogleOAuth>) -> Self {
        self.google = Some(google);
        self
    }

    pub fn google_enabled(&self) -> bool {
        self.google.is_some()
    }

    fn action_url(&self) -> String {
        format!("{}/action", self.base_url)
    }

    fn google_redirect_uri(&self) -> String {
        format!("{}/auth/google/callback", self.base_url)
    }

    /// Sign in with email and password.
    ///
    /// Unverified accounts are refused with [`AuthError::EmailNotVerified`];
    /// no session is created for them.
    pub async fn login(&self, form: &LoginForm, ip: Option<IpAddr>) -> Result<Session, AuthError> {
        if let Some(ip) = ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                tracing::warn!(%ip, "Sign-in rate limited by IP");
                return Err(AuthError::RateLimited);
            }
            self.rate_limiter.record_ip_request(ip).await;
        }

        form.validate().map_err(AuthError::Validation)?;
        let email = form.email.trim();

        if self.rate_limiter.is_email_limited(email).await {
            tracing::warn!("Sign-in rate limited for account");
            return Err(AuthError::RateLimited);
        }

        let tokens = match self.identity.sign_in_with_password(email, &form.password).await {
            Ok(tokens) => tokens,
            Err(IdentityError::InvalidCredentials) => {
                self.rate_limiter.record_failed_attempt(email).await;
                return Err(AuthError::Failed(INVALID_CREDENTIALS));
            }
            Err(e) => {
                tracing::warn!("Sign-in failed: {}", e);
                return Err(AuthError::Failed(SIGN_IN_FAILED));
            }
        };

        let account = self.identity.lookup(&tokens.id_token).await.map_err(|e| {
            tracing::warn!("Account lookup after sign-in failed: {}", e);
            AuthError::Failed(SIGN_IN_FAILED)
        })?;

        if !account.email_verified {
            return Err(AuthError::EmailNotVerified {
                email: email.to_string(),
            });
        }

        self.rate_limiter.clear_email_attempts(email).await;
        let session = self.sessions.create(&tokens, &account).await?;
        self.sync_quietly(&session).await;
        tracing::info!(uid = %session.uid, "User signed in");
        Ok(session)
    }

    /// Create an account, name it, and send the verification email.
    ///
    /// Returns an unverified session so the user can ask for a resend.
    pub async fn signup(&self, form: &SignupForm) -> Result<Session, AuthError> {
        form.validate().map_err(AuthError::Validation)?;
        let email = form.email.trim();

        let tokens = match self.identity.sign_up(email, &form.password).await {
            Ok(tokens) => tokens,
            Err(IdentityError::EmailExists) => return Err(AuthError::Failed(EMAIL_ALREADY_REGISTERED)),
            Err(e) => {
                tracing::warn!("Sign-up failed: {}", e);
                return Err(AuthError::Failed(SIGN_UP_FAILED));
            }
        };

        let display_name = form.display_name().map(String::from);
        if let Some(name) = &display_name {
            if let Err(e) = self.identity.update_display_name(&tokens.id_token, name).await {
                tracing::warn!("Setting display name failed: {}", e);
                return Err(AuthError::Failed(SIGN_UP_FAILED));
            }
        }

        if let Err(e) = self
            .identity
            .send_email_verification(&tokens.id_token, &self.action_url())
            .await
        {
            tracing::warn!("Sending verification email failed: {}", e);
            return Err(AuthError::Failed(SIGN_UP_FAILED));
        }

        let account = AccountInfo {
            uid: tokens.uid.clone(),
            email: tokens.email.clone(),
            email_verified: false,
            display_name,
            photo_url: None,
        };
        let session = self.sessions.create(&tokens, &account).await?;
        self.sync_quietly(&session).await;
        tracing::info!(uid = %session.uid, "Account created");
        Ok(session)
    }

    /// Request a password reset email
    pub async fn forgot_password(&self, form: &ForgotPasswordForm) -> Result<(), AuthError> {
        form.validate().map_err(AuthError::Validation)?;
        let continue_url = format!("{}/login", self.base_url);
        self.identity
            .send_password_reset(form.email.trim(), &continue_url)
            .await
            .map_err(|e| {
                tracing::warn!("Password reset request failed: {}", e);
                AuthError::Failed(RESET_EMAIL_FAILED)
            })
    }

    /// Resolve an email action link (`/action?mode=...&oobCode=...`)
    pub async fn handle_action(&self, mode: Option<&str>, oob_code: Option<&str>) -> ActionOutcome {
        let code = oob_code.filter(|c| !c.is_empty());
        match mode {
            Some("resetPassword") => match code {
                Some(code) => ActionOutcome::ResetPassword {
                    oob_code: code.to_string(),
                },
                None => ActionOutcome::ResetLinkMissing,
            },
            Some("verifyEmail") => {
                let Some(code) = code else {
                    return ActionOutcome::VerificationFailed(VERIFY_LINK_MISSING);
                };
                match self.identity.apply_action_code(code).await {
                    Ok(()) => ActionOutcome::EmailVerified,
                    Err(IdentityError::ExpiredActionCode) => ActionOutcome::VerificationFailed(VERIFY_LINK_EXPIRED),
                    Err(IdentityError::InvalidActionCode) => ActionOutcome::VerificationFailed(VERIFY_LINK_INVALID),
                    Err(e) => {
                        tracing::warn!("Email verification failed: {}", e);
                        ActionOutcome::VerificationFailed(VERIFY_FAILED)
                    }
                }
            }
            _ => ActionOutcome::InvalidAction,
        }
    }

    /// Set a new password using a reset code
    pub async fn reset_password(&self, form: &ResetPasswordForm) -> Result<(), AuthError> {
        if form.oob_code.is_empty() {
            return Err(AuthError::Failed(RESET_LINK_MISSING));
        }
        form.validate().map_err(AuthError::Validation)?;

        let result = match self.identity.verify_password_reset_code(&form.oob_code).await {
            Ok(_) => {
                self.identity
                    .confirm_password_reset(&form.oob_code, &form.password)
                    .await
            }
            Err(e) => Err(e),
        };

        result.map_err(|e| match e {
            IdentityError::ExpiredActionCode => AuthError::Failed(RESET_LINK_EXPIRED),
            IdentityError::InvalidActionCode => AuthError::Failed(RESET_LINK_INVALID),
            other => {
                tracing::warn!("Password reset failed: {}", other);
                AuthError::Failed(RESET_FAILED)
            }
        })
    }

    /// Exchange the session's refresh token for a new ID token and store it
    async fn renew_token(&self, session: &Session) -> Result<Session, AuthError> {
        let refreshed = self
            .identity
            .refresh_id_token(&session.refresh_token)
            .await
            .map_err(|e| AuthError::InternalError(anyhow::anyhow!("token refresh failed: {}", e)))?;

        let mut renewed = session.clone();
        renewed.id_token = refreshed.id_token;
        renewed.refresh_token = refreshed.refresh_token;
        renewed.token_expires_at = Utc::now() + Duration::seconds(refreshed.expires_in as i64);
        self.sessions.update(&renewed).await?;
        tracing::debug!(uid = %session.uid, "ID token renewed");
        Ok(renewed)
    }

    async fn with_fresh_token(&self, session: &Session) -> Result<Session, AuthError> {
        if session.token_is_stale() {
            self.renew_token(session).await
        } else {
            Ok(session.clone())
        }
    }

    /// Account lookup that renews a rejected token once
    async fn lookup_account(&self, session: &Session) -> Result<(Session, AccountInfo), AuthError> {
        let current = self.with_fresh_token(session).await?;
        let lookup_failed = |e: IdentityError| AuthError::InternalError(anyhow::anyhow!("account lookup failed: {}", e));
        match self.identity.lookup(&current.id_token).await {
            Ok(account) => Ok((current, account)),
            Err(IdentityError::TokenExpired) => {
                let renewed = self.renew_token(&current).await?;
                let account = self.identity.lookup(&renewed.id_token).await.map_err(lookup_failed)?;
                Ok((renewed, account))
            }
            Err(e) => Err(lookup_failed(e)),
        }
    }

    /// Re-read the account and store changed fields in the session
    pub async fn refresh_session(&self, session: &Session) -> Result<Session, AuthError> {
        let (current, account) = self.lookup_account(session).await?;

        let mut refreshed = current.clone();
        refreshed.email_verified = account.email_verified;
        if account.display_name.is_some() {
            refreshed.display_name = account.display_name;
        }
        if account.photo_url.is_some() {
            refreshed.photo_url = account.photo_url;
        }
        if refreshed != current {
            self.sessions.update(&refreshed).await?;
        }
        Ok(refreshed)
    }

    /// Send another verification email unless the address is verified already
    pub async fn resend_verification(&self, session: &Session) -> Result<ResendOutcome, AuthError> {
        let current = match self.refresh_session(session).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Refreshing session before resend failed: {}", e);
                session.clone()
            }
        };
        if current.email_verified {
            return Ok(ResendOutcome::AlreadyVerified);
        }

        let current = self.with_fresh_token(&current).await.map_err(resend_failed)?;
        match self
            .identity
            .send_email_verification(&current.id_token, &self.action_url())
            .await
        {
            Ok(()) => {}
            Err(IdentityError::TokenExpired) => {
                let renewed = self.renew_token(&current).await.map_err(resend_failed)?;
                self.identity
                    .send_email_verification(&renewed.id_token, &self.action_url())
                    .await
                    .map_err(resend_failed)?;
            }
            Err(e) => return Err(resend_failed(e)),
        }
        Ok(ResendOutcome::Sent)
    }

    /// Consent screen URL for `state`; `None` when Google sign-in is off
    pub fn google_authorize_url(&self, state: &str) -> Option<String> {
        self.google
            .as_ref()
            .map(|google| google.authorize_url(&self.google_redirect_uri(), state))
    }

    /// Finish Google sign-in with the code from the consent redirect.
    ///
    /// New Google accounts are created by the provider; either way the
    /// account gets a session and a users API record.
    pub async fn google_sign_in(&self, code: &str) -> Result<Session, AuthError> {
        let google = self.google.as_ref().ok_or(AuthError::Failed(SOCIAL_SIGN_IN_FAILED))?;
        let redirect_uri = self.google_redirect_uri();

        let google_token = google.exchange_code(code, &redirect_uri).await.map_err(|e| {
            tracing::warn!("Google code exchange failed: {}", e);
            AuthError::Failed(SOCIAL_SIGN_IN_FAILED)
        })?;

        let tokens = match self.identity.sign_in_with_google(&google_token, &redirect_uri).await {
            Ok(tokens) => tokens,
            Err(IdentityError::AccountExistsWithDifferentCredential) => {
                return Err(AuthError::Failed(ACCOUNT_EXISTS_WITH_OTHER_METHOD))
            }
            Err(e) => {
                tracing::warn!("Google sign-in failed: {}", e);
                return Err(AuthError::Failed(SOCIAL_SIGN_IN_FAILED));
            }
        };

        let account = self.identity.lookup(&tokens.id_token).await.map_err(|e| {
            tracing::warn!("Account lookup after Google sign-in failed: {}", e);
            AuthError::Failed(SOCIAL_SIGN_IN_FAILED)
        })?;

        let session = self.sessions.create(&tokens, &account).await?;
        self.sync_quietly(&session).await;
        tracing::info!(uid = %session.uid, "User signed in with Google");
        Ok(session)
    }

    /// End a session
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.delete(session_id).await?;
        Ok(())
    }

    /// Look up the session behind a cookie token
    pub async fn session(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.sessions.get(session_id).await?)
    }

    /// Sync failures are logged; "User already exists" is expected.
    async fn sync_quietly(&self, session: &Session) {
        if let Err(e) = self.profiles.sync_account(session).await {
            tracing::warn!(uid = %session.uid, "Could not sync account: {}", e);
        }
    }
}
