//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the two remote systems:
//! - Account flows delegated to the identity provider
//! - Profile reads and writes through the users API
//! - Sessions, rate limiting and form validation
//! - Search-engine metadata

pub mod auth;
pub mod profile;
pub mod rate_limiter;
pub mod seo;
pub mod session;
pub mod social;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{ActionOutcome, AuthError, AuthService, ResendOutcome};
pub use profile::{EditorView, ProfileError, ProfileForm, ProfileService, PublicProfileView, SyncOutcome};
pub use rate_limiter::LoginRateLimiter;
pub use seo::PageMeta;
pub use session::SessionStore;
pub use validation::FieldErrors;
