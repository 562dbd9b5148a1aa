//! Remote users API
//!
//! User records live in an external REST service. [`UserDirectory`] is the
//! seam the services talk to; [`HttpUserDirectory`] is the reqwest client.

pub mod http;
pub mod token;

use async_trait::async_trait;

use crate::models::{NewUser, ProfileUpdate, UserRecord};

pub use http::HttpUserDirectory;
pub use token::{IdTokenSource, MetadataTokenSource, NoTokenSource, StaticTokenSource};

/// Error returned by users API operations.
///
/// `Display` yields the user-facing message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UsersApiError {
    /// The service answered with a non-success status
    #[error("{message}")]
    Remote { status: u16, message: String },
    /// The request never produced a response
    #[error("{0}")]
    Network(String),
    /// A success response whose body could not be decoded
    #[error("{0}")]
    InvalidResponse(String),
}

impl UsersApiError {
    /// HTTP status of a remote error
    pub fn status(&self) -> Option<u16> {
        match self {
            UsersApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Access to stored user records
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create the record of a freshly registered account (`PUT /users`)
    async fn create_user(&self, user: &NewUser) -> Result<serde_json::Value, UsersApiError>;

    /// Update profile fields (`PATCH /users/{uid}`)
    async fn update_user(&self, uid: &str, update: &ProfileUpdate) -> Result<serde_json::Value, UsersApiError>;

    /// Fetch a record by account id (`GET /users/{uid}`)
    async fn get_user(&self, uid: &str) -> Result<UserRecord, UsersApiError>;

    /// Fetch a record by public slug (`GET /users/slug/{slug}`), unauthenticated
    async fn get_by_slug(&self, slug: &str) -> Result<UserRecord, UsersApiError>;
}
