//! View engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Parse or render failure, with the Tera error chain
    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
