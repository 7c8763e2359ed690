//! Error types for SupportLink

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Missing identity field: {0}")]
    MissingField(&'static str),
}
