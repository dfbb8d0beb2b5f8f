//! Error types for cuchol-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape error: {0}")]
    Shape(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
