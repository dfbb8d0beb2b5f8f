//! Error types for cuchol-solver.

use std::fmt;

use thiserror::Error;

/// Outcome reported by a [`SparseSolverBackend`](crate::SparseSolverBackend)
/// when the numeric phase fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    /// Factorization hit a non-positive pivot at `row` (in the ordering the
    /// backend was given).
    NotPositiveDefinite { row: usize },
    /// Factorize or solve was called without a matching symbolic analysis.
    NotAnalyzed,
    /// The device runtime or solver library returned a failure status.
    Fault { code: i32 },
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStatus::NotPositiveDefinite { row } => {
                write!(f, "matrix not positive definite at row {}", row)
            }
            BackendStatus::NotAnalyzed => write!(f, "symbolic analysis missing"),
            BackendStatus::Fault { code } => write!(f, "status {}", code),
        }
    }
}

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

    #[error("backend error ({status}): {message}")]
    Backend {
        status: BackendStatus,
        message: String,
    },

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("device context: {0}")]
    Context(String),

    #[error("no factorization prepared in this session")]
    NotPrepared,
}

impl Error {
    /// Shorthand for a [`BackendStatus::Fault`] error.
    pub fn fault(code: i32, message: impl Into<String>) -> Self {
        Error::Backend {
            status: BackendStatus::Fault { code },
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only allocation failures can be transient. Validation errors need
    /// different inputs and a matrix that is not positive definite fails the
    /// same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Allocation(_))
    }
}

impl From<cuchol_core::Error> for Error {
    fn from(e: cuchol_core::Error) -> Self {
        match e {
            cuchol_core::Error::Shape(msg) => Error::Shape(msg),
            cuchol_core::Error::Format(msg) => Error::Format(msg),
            cuchol_core::Error::DimensionMismatch {
                expected,
                actual,
                context,
            } => Error::DimensionMismatch {
                expected,
                actual,
                context,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
