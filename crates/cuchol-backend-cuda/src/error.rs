//! Error types for CUDA backend operations.

use std::fmt;

use cuchol_solver::BackendStatus;

/// CUDA backend error type.
#[derive(Debug)]
pub enum CudaError {
    /// No CUDA device available.
    NoDevice,
    /// CUDA device or library handle initialization failed.
    DeviceInit(String),
    /// CUDA memory allocation failed.
    MemoryAlloc(String),
    /// Data transfer error (host<->device).
    Transfer(String),
    /// cuSPARSE call returned a failure status.
    Cusparse(String),
    /// cuSOLVER call returned a failure status.
    Cusolver { code: i32, message: String },
    /// Invalid dimension or size.
    InvalidDimension(String),
    /// Cholesky breakdown: the matrix is not positive definite.
    NotPositiveDefinite { row: usize },
}

impl fmt::Display for CudaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CudaError::NoDevice => write!(f, "No CUDA device available"),
            CudaError::DeviceInit(msg) => write!(f, "CUDA device initialization failed: {}", msg),
            CudaError::MemoryAlloc(msg) => write!(f, "CUDA memory allocation failed: {}", msg),
            CudaError::Transfer(msg) => write!(f, "CUDA data transfer failed: {}", msg),
            CudaError::Cusparse(msg) => write!(f, "cuSPARSE operation failed: {}", msg),
            CudaError::Cusolver { code, message } => {
                write!(f, "cuSOLVER operation failed (status {}): {}", code, message)
            }
            CudaError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            CudaError::NotPositiveDefinite { row } => {
                write!(f, "matrix is not positive definite (breakdown at row {})", row)
            }
        }
    }
}

impl std::error::Error for CudaError {}

impl From<CudaError> for cuchol_solver::Error {
    fn from(e: CudaError) -> Self {
        use cuchol_solver::Error;

        match e {
            CudaError::NoDevice => Error::Unavailable("no CUDA device available".into()),
            CudaError::DeviceInit(msg) => Error::Context(msg),
            CudaError::MemoryAlloc(msg) => Error::Allocation(msg),
            CudaError::InvalidDimension(msg) => Error::Shape(msg),
            CudaError::NotPositiveDefinite { row } => Error::Backend {
                status: BackendStatus::NotPositiveDefinite { row },
                message: "cusolverSpDcsrlsvchol".into(),
            },
            CudaError::Cusolver { code, message } => Error::fault(code, message),
            CudaError::Transfer(msg) | CudaError::Cusparse(msg) => Error::fault(-1, msg),
        }
    }
}

/// Result type for CUDA operations.
pub type Result<T> = std::result::Result<T, CudaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_error_mapping() {
        let e: cuchol_solver::Error = CudaError::MemoryAlloc("x".into()).into();
        assert!(e.is_retryable());

        let e: cuchol_solver::Error = CudaError::NoDevice.into();
        assert!(matches!(e, cuchol_solver::Error::Unavailable(_)));

        let e: cuchol_solver::Error = CudaError::NotPositiveDefinite { row: 4 }.into();
        assert!(matches!(
            e,
            cuchol_solver::Error::Backend {
                status: BackendStatus::NotPositiveDefinite { row: 4 },
                ..
            }
        ));

        let e: cuchol_solver::Error = CudaError::Cusolver {
            code: 7,
            message: "internal".into(),
        }
        .into();
        assert!(matches!(
            e,
            cuchol_solver::Error::Backend {
                status: BackendStatus::Fault { code: 7 },
                ..
            }
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(CudaError::NoDevice.to_string(), "No CUDA device available");
        assert_eq!(
            CudaError::NotPositiveDefinite { row: 2 }.to_string(),
            "matrix is not positive definite (breakdown at row 2)"
        );
    }
}
