//! CUDA backend for cuchol: sparse Cholesky through cuSOLVER.

pub mod backend;
pub mod buffers;
pub mod context;
pub mod error;
pub mod runtime;
pub mod sparse_context;

pub use backend::{CudaCholeskyBackend, CudaConfig, CudaFactorization, DEFAULT_TOLERANCE};
pub use buffers::{CudaCsr, CudaVector};
pub use context::CudaContext;
pub use error::{CudaError, Result};
pub use sparse_context::CudaSparseContext;
