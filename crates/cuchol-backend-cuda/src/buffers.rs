//! Device-resident CSR matrices and dense vectors.

use crate::error::{CudaError, Result};
use cuchol_core::CsrMatrix;
use cuchol_solver::{DeviceMatrix, DeviceVector};
use cudarc::driver::{CudaSlice, CudaStream, DriverError, sys};
use std::sync::Arc;

/// CSR matrix in device memory with 32-bit indices, as cuSOLVER expects.
pub struct CudaCsr {
    nrows: usize,
    ncols: usize,
    pub(crate) row_ptr: CudaSlice<i32>,
    pub(crate) col_idx: CudaSlice<i32>,
    pub(crate) values: CudaSlice<f64>,
}

impl CudaCsr {
    /// Copy a host matrix to the device.
    ///
    /// # Errors
    ///
    /// Returns `CudaError::InvalidDimension` if the dimension or number of
    /// stored entries does not fit a 32-bit index, and
    /// `CudaError::MemoryAlloc` if the device is out of memory.
    pub fn upload(stream: &Arc<CudaStream>, matrix: &CsrMatrix) -> Result<Self> {
        let row_ptr = to_i32(matrix.row_ptr(), "row_ptr")?;
        let col_idx = to_i32(matrix.col_idx(), "col_idx")?;
        if i32::try_from(matrix.ncols()).is_err() {
            return Err(CudaError::InvalidDimension(format!(
                "{} columns exceed the 32-bit index range",
                matrix.ncols()
            )));
        }

        let d_row_ptr = stream
            .memcpy_stod(&row_ptr)
            .map_err(|e| upload_error(e, "row_ptr"))?;
        let d_col_idx = stream
            .memcpy_stod(&col_idx)
            .map_err(|e| upload_error(e, "col_idx"))?;
        let d_values = stream
            .memcpy_stod(matrix.values())
            .map_err(|e| upload_error(e, "values"))?;

        log::debug!(
            "uploaded {}x{} CSR matrix, nnz={}",
            matrix.nrows(),
            matrix.ncols(),
            matrix.nnz()
        );

        Ok(Self {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            row_ptr: d_row_ptr,
            col_idx: d_col_idx,
            values: d_values,
        })
    }

    /// Copy the matrix back to the host.
    pub fn download(&self, stream: &Arc<CudaStream>) -> Result<CsrMatrix> {
        let row_ptr: Vec<i32> = stream
            .memcpy_dtov(&self.row_ptr)
            .map_err(|e| CudaError::Transfer(format!("row_ptr download failed: {}", e)))?;
        let col_idx: Vec<i32> = stream
            .memcpy_dtov(&self.col_idx)
            .map_err(|e| CudaError::Transfer(format!("col_idx download failed: {}", e)))?;
        let values: Vec<f64> = stream
            .memcpy_dtov(&self.values)
            .map_err(|e| CudaError::Transfer(format!("values download failed: {}", e)))?;

        CsrMatrix::try_new(
            self.nrows,
            self.ncols,
            from_i32(&row_ptr, "row_ptr")?,
            from_i32(&col_idx, "col_idx")?,
            values,
        )
        .map_err(|e| CudaError::Transfer(format!("downloaded matrix is malformed: {}", e)))
    }
}

impl DeviceMatrix for CudaCsr {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn nnz(&self) -> usize {
        self.values.len()
    }
}

/// Dense `f64` vector in device memory.
pub struct CudaVector {
    pub(crate) data: CudaSlice<f64>,
}

impl CudaVector {
    pub fn upload(stream: &Arc<CudaStream>, v: &[f64]) -> Result<Self> {
        let data = stream
            .memcpy_stod(v)
            .map_err(|e| upload_error(e, "vector"))?;
        Ok(Self { data })
    }

    pub fn zeros(stream: &Arc<CudaStream>, len: usize) -> Result<Self> {
        let data = stream
            .alloc_zeros::<f64>(len)
            .map_err(|e| CudaError::MemoryAlloc(format!("vector alloc failed: {}", e)))?;
        Ok(Self { data })
    }

    pub fn download(&self, stream: &Arc<CudaStream>) -> Result<Vec<f64>> {
        stream
            .memcpy_dtov(&self.data)
            .map_err(|e| CudaError::Transfer(format!("vector download failed: {}", e)))
    }
}

impl DeviceVector for CudaVector {
    fn len(&self) -> usize {
        self.data.len()
    }
}

/// A host-to-device copy allocates its destination, so out-of-memory is an
/// allocation failure rather than a transfer failure.
fn upload_error(e: DriverError, what: &str) -> CudaError {
    if e.0 == sys::CUresult::CUDA_ERROR_OUT_OF_MEMORY {
        CudaError::MemoryAlloc(format!("{} upload: out of device memory", what))
    } else {
        CudaError::Transfer(format!("{} upload failed: {:?}", what, e.0))
    }
}

fn to_i32(indices: &[usize], what: &str) -> Result<Vec<i32>> {
    indices
        .iter()
        .map(|&i| i32::try_from(i))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| {
            CudaError::InvalidDimension(format!("{} entry exceeds the 32-bit index range", what))
        })
}

fn from_i32(indices: &[i32], what: &str) -> Result<Vec<usize>> {
    indices
        .iter()
        .map(|&i| usize::try_from(i))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| CudaError::Transfer(format!("negative {} entry on device", what)))
}
