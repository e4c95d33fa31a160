//! Error types for NetCDF reading.

use colloc_common::CollocError;
use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF reading.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reported by libnetcdf
    #[error("NetCDF error: {0}")]
    Library(#[from] netcdf::Error),

    /// Missing required variable or dimension
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Coordinate axis present but unusable
    #[error("Invalid axis '{axis}': {message}")]
    InvalidAxis { axis: String, message: String },

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl From<NetCdfError> for CollocError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::InvalidAxis { axis, message } => CollocError::AxisInvalid { axis, message },
            NetCdfError::MissingData(what) => CollocError::axis_invalid("grid", what),
            other => CollocError::InvalidGrid(other.to_string()),
        }
    }
}
