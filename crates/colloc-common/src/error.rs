//! Error types for collocation crates.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using CollocError.
pub type CollocResult<T> = Result<T, CollocError>;

/// Primary error type for collocation operations.
///
/// Per-sample problems (no file, cell out of tolerance, fill values) are not
/// errors at this level; they are recorded as missing values with a reason.
/// The variants here either abort the run (structural problems) or are
/// caught by the collocator and turned into a per-row outcome.
#[derive(Debug, Error)]
pub enum CollocError {
    // === Grid Errors ===
    #[error("Failed to open grid file {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    #[error("Variable not present in dataset: {0}")]
    VariableAbsent(String),

    #[error("Invalid axis '{axis}': {message}")]
    AxisInvalid { axis: String, message: String },

    #[error("Invalid grid data: {0}")]
    InvalidGrid(String),

    #[error("Time index {index} out of range for variable '{variable}'")]
    TimeIndexOutOfRange { variable: String, index: usize },

    // === Table Errors ===
    #[error("Missing column in input table: {0}")]
    MissingColumn(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Failed to read table: {0}")]
    TableRead(String),

    #[error("Failed to write table: {0}")]
    TableWrite(String),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollocError {
    /// Create an OpenFailed error.
    pub fn open_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an AxisInvalid error.
    pub fn axis_invalid(axis: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AxisInvalid {
            axis: axis.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts a batch run.
    ///
    /// Grid-level errors only affect the samples that referenced the grid.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CollocError::MissingColumn(_)
                | CollocError::TableRead(_)
                | CollocError::TableWrite(_)
                | CollocError::UnsupportedFormat(_)
                | CollocError::InvalidConfig(_)
                | CollocError::Io(_)
        )
    }
}

impl From<serde_json::Error> for CollocError {
    fn from(err: serde_json::Error) -> Self {
        CollocError::InvalidConfig(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(CollocError::MissingColumn("LATITUDE".into()).is_structural());
        assert!(CollocError::InvalidConfig("bad".into()).is_structural());
        assert!(!CollocError::VariableAbsent("CHL".into()).is_structural());
        assert!(!CollocError::open_failed("/tmp/x.nc", "boom").is_structural());
    }

    #[test]
    fn test_error_messages() {
        let err = CollocError::axis_invalid("lat", "not monotonic");
        assert_eq!(err.to_string(), "Invalid axis 'lat': not monotonic");
    }
}
