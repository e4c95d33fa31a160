//! Common types and utilities shared across the collocation crates.

pub mod error;
pub mod geo;
pub mod grid;
pub mod sample;
pub mod time;

pub use error::{CollocError, CollocResult};
pub use geo::{LonConvention, KM_PER_DEGREE};
pub use grid::{GridDataset, GridDim, GridField, GridSource, GridVariable, TimeAxis, VariableAttrs};
pub use sample::{CellValue, ColumnMapping, DateColumns, ResolvedMapping, Sample, SampleError, SampleTable};
pub use time::{SampleTime, TimeParseError};
