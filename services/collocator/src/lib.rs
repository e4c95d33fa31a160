//! Collocator service library.
//!
//! Loads a YAML run file, reads the sample table, collocates it against the
//! configured gridded products through [`netcdf_parser::NetCdfSource`] and
//! writes the augmented table (every sheet of a workbook) plus an optional
//! JSON report.

pub mod config;
pub mod pipeline;

pub use config::{load_service_config, parse_service_config, ServiceConfig};
pub use pipeline::{run_upwelling, write_report, CollocationPipeline};
