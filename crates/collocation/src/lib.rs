//! Sample-to-grid collocation engine.
//!
//! Given a table of point samples (latitude, longitude, date) and pools of
//! dated gridded files, each sample is matched to the nearest grid cell of
//! the file for its date, within a tolerance, and the requested variables
//! are appended to its row.
//!
//! # Architecture
//!
//! ```text
//! SampleCollocator::run(table)
//!      │
//!      ├─► GridFileIndex     (date, group) → files
//!      ├─► GridAccessor      path → cached GridDataset
//!      ├─► locate            nearest (row, col) within tolerance
//!      ├─► extract           masked, unpacked values
//!      └─► derived           K → C, upwelling index
//! ```
//!
//! Per-row failures never abort a run: they leave missing cells and are
//! counted in the [`CollocationReport`].
//!
//! # Example
//!
//! ```ignore
//! use collocation::{CollocationConfig, GroupConfig, SampleCollocator};
//! use netcdf_parser::NetCdfSource;
//! use storage::FileGroup;
//!
//! let config = CollocationConfig::default()
//!     .with_group(GroupConfig::plankton(FileGroup::new("/data/plankton")));
//! let collocator = SampleCollocator::new(config, Arc::new(NetCdfSource::new()))?;
//! let report = collocator.run(&mut table)?;
//! ```

pub mod collocator;
pub mod config;
pub mod derived;
pub mod extract;
pub mod locator;
pub mod types;
pub mod upwelling;

// Re-export commonly used types at crate root
pub use collocator::SampleCollocator;
pub use config::{
    CollocationConfig, DistanceUnit, GriddedUpwelling, GroupConfig, PhysicalConstants, Tolerance,
};
pub use derived::{
    celsius_to_kelvin, kelvin_to_celsius, upwelling_index, DerivedError, DerivedRecord,
    UpwellingParams,
};
pub use extract::{extract, ExtractedValue, MissingReason};
pub use locator::{locate, CellMatch, LocateFailure};
pub use types::{CollocationReport, CollocationResult, GroupDiagnostics, MatchOutcome};
pub use upwelling::{compute_upwelling_column, UpwellingColumns, UpwellingSummary};
