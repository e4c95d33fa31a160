//! NetCDF reader for rectilinear lat/lon grids.
//!
//! Files are opened with the native `netcdf` library (libnetcdf/HDF5) and
//! loaded whole into a [`colloc_common::GridDataset`]: the 1-D latitude and
//! longitude axes, the optional time axis with its CF units, and every
//! variable whose dimensions include both grid axes, together with the
//! attributes needed for masking and unpacking (`_FillValue`,
//! `missing_value`, `valid_min`/`valid_max`/`valid_range`, `scale_factor`,
//! `add_offset`, `units`).

pub mod error;
pub mod native;

pub use error::{NetCdfError, NetCdfResult};
pub use native::{silence_hdf5_errors, AxisNames, NetCdfSource};
