//! Nearest-cell search on rectilinear lat/lon grids.
//!
//! The grid axes are independent, so the nearest cell is found as a
//! separable arg-min: the closest latitude row and the closest longitude
//! column are searched separately. The reported distance is the larger of the
//! two per-axis offsets, in the unit of the tolerance.

use colloc_common::geo::{lat_degrees_to_km, lon_degrees_to_km, wrapped_lon_delta};
use colloc_common::LonConvention;
use serde::Serialize;
use thiserror::Error;

use crate::config::{DistanceUnit, Tolerance};

/// Matched grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellMatch {
    /// Latitude index
    pub row: usize,
    /// Longitude index
    pub col: usize,
    /// Distance to the sample, in the tolerance unit
    pub distance: f64,
    pub grid_lat: f64,
    pub grid_lon: f64,
}

/// Why no cell was matched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocateFailure {
    #[error("{axis} axis is empty")]
    EmptyAxis { axis: &'static str },

    #[error("{axis} axis is not strictly monotonic")]
    NonMonotonic { axis: &'static str },

    #[error("nearest cell is {distance} away, beyond tolerance")]
    ExceedsTolerance { distance: f64 },
}

impl LocateFailure {
    /// Whether the failure comes from the grid rather than the sample.
    pub fn is_axis_problem(&self) -> bool {
        !matches!(self, LocateFailure::ExceedsTolerance { .. })
    }
}

/// Check that an axis is non-empty and strictly ascending or descending.
///
/// A NaN anywhere breaks monotonicity.
pub fn check_axis(axis: &[f64], name: &'static str) -> Result<(), LocateFailure> {
    if axis.is_empty() {
        return Err(LocateFailure::EmptyAxis { axis: name });
    }
    if axis.iter().any(|v| v.is_nan()) {
        return Err(LocateFailure::NonMonotonic { axis: name });
    }

    let ascending = axis.windows(2).all(|w| w[0] < w[1]);
    let descending = axis.windows(2).all(|w| w[0] > w[1]);
    if ascending || descending {
        Ok(())
    } else {
        Err(LocateFailure::NonMonotonic { axis: name })
    }
}

/// Index of the smallest offset; the lowest index wins ties.
fn nearest_index(axis: &[f64], offset: impl Fn(f64) -> f64) -> (usize, f64) {
    let mut best = (0, offset(axis[0]));
    for (i, &v) in axis.iter().enumerate().skip(1) {
        let d = offset(v);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Locate the cell nearest to (`target_lat`, `target_lon`).
///
/// The target longitude is first brought into the grid's convention
/// (0..360 when every grid longitude is non-negative and some exceed 180,
/// -180..180 otherwise); longitude offsets wrap around the antimeridian.
pub fn locate(
    lat_axis: &[f64],
    lon_axis: &[f64],
    target_lat: f64,
    target_lon: f64,
    tolerance: Tolerance,
) -> Result<CellMatch, LocateFailure> {
    check_axis(lat_axis, "lat")?;
    check_axis(lon_axis, "lon")?;

    let target_lon = LonConvention::detect(lon_axis).normalize(target_lon);

    let (row, dlat) = nearest_index(lat_axis, |v| (v - target_lat).abs());
    let (col, dlon) = nearest_index(lon_axis, |v| wrapped_lon_delta(v, target_lon));

    let distance = match tolerance.unit {
        DistanceUnit::Degrees => dlat.max(dlon),
        DistanceUnit::Km => lat_degrees_to_km(dlat).max(lon_degrees_to_km(dlon, target_lat)),
    };

    if distance > tolerance.value {
        return Err(LocateFailure::ExceedsTolerance { distance });
    }

    Ok(CellMatch {
        row,
        col,
        distance,
        grid_lat: lat_axis[row],
        grid_lon: lon_axis[col],
    })
}
