//! Longitude conventions and degree/kilometre conversions.

use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.32;

/// Longitude convention of a grid axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LonConvention {
    /// -180..180
    Signed,
    /// 0..360
    Positive,
}

impl LonConvention {
    /// Detect the convention of a longitude axis.
    ///
    /// An axis is 0..360 when every finite value is >= 0 and at least one is
    /// above 180; anything else is treated as -180..180.
    pub fn detect(lon_axis: &[f64]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in lon_axis.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }

        if min >= 0.0 && max > 180.0 {
            LonConvention::Positive
        } else {
            LonConvention::Signed
        }
    }

    /// Map a longitude into this convention.
    pub fn normalize(&self, lon: f64) -> f64 {
        match self {
            LonConvention::Signed => lon_to_180(lon),
            LonConvention::Positive => lon_to_360(lon),
        }
    }
}

/// Map a longitude into [-180, 180).
pub fn lon_to_180(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Map a longitude into [0, 360).
pub fn lon_to_360(lon: f64) -> f64 {
    lon.rem_euclid(360.0)
}

/// Absolute longitude difference, going the short way around the globe.
pub fn wrapped_lon_delta(a: f64, b: f64) -> f64 {
    lon_to_180(a - b).abs()
}

/// Convert a latitude offset in degrees to kilometres.
pub fn lat_degrees_to_km(dlat: f64) -> f64 {
    dlat * KM_PER_DEGREE
}

/// Convert a longitude offset in degrees to kilometres at `lat` degrees.
pub fn lon_degrees_to_km(dlon: f64, lat: f64) -> f64 {
    dlon * KM_PER_DEGREE * lat.to_radians().cos().abs()
}
