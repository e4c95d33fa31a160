//! Derived quantities: temperature unit conversion and the wind-driven
//! upwelling index.

use colloc_common::{CollocError, CollocResult};
use serde::Serialize;
use thiserror::Error;

use crate::config::PhysicalConstants;

/// Offset between the Kelvin and Celsius scales.
pub const KELVIN_OFFSET: f64 = 273.15;

const KELVIN_UNITS: &[&str] = &["k", "kelvin", "degk", "deg_k", "degree_k", "degrees_k"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedError {
    /// Coriolis parameter is zero at the equator.
    #[error("upwelling index is undefined at the equator")]
    UndefinedAtEquator,

    #[error("non-finite input")]
    NonFiniteInput,
}

/// Intermediate and final values of one upwelling computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedRecord {
    /// Wind speed magnitude (m/s)
    pub wind_speed: f64,
    /// Eastward wind stress (N/m^2)
    pub tau_x: f64,
    /// Northward wind stress (N/m^2)
    pub tau_y: f64,
    /// Coriolis parameter (1/s)
    pub coriolis: f64,
    /// Upwelling index (m^2/s per metre of coastline)
    pub upwelling_index: f64,
}

/// Parameters of the upwelling index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpwellingParams {
    /// Coastline angle (degrees)
    pub coastline_angle_deg: f64,
    pub constants: PhysicalConstants,
}

impl Default for UpwellingParams {
    fn default() -> Self {
        Self {
            coastline_angle_deg: crate::config::DEFAULT_COASTLINE_ANGLE_DEG,
            constants: PhysicalConstants::default(),
        }
    }
}

impl UpwellingParams {
    pub fn validate(&self) -> CollocResult<()> {
        if !self.coastline_angle_deg.is_finite() {
            return Err(CollocError::InvalidConfig(
                "coastline_angle_deg must be finite".to_string(),
            ));
        }
        self.constants.validate()
    }
}

/// Wind speed and bulk wind stress components.
pub fn wind_stress(u: f64, v: f64, rho_air: f64, drag_coefficient: f64) -> (f64, f64, f64) {
    let speed = (u * u + v * v).sqrt();
    let k = rho_air * drag_coefficient * speed;
    (speed, k * u, k * v)
}

/// Coriolis parameter `2 Ω sin φ`.
pub fn coriolis_parameter(lat_deg: f64, omega: f64) -> f64 {
    2.0 * omega * lat_deg.to_radians().sin()
}

/// Cross-shore Ekman transport from wind components at a latitude.
pub fn upwelling_index(
    u: f64,
    v: f64,
    lat_deg: f64,
    params: &UpwellingParams,
) -> Result<DerivedRecord, DerivedError> {
    if !(u.is_finite() && v.is_finite() && lat_deg.is_finite()) {
        return Err(DerivedError::NonFiniteInput);
    }

    let c = &params.constants;
    let (wind_speed, tau_x, tau_y) = wind_stress(u, v, c.rho_air, c.drag_coefficient);
    let coriolis = coriolis_parameter(lat_deg, c.omega);
    if coriolis == 0.0 {
        return Err(DerivedError::UndefinedAtEquator);
    }

    let theta = params.coastline_angle_deg.to_radians();
    let upwelling_index = (tau_x * theta.sin() - tau_y * theta.cos()) / (c.rho_water * coriolis);
    if !upwelling_index.is_finite() {
        return Err(DerivedError::NonFiniteInput);
    }

    Ok(DerivedRecord {
        wind_speed,
        tau_x,
        tau_y,
        coriolis,
        upwelling_index,
    })
}

/// Whether a `units` attribute denotes Kelvin.
pub fn is_kelvin(units: &str) -> bool {
    let u = units.trim().to_ascii_lowercase();
    KELVIN_UNITS.contains(&u.as_str())
}

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - KELVIN_OFFSET
}

pub fn celsius_to_kelvin(c: f64) -> f64 {
    c + KELVIN_OFFSET
}

/// Convert to Celsius when `units` says Kelvin; other values pass through.
pub fn to_celsius_if_kelvin(value: f64, units: Option<&str>) -> f64 {
    match units {
        Some(u) if is_kelvin(u) => kelvin_to_celsius(value),
        _ => value,
    }
}
