//! Configuration for a collocation run.

use std::collections::{BTreeMap, HashSet};

use colloc_common::{CollocError, CollocResult, ColumnMapping, DateColumns};
use serde::{Deserialize, Serialize};
use storage::FileGroup;

/// Default nearest-cell tolerance, in degrees.
pub const DEFAULT_TOLERANCE_DEG: f64 = 0.05;

/// Default coastline angle for the upwelling index, in degrees.
pub const DEFAULT_COASTLINE_ANGLE_DEG: f64 = -32.0;

/// Plankton functional types distributed with the ocean-colour product.
pub const PLANKTON_TYPES: &[&str] = &[
    "DIATO", "DINO", "HAPTO", "GREEN", "PROKAR", "PROCHLO", "MICRO", "NANO", "PICO",
];

/// Unit of the nearest-cell tolerance and of reported distances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Degrees,
    Km,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Degrees => "degrees",
            DistanceUnit::Km => "km",
        }
    }
}

/// Maximum accepted distance between a sample and its matched cell.
///
/// The unit is required whenever a tolerance is written out; only the
/// built-in default (0.05 degrees) leaves it implicit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub value: f64,
    pub unit: DistanceUnit,
}

impl Tolerance {
    pub fn degrees(value: f64) -> Self {
        Self {
            value,
            unit: DistanceUnit::Degrees,
        }
    }

    pub fn km(value: f64) -> Self {
        Self {
            value,
            unit: DistanceUnit::Km,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::degrees(DEFAULT_TOLERANCE_DEG)
    }
}

/// Physical constants used by the upwelling index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Air density (kg/m^3)
    pub rho_air: f64,
    /// Sea water density (kg/m^3)
    pub rho_water: f64,
    /// Wind drag coefficient (dimensionless)
    pub drag_coefficient: f64,
    /// Earth rotation rate (rad/s)
    pub omega: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            rho_air: 1.22,
            rho_water: 1025.0,
            drag_coefficient: 1.3e-3,
            omega: 7.2921e-5,
        }
    }
}

impl PhysicalConstants {
    /// Every constant must be finite and strictly positive.
    pub fn validate(&self) -> CollocResult<()> {
        for (name, value) in [
            ("rho_air", self.rho_air),
            ("rho_water", self.rho_water),
            ("drag_coefficient", self.drag_coefficient),
            ("omega", self.omega),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CollocError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_ui_column() -> String {
    "UI".to_string()
}

/// Gridded upwelling index computed from two wind variables of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedUpwelling {
    pub u_variable: String,
    pub v_variable: String,
    #[serde(default = "default_ui_column")]
    pub column: String,
}

fn default_true() -> bool {
    true
}

/// One independently stored family of variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub files: FileGroup,
    #[serde(default)]
    pub variables: Vec<String>,
    /// Prefix for output columns of this group.
    #[serde(default)]
    pub column_prefix: String,
    /// Explicit output column per variable; wins over the prefix.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Write a per-row match outcome column.
    #[serde(default)]
    pub write_status: bool,
    /// Name of the outcome column (default `<prefix>status`).
    #[serde(default)]
    pub status_column: Option<String>,
    /// Convert Kelvin-unit variables to Celsius.
    #[serde(default = "default_true")]
    pub kelvin_to_celsius: bool,
    #[serde(default)]
    pub upwelling: Option<GriddedUpwelling>,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>, files: FileGroup, variables: Vec<String>) -> Self {
        Self {
            name: name.into(),
            files,
            variables,
            column_prefix: String::new(),
            rename: BTreeMap::new(),
            write_status: false,
            status_column: None,
            kelvin_to_celsius: true,
            upwelling: None,
        }
    }

    /// Chlorophyll and plankton functional types with their uncertainties.
    pub fn plankton(files: FileGroup) -> Self {
        let mut variables = vec![
            "CHL".to_string(),
            "CHL_uncertainty".to_string(),
            "flags".to_string(),
        ];
        variables.extend(PLANKTON_TYPES.iter().map(|s| s.to_string()));
        variables.extend(PLANKTON_TYPES.iter().map(|s| format!("{}_uncertainty", s)));
        Self::new("plankton", files, variables)
    }

    /// Backscattering and CDM optics; `flags` is written as `flags_optics`.
    pub fn optics(files: FileGroup) -> Self {
        let variables = ["BBP", "BBP_uncertainty", "flags", "CDM", "CDM_uncertainty"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut group = Self::new("optics", files, variables);
        group
            .rename
            .insert("flags".to_string(), "flags_optics".to_string());
        group
    }

    /// Output column for a variable of this group.
    pub fn output_column(&self, variable: &str) -> String {
        self.rename
            .get(variable)
            .cloned()
            .unwrap_or_else(|| format!("{}{}", self.column_prefix, variable))
    }

    pub fn status_column_name(&self) -> Option<String> {
        if !self.write_status {
            return None;
        }
        Some(
            self.status_column
                .clone()
                .unwrap_or_else(|| format!("{}status", self.column_prefix)),
        )
    }

    /// Every column this group writes, in output order.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.variables.iter().map(|v| self.output_column(v)).collect();
        if let Some(ui) = &self.upwelling {
            columns.push(ui.column.clone());
        }
        if let Some(status) = self.status_column_name() {
            columns.push(status);
        }
        columns
    }

    /// Variables to read: the configured list plus wind components.
    pub fn variables_to_read(&self) -> Vec<String> {
        let mut names = self.variables.clone();
        if let Some(ui) = &self.upwelling {
            for name in [&ui.u_variable, &ui.v_variable] {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

fn default_missing_marker() -> String {
    "NaN".to_string()
}

/// Complete configuration of a collocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollocationConfig {
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub tolerance: Tolerance,
    #[serde(default = "default_coastline_angle")]
    pub coastline_angle_deg: f64,
    #[serde(default)]
    pub constants: PhysicalConstants,
    #[serde(default)]
    pub columns: ColumnMapping,
    /// Text written for missing values.
    #[serde(default = "default_missing_marker")]
    pub missing_marker: String,
    /// Process date groups on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Bound on the number of open files held at once (unbounded if unset).
    #[serde(default)]
    pub cache_capacity: Option<usize>,
}

fn default_coastline_angle() -> f64 {
    DEFAULT_COASTLINE_ANGLE_DEG
}

impl Default for CollocationConfig {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            tolerance: Tolerance::default(),
            coastline_angle_deg: DEFAULT_COASTLINE_ANGLE_DEG,
            constants: PhysicalConstants::default(),
            columns: ColumnMapping::default(),
            missing_marker: default_missing_marker(),
            parallel: false,
            cache_capacity: None,
        }
    }
}

impl CollocationConfig {
    pub fn with_group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CollocResult<()> {
        let invalid = |msg: String| Err(CollocError::InvalidConfig(msg));

        if self.groups.is_empty() {
            return invalid("at least one variable group is required".to_string());
        }

        if !self.tolerance.value.is_finite() || self.tolerance.value < 0.0 {
            return invalid(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance.value
            ));
        }

        if !self.coastline_angle_deg.is_finite() {
            return invalid("coastline_angle_deg must be finite".to_string());
        }

        self.constants.validate()?;

        if self.cache_capacity == Some(0) {
            return invalid("cache_capacity must be > 0 when set".to_string());
        }

        let input_columns = self.input_columns();
        let mut group_names = HashSet::new();
        let mut owners: BTreeMap<String, String> = BTreeMap::new();

        for group in &self.groups {
            if group.name.trim().is_empty() {
                return invalid("group name must not be empty".to_string());
            }
            if !group_names.insert(group.name.as_str()) {
                return invalid(format!("duplicate group '{}'", group.name));
            }
            if group.variables.is_empty() && group.upwelling.is_none() {
                return invalid(format!("group '{}' requests no variables", group.name));
            }
            for renamed in group.rename.keys() {
                if !group.variables.contains(renamed) {
                    return invalid(format!(
                        "group '{}' renames '{}', which it does not request",
                        group.name, renamed
                    ));
                }
            }

            for column in group.output_columns() {
                if input_columns.contains(&column) {
                    return invalid(format!(
                        "group '{}' would overwrite mapped input column '{}'",
                        group.name, column
                    ));
                }
                if let Some(other) = owners.insert(column.clone(), group.name.clone()) {
                    return invalid(format!(
                        "output column '{}' written by both '{}' and '{}'",
                        column, other, group.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Columns the sample mapping reads.
    fn input_columns(&self) -> Vec<String> {
        let m = &self.columns;
        let mut cols = vec![m.lat.clone(), m.lon.clone()];
        match &m.date {
            DateColumns::Split { year, month, day } => {
                cols.extend([year.clone(), month.clone(), day.clone()])
            }
            DateColumns::Single { column, .. } => cols.push(column.clone()),
        }
        cols.extend(m.id.iter().cloned());
        cols.extend(m.time_of_day.iter().cloned());
        cols
    }
}
