//! In-memory representation of one gridded file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CollocError, CollocResult};

/// Role of a variable dimension with respect to the grid axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridDim {
    Time,
    Lat,
    Lon,
    /// Any other dimension (depth, band, ...); read at index 0.
    Other(String),
}

/// Time axis values with their CF units string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    pub values: Vec<f64>,
    pub units: String,
}

/// Encoding attributes of a gridded variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableAttrs {
    pub fill_value: Option<f64>,
    pub missing_value: Option<f64>,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
    pub units: Option<String>,
}

/// One named variable with its raw (unscaled) values in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridVariable {
    pub name: String,
    pub dims: Vec<GridDim>,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
    pub attrs: VariableAttrs,
}

impl GridVariable {
    /// Create a variable, checking that the data length matches the shape.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<GridDim>,
        shape: Vec<usize>,
        data: Vec<f64>,
        attrs: VariableAttrs,
    ) -> CollocResult<Self> {
        let name = name.into();
        if dims.len() != shape.len() {
            return Err(CollocError::InvalidGrid(format!(
                "variable '{}' has {} dims but shape of rank {}",
                name,
                dims.len(),
                shape.len()
            )));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CollocError::InvalidGrid(format!(
                "variable '{}' has {} values, shape {:?} needs {}",
                name,
                data.len(),
                shape,
                expected
            )));
        }
        if !dims.contains(&GridDim::Lat) || !dims.contains(&GridDim::Lon) {
            return Err(CollocError::InvalidGrid(format!(
                "variable '{}' is not defined on the lat/lon grid",
                name
            )));
        }

        Ok(Self {
            name,
            dims,
            shape,
            data,
            attrs,
        })
    }

    /// Whether the variable varies along the time axis.
    pub fn has_time(&self) -> bool {
        self.dims.contains(&GridDim::Time)
    }

    /// Raw value at (row, col), with the time index applied when the
    /// variable has a time dimension. Other dimensions are read at 0.
    pub fn raw_at(&self, row: usize, col: usize, time_index: Option<usize>) -> CollocResult<f64> {
        let mut flat = 0usize;
        for (dim, &len) in self.dims.iter().zip(&self.shape) {
            let idx = match dim {
                GridDim::Lat => row,
                GridDim::Lon => col,
                GridDim::Time => time_index.unwrap_or(0),
                GridDim::Other(_) => 0,
            };
            if idx >= len {
                return Err(match dim {
                    GridDim::Time => CollocError::TimeIndexOutOfRange {
                        variable: self.name.clone(),
                        index: idx,
                    },
                    _ => CollocError::InvalidGrid(format!(
                        "index {} out of range {} for variable '{}'",
                        idx, len, self.name
                    )),
                });
            }
            flat = flat * len + idx;
        }
        Ok(self.data[flat])
    }
}

/// A 2-D lat/lon slice of a variable at one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    /// Number of latitude rows
    pub height: usize,
    /// Number of longitude columns
    pub width: usize,
    /// Raw values, row-major (lat, lon)
    pub data: Vec<f64>,
}

impl GridField {
    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }
}

/// One opened gridded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDataset {
    pub path: PathBuf,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub time: Option<TimeAxis>,
    pub variables: BTreeMap<String, GridVariable>,
}

impl GridDataset {
    pub fn new(path: impl Into<PathBuf>, lat: Vec<f64>, lon: Vec<f64>) -> Self {
        Self {
            path: path.into(),
            lat,
            lon,
            time: None,
            variables: BTreeMap::new(),
        }
    }

    pub fn with_time(mut self, time: TimeAxis) -> Self {
        self.time = Some(time);
        self
    }

    /// Add a variable; it must be shaped consistently with the axes.
    pub fn insert_variable(&mut self, var: GridVariable) -> CollocResult<()> {
        for (dim, &len) in var.dims.iter().zip(&var.shape) {
            let expected = match dim {
                GridDim::Lat => Some(self.lat.len()),
                GridDim::Lon => Some(self.lon.len()),
                GridDim::Time => self.time.as_ref().map(|t| t.values.len()),
                GridDim::Other(_) => None,
            };
            if let Some(expected) = expected {
                if expected != len {
                    return Err(CollocError::InvalidGrid(format!(
                        "variable '{}' dimension {:?} has length {}, axis has {}",
                        var.name, dim, len, expected
                    )));
                }
            }
        }
        self.variables.insert(var.name.clone(), var);
        Ok(())
    }

    /// Latitude and longitude axes.
    pub fn axes(&self) -> (&[f64], &[f64]) {
        (&self.lat, &self.lon)
    }

    pub fn variable(&self, name: &str) -> Option<&GridVariable> {
        self.variables.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// 2-D raw field of `name` at `time_index`.
    ///
    /// Copies the whole layer. Per-sample reads go through
    /// [`GridVariable::raw_at`]; this is for callers that want the layer.
    pub fn field(&self, name: &str, time_index: Option<usize>) -> CollocResult<GridField> {
        let var = self
            .variable(name)
            .ok_or_else(|| CollocError::VariableAbsent(name.to_string()))?;

        let height = self.lat.len();
        let width = self.lon.len();
        let mut data = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                data.push(var.raw_at(row, col, time_index)?);
            }
        }

        Ok(GridField {
            height,
            width,
            data,
        })
    }
}

/// Something that can open a gridded file into a [`GridDataset`].
///
/// Implemented by the NetCDF reader; tests supply in-memory sources.
pub trait GridSource: Send + Sync {
    fn open(&self, path: &Path) -> CollocResult<GridDataset>;
}
