//! Native NetCDF reading using the netcdf library.
//!
//! Opens a CF-style file on a rectilinear lat/lon grid and loads its axes and
//! every variable defined on that grid into a [`GridDataset`]. Values are kept
//! raw; masking and scaling are applied at extraction time from the recorded
//! attributes.

use std::path::Path;
use std::sync::Once;

use colloc_common::{
    CollocError, CollocResult, GridDataset, GridDim, GridSource, GridVariable, TimeAxis,
    VariableAttrs,
};
use tracing::{debug, warn};

use crate::error::{NetCdfError, NetCdfResult};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics even when a failed lookup is
/// handled on the Rust side (for example probing an optional attribute). This
/// disables that output with `H5Eset_auto2`. It only needs to run once per
/// process and is safe to call repeatedly; call it before the first open.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to turn automatic printing off.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Candidate variable names for each coordinate axis, tried in order.
#[derive(Debug, Clone)]
pub struct AxisNames {
    pub lat: Vec<String>,
    pub lon: Vec<String>,
    pub time: Vec<String>,
}

impl Default for AxisNames {
    fn default() -> Self {
        Self {
            lat: vec!["lat".into(), "latitude".into(), "LATITUDE".into()],
            lon: vec!["lon".into(), "longitude".into(), "LONGITUDE".into()],
            time: vec!["time".into(), "TIME".into()],
        }
    }
}

/// [`GridSource`] backed by libnetcdf.
#[derive(Debug, Clone, Default)]
pub struct NetCdfSource {
    axis_names: AxisNames,
}

impl NetCdfSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis_names(axis_names: AxisNames) -> Self {
        Self { axis_names }
    }

    /// Read a whole file into memory.
    pub fn read(&self, path: &Path) -> NetCdfResult<GridDataset> {
        silence_hdf5_errors();

        let file = netcdf::open(path)?;

        let (lat_name, lat_dim, lat) = read_axis(&file, "lat", &self.axis_names.lat)?
            .ok_or_else(|| NetCdfError::MissingData("latitude axis".to_string()))?;
        let (lon_name, lon_dim, lon) = read_axis(&file, "lon", &self.axis_names.lon)?
            .ok_or_else(|| NetCdfError::MissingData("longitude axis".to_string()))?;
        let time = read_axis(&file, "time", &self.axis_names.time)?;

        let mut dataset = GridDataset::new(path, lat, lon);
        let mut time_dim = None;
        let mut skip = vec![lat_name, lon_name];
        if let Some((time_name, dim, values)) = time {
            let units = file
                .variable(&time_name)
                .and_then(|v| get_string_attr(&v, "units"))
                .unwrap_or_default();
            dataset = dataset.with_time(TimeAxis { values, units });
            time_dim = Some(dim);
            skip.push(time_name);
        }

        for var in file.variables() {
            let name = var.name();
            if skip.contains(&name) {
                continue;
            }

            let dims: Vec<GridDim> = var
                .dimensions()
                .iter()
                .map(|d| {
                    let dname = d.name();
                    if dname == lat_dim {
                        GridDim::Lat
                    } else if dname == lon_dim {
                        GridDim::Lon
                    } else if time_dim.as_deref() == Some(dname.as_str()) {
                        GridDim::Time
                    } else {
                        GridDim::Other(dname)
                    }
                })
                .collect();
            if !dims.contains(&GridDim::Lat) || !dims.contains(&GridDim::Lon) {
                debug!(variable = %name, "Skipping variable not on the lat/lon grid");
                continue;
            }
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

            let data: Vec<f64> = match var.get_values(..) {
                Ok(data) => data,
                Err(e) => {
                    warn!(variable = %name, error = %e, "Failed to read variable values");
                    continue;
                }
            };

            let attrs = read_attrs(&var);
            let grid_var = GridVariable::new(name, dims, shape, data, attrs)
                .map_err(|e| NetCdfError::InvalidFormat(e.to_string()))?;
            dataset
                .insert_variable(grid_var)
                .map_err(|e| NetCdfError::InvalidFormat(e.to_string()))?;
        }

        debug!(
            path = %path.display(),
            variables = dataset.variables.len(),
            lat_len = dataset.lat.len(),
            lon_len = dataset.lon.len(),
            "Loaded NetCDF grid"
        );

        Ok(dataset)
    }
}

impl GridSource for NetCdfSource {
    fn open(&self, path: &Path) -> CollocResult<GridDataset> {
        self.read(path).map_err(|e| match e {
            NetCdfError::InvalidAxis { .. } | NetCdfError::MissingData(_) => e.into(),
            other => CollocError::open_failed(path, other.to_string()),
        })
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Read the first 1-D coordinate variable found among `names`.
///
/// Returns the variable name, its dimension name and values.
fn read_axis(
    file: &netcdf::File,
    axis: &str,
    names: &[String],
) -> NetCdfResult<Option<(String, String, Vec<f64>)>> {
    for name in names {
        let Some(var) = file.variable(name) else {
            continue;
        };
        let dims = var.dimensions();
        if dims.len() != 1 {
            return Err(NetCdfError::InvalidAxis {
                axis: axis.to_string(),
                message: format!("'{}' has {} dimensions, expected 1", name, dims.len()),
            });
        }
        let dim_name = dims[0].name();
        let values: Vec<f64> = var.get_values(..)?;
        return Ok(Some((name.clone(), dim_name, values)));
    }
    Ok(None)
}

fn read_attrs(var: &netcdf::Variable) -> VariableAttrs {
    let (mut valid_min, mut valid_max) = (
        get_f64_attr(var, "valid_min"),
        get_f64_attr(var, "valid_max"),
    );
    if let Some((lo, hi)) = get_f64_pair_attr(var, "valid_range") {
        valid_min = valid_min.or(Some(lo));
        valid_max = valid_max.or(Some(hi));
    }

    VariableAttrs {
        fill_value: get_f64_attr(var, "_FillValue"),
        missing_value: get_f64_attr(var, "missing_value"),
        valid_min,
        valid_max,
        scale_factor: get_f64_attr(var, "scale_factor"),
        add_offset: get_f64_attr(var, "add_offset"),
        units: get_string_attr(var, "units"),
    }
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

fn get_f64_pair_attr(var: &netcdf::Variable, name: &str) -> Option<(f64, f64)> {
    use netcdf::AttributeValue as A;

    if !has_attr(var, name) {
        return None;
    }
    let values: Vec<f64> = match var.attribute_value(name)?.ok()? {
        A::Doubles(v) => v,
        A::Floats(v) => v.into_iter().map(f64::from).collect(),
        A::Ints(v) => v.into_iter().map(f64::from).collect(),
        A::Shorts(v) => v.into_iter().map(f64::from).collect(),
        A::Schars(v) => v.into_iter().map(f64::from).collect(),
        A::Uchars(v) => v.into_iter().map(f64::from).collect(),
        A::Ushorts(v) => v.into_iter().map(f64::from).collect(),
        A::Uints(v) => v.into_iter().map(f64::from).collect(),
        _ => return None,
    };
    match values.as_slice() {
        [lo, hi] => Some((*lo, *hi)),
        _ => None,
    }
}

fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
