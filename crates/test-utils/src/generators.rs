//! Synthetic datasets and an in-memory grid source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use colloc_common::{
    CollocError, CollocResult, GridDataset, GridDim, GridSource, GridVariable, TimeAxis,
    VariableAttrs,
};

/// Evenly spaced axis from `start` with `n` values `step` apart.
///
/// # Example
///
/// ```
/// use test_utils::regular_axis;
///
/// assert_eq!(regular_axis(38.0, 1.0, 4), vec![38.0, 39.0, 40.0, 41.0]);
/// ```
pub fn regular_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Builder for in-memory [`GridDataset`]s.
///
/// Variables are filled from a closure of `(row, col)` (or
/// `(time, row, col)` for time-varying variables), so values are easy to
/// predict in assertions.
pub struct DatasetBuilder {
    dataset: GridDataset,
}

impl DatasetBuilder {
    pub fn new(path: impl Into<PathBuf>, lat: Vec<f64>, lon: Vec<f64>) -> Self {
        Self {
            dataset: GridDataset::new(path, lat, lon),
        }
    }

    pub fn time(mut self, values: Vec<f64>, units: &str) -> Self {
        self.dataset.time = Some(TimeAxis {
            values,
            units: units.to_string(),
        });
        self
    }

    /// Add a (lat, lon) variable.
    pub fn variable(
        mut self,
        name: &str,
        attrs: VariableAttrs,
        value: impl Fn(usize, usize) -> f64,
    ) -> Self {
        let (h, w) = (self.dataset.lat.len(), self.dataset.lon.len());
        let mut data = Vec::with_capacity(h * w);
        for row in 0..h {
            for col in 0..w {
                data.push(value(row, col));
            }
        }
        let var = GridVariable::new(name, vec![GridDim::Lat, GridDim::Lon], vec![h, w], data, attrs)
            .expect("variable shape matches axes");
        self.dataset
            .insert_variable(var)
            .expect("variable consistent with dataset");
        self
    }

    /// Add a (time, lat, lon) variable; requires [`DatasetBuilder::time`] first.
    pub fn time_variable(
        mut self,
        name: &str,
        attrs: VariableAttrs,
        value: impl Fn(usize, usize, usize) -> f64,
    ) -> Self {
        let nt = self
            .dataset
            .time
            .as_ref()
            .map(|t| t.values.len())
            .expect("time axis set before time variables");
        let (h, w) = (self.dataset.lat.len(), self.dataset.lon.len());
        let mut data = Vec::with_capacity(nt * h * w);
        for t in 0..nt {
            for row in 0..h {
                for col in 0..w {
                    data.push(value(t, row, col));
                }
            }
        }
        let var = GridVariable::new(
            name,
            vec![GridDim::Time, GridDim::Lat, GridDim::Lon],
            vec![nt, h, w],
            data,
            attrs,
        )
        .expect("variable shape matches axes");
        self.dataset
            .insert_variable(var)
            .expect("variable consistent with dataset");
        self
    }

    pub fn build(self) -> GridDataset {
        self.dataset
    }
}

/// Attributes with only a fill value.
pub fn fill_attrs(fill: f64) -> VariableAttrs {
    VariableAttrs {
        fill_value: Some(fill),
        ..VariableAttrs::default()
    }
}

/// Attributes with only a units string.
pub fn units_attrs(units: &str) -> VariableAttrs {
    VariableAttrs {
        units: Some(units.to_string()),
        ..VariableAttrs::default()
    }
}

/// In-memory [`GridSource`] that counts opens per path.
///
/// Paths are matched by file name, so tests can register datasets without
/// knowing the temporary directory they end up in. Unknown names fail with
/// `OpenFailed`.
#[derive(Default)]
pub struct MockGridSource {
    datasets: HashMap<String, GridDataset>,
    failures: HashMap<String, CollocError>,
    total_opens: AtomicUsize,
    opens: Mutex<HashMap<PathBuf, usize>>,
}

impl MockGridSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `dataset` for any path whose file name is `file_name`.
    pub fn with_dataset(mut self, file_name: &str, dataset: GridDataset) -> Self {
        self.datasets.insert(file_name.to_string(), dataset);
        self
    }

    /// Fail with an axis error for `file_name`.
    pub fn with_axis_failure(mut self, file_name: &str) -> Self {
        self.failures.insert(
            file_name.to_string(),
            CollocError::axis_invalid("lat", "not monotonic"),
        );
        self
    }

    /// Total number of open calls.
    pub fn open_count(&self) -> usize {
        self.total_opens.load(Ordering::SeqCst)
    }

    /// Number of opens of one path.
    pub fn opens_of(&self, path: &Path) -> usize {
        self.opens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Largest number of opens of any single path.
    pub fn max_opens_per_path(&self) -> usize {
        self.opens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

impl GridSource for MockGridSource {
    fn open(&self, path: &Path) -> CollocResult<GridDataset> {
        self.total_opens.fetch_add(1, Ordering::SeqCst);
        *self
            .opens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(CollocError::AxisInvalid { axis, message }) = self.failures.get(&name) {
            return Err(CollocError::axis_invalid(axis.clone(), message.clone()));
        }

        match self.datasets.get(&name) {
            Some(ds) => {
                let mut ds = ds.clone();
                ds.path = path.to_path_buf();
                Ok(ds)
            }
            None => Err(CollocError::open_failed(path, "no such mock dataset")),
        }
    }
}
