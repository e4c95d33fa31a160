//! Reference scenario shared by the collocation tests.
//!
//! A 4x3 grid off the Iberian coast with a known chlorophyll value at
//! (40N, 8W), and helpers to build sample tables in the default column
//! layout.

use std::path::Path;

use colloc_common::sample::{
    DEFAULT_DAY_COLUMN, DEFAULT_LAT_COLUMN, DEFAULT_LON_COLUMN, DEFAULT_MONTH_COLUMN,
    DEFAULT_YEAR_COLUMN,
};
use colloc_common::{CellValue, GridDataset, SampleTable};

use crate::generators::{fill_attrs, DatasetBuilder};

/// Latitude axis of the scenario grid.
pub const SCENARIO_LAT: [f64; 4] = [38.0, 39.0, 40.0, 41.0];

/// Longitude axis of the scenario grid.
pub const SCENARIO_LON: [f64; 3] = [-9.0, -8.0, -7.0];

/// Scenario sampling date (year, month, day).
pub const SCENARIO_DATE: (i32, u32, u32) = (2016, 6, 15);

/// Chlorophyll at row 2, column 1.
pub const SCENARIO_CHL: f64 = 1.23;

/// Fill value used by scenario variables.
pub const SCENARIO_FILL: f64 = -999.0;

/// File name the scenario grid is registered under.
pub const SCENARIO_FILE: &str = "CHL_20160615.nc";

/// Scenario grid with `CHL` (1.23 at (2, 1), 0.5 elsewhere, one fill cell at
/// (0, 0)) and `CHL_uncertainty` (constant 10).
pub fn scenario_dataset(path: impl AsRef<Path>) -> GridDataset {
    DatasetBuilder::new(
        path.as_ref(),
        SCENARIO_LAT.to_vec(),
        SCENARIO_LON.to_vec(),
    )
    .variable("CHL", fill_attrs(SCENARIO_FILL), |row, col| match (row, col) {
        (2, 1) => SCENARIO_CHL,
        (0, 0) => SCENARIO_FILL,
        _ => 0.5,
    })
    .variable("CHL_uncertainty", fill_attrs(SCENARIO_FILL), |_, _| 10.0)
    .build()
}

/// Empty table with the default Year/Month/Day/LATITUDE/LONGITUDE header.
pub fn sample_table_header() -> SampleTable {
    SampleTable::new(
        [
            DEFAULT_YEAR_COLUMN,
            DEFAULT_MONTH_COLUMN,
            DEFAULT_DAY_COLUMN,
            DEFAULT_LAT_COLUMN,
            DEFAULT_LON_COLUMN,
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    )
}

/// Table with one row per `(lat, lon)` on a single date.
pub fn sample_table(date: (i32, u32, u32), positions: &[(f64, f64)]) -> SampleTable {
    let mut table = sample_table_header();
    for &(lat, lon) in positions {
        push_sample(&mut table, date, lat, lon);
    }
    table
}

/// Append one sample row to a table built by [`sample_table_header`].
pub fn push_sample(table: &mut SampleTable, date: (i32, u32, u32), lat: f64, lon: f64) {
    let (y, m, d) = date;
    table
        .push_row(vec![
            CellValue::Number(y as f64),
            CellValue::Number(m as f64),
            CellValue::Number(d as f64),
            CellValue::Number(lat),
            CellValue::Number(lon),
        ])
        .expect("row matches the default header");
}
