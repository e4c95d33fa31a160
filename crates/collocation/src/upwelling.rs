//! Upwelling index for tables that already carry wind components.

use colloc_common::{CellValue, CollocError, CollocResult, SampleTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::derived::{upwelling_index, DerivedError, UpwellingParams};

/// Latitude columns tried when none is configured or the configured one is absent.
const LAT_FALLBACKS: &[&str] = &["LATITUDE", "latitude"];

/// Column names for the table pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpwellingColumns {
    pub lat: Option<String>,
    pub u: String,
    pub v: String,
    pub output: String,
}

impl Default for UpwellingColumns {
    fn default() -> Self {
        Self {
            lat: None,
            u: "eastward_wind".to_string(),
            v: "northward_wind".to_string(),
            output: "UI".to_string(),
        }
    }
}

/// Counts from one table pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpwellingSummary {
    pub rows: u64,
    pub computed: u64,
    pub undefined_at_equator: u64,
    pub invalid_inputs: u64,
    /// Latitude column actually used
    pub lat_column: String,
}

fn find_lat_column(table: &SampleTable, configured: Option<&str>) -> CollocResult<usize> {
    configured
        .into_iter()
        .chain(LAT_FALLBACKS.iter().copied())
        .find_map(|name| table.column_index(name))
        .ok_or_else(|| {
            CollocError::MissingColumn(configured.unwrap_or(LAT_FALLBACKS[0]).to_string())
        })
}

/// Append (or overwrite) the upwelling index column, one value per row.
///
/// Rows at the equator or with unreadable inputs get a missing cell.
/// Invalid parameters are rejected before the table is touched.
pub fn compute_upwelling_column(
    table: &mut SampleTable,
    columns: &UpwellingColumns,
    params: &UpwellingParams,
) -> CollocResult<UpwellingSummary> {
    params.validate()?;
    let lat_col = find_lat_column(table, columns.lat.as_deref())?;
    let u_col = table.require_column(&columns.u)?;
    let v_col = table.require_column(&columns.v)?;
    let out_col = table.ensure_column(&columns.output);

    let mut summary = UpwellingSummary {
        rows: table.row_count() as u64,
        lat_column: table.columns()[lat_col].clone(),
        ..UpwellingSummary::default()
    };

    for row in 0..table.row_count() {
        let read = |col: usize| table.get(row, col).and_then(|c| c.as_f64());
        let result = match (read(lat_col), read(u_col), read(v_col)) {
            (Some(lat), Some(u), Some(v)) => upwelling_index(u, v, lat, params),
            _ => Err(DerivedError::NonFiniteInput),
        };

        let cell = match result {
            Ok(record) => {
                summary.computed += 1;
                CellValue::Number(record.upwelling_index)
            }
            Err(DerivedError::UndefinedAtEquator) => {
                summary.undefined_at_equator += 1;
                CellValue::Missing
            }
            Err(DerivedError::NonFiniteInput) => {
                debug!(row = row + 1, "Unreadable wind or latitude");
                summary.invalid_inputs += 1;
                CellValue::Missing
            }
        };
        table.set(row, out_col, cell);
    }

    info!(
        rows = summary.rows,
        computed = summary.computed,
        undefined_at_equator = summary.undefined_at_equator,
        invalid_inputs = summary.invalid_inputs,
        lat_column = %summary.lat_column,
        "Upwelling index computed"
    );

    Ok(summary)
}
