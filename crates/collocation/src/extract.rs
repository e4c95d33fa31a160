//! Reading variable values at a matched cell.

use colloc_common::time::nearest_time_index;
use colloc_common::{GridDataset, SampleTime, VariableAttrs};
use serde::Serialize;
use tracing::{debug, warn};

use crate::locator::CellMatch;

/// Why a value is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The file has no such variable.
    VariableAbsent,
    /// The cell holds a fill, missing or out-of-range value.
    MaskedOrFill,
}

/// Value read for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ExtractedValue {
    Value(f64),
    Missing(MissingReason),
}

impl ExtractedValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            ExtractedValue::Value(v) => Some(*v),
            ExtractedValue::Missing(_) => None,
        }
    }
}

/// Mask and unpack one raw value.
pub fn unpack(raw: f64, attrs: &VariableAttrs) -> ExtractedValue {
    let masked = !raw.is_finite()
        || attrs.fill_value == Some(raw)
        || attrs.missing_value == Some(raw)
        || attrs.valid_min.is_some_and(|min| raw < min)
        || attrs.valid_max.is_some_and(|max| raw > max);
    if masked {
        return ExtractedValue::Missing(MissingReason::MaskedOrFill);
    }

    let value = raw * attrs.scale_factor.unwrap_or(1.0) + attrs.add_offset.unwrap_or(0.0);
    ExtractedValue::Value(value)
}

/// Read `names` at `cell`, applying masking and scale/offset.
pub fn extract(
    dataset: &GridDataset,
    cell: &CellMatch,
    time_index: Option<usize>,
    names: &[String],
) -> Vec<(String, ExtractedValue)> {
    names
        .iter()
        .map(|name| {
            let value = match dataset.variable(name) {
                None => ExtractedValue::Missing(MissingReason::VariableAbsent),
                Some(var) => match var.raw_at(cell.row, cell.col, time_index) {
                    Ok(raw) => unpack(raw, &var.attrs),
                    Err(e) => {
                        debug!(variable = %name, error = %e, "Cell read failed");
                        ExtractedValue::Missing(MissingReason::MaskedOrFill)
                    }
                },
            };
            (name.clone(), value)
        })
        .collect()
}

/// Time step to read for a sample.
///
/// No time axis gives `None`, a single step gives 0, otherwise the step
/// nearest to the sample's date-time. Unreadable time units fall back to 0.
pub fn select_time_index(dataset: &GridDataset, time: &SampleTime) -> Option<usize> {
    let axis = dataset.time.as_ref()?;
    match nearest_time_index(&axis.values, &axis.units, time.datetime()) {
        Ok(index) => index,
        Err(e) => {
            warn!(
                path = %dataset.path.display(),
                error = %e,
                "Unreadable time axis, using first step"
            );
            Some(0)
        }
    }
}
