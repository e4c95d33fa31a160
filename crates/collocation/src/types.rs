//! Per-sample results and run diagnostics.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use storage::DatasetCacheStats;

use crate::derived::DerivedError;
use crate::extract::{ExtractedValue, MissingReason};

/// Outcome of matching one sample against one variable group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Ok,
    NoFile,
    AxisInvalid,
    OpenFailed,
    ToleranceExceeded,
    InvalidSample,
}

impl MatchOutcome {
    /// Code written to status columns.
    pub fn code(&self) -> &'static str {
        match self {
            MatchOutcome::Ok => "ok",
            MatchOutcome::NoFile => "no_file",
            MatchOutcome::AxisInvalid => "axis_invalid",
            MatchOutcome::OpenFailed => "open_failed",
            MatchOutcome::ToleranceExceeded => "tolerance_exceeded",
            MatchOutcome::InvalidSample => "invalid_sample",
        }
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of one sample against one variable group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollocationResult {
    pub group: String,
    pub outcome: MatchOutcome,
    /// Distance to the nearest cell, when a cell was evaluated
    pub distance: Option<f64>,
    /// File the values came from
    pub source: Option<PathBuf>,
    pub time_index: Option<usize>,
    /// One entry per requested variable, in request order
    pub values: Vec<(String, ExtractedValue)>,
    /// Gridded upwelling index, when configured
    pub upwelling: Option<Result<f64, DerivedError>>,
}

impl CollocationResult {
    pub fn failed(group: impl Into<String>, outcome: MatchOutcome, distance: Option<f64>) -> Self {
        Self {
            group: group.into(),
            outcome,
            distance,
            source: None,
            time_index: None,
            values: Vec::new(),
            upwelling: None,
        }
    }

    pub fn matched(&self) -> bool {
        self.outcome == MatchOutcome::Ok
    }

    pub fn value(&self, name: &str) -> Option<ExtractedValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Counters for one variable group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupDiagnostics {
    pub matched: u64,
    pub no_file: u64,
    pub axis_invalid: u64,
    pub open_failed: u64,
    pub tolerance_exceeded: u64,
    pub variable_absent: u64,
    pub masked_or_fill: u64,
    pub undefined_at_equator: u64,
    /// (date, group) keys that resolved to more than one file
    pub ambiguous: u64,
}

impl GroupDiagnostics {
    pub fn record(&mut self, result: &CollocationResult) {
        match result.outcome {
            MatchOutcome::Ok => self.matched += 1,
            MatchOutcome::NoFile => self.no_file += 1,
            MatchOutcome::AxisInvalid => self.axis_invalid += 1,
            MatchOutcome::OpenFailed => self.open_failed += 1,
            MatchOutcome::ToleranceExceeded => self.tolerance_exceeded += 1,
            MatchOutcome::InvalidSample => {}
        }

        for (_, value) in &result.values {
            match value {
                ExtractedValue::Missing(MissingReason::VariableAbsent) => self.variable_absent += 1,
                ExtractedValue::Missing(MissingReason::MaskedOrFill) => self.masked_or_fill += 1,
                ExtractedValue::Value(_) => {}
            }
        }

        if result.upwelling == Some(Err(DerivedError::UndefinedAtEquator)) {
            self.undefined_at_equator += 1;
        }
    }

    /// Samples that produced no match.
    pub fn unmatched(&self) -> u64 {
        self.no_file + self.axis_invalid + self.open_failed + self.tolerance_exceeded
    }
}

/// Summary of a collocation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollocationReport {
    pub total_samples: u64,
    /// Rows whose position or date could not be read
    pub invalid_samples: u64,
    pub groups: BTreeMap<String, GroupDiagnostics>,
    pub warnings: Vec<String>,
    pub cache: DatasetCacheStats,
}

impl CollocationReport {
    pub fn group(&self, name: &str) -> Option<&GroupDiagnostics> {
        self.groups.get(name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
