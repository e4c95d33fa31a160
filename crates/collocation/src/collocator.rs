//! Sample-to-grid collocation over a whole table.
//!
//! ```text
//! SampleTable rows
//!      │  group by date
//!      ▼
//! GridFileIndex::resolve(date, group)      (once per date and group)
//!      │
//!      ▼
//! GridAccessor::open(path)                 (once per distinct path)
//!      │
//!      ├─► locate nearest cell
//!      ├─► extract variables, K → C
//!      └─► gridded upwelling index
//!      │
//!      ▼
//! result columns written back in row order
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use colloc_common::{CellValue, CollocError, CollocResult, GridSource, Sample, SampleTable};
use rayon::prelude::*;
use storage::{GridAccessor, GridFileIndex};
use tracing::{debug, info, warn};

use crate::config::{CollocationConfig, GroupConfig};
use crate::derived::{to_celsius_if_kelvin, upwelling_index, DerivedError, UpwellingParams};
use crate::extract::{extract, select_time_index, ExtractedValue};
use crate::locator::{locate, LocateFailure};
use crate::types::{CollocationReport, CollocationResult, GroupDiagnostics, MatchOutcome};

/// Output column indices of one group.
#[derive(Debug, Clone)]
struct GroupColumns {
    values: Vec<(String, usize)>,
    upwelling: Option<usize>,
    status: Option<usize>,
}

impl GroupColumns {
    fn data_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.iter().map(|(_, col)| *col).chain(self.upwelling)
    }
}

#[derive(Debug)]
struct RowUpdate {
    row: usize,
    cells: Vec<(usize, CellValue)>,
}

/// Everything produced for one date.
#[derive(Debug, Default)]
struct BatchOutput {
    updates: Vec<RowUpdate>,
    results: Vec<CollocationResult>,
    warnings: Vec<String>,
    ambiguous_groups: Vec<String>,
}

/// Collocates samples with gridded files for every configured group.
pub struct SampleCollocator {
    config: CollocationConfig,
    index: GridFileIndex,
    accessor: GridAccessor,
    params: UpwellingParams,
}

impl SampleCollocator {
    /// Validate `config` and build the file index and accessor for it.
    pub fn new(config: CollocationConfig, source: Arc<dyn GridSource>) -> CollocResult<Self> {
        config.validate()?;

        let mut index = GridFileIndex::new();
        for group in &config.groups {
            index.register(group.name.clone(), group.files.clone());
        }

        let accessor = match config.cache_capacity {
            Some(capacity) => GridAccessor::with_capacity(source, capacity),
            None => GridAccessor::new(source),
        };

        Ok(Self::from_parts(config, index, accessor))
    }

    /// Assemble from prebuilt parts; `config` is assumed valid.
    pub fn from_parts(config: CollocationConfig, index: GridFileIndex, accessor: GridAccessor) -> Self {
        let params = UpwellingParams {
            coastline_angle_deg: config.coastline_angle_deg,
            constants: config.constants,
        };
        Self {
            config,
            index,
            accessor,
            params,
        }
    }

    pub fn config(&self) -> &CollocationConfig {
        &self.config
    }

    pub fn accessor(&self) -> &GridAccessor {
        &self.accessor
    }

    /// Match one sample against every group.
    pub fn collocate(&self, sample: &Sample) -> Vec<CollocationResult> {
        self.config
            .groups
            .iter()
            .map(|group| {
                let candidates = self.index.resolve(sample.time.date, &group.name);
                self.collocate_sample(sample, group, &candidates)
            })
            .collect()
    }

    /// Match one sample against one group, trying `candidates` in order
    /// until one yields a cell within tolerance.
    pub fn collocate_sample(
        &self,
        sample: &Sample,
        group: &GroupConfig,
        candidates: &[PathBuf],
    ) -> CollocationResult {
        let mut failure = (MatchOutcome::NoFile, None);

        for path in candidates {
            let dataset = match self.accessor.open(path) {
                Ok(dataset) => dataset,
                Err(CollocError::AxisInvalid { .. }) => {
                    failure = (MatchOutcome::AxisInvalid, None);
                    continue;
                }
                Err(_) => {
                    failure = (MatchOutcome::OpenFailed, None);
                    continue;
                }
            };

            let (lat_axis, lon_axis) = self.accessor.axes(&dataset);
            let cell = match locate(lat_axis, lon_axis, sample.lat, sample.lon, self.config.tolerance) {
                Ok(cell) => cell,
                Err(LocateFailure::ExceedsTolerance { distance }) => {
                    debug!(
                        sample = %sample.id,
                        group = %group.name,
                        distance = distance,
                        unit = self.config.tolerance.unit.as_str(),
                        "Nearest cell beyond tolerance"
                    );
                    failure = (MatchOutcome::ToleranceExceeded, Some(distance));
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unusable grid axes");
                    failure = (MatchOutcome::AxisInvalid, None);
                    continue;
                }
            };

            let time_index = select_time_index(&dataset, &sample.time);
            let mut values = extract(&dataset, &cell, time_index, &group.variables_to_read());

            if group.kelvin_to_celsius {
                for (name, value) in values.iter_mut() {
                    if let ExtractedValue::Value(v) = value {
                        let units = dataset
                            .variable(name)
                            .and_then(|var| var.attrs.units.as_deref());
                        *value = ExtractedValue::Value(to_celsius_if_kelvin(*v, units));
                    }
                }
            }

            let upwelling = group.upwelling.as_ref().map(|ui| {
                let component = |name: &str| {
                    values
                        .iter()
                        .find(|(n, _)| n == name)
                        .and_then(|(_, v)| v.value())
                };
                match (component(&ui.u_variable), component(&ui.v_variable)) {
                    (Some(u), Some(v)) => {
                        upwelling_index(u, v, sample.lat, &self.params).map(|r| r.upwelling_index)
                    }
                    _ => Err(DerivedError::NonFiniteInput),
                }
            });

            return CollocationResult {
                group: group.name.clone(),
                outcome: MatchOutcome::Ok,
                distance: Some(cell.distance),
                source: Some(path.clone()),
                time_index,
                values,
                upwelling,
            };
        }

        CollocationResult::failed(group.name.clone(), failure.0, failure.1)
    }

    /// Collocate every row of `table`, appending (or overwriting) the
    /// configured output columns.
    ///
    /// Only structural problems are returned as errors; per-row failures
    /// leave missing cells and are counted in the report.
    pub fn run(&self, table: &mut SampleTable) -> CollocResult<CollocationReport> {
        self.run_all(std::iter::once(table))
    }

    /// Collocate several tables (the sheets of one workbook) as one run.
    ///
    /// Directory listings and open files are shared between the tables and
    /// dropped when the run ends, so nothing carries over to the next run.
    pub fn run_all<'t>(
        &self,
        tables: impl IntoIterator<Item = &'t mut SampleTable>,
    ) -> CollocResult<CollocationReport> {
        self.index.clear();
        self.accessor.reset();

        let mut report = CollocationReport::default();
        for group in &self.config.groups {
            report
                .groups
                .insert(group.name.clone(), GroupDiagnostics::default());
        }

        let outcome = tables
            .into_iter()
            .try_for_each(|table| self.collocate_table(table, &mut report));

        report.cache = self.accessor.stats();
        self.accessor.clear();
        self.index.clear();
        outcome?;

        for (name, diag) in &report.groups {
            info!(
                group = %name,
                matched = diag.matched,
                no_file = diag.no_file,
                tolerance_exceeded = diag.tolerance_exceeded,
                axis_invalid = diag.axis_invalid,
                open_failed = diag.open_failed,
                "Group collocated"
            );
        }
        info!(
            samples = report.total_samples,
            files_opened = report.cache.opens,
            failed_opens = report.cache.failed_opens,
            warnings = report.warnings.len(),
            "Collocation complete"
        );

        Ok(report)
    }

    fn collocate_table(&self, table: &mut SampleTable, report: &mut CollocationReport) -> CollocResult<()> {
        let mapping = self.config.columns.resolve(table)?;

        let layout: Vec<GroupColumns> = self
            .config
            .groups
            .iter()
            .map(|group| GroupColumns {
                values: group
                    .variables
                    .iter()
                    .map(|v| (v.clone(), table.ensure_column(&group.output_column(v))))
                    .collect(),
                upwelling: group.upwelling.as_ref().map(|ui| table.ensure_column(&ui.column)),
                status: group.status_column_name().map(|c| table.ensure_column(&c)),
            })
            .collect();

        let mut invalid = 0u64;
        let mut by_date: BTreeMap<NaiveDate, Vec<Sample>> = BTreeMap::new();
        for row in 0..table.row_count() {
            match mapping.sample(table, row) {
                Ok(sample) => by_date.entry(sample.time.date).or_default().push(sample),
                Err(e) => {
                    debug!(row = row + 1, error = %e, "Invalid sample row");
                    invalid += 1;
                    for cols in &layout {
                        for col in cols.data_columns() {
                            table.set(row, col, CellValue::Missing);
                        }
                        if let Some(col) = cols.status {
                            table.set(
                                row,
                                col,
                                CellValue::Text(MatchOutcome::InvalidSample.code().to_string()),
                            );
                        }
                    }
                }
            }
        }

        info!(
            samples = table.row_count(),
            invalid = invalid,
            dates = by_date.len(),
            groups = self.config.groups.len(),
            parallel = self.config.parallel,
            "Starting collocation"
        );

        report.total_samples += table.row_count() as u64;
        report.invalid_samples += invalid;

        let batches: Vec<(NaiveDate, Vec<Sample>)> = by_date.into_iter().collect();
        let outputs: Vec<BatchOutput> = if self.config.parallel {
            batches
                .par_iter()
                .map(|(date, samples)| self.process_date(*date, samples, &layout))
                .collect()
        } else {
            batches
                .iter()
                .map(|(date, samples)| self.process_date(*date, samples, &layout))
                .collect()
        };

        let mut updates = Vec::with_capacity(table.row_count());
        for output in outputs {
            for result in &output.results {
                if let Some(diag) = report.groups.get_mut(&result.group) {
                    diag.record(result);
                }
            }
            for group in &output.ambiguous_groups {
                if let Some(diag) = report.groups.get_mut(group) {
                    diag.ambiguous += 1;
                }
            }
            report.warnings.extend(output.warnings);
            updates.extend(output.updates);
        }

        updates.sort_by_key(|u| u.row);
        for update in updates {
            for (col, value) in update.cells {
                table.set(update.row, col, value);
            }
        }

        Ok(())
    }

    fn process_date(&self, date: NaiveDate, samples: &[Sample], layout: &[GroupColumns]) -> BatchOutput {
        debug!(date = %date, samples = samples.len(), "Collocating date");
        let mut output = BatchOutput::default();

        let candidates: Vec<Vec<PathBuf>> = self
            .config
            .groups
            .iter()
            .map(|group| self.index.resolve(date, &group.name))
            .collect();

        for (group, files) in self.config.groups.iter().zip(&candidates) {
            if files.len() > 1 {
                let listed: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
                warn!(
                    date = %date,
                    group = %group.name,
                    candidates = ?listed,
                    "Several files match, using the first"
                );
                output.warnings.push(format!(
                    "{} {}: {} files match ({}), using {}",
                    date,
                    group.name,
                    files.len(),
                    listed.join(", "),
                    listed[0]
                ));
                output.ambiguous_groups.push(group.name.clone());
            }
        }

        for sample in samples {
            let mut cells = Vec::new();
            for ((group, files), cols) in self.config.groups.iter().zip(&candidates).zip(layout) {
                let result = self.collocate_sample(sample, group, files);
                cells.extend(result_cells(&result, cols));
                output.results.push(result);
            }
            output.updates.push(RowUpdate {
                row: sample.row,
                cells,
            });
        }

        output
    }
}

/// Cells to write for one group's result.
fn result_cells(result: &CollocationResult, cols: &GroupColumns) -> Vec<(usize, CellValue)> {
    let mut cells: Vec<(usize, CellValue)> = cols
        .values
        .iter()
        .map(|(name, col)| {
            let value = result.value(name).and_then(|v| v.value());
            (*col, CellValue::from(value))
        })
        .collect();

    if let Some(col) = cols.upwelling {
        let value = result.upwelling.and_then(|r| r.ok());
        cells.push((col, CellValue::from(value)));
    }
    if let Some(col) = cols.status {
        cells.push((col, CellValue::Text(result.outcome.code().to_string())));
    }
    cells
}
