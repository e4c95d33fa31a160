//! Collocation and upwelling runs over table files.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use collocation::{
    compute_upwelling_column, CollocationReport, SampleCollocator, UpwellingColumns,
    UpwellingParams, UpwellingSummary,
};
use colloc_common::GridSource;
use table_io::{read_tables, write_tables, CsvOptions, Sheet};
use tracing::info;

use crate::config::ServiceConfig;

/// Reads the input table, collocates it and writes the outputs.
pub struct CollocationPipeline {
    config: ServiceConfig,
    collocator: SampleCollocator,
}

impl CollocationPipeline {
    pub fn new(config: ServiceConfig, source: Arc<dyn GridSource>) -> Result<Self> {
        let collocator = SampleCollocator::new(config.collocation.clone(), source)
            .context("Failed to set up collocator")?;
        Ok(Self { config, collocator })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run once: read, collocate, write the table and the optional report.
    ///
    /// Every selected sheet of a workbook input is collocated in the same run.
    pub fn run(&self) -> Result<CollocationReport> {
        let start = Instant::now();
        let csv = self.config.csv_options();
        let input = &self.config.input;

        let mut sheets = read_tables(&input.path, &csv, &input.sheets)
            .with_context(|| format!("Failed to read samples from {:?}", input.path))?;

        let report = self
            .collocator
            .run_all(sheets.iter_mut().map(|sheet| &mut sheet.table))
            .context("Collocation failed")?;

        write_tables(&sheets, &self.config.output.path, &csv)
            .with_context(|| format!("Failed to write {:?}", self.config.output.path))?;

        if let Some(path) = &self.config.output.report {
            write_report(&report, path)?;
        }

        info!(
            input = %input.path.display(),
            output = %self.config.output.path.display(),
            sheets = sheets.len(),
            samples = report.total_samples,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Collocation run finished"
        );

        Ok(report)
    }
}

/// Write the diagnostics report as pretty JSON.
pub fn write_report(report: &CollocationReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {:?}", parent))?;
    }
    let json = report.to_json().context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

/// Add an upwelling index column to every selected sheet of a table file.
///
/// Returns one summary per sheet, in sheet order. Parameters are checked
/// before the input is read.
pub fn run_upwelling(
    input: &Path,
    output: &Path,
    sheets: &[String],
    columns: &UpwellingColumns,
    params: &UpwellingParams,
    csv: &CsvOptions,
) -> Result<Vec<(String, UpwellingSummary)>> {
    params.validate().context("Invalid upwelling parameters")?;
    anyhow::ensure!(
        input != output,
        "Output path must differ from input path: {:?}",
        input
    );

    let mut tables: Vec<Sheet> = read_tables(input, csv, sheets)
        .with_context(|| format!("Failed to read samples from {:?}", input))?;

    let mut summaries = Vec::with_capacity(tables.len());
    for sheet in &mut tables {
        let summary = compute_upwelling_column(&mut sheet.table, columns, params)
            .with_context(|| format!("Upwelling index computation failed for sheet {:?}", sheet.name))?;
        summaries.push((sheet.name.clone(), summary));
    }

    write_tables(&tables, output, csv).with_context(|| format!("Failed to write {:?}", output))?;

    Ok(summaries)
}
