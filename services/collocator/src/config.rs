//! Configuration loader for the collocator.
//!
//! Loads and validates a YAML run file describing the input table, the
//! output locations and the collocation itself (variable groups, tolerance,
//! column mapping, constants).
//!
//! Supports environment variable substitution using ${VAR} and
//! ${VAR:-default} syntax, so data roots can differ between machines.

use anyhow::{Context, Result};
use collocation::CollocationConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use table_io::{CsvOptions, TableFormat};

// ============================================================================
// Run Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    pub collocation: CollocationConfig,
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Delimited text or workbook; the format follows the extension
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Workbook sheets to process (every sheet when empty)
    #[serde(default)]
    pub sheets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `.xlsx` keeps every sheet; delimited output keeps the first one
    pub path: PathBuf,
    /// JSON diagnostics report, written when set
    #[serde(default)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Size of the rayon pool in parallel mode (rayon default when unset)
    #[serde(default)]
    pub threads: Option<usize>,
}

impl ServiceConfig {
    /// CSV options for reading the input and writing the output.
    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            delimiter: self.input.delimiter,
            missing_marker: self.collocation.missing_marker.clone(),
        }
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load and parse a run file with environment variable substitution.
pub fn load_service_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read collocation config from {:?}", path.as_ref()))?;

    parse_service_config(&content)
        .with_context(|| format!("Invalid collocation config {:?}", path.as_ref()))
}

/// Parse run file content (after reading) with environment substitution.
pub fn parse_service_config(content: &str) -> Result<ServiceConfig> {
    let expanded = expand_env_vars(content)?;

    let config: ServiceConfig =
        serde_yaml::from_str(&expanded).context("Failed to parse collocation config YAML")?;

    validate_service_config(&config)?;

    Ok(config)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content.
/// Supports ${VAR} and ${VAR:-default} syntax.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve a variable expression (VAR or VAR:-default).
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_service_config(config: &ServiceConfig) -> Result<()> {
    anyhow::ensure!(
        !config.input.path.as_os_str().is_empty(),
        "Input path cannot be empty"
    );
    anyhow::ensure!(
        !config.output.path.as_os_str().is_empty(),
        "Output path cannot be empty"
    );
    anyhow::ensure!(
        config.input.path != config.output.path,
        "Output path must differ from input path: {:?}",
        config.input.path
    );
    anyhow::ensure!(
        config.input.delimiter.is_ascii(),
        "Delimiter must be an ASCII character, got {:?}",
        config.input.delimiter
    );
    anyhow::ensure!(
        config.input.sheets.iter().all(|s| !s.trim().is_empty()),
        "Sheet names cannot be empty"
    );
    TableFormat::writable(&config.output.path)?;
    if let Some(threads) = config.runtime.threads {
        anyhow::ensure!(threads > 0, "Thread count must be greater than 0");
    }

    config.collocation.validate()?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
