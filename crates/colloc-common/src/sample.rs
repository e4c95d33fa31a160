//! Sample tables and the mapping of their columns to semantic fields.

use serde::{Deserialize, Serialize};

use crate::error::{CollocError, CollocResult};
use crate::time::{default_date_formats, SampleTime};

/// Default column names of the split date layout.
pub const DEFAULT_YEAR_COLUMN: &str = "Year";
pub const DEFAULT_MONTH_COLUMN: &str = "Month";
pub const DEFAULT_DAY_COLUMN: &str = "Day";
pub const DEFAULT_LAT_COLUMN: &str = "LATITUDE";
pub const DEFAULT_LON_COLUMN: &str = "LONGITUDE";

/// One cell of a sample table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Build a cell from raw text, keeping empty strings as text.
    pub fn from_text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Numeric view of the cell; text is parsed, blanks and `NaN` are `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            CellValue::Number(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            CellValue::Missing => None,
        }
    }

    /// Text view of the cell.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Number(v) => Some(v.to_string()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Render for output, with `missing` used for absent values.
    pub fn render(&self, missing: &str) -> String {
        match self {
            CellValue::Number(v) if v.is_finite() => v.to_string(),
            CellValue::Number(_) => missing.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Missing => missing.to_string(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        v.map(CellValue::Number).unwrap_or(CellValue::Missing)
    }
}

/// Row-oriented in-memory table with ordered column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl SampleTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; short rows are padded with `Missing`, long rows rejected.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) -> CollocResult<()> {
        if row.len() > self.columns.len() {
            return Err(CollocError::TableRead(format!(
                "row {} has {} cells but the table has {} columns",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        row.resize(self.columns.len(), CellValue::Missing);
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of `name`, or `MissingColumn`.
    pub fn require_column(&self, name: &str) -> CollocResult<usize> {
        self.column_index(name)
            .ok_or_else(|| CollocError::MissingColumn(name.to_string()))
    }

    /// Index of `name`, appending it (filled with `Missing`) if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(CellValue::Missing);
        }
        self.columns.len() - 1
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value;
        }
    }
}

/// How the sample date is laid out in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateColumns {
    /// Separate year, month and day columns.
    Split {
        year: String,
        month: String,
        day: String,
    },
    /// One date (or date-time) column parsed with the listed formats.
    Single {
        column: String,
        #[serde(default = "default_date_formats")]
        formats: Vec<String>,
    },
}

impl Default for DateColumns {
    fn default() -> Self {
        DateColumns::Split {
            year: DEFAULT_YEAR_COLUMN.to_string(),
            month: DEFAULT_MONTH_COLUMN.to_string(),
            day: DEFAULT_DAY_COLUMN.to_string(),
        }
    }
}

/// Which table columns carry the sample's semantic fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub date: DateColumns,
    pub lat: String,
    pub lon: String,
    /// Identifier column; the 1-based row number is used when unset.
    pub id: Option<String>,
    /// Optional time-of-day column (`HH:MM[:SS]`).
    pub time_of_day: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: DateColumns::default(),
            lat: DEFAULT_LAT_COLUMN.to_string(),
            lon: DEFAULT_LON_COLUMN.to_string(),
            id: None,
            time_of_day: None,
        }
    }
}

/// Column indices resolved once against a table.
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    date: ResolvedDate,
    lat: usize,
    lon: usize,
    id: Option<usize>,
    time_of_day: Option<usize>,
}

#[derive(Debug, Clone)]
enum ResolvedDate {
    Split { year: usize, month: usize, day: usize },
    Single { column: usize, formats: Vec<String> },
}

/// Why a row could not be turned into a [`Sample`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("latitude is missing or not a number")]
    InvalidLatitude,

    #[error("latitude {0} outside -90..90")]
    LatitudeOutOfRange(f64),

    #[error("longitude is missing or not a number")]
    InvalidLongitude,

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

impl ColumnMapping {
    /// Resolve column names to indices; every mapped column must exist.
    pub fn resolve(&self, table: &SampleTable) -> CollocResult<ResolvedMapping> {
        let date = match &self.date {
            DateColumns::Split { year, month, day } => ResolvedDate::Split {
                year: table.require_column(year)?,
                month: table.require_column(month)?,
                day: table.require_column(day)?,
            },
            DateColumns::Single { column, formats } => ResolvedDate::Single {
                column: table.require_column(column)?,
                formats: formats.clone(),
            },
        };

        Ok(ResolvedMapping {
            date,
            lat: table.require_column(&self.lat)?,
            lon: table.require_column(&self.lon)?,
            id: self.id.as_deref().map(|c| table.require_column(c)).transpose()?,
            time_of_day: self
                .time_of_day
                .as_deref()
                .map(|c| table.require_column(c))
                .transpose()?,
        })
    }
}

/// One observation row with its semantic fields parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Row index in the source table (0-based).
    pub row: usize,
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub time: SampleTime,
}

impl ResolvedMapping {
    /// Parse row `row` of `table`.
    pub fn sample(&self, table: &SampleTable, row: usize) -> Result<Sample, SampleError> {
        let cell = |col: usize| table.get(row, col).cloned().unwrap_or(CellValue::Missing);

        let lat = cell(self.lat).as_f64().ok_or(SampleError::InvalidLatitude)?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(SampleError::LatitudeOutOfRange(lat));
        }
        let lon = cell(self.lon).as_f64().ok_or(SampleError::InvalidLongitude)?;

        let mut time = match &self.date {
            ResolvedDate::Split { year, month, day } => {
                let part = |col: usize, what: &str| {
                    cell(col)
                        .as_f64()
                        .filter(|v| v.fract() == 0.0)
                        .ok_or_else(|| SampleError::InvalidDate(format!("{} is not an integer", what)))
                };
                let y = part(*year, "year")?;
                let m = part(*month, "month")?;
                let d = part(*day, "day")?;
                SampleTime::from_ymd(y as i32, m as u32, d as u32)
                    .map_err(|e| SampleError::InvalidDate(e.to_string()))?
            }
            ResolvedDate::Single { column, formats } => {
                let text = cell(*column).as_text().unwrap_or_default();
                SampleTime::parse(&text, formats).map_err(|e| SampleError::InvalidDate(e.to_string()))?
            }
        };

        if let Some(col) = self.time_of_day {
            if let Some(text) = cell(col).as_text() {
                if let Some(t) = parse_time_of_day(&text) {
                    time.time = Some(t);
                }
            }
        }

        let id = self
            .id
            .and_then(|col| cell(col).as_text())
            .unwrap_or_else(|| (row + 1).to_string());

        Ok(Sample {
            row,
            id,
            lat,
            lon,
            time,
        })
    }
}

fn parse_time_of_day(s: &str) -> Option<chrono::NaiveTime> {
    let s = s.trim();
    chrono::NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| chrono::NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
