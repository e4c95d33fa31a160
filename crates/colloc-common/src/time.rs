//! Time handling for sample dates and CF time axes.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date formats tried, in order, when a sample carries a single date column.
///
/// Day-first formats come before ISO so that `05/06/2016` reads as 5 June.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y%m%d",
];

/// Calendar day of a sample, optionally with a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleTime {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl SampleTime {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    /// Full timestamp; a sample without time of day sits at midnight.
    pub fn datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }

    /// Build from split year/month/day values.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, TimeParseError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self::from_date)
            .ok_or_else(|| TimeParseError::InvalidFormat(format!("{:04}-{:02}-{:02}", year, month, day)))
    }

    /// Parse a single date (or date-time) cell using the given formats.
    ///
    /// Formats are tried in order; date-only formats produce no time of day.
    pub fn parse(s: &str, formats: &[String]) -> Result<Self, TimeParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimeParseError::Empty);
        }

        for fmt in formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self::new(dt.date(), Some(dt.time())));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(Self::from_date(date));
            }
        }

        Err(TimeParseError::InvalidFormat(s.to_string()))
    }

    /// `YYYYMMDD` token used in gridded file names.
    pub fn ymd_token(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }
}

/// Default format list as owned strings (for configuration defaults).
pub fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Empty date value")]
    Empty,

    #[error("Unsupported CF time units: {0}")]
    UnsupportedUnits(String),
}

/// CF-convention time units such as `days since 1993-01-01`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfTimeUnits {
    pub seconds_per_unit: f64,
    pub epoch: NaiveDateTime,
}

impl CfTimeUnits {
    /// Parse a `<unit> since <epoch>` string.
    pub fn parse(units: &str) -> Result<Self, TimeParseError> {
        let unsupported = || TimeParseError::UnsupportedUnits(units.to_string());

        let (unit, epoch) = units.trim().split_once(" since ").ok_or_else(unsupported)?;

        let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
            "days" | "day" | "d" => 86_400.0,
            _ => return Err(unsupported()),
        };

        let epoch = parse_epoch(epoch).ok_or_else(unsupported)?;

        Ok(Self {
            seconds_per_unit,
            epoch,
        })
    }

    /// Offset of `dt` from the epoch, expressed in these units.
    pub fn offset_of(&self, dt: NaiveDateTime) -> f64 {
        let seconds = (dt - self.epoch).num_seconds() as f64;
        seconds / self.seconds_per_unit
    }
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    let s = s
        .trim()
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim();

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Pick the time step to read for a sample.
///
/// - no steps: `None`
/// - a single step: `Some(0)` regardless of units
/// - several steps: the step nearest to `target`, lowest index on ties
pub fn nearest_time_index(
    values: &[f64],
    units: &str,
    target: NaiveDateTime,
) -> Result<Option<usize>, TimeParseError> {
    match values.len() {
        0 => Ok(None),
        1 => Ok(Some(0)),
        _ => {
            let cf = CfTimeUnits::parse(units)?;
            let offset = cf.offset_of(target);

            let mut best: Option<(usize, f64)> = None;
            for (i, v) in values.iter().enumerate() {
                let d = (v - offset).abs();
                if d.is_nan() {
                    continue;
                }
                match best {
                    Some((_, bd)) if d >= bd => {}
                    _ => best = Some((i, d)),
                }
            }
            Ok(best.map(|(i, _)| i))
        }
    }
}
