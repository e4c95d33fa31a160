//! Delimited text tables.
//!
//! Every cell is read as text; numeric interpretation happens later through
//! [`CellValue::as_f64`]. Input bytes that are not valid UTF-8 are decoded
//! lossily so that legacy Latin-1 exports still load.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use colloc_common::{CellValue, CollocError, CollocResult, SampleTable};
use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const UTF8_BOM: char = '\u{feff}';

/// Options for reading and writing delimited tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter (single byte)
    pub delimiter: char,
    /// Text written for missing cells
    pub missing_marker: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            missing_marker: "NaN".to_string(),
        }
    }
}

impl CsvOptions {
    fn delimiter_byte(&self) -> CollocResult<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| {
                CollocError::InvalidConfig(format!(
                    "delimiter {:?} is not a single ASCII character",
                    self.delimiter
                ))
            })
    }
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Read a table from any reader; the first record is the header.
pub fn read_csv_from<R: Read>(reader: R, options: &CsvOptions) -> CollocResult<SampleTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.byte_records();
    let header = match records.next() {
        Some(record) => record.map_err(|e| CollocError::TableRead(e.to_string()))?,
        None => return Err(CollocError::TableRead("empty table".to_string())),
    };

    let mut columns = decode(&header);
    if let Some(first) = columns.first_mut() {
        *first = first.trim_start_matches(UTF8_BOM).to_string();
    }
    let columns: Vec<String> = columns.into_iter().map(|c| c.trim().to_string()).collect();
    let width = columns.len();
    let mut table = SampleTable::new(columns);

    let mut padded = 0usize;
    for record in records {
        let record = record.map_err(|e| CollocError::TableRead(e.to_string()))?;
        let mut cells: Vec<CellValue> = decode(&record).into_iter().map(CellValue::from_text).collect();
        if cells.len() < width {
            padded += 1;
            cells.resize(width, CellValue::from_text(""));
        }
        table.push_row(cells)?;
    }

    if padded > 0 {
        debug!(rows = padded, "Padded short rows");
    }
    Ok(table)
}

/// Read a table from a file.
pub fn read_csv(path: &Path, options: &CsvOptions) -> CollocResult<SampleTable> {
    let file = File::open(path)
        .map_err(|e| CollocError::TableRead(format!("{}: {}", path.display(), e)))?;
    let table = read_csv_from(file, options)?;
    info!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.columns().len(),
        "Table loaded"
    );
    Ok(table)
}

/// Write a table to any writer, rendering missing cells with the marker.
pub fn write_csv_to<W: Write>(table: &SampleTable, writer: W, options: &CsvOptions) -> CollocResult<()> {
    let write_err = |e: csv::Error| CollocError::TableWrite(e.to_string());

    let mut wtr = WriterBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .from_writer(writer);

    wtr.write_record(table.columns()).map_err(write_err)?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|cell| cell.render(&options.missing_marker)))
            .map_err(write_err)?;
    }
    wtr.flush()
        .map_err(|e| CollocError::TableWrite(e.to_string()))?;
    Ok(())
}

/// Write a table to a file, creating parent directories as needed.
pub fn write_csv(table: &SampleTable, path: &Path, options: &CsvOptions) -> CollocResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| CollocError::TableWrite(format!("{}: {}", parent.display(), e)))?;
    }
    let file = File::create(path)
        .map_err(|e| CollocError::TableWrite(format!("{}: {}", path.display(), e)))?;
    write_csv_to(table, file, options)?;
    info!(path = %path.display(), rows = table.row_count(), "Table written");
    Ok(())
}
