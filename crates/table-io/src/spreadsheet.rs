//! Excel workbooks.
//!
//! Each worksheet is its own [`SampleTable`]: the first row is the header
//! and the rows below it are samples. Workbooks are read with `calamine`
//! (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) and written with
//! `rust_xlsxwriter` (`.xlsx` only).

use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::Timelike;
use colloc_common::{CellValue, CollocError, CollocResult, SampleTable};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::{info, warn};

/// Sheet name used when a single table is written as a workbook.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// One named table of a workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: SampleTable,
}

impl Sheet {
    pub fn new(name: impl Into<String>, table: SampleTable) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

fn read_err(path: &Path, e: impl std::fmt::Display) -> CollocError {
    CollocError::TableRead(format!("{}: {}", path.display(), e))
}

fn write_err(path: &Path, e: impl std::fmt::Display) -> CollocError {
    CollocError::TableWrite(format!("{}: {}", path.display(), e))
}

/// Read the worksheets named in `sheets`, or every sheet when it is empty.
///
/// A requested sheet that does not exist or holds no header is an error.
/// When reading every sheet, empty ones are skipped; at least one table
/// must remain.
pub fn read_workbook(path: &Path, sheets: &[String]) -> CollocResult<Vec<Sheet>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| read_err(path, e))?;
    let available = workbook.sheet_names();

    let names: Vec<String> = if sheets.is_empty() {
        available.clone()
    } else {
        if let Some(unknown) = sheets.iter().find(|name| !available.contains(name)) {
            return Err(read_err(
                path,
                format!("no sheet named {:?} (found {})", unknown, available.join(", ")),
            ));
        }
        sheets.to_vec()
    };

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| read_err(path, format!("sheet {:?}: {}", name, e)))?;
        match range_to_table(&range).map_err(|e| read_err(path, format!("sheet {:?}: {}", name, e)))? {
            Some(table) => out.push(Sheet::new(name, table)),
            None if sheets.is_empty() => {
                warn!(path = %path.display(), sheet = %name, "Skipping empty sheet");
            }
            None => return Err(read_err(path, format!("sheet {:?} is empty", name))),
        }
    }

    if out.is_empty() {
        return Err(read_err(path, "workbook has no tables"));
    }

    info!(
        path = %path.display(),
        sheets = out.len(),
        rows = out.iter().map(|s| s.table.row_count()).sum::<usize>(),
        "Workbook loaded"
    );
    Ok(out)
}

/// Header row plus data rows; `None` when the sheet has no header.
fn range_to_table(range: &Range<Data>) -> Result<Option<SampleTable>, String> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(None);
    };

    let mut columns: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
    while columns.last().is_some_and(|c| c.is_empty()) {
        columns.pop();
    }
    if columns.is_empty() {
        return Ok(None);
    }

    let width = columns.len();
    let mut table = SampleTable::new(columns);
    for (offset, row) in rows.enumerate() {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        if row.iter().skip(width).any(|c| !matches!(c, Data::Empty)) {
            return Err(format!("row {} has more cells than the header", offset + 2));
        }
        table
            .push_row(row.iter().take(width).map(cell_value).collect())
            .map_err(|e| e.to_string())?;
    }
    Ok(Some(table))
}

/// Spreadsheet cell as a table cell. Dates become ISO text so they parse
/// like dates read from delimited files.
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) if dt.num_seconds_from_midnight() == 0 => {
                CellValue::Text(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => CellValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Missing,
        Data::Empty => CellValue::Text(String::new()),
    }
}

/// Write each `(name, table)` pair as a worksheet of a new `.xlsx` file.
///
/// Missing cells are left empty. Text that reads as a number is written as
/// a number.
pub fn write_workbook<'a, I>(sheets: I, path: &Path) -> CollocResult<()>
where
    I: IntoIterator<Item = (&'a str, &'a SampleTable)>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let mut written = 0usize;

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(name)
            .map_err(|e| write_err(path, format!("sheet {:?}: {}", name, e)))?;
        write_sheet(worksheet, table, &header)
            .map_err(|e| write_err(path, format!("sheet {:?}: {}", name, e)))?;
        written += 1;
    }

    if written == 0 {
        return Err(write_err(path, "no tables to write"));
    }
    workbook.save(path).map_err(|e| write_err(path, e))?;

    info!(path = %path.display(), sheets = written, "Workbook written");
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, table: &SampleTable, header: &Format) -> Result<(), XlsxError> {
    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col_num(col)?, name, header)?;
    }

    for (row, cells) in table.rows().iter().enumerate() {
        let row = u32::try_from(row + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, cell) in cells.iter().enumerate() {
            let col = col_num(col)?;
            match cell {
                CellValue::Number(v) if v.is_finite() => {
                    worksheet.write_number(row, col, *v)?;
                }
                CellValue::Text(s) => match cell.as_f64() {
                    Some(v) => {
                        worksheet.write_number(row, col, v)?;
                    }
                    None if s.is_empty() => {}
                    None => {
                        worksheet.write_string(row, col, s)?;
                    }
                },
                CellValue::Number(_) | CellValue::Missing => {}
            }
        }
    }
    Ok(())
}

fn col_num(col: usize) -> Result<u16, XlsxError> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)
}
