//! Table format detection from file extensions.

use std::path::Path;

use colloc_common::{CollocError, CollocResult, SampleTable};
use tracing::warn;

use crate::csv_io::{read_csv, write_csv, CsvOptions};
use crate::spreadsheet::{read_workbook, write_workbook, Sheet, DEFAULT_SHEET};

/// On-disk table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text (`.csv`, `.txt`, `.tsv` and anything unrecognized)
    Delimited,
    /// Workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`)
    Spreadsheet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => TableFormat::Spreadsheet,
            _ => TableFormat::Delimited,
        }
    }

    /// Format to write `path` in; workbooks can only be written as `.xlsx`.
    pub fn writable(path: &Path) -> CollocResult<Self> {
        match Self::from_path(path) {
            TableFormat::Spreadsheet if extension(path).as_deref() != Some("xlsx") => {
                Err(CollocError::UnsupportedFormat(format!(
                    "{}: workbooks are written as .xlsx only",
                    path.display()
                )))
            }
            format => Ok(format),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Read every table of `path`.
///
/// Delimited files hold one table. Workbooks yield the sheets named in
/// `sheets`, or all of them when it is empty.
pub fn read_tables(path: &Path, options: &CsvOptions, sheets: &[String]) -> CollocResult<Vec<Sheet>> {
    match TableFormat::from_path(path) {
        TableFormat::Delimited => {
            if !sheets.is_empty() {
                warn!(path = %path.display(), "Sheet selection ignored for delimited input");
            }
            Ok(vec![Sheet::new(DEFAULT_SHEET, read_csv(path, options)?)])
        }
        TableFormat::Spreadsheet => read_workbook(path, sheets),
    }
}

/// Write `sheets` to `path`.
///
/// A workbook gets one worksheet per table. Delimited output holds only the
/// first table; the rest are dropped with a warning.
pub fn write_tables(sheets: &[Sheet], path: &Path, options: &CsvOptions) -> CollocResult<()> {
    match TableFormat::writable(path)? {
        TableFormat::Spreadsheet => {
            write_workbook(sheets.iter().map(|s| (s.name.as_str(), &s.table)), path)
        }
        TableFormat::Delimited => {
            let Some((first, rest)) = sheets.split_first() else {
                return Err(CollocError::TableWrite(format!(
                    "{}: no tables to write",
                    path.display()
                )));
            };
            if !rest.is_empty() {
                warn!(
                    path = %path.display(),
                    kept = %first.name,
                    dropped = ?rest.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                    "Delimited output holds one table, writing the first sheet only"
                );
            }
            write_csv(&first.table, path, options)
        }
    }
}

/// Read one table; for workbooks, the first non-empty sheet.
pub fn read_table(path: &Path, options: &CsvOptions) -> CollocResult<SampleTable> {
    read_tables(path, options, &[])?
        .into_iter()
        .next()
        .map(|sheet| sheet.table)
        .ok_or_else(|| CollocError::TableRead(format!("{}: no tables", path.display())))
}

/// Write one table, choosing the writer from the extension.
pub fn write_table(table: &SampleTable, path: &Path, options: &CsvOptions) -> CollocResult<()> {
    match TableFormat::writable(path)? {
        TableFormat::Spreadsheet => write_workbook([(DEFAULT_SHEET, table)], path),
        TableFormat::Delimited => write_csv(table, path, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloc_common::CellValue;

    fn table(lat: f64) -> SampleTable {
        let mut t = SampleTable::new(vec!["LATITUDE".into()]);
        t.push_row(vec![lat.into()]).unwrap();
        t
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.csv")), TableFormat::Delimited);
        assert_eq!(TableFormat::from_path(Path::new("a.TXT")), TableFormat::Delimited);
        assert_eq!(TableFormat::from_path(Path::new("a")), TableFormat::Delimited);
        assert_eq!(TableFormat::from_path(Path::new("a.XLSX")), TableFormat::Spreadsheet);
        assert_eq!(TableFormat::from_path(Path::new("a.xls")), TableFormat::Spreadsheet);
    }

    #[test]
    fn test_legacy_workbooks_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["samples.xls", "samples.ods"] {
            let path = dir.path().join(name);
            assert!(matches!(
                write_table(&table(40.0), &path, &CsvOptions::default()),
                Err(CollocError::UnsupportedFormat(_))
            ));
            assert!(!path.exists());
        }
        assert_eq!(
            TableFormat::writable(Path::new("out.XLSX")).unwrap(),
            TableFormat::Spreadsheet
        );
    }

    #[test]
    fn test_single_table_through_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        write_table(&table(40.0), &path, &CsvOptions::default()).unwrap();
        let back = read_table(&path, &CsvOptions::default()).unwrap();
        assert_eq!(back.columns(), &["LATITUDE".to_string()]);
        assert_eq!(back.get(0, 0).unwrap().as_f64(), Some(40.0));
    }

    #[test]
    fn test_csv_output_keeps_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sheets = vec![Sheet::new("north", table(40.0)), Sheet::new("south", table(-35.0))];

        write_tables(&sheets, &path, &CsvOptions::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "LATITUDE\n40\n");

        let back = read_tables(&path, &CsvOptions::default(), &[]).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].name, DEFAULT_SHEET);
    }

    #[test]
    fn test_xlsx_output_keeps_every_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let sheets = vec![Sheet::new("north", table(40.0)), Sheet::new("south", table(-35.0))];

        write_tables(&sheets, &path, &CsvOptions::default()).unwrap();
        let back = read_tables(&path, &CsvOptions::default(), &[]).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].name, "south");
        assert_eq!(back[1].table.get(0, 0), Some(&CellValue::Number(-35.0)));
    }

    #[test]
    fn test_nothing_to_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert!(matches!(
            write_tables(&[], &path, &CsvOptions::default()),
            Err(CollocError::TableWrite(_))
        ));
    }

    #[test]
    fn test_round_trip_through_txt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.txt");

        write_table(&table(40.0), &path, &CsvOptions::default()).unwrap();
        let back = read_table(&path, &CsvOptions::default()).unwrap();
        assert_eq!(back.get(0, 0).unwrap().as_f64(), Some(40.0));
    }
}
