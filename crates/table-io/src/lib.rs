//! Sample table input and output.
//!
//! Tables are read from delimited text or from workbooks into
//! [`SampleTable`]s and written back the same way. The format is chosen
//! from the file extension. A workbook yields one table per sheet; delimited
//! files hold a single table.
//!
//! [`SampleTable`]: colloc_common::SampleTable

pub mod csv_io;
pub mod format;
pub mod spreadsheet;

pub use csv_io::{read_csv, read_csv_from, write_csv, write_csv_to, CsvOptions};
pub use format::{read_table, read_tables, write_table, write_tables, TableFormat};
pub use spreadsheet::{read_workbook, write_workbook, Sheet, DEFAULT_SHEET};
