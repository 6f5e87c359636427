//! Tabular and key-value storage used by a run.
//!
//! Rows and columns are 1-based, like the spreadsheet the records end up in.
//! Sheet mutations may be buffered until [`SheetStore::commit`].

pub mod properties;
pub mod sheet;
pub mod workbook;

use crate::error::Result;

pub use properties::{FileProperties, MemoryProperties};
pub use workbook::Workbook;

/// A single sheet of string cells.
pub trait SheetStore {
    /// Index of the last non-empty row, `0` for an empty sheet.
    fn last_row(&self) -> usize;

    /// Width of the widest row, `0` for an empty sheet.
    fn last_column(&self) -> usize;

    /// Overwrite row `row` starting at column 1. Cells past `values` are kept.
    fn write_row(&mut self, row: usize, values: &[String]) -> Result<()>;

    /// Append rows after the last row and return the index of the first one.
    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<usize>;

    fn set_background(&mut self, row: usize, column: usize, color: &str) -> Result<()>;

    fn frozen_rows(&self) -> usize;

    fn set_frozen_rows(&mut self, rows: usize) -> Result<()>;

    fn set_bold_row(&mut self, row: usize) -> Result<()>;

    /// Persist every mutation made since the last commit.
    fn commit(&mut self) -> Result<()>;
}

/// String properties that survive between runs.
pub trait PropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}
