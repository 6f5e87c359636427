//! JSON-backed workbook.
//!
//! A workbook file holds any number of named sheets; a [`Workbook`] handle
//! works on one of them and creates it on first use. Mutations stay in
//! memory; [`SheetStore::commit`] rewrites the file once if anything changed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SheetStore;
use crate::error::{Result, TrackError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBackground {
    pub row: usize,
    pub column: usize,
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetData {
    pub rows: Vec<Vec<String>>,
    /// Keyed by `(row, column)`; stored on disk as a list of cells.
    #[serde(with = "background_list")]
    pub backgrounds: BTreeMap<(usize, usize), String>,
    pub frozen_rows: usize,
    pub bold_rows: BTreeSet<usize>,
}

mod background_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::CellBackground;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<(usize, usize), String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let cells: Vec<CellBackground> = map
            .iter()
            .map(|(&(row, column), color)| CellBackground {
                row,
                column,
                color: color.clone(),
            })
            .collect();
        cells.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<(usize, usize), String>, D::Error> {
        let cells = Vec::<CellBackground>::deserialize(deserializer)?;
        Ok(cells
            .into_iter()
            .map(|c| ((c.row, c.column), c.color))
            .collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct WorkbookFile {
    sheets: BTreeMap<String, SheetData>,
}

#[derive(Debug)]
pub struct Workbook {
    path: Option<PathBuf>,
    sheet_name: String,
    file: WorkbookFile,
    dirty: bool,
}

impl Workbook {
    /// Open (or start) the workbook at `path` and select `sheet_name`.
    pub fn open(path: impl AsRef<Path>, sheet_name: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| TrackError::json(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WorkbookFile::default(),
            Err(e) => return Err(TrackError::io(&path, e)),
        };
        debug!(path = %path.display(), sheet = sheet_name, "Opened workbook");
        Ok(Self {
            path: Some(path),
            sheet_name: sheet_name.to_string(),
            file,
            dirty: false,
        })
    }

    /// Whether there are mutations not yet committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// A workbook that is never written to disk.
    pub fn in_memory(sheet_name: &str) -> Self {
        Self {
            path: None,
            sheet_name: sheet_name.to_string(),
            file: WorkbookFile::default(),
            dirty: false,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All rows of the selected sheet (row 1 first).
    pub fn rows(&self) -> &[Vec<String>] {
        self.sheet().map(|s| s.rows.as_slice()).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let cells = self.rows().get(row.checked_sub(1)?)?;
        cells.get(column.checked_sub(1)?).map(String::as_str)
    }

    pub fn background(&self, row: usize, column: usize) -> Option<&str> {
        self.sheet()?
            .backgrounds
            .get(&(row, column))
            .map(String::as_str)
    }

    pub fn is_bold_row(&self, row: usize) -> bool {
        self.sheet().is_some_and(|s| s.bold_rows.contains(&row))
    }

    fn sheet(&self) -> Option<&SheetData> {
        self.file.sheets.get(&self.sheet_name)
    }

    fn sheet_mut(&mut self) -> &mut SheetData {
        self.dirty = true;
        self.file.sheets.entry(self.sheet_name.clone()).or_default()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.file).map_err(|e| TrackError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| TrackError::io(path, e))
    }
}

fn check_position(row: usize, column: usize) -> Result<()> {
    if row == 0 || column == 0 {
        return Err(TrackError::Sheet(format!(
            "cell ({row}, {column}) is out of range; rows and columns start at 1"
        )));
    }
    Ok(())
}

impl SheetStore for Workbook {
    fn last_row(&self) -> usize {
        self.rows()
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map_or(0, |i| i + 1)
    }

    fn last_column(&self) -> usize {
        self.rows().iter().map(Vec::len).max().unwrap_or(0)
    }

    fn write_row(&mut self, row: usize, values: &[String]) -> Result<()> {
        check_position(row, 1)?;
        let sheet = self.sheet_mut();
        if sheet.rows.len() < row {
            sheet.rows.resize(row, Vec::new());
        }
        let cells = &mut sheet.rows[row - 1];
        if cells.len() < values.len() {
            cells.resize(values.len(), String::new());
        }
        cells[..values.len()].clone_from_slice(values);
        Ok(())
    }

    fn append_rows(&mut self, rows: &[Vec<String>]) -> Result<usize> {
        let first = self.last_row() + 1;
        let sheet = self.sheet_mut();
        sheet.rows.truncate(first - 1);
        sheet.rows.extend(rows.iter().cloned());
        Ok(first)
    }

    fn set_background(&mut self, row: usize, column: usize, color: &str) -> Result<()> {
        check_position(row, column)?;
        self.sheet_mut()
            .backgrounds
            .insert((row, column), color.to_string());
        Ok(())
    }

    fn frozen_rows(&self) -> usize {
        self.sheet().map_or(0, |s| s.frozen_rows)
    }

    fn set_frozen_rows(&mut self, rows: usize) -> Result<()> {
        self.sheet_mut().frozen_rows = rows;
        Ok(())
    }

    fn set_bold_row(&mut self, row: usize) -> Result<()> {
        check_position(row, 1)?;
        self.sheet_mut().bold_rows.insert(row);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.save()?;
        self.dirty = false;
        debug!(sheet = %self.sheet_name, "Committed workbook");
        Ok(())
    }
}
