//! Export a sheet to CSV.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, TrackError};

/// Write `rows` (header row included) to `output_path`.
///
/// Short rows are padded so every line has as many fields as the widest row.
/// Returns the number of data rows written, header excluded.
pub fn export_csv(rows: &[Vec<String>], output_path: &Path) -> Result<usize> {
    let mut out = Vec::new();
    write_csv(rows, &mut out).map_err(|e| TrackError::io(output_path, e))?;
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
        }
    }
    std::fs::write(output_path, out).map_err(|e| TrackError::io(output_path, e))?;
    Ok(rows.len().saturating_sub(1))
}

/// Serialize rows as BOM-prefixed CSV into `writer`.
pub fn write_csv<W: Write>(rows: &[Vec<String>], writer: &mut W) -> std::io::Result<()> {
    writer.write_all(&[0xEF, 0xBB, 0xBF])?;
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows {
        let mut line: Vec<String> = row.iter().map(|c| csv_escape(c)).collect();
        line.resize(width, String::new());
        writeln!(writer, "{}", line.join(","))?;
    }
    Ok(())
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_escape_simple() {
        assert_eq!(csv_escape("見積"), "見積");
    }

    #[test]
    fn test_csv_escape_comma() {
        assert_eq!(csv_escape("見積, 至急"), "\"見積, 至急\"");
    }

    #[test]
    fn test_csv_escape_quotes() {
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_escape_newline() {
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn test_write_csv_pads_rows_and_adds_bom() {
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["1".to_string()],
        ];
        let mut out = Vec::new();
        write_csv(&rows, &mut out).unwrap();
        assert!(out.starts_with(&[0xEF, 0xBB, 0xBF]));
        assert_eq!(String::from_utf8_lossy(&out[3..]), "a,b\n1,\n");
    }

    #[test]
    fn test_export_counts_data_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("sheet.csv");
        let rows = vec![vec!["h".to_string()], vec!["x".to_string()]];
        assert_eq!(export_csv(&rows, &path).unwrap(), 1);
        assert!(path.exists());
    }
}
