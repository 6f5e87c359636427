//! Writing tracked replies into a [`SheetStore`].

use chrono::FixedOffset;
use tracing::{debug, info};

use super::SheetStore;
use crate::engine::PendingRecord;
use crate::error::Result;
use crate::presenter::{to_row, HEADERS, REPLY_COUNT_COLUMN};

fn header_row() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

/// Make sure row 1 carries the column headers.
///
/// An empty sheet gets the header row, bold and frozen. A sheet narrower
/// than the header row has its header row rewritten; wider sheets are left
/// alone.
pub fn prepare_header<S: SheetStore + ?Sized>(sheet: &mut S) -> Result<()> {
    if sheet.last_row() == 0 {
        sheet.write_row(1, &header_row())?;
        sheet.set_bold_row(1)?;
        sheet.set_frozen_rows(1)?;
        info!("Initialized sheet header");
    } else if sheet.last_column() < HEADERS.len() {
        let from = sheet.last_column();
        sheet.write_row(1, &header_row())?;
        info!(from, to = HEADERS.len(), "Extended sheet header");
    }
    sheet.commit()
}

/// Append the batch and color each reply-count cell, then commit once.
///
/// Returns the number of rows appended.
pub fn flush<S: SheetStore + ?Sized>(
    sheet: &mut S,
    batch: &[PendingRecord],
    tz: &FixedOffset,
) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }

    let rows: Vec<Vec<String>> = batch.iter().map(|p| to_row(&p.record, tz)).collect();
    let first_row = sheet.append_rows(&rows)?;

    for (i, pending) in batch.iter().enumerate() {
        if let Some(color) = pending.color {
            sheet.set_background(first_row + i, REPLY_COUNT_COLUMN, color)?;
        }
    }

    if sheet.frozen_rows() == 0 {
        sheet.set_frozen_rows(1)?;
    }
    sheet.set_bold_row(1)?;
    sheet.commit()?;

    debug!(first_row, count = rows.len(), "Flushed batch");
    Ok(rows.len())
}
