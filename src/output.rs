use crate::error::ReportError;
use crate::pivot::PivotGrid;
use csv::Writer;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// UTF-8 byte-order mark so spreadsheet tools detect the encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write `grid` as CSV to `path`, replacing any existing file.
pub fn write_csv(grid: &PivotGrid, item_header: &str, path: &Path) -> Result<(), ReportError> {
    let file = BufWriter::new(File::create(path)?);
    write_to(grid, item_header, file)?;
    debug!("Wrote {} rows to {}", grid.rows.len() + 1, path.display());
    Ok(())
}

/// Write the BOM, the header row, then every grid row.
pub fn write_to<W: Write>(
    grid: &PivotGrid,
    item_header: &str,
    mut out: W,
) -> Result<(), ReportError> {
    out.write_all(UTF8_BOM)?;
    let mut wtr = Writer::from_writer(out);

    wtr.write_record(std::iter::once(item_header).chain(grid.dates.iter().map(String::as_str)))?;
    for row in &grid.rows {
        wtr.write_record(
            std::iter::once(row.label.as_str()).chain(row.cells.iter().map(String::as_str)),
        )?;
    }

    wtr.flush()?;
    Ok(())
}
