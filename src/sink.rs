use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::model::summary::SummaryRow;

/// Row-by-row CSV writer for the summary series. The header goes out on
/// construction so an empty series still yields a valid file.
pub struct SummaryCsvWriter<W: Write> {
    writer: Writer<W>,
    rows_written: usize,
}

impl<W: Write> SummaryCsvWriter<W> {
    pub fn new(inner: W) -> Result<Self, AppError> {
        let mut writer = Writer::from_writer(inner);
        writer.write_record(SummaryRow::csv_headers())?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn write_row(&mut self, row: &SummaryRow) -> Result<(), AppError> {
        self.writer.write_record(row.to_csv_record())?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W, AppError> {
        self.writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))
    }
}

/// Write a whole series to `path`, replacing any previous file.
pub fn save_rows_to_csv<P: AsRef<Path>>(path: P, rows: &[SummaryRow]) -> Result<(), AppError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!(rows = rows.len(), path = %path.display(), "Writing summary CSV");

    let file = File::create(path)?;
    let mut writer = SummaryCsvWriter::new(file)?;
    for row in rows {
        writer.write_row(row)?;
    }
    writer.finish()?;

    tracing::info!(rows = rows.len(), path = %path.display(), "Saved summary CSV");
    Ok(())
}

/// Render a series to an in-memory CSV string.
pub fn rows_to_csv_string(rows: &[SummaryRow]) -> Result<String, AppError> {
    let mut writer = SummaryCsvWriter::new(Vec::new())?;
    for row in rows {
        writer.write_row(row)?;
    }
    let bytes = writer.finish()?;
    String::from_utf8(bytes).map_err(|e| AppError::Io(std::io::Error::other(e)))
}
