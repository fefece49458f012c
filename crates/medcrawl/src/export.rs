use std::path::{Path, PathBuf};

use crate::record::Record;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes crawled records as UTF-8 CSV.
///
/// `save` produces the short export (`id` followed by the record's summary
/// columns, e.g. `id,name`) and `save_full` every field of the record.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    output_path: PathBuf,
}

impl CsvWriter {
    pub fn new(output_dir: impl AsRef<Path>, filename: &str) -> Self {
        Self {
            output_path: output_dir.as_ref().join(filename),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn save<R: Record>(&self, records: &[R]) -> Result<PathBuf, ExportError> {
        let mut writer = self.open()?;

        let mut header = vec!["id"];
        header.extend_from_slice(R::SUMMARY_HEADERS);
        writer.write_record(&header)?;

        for (i, record) in records.iter().enumerate() {
            let mut row = vec![(i + 1).to_string()];
            row.extend(
                record
                    .summary()
                    .into_iter()
                    .map(|v| v.unwrap_or_default().to_string()),
            );
            writer.write_record(&row)?;
        }
        writer.flush()?;

        log::info!(
            "Saved {} {} record(s) to {}",
            records.len(),
            R::NAME,
            self.output_path.display()
        );
        Ok(self.output_path.clone())
    }

    pub fn save_full<R: Record>(&self, records: &[R]) -> Result<PathBuf, ExportError> {
        if records.is_empty() {
            log::warn!("No {} records to save", R::NAME);
            return Ok(self.output_path.clone());
        }

        let mut writer = self.open()?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        log::info!(
            "Saved {} {} record(s) (full) to {}",
            records.len(),
            R::NAME,
            self.output_path.display()
        );
        Ok(self.output_path.clone())
    }

    fn open(&self) -> Result<csv::Writer<std::fs::File>, ExportError> {
        if let Some(parent) = self.output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(csv::Writer::from_path(&self.output_path)?)
    }
}
