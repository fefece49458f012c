use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto, open_workbook_auto_from_rs};
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("Failed to open workbook {filename}: {source}")]
    Open {
        filename: String,
        #[source]
        source: calamine::Error,
    },
    #[error("Workbook {0} has no worksheet")]
    NoWorksheet(String),
}

pub type Row = Vec<Option<String>>;

/// Every row of the first worksheet of a downloaded workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcelData {
    pub filename: String,
    pub sheet_name: Option<String>,
    pub rows: Vec<Row>,
    pub parsed_at: DateTime<Local>,
}

impl ExcelData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn data_rows(&self) -> &[Row] {
        if self.rows.len() > 1 {
            &self.rows[1..]
        } else {
            &[]
        }
    }
}

pub fn read_bytes(filename: &str, bytes: &[u8]) -> Result<ExcelData, SpreadsheetError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|source| {
            SpreadsheetError::Open {
                filename: filename.to_string(),
                source,
            }
        })?;
    let sheet_name = workbook.sheet_names().first().cloned();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SpreadsheetError::NoWorksheet(filename.to_string()))?
        .map_err(|source| SpreadsheetError::Open {
            filename: filename.to_string(),
            source,
        })?;

    Ok(ExcelData {
        filename: filename.to_string(),
        sheet_name,
        rows: range.rows().map(|r| r.iter().map(cell_text).collect()).collect(),
        parsed_at: Local::now(),
    })
}

pub fn read_file(path: &Path) -> Result<ExcelData, SpreadsheetError> {
    let filename = path.display().to_string();
    let mut workbook = open_workbook_auto(path).map_err(|source| SpreadsheetError::Open {
        filename: filename.clone(),
        source,
    })?;
    let sheet_name = workbook.sheet_names().first().cloned();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SpreadsheetError::NoWorksheet(filename.clone()))?
        .map_err(|source| SpreadsheetError::Open {
            filename: filename.clone(),
            source,
        })?;

    Ok(ExcelData {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(filename),
        sheet_name,
        rows: range.rows().map(|r| r.iter().map(cell_text).collect()).collect(),
        parsed_at: Local::now(),
    })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(value) => Some(format_datetime(value)),
            None => Some(dt.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Date-formatted cells come back as `2008-12-22`, or with the time when
/// there is one.
fn format_datetime(value: NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
