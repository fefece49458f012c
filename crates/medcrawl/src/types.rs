use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Invalid file type '{0}'. Accepted values: 'xls', 'xlsx', 'csv', 'zip'")]
pub struct FileTypeParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Xls,
    Xlsx,
    Csv,
    Zip,
    Unknown,
}

impl FileType {
    pub fn detect(filename: &str) -> FileType {
        let lower = filename.to_lowercase();
        match lower.rsplit_once('.') {
            Some((_, ext)) => ext.parse().unwrap_or(FileType::Unknown),
            None => FileType::Unknown,
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileType::Xls | FileType::Xlsx)
    }
}

impl FromStr for FileType {
    type Err = FileTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xls" => Ok(FileType::Xls),
            "xlsx" => Ok(FileType::Xlsx),
            "csv" => Ok(FileType::Csv),
            "zip" => Ok(FileType::Zip),
            _ => Err(FileTypeParseError(s.to_string())),
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Xls => write!(f, "XLS"),
            FileType::Xlsx => write!(f, "XLSX"),
            FileType::Csv => write!(f, "CSV"),
            FileType::Zip => write!(f, "ZIP"),
            FileType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A file fetched from one of the portals, kept in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFile {
    pub filename: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub file_type: FileType,
    pub downloaded_at: DateTime<Local>,
}

impl DownloadFile {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        let filename = filename.into();
        Self {
            file_type: FileType::detect(&filename),
            filename,
            content,
            downloaded_at: Local::now(),
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn size_kb(&self) -> f64 {
        self.size() as f64 / 1024.0
    }

    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / (1024.0 * 1024.0)
    }
}

impl Display for DownloadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {:.1} KB",
            self.filename,
            self.file_type,
            self.size_kb()
        )
    }
}
