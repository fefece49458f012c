pub mod client;
pub mod export;
pub mod health;
pub mod hira;
pub mod nedrug;
pub mod record;
pub mod spreadsheet;
pub mod types;
pub mod utils;

pub use client::{ClientConfig, HttpClient};
pub use export::CsvWriter;
pub use record::{Column, Record};

pub(crate) const DEFAULT_OUTPUT_DIR: &str = "./data";
