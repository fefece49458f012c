mod parser;
pub mod scraper;
pub mod types;

pub use parser::{ParseError, extract_zip};
pub use scraper::{ScraperError, WebScraper};

pub(crate) const BASE_URL: &str = "https://www.hira.or.kr";
pub(crate) const OPENDATA_BASE_URL: &str = "https://opendata.hira.or.kr";
