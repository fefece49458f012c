mod parser;
pub mod scraper;
pub mod types;

pub use parser::ParseError;
pub use scraper::{ScraperError, WebScraper};

pub(crate) const BASE_URL: &str = "https://www.health.kr";

/// Leading consonants the drug-name search is split by.
pub const KOREAN_INITIALS: [&str; 14] = [
    "ㄱ", "ㄴ", "ㄷ", "ㄹ", "ㅁ", "ㅂ", "ㅅ", "ㅇ", "ㅈ", "ㅊ", "ㅋ", "ㅌ", "ㅍ", "ㅎ",
];
