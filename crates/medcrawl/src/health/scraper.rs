use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use super::KOREAN_INITIALS;
use super::parser::{ParseError, parse_medicine_table};
use super::types::{Medicine, SearchPayload};
use crate::client::{ClientConfig, HttpClient};
use crate::export::{CsvWriter, ExportError};
use crate::record::renumber;
use crate::utils::decode_korean;

pub const MEDICINE_LIST_FILE: &str = "medicine_list_health.csv";

const DEFAULT_PAGE_SIZE: u32 = 1000;
const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Export error: {0}")]
    ExportError(#[from] ExportError),
}

/// Crawls the 약학정보원 detail search one Korean initial at a time.
#[derive(Debug, Clone)]
pub struct WebScraper {
    client: HttpClient,
    base_url: String,
    output_dir: PathBuf,
    page_size: u32,
    page_delay: Duration,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_client_config(ClientConfig::default())
    }

    pub fn with_client_config(config: ClientConfig) -> Result<Self, ScraperError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: super::BASE_URL.to_string(),
            output_dir: PathBuf::from(crate::DEFAULT_OUTPUT_DIR),
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn csv_writer(&self) -> CsvWriter {
        CsvWriter::new(&self.output_dir, MEDICINE_LIST_FILE)
    }

    /// Fetches result page `page` for `initial`. Ids in the returned page start at 1.
    pub async fn fetch_page(&self, page: u32, initial: &str) -> Result<Vec<Medicine>, ScraperError> {
        let url = format!("{}/searchDrug/result_more.asp", self.base_url);
        let referer = format!("{}/searchDrug/search_detail.asp", self.base_url);
        let body = SearchPayload::for_initial(initial, page, self.page_size).to_urlencoded();

        log::info!("Fetching medicines for initial {} page {}...", initial, page);
        log::debug!("Payload: {body}");

        let bytes = self
            .client
            .post_form(&url, body, Some(&referer), Some(DOWNLOAD_TIMEOUT))
            .await?
            .bytes()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        let html = decode_korean(&bytes);
        Ok(parse_medicine_table(&html, 1)?)
    }

    /// Walks every initial until each returns an empty page.
    pub async fn fetch_all(&self) -> Result<Vec<Medicine>, ScraperError> {
        crawl_initials(&KOREAN_INITIALS, self.page_delay, |page, initial| {
            self.fetch_page(page, initial)
        })
        .await
    }

    /// Crawls everything and writes the `id,name` CSV.
    pub async fn medicines(&self) -> Result<Vec<Medicine>, ScraperError> {
        let medicines = self.fetch_all().await?;
        self.csv_writer().save(&medicines)?;
        Ok(medicines)
    }
}

pub(crate) async fn crawl_initials<F, Fut, E>(
    initials: &[&'static str],
    page_delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<Medicine>, E>
where
    F: FnMut(u32, &'static str) -> Fut,
    Fut: Future<Output = Result<Vec<Medicine>, E>>,
{
    let mut medicines = Vec::new();
    let mut first_request = true;

    for &initial in initials {
        let mut page = 1;
        loop {
            if !first_request && !page_delay.is_zero() {
                tokio::time::sleep(page_delay).await;
            }
            first_request = false;

            let rows = fetch_page(page, initial).await?;
            if rows.is_empty() {
                log::info!("Initial {} exhausted after {} page(s)", initial, page - 1);
                break;
            }

            log::info!("Initial {} page {}: {} row(s)", initial, page, rows.len());
            medicines.extend(rows);
            page += 1;
        }
    }

    renumber(&mut medicines);
    log::info!("Collected {} medicine(s) in total", medicines.len());
    Ok(medicines)
}
