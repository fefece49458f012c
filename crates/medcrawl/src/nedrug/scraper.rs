use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use reqwest::header::CONTENT_DISPOSITION;

use super::parser::{ParseError, page_filename, page_order_key, parse_export, parse_products};
use super::types::{DownloadResult, DrugProduct, PageResult, SearchParams};
use crate::client::{ClientConfig, HttpClient, encode_form};
use crate::export::{CsvWriter, ExportError};
use crate::record::{has_header, renumber};
use crate::spreadsheet;
use crate::types::{DownloadFile, FileType};
use crate::utils::filename_from_content_disposition;

pub const MEDICINE_LIST_FILE: &str = "medicine_list_nedrug.csv";

const DEFAULT_PAGE_SIZE: u32 = 10000;
const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Export error: {0}")]
    ExportError(#[from] ExportError),
    #[error("File operation failed: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pages through the 의약품등 제품정보 spreadsheet export.
#[derive(Debug, Clone)]
pub struct WebScraper {
    client: HttpClient,
    base_url: String,
    output_dir: PathBuf,
    page_size: u32,
    page_delay: Duration,
    params: SearchParams,
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
            params: SearchParams::default(),
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

    pub fn with_search_params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn csv_writer(&self) -> CsvWriter {
        CsvWriter::new(&self.output_dir, MEDICINE_LIST_FILE)
    }

    /// Requests one export page.
    ///
    /// HTTP failures are returned as errors. A response without a filename,
    /// a workbook without data rows, or a workbook that cannot be read or
    /// saved all yield an empty page, which ends pagination.
    pub async fn fetch_page(&self, page_num: u32) -> Result<PageResult, ScraperError> {
        let url = format!("{}/searchDrug/getExcel", self.base_url);
        let referer = format!("{}/searchDrug", self.base_url);
        let body = encode_form(&self.params.to_payload(page_num, self.page_size));

        log::info!("Fetching export page {}...", page_num);

        let response = self
            .client
            .post_form(&url, body, Some(&referer), Some(DOWNLOAD_TIMEOUT))
            .await?;

        let served_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| filename_from_content_disposition(value.as_bytes()));
        let final_url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        Ok(self
            .page_from_response(page_num, served_name.as_deref(), &final_url, bytes.to_vec())
            .await)
    }

    /// Turns a downloaded export into a page: saves the workbook under its
    /// page filename and maps its rows. Every failure past the HTTP layer
    /// is logged and becomes an empty page.
    pub(crate) async fn page_from_response(
        &self,
        page_num: u32,
        served_name: Option<&str>,
        url: &str,
        content: Vec<u8>,
    ) -> PageResult {
        let Some(served_name) = served_name else {
            log::info!("Export page {} carried no attachment", page_num);
            return PageResult::empty(page_num);
        };

        match self.store_page(page_num, served_name, url, content).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Failed to process export page {}: {}", page_num, e);
                PageResult::empty(page_num)
            }
        }
    }

    async fn store_page(
        &self,
        page_num: u32,
        served_name: &str,
        url: &str,
        content: Vec<u8>,
    ) -> Result<PageResult, ScraperError> {
        let Some(data) = parse_export(served_name, &content)? else {
            return Ok(PageResult::empty(page_num));
        };

        let filename = page_filename(
            Some(served_name),
            url,
            page_num,
            self.page_size,
            data.row_count(),
        );
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&filename);
        tokio::fs::write(&path, &content).await?;
        log::info!("Saved export page {} to {}", page_num, path.display());

        let products = parse_products(&data, 1)?;
        Ok(PageResult {
            page_num,
            filename: Some(filename.clone()),
            download_file: Some(DownloadFile::new(filename, content)),
            has_more: data.row_count() > self.page_size as usize,
            products,
        })
    }

    pub async fn fetch_all(&self) -> Result<DownloadResult, ScraperError> {
        let pages = collect_pages(self.page_delay, |page| self.fetch_page(page)).await?;
        Ok(into_result(pages))
    }

    /// Downloads every page and writes the `id,name` CSV.
    pub async fn download(&self) -> Result<DownloadResult, ScraperError> {
        let result = self.fetch_all().await?;
        self.csv_writer().save(&result.products)?;
        Ok(result)
    }

    /// Re-reads export pages saved by earlier runs, ordered by the row index
    /// in their names. Unreadable files and spreadsheets without the product
    /// header are logged and skipped.
    pub fn parse_directory(&self, dir: &Path) -> Result<DownloadResult, ScraperError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .is_some_and(|n| FileType::detect(&n.to_string_lossy()).is_spreadsheet())
            })
            .collect();
        paths.sort_by_cached_key(|path| page_order_key(path));

        let mut pages = Vec::with_capacity(paths.len());
        for path in &paths {
            let data = match spreadsheet::read_file(path) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            if !has_header::<DrugProduct>(&data.rows) {
                log::warn!("Skipping {}: not a product export", path.display());
                continue;
            }
            let products = parse_products(&data, 1)?;
            log::info!("Parsed {} product(s) from {}", products.len(), data.filename);
            pages.push(PageResult {
                page_num: pages.len() as u32,
                filename: Some(data.filename),
                download_file: None,
                products,
                has_more: false,
            });
        }

        Ok(into_result(pages))
    }
}

/// Requests pages 0, 1, 2, … until one comes back empty.
pub(crate) async fn collect_pages<F, Fut, E>(
    page_delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<PageResult>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PageResult, E>>,
{
    let mut pages = Vec::new();
    let mut page_num = 0;
    loop {
        if page_num > 0 && !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }

        let page = fetch_page(page_num).await?;
        if page.is_empty() {
            log::info!("Export exhausted after {} page(s)", page_num);
            break;
        }

        log::info!("Export page {}: {} product(s)", page_num, page.product_count());
        pages.push(page);
        page_num += 1;
    }
    Ok(pages)
}

fn into_result(page_results: Vec<PageResult>) -> DownloadResult {
    let mut products: Vec<DrugProduct> = page_results
        .iter()
        .flat_map(|p| p.products.iter().cloned())
        .collect();
    renumber(&mut products);

    DownloadResult {
        total_pages: page_results.len(),
        products,
        page_results,
        downloaded_at: Local::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use rust_xlsxwriter::Workbook;

    fn page(page_num: u32, n: usize) -> PageResult {
        PageResult {
            page_num,
            filename: Some(format!("page_{page_num}.xls")),
            download_file: None,
            products: (0..n)
                .map(|i| DrugProduct {
                    id: i + 1,
                    item_code: Some(format!("{page_num}-{i}")),
                    ..Default::default()
                })
                .collect(),
            has_more: true,
        }
    }

    #[tokio::test]
    async fn test_pagination_terminates_on_empty_page() {
        let mut requested = Vec::new();
        let pages = collect_pages(Duration::ZERO, |page_num| {
            requested.push(page_num);
            let result = match page_num {
                0 => page(0, 3),
                1 => page(1, 2),
                _ => PageResult::empty(page_num),
            };
            async move { Ok::<_, Infallible>(result) }
        })
        .await
        .unwrap();

        assert_eq!(requested, vec![0, 1, 2]);
        assert_eq!(pages.len(), 2);

        let result = into_result(pages);
        assert_eq!(result.total_pages, 2);
        assert_eq!(result.total_count(), 5);
        assert_eq!(
            result.products.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(result.products[3].item_code.as_deref(), Some("1-0"));
    }

    #[tokio::test]
    async fn test_pagination_first_page_empty() {
        let pages = collect_pages(Duration::ZERO, |page_num| async move {
            Ok::<_, Infallible>(PageResult::empty(page_num))
        })
        .await
        .unwrap();
        assert!(pages.is_empty());
        assert!(into_result(pages).is_empty());
    }

    fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        workbook.save_to_buffer().expect("Failed to build workbook")
    }

    fn export_workbook(codes: &[&str]) -> Vec<u8> {
        let names: Vec<String> = codes.iter().map(|code| format!("제품 {code}")).collect();
        let mut rows: Vec<Vec<&str>> = vec![vec!["품목기준코드", "제품명"]];
        for (code, name) in codes.iter().zip(&names) {
            rows.push(vec![*code, name.as_str()]);
        }
        let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        workbook(&rows)
    }

    fn scraper_in(dir: &Path) -> WebScraper {
        WebScraper::new()
            .expect("Failed to build scraper")
            .with_output_dir(dir)
    }

    #[tokio::test]
    async fn test_response_without_filename_is_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper_in(dir.path());

        let page = scraper
            .page_from_response(0, None, "https://example.com/getExcel", export_workbook(&["199303108"]))
            .await;

        assert!(page.is_empty());
        assert_eq!(page.filename, None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_workbook_is_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper_in(dir.path());

        let page = scraper
            .page_from_response(2, Some("의약품등_제품정보.xls"), "", b"<html>error</html>".to_vec())
            .await;

        assert!(page.is_empty());
        assert_eq!(page.page_num, 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_header_only_workbook_is_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper_in(dir.path());

        let page = scraper
            .page_from_response(3, Some("의약품등_제품정보.xlsx"), "", export_workbook(&[]))
            .await;

        assert!(page.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_is_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let scraper = scraper_in(&blocker);

        let page = scraper
            .page_from_response(0, Some("의약품등_제품정보.xlsx"), "", export_workbook(&["199303108"]))
            .await;

        assert!(page.is_empty());
        assert_eq!(std::fs::read(&blocker).unwrap(), b"file");
    }

    #[tokio::test]
    async fn test_page_from_response_saves_and_maps() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper_in(dir.path());
        let content = export_workbook(&["199303108", "200808876"]);

        let page = scraper
            .page_from_response(0, Some("의약품등_제품정보.xlsx"), "", content.clone())
            .await;

        assert_eq!(page.filename.as_deref(), Some("의약품등_제품정보_2.xlsx"));
        assert!(!page.has_more);
        assert_eq!(page.product_count(), 2);
        assert_eq!(page.products[1].item_code.as_deref(), Some("200808876"));
        assert_eq!(
            std::fs::read(dir.path().join("의약품등_제품정보_2.xlsx")).unwrap(),
            content
        );
    }

    #[test]
    fn test_parse_directory() {
        let dir = tempfile::tempdir().unwrap();
        for (name, code) in [
            ("p_100000.xlsx", "201000001"),
            ("p_20000.xlsx", "199303108"),
            ("p_30000.xlsx", "200808876"),
        ] {
            std::fs::write(dir.path().join(name), export_workbook(&[code])).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("c_broken.xls"), "broken").unwrap();

        let scraper = WebScraper::new().unwrap();
        let result = scraper.parse_directory(dir.path()).expect("Failed to parse directory");

        assert_eq!(result.total_pages, 3);
        assert_eq!(
            result
                .products
                .iter()
                .map(|p| p.item_code.as_deref().unwrap_or_default())
                .collect::<Vec<_>>(),
            vec!["199303108", "200808876", "201000001"]
        );
        assert_eq!(result.products[2].id, 3);
        assert_eq!(result.products[1].product_name.as_deref(), Some("제품 200808876"));
    }

    #[test]
    fn test_parse_directory_skips_other_spreadsheets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("의약품등_제품정보_10000.xlsx"),
            export_workbook(&["199303108"]),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("약제급여목록및급여상한금액표.xlsx"),
            workbook(&[
                &["연번", "투여", "분류", "주성분코드", "제품코드", "제품명"],
                &["1", "내복", "114", "101301ATB", "645301220", "아세트아미노펜정"],
            ]),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("1.병원정보서비스.xlsx"),
            workbook(&[
                &["암호화요양기호", "요양기관명"],
                &["JDQ4MTg4", "서울대학교병원"],
            ]),
        )
        .unwrap();

        let result = scraper_in(dir.path())
            .parse_directory(dir.path())
            .expect("Failed to parse directory");

        assert_eq!(result.total_pages, 1);
        assert_eq!(result.total_count(), 1);
        assert_eq!(result.products[0].item_code.as_deref(), Some("199303108"));
    }
}
