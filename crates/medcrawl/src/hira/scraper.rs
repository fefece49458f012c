use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Response;
use reqwest::header::CONTENT_DISPOSITION;

use super::parser::{
    ParseError, extract_zip, parse_benefits, parse_board, parse_download_codes, parse_hospitals,
    parse_pharmacies,
};
use super::types::{
    BenefitItem, BoardItem, DownloadResult, Hospital, OpenDataResult, Pharmacy, latest_item,
};
use crate::client::{ClientConfig, HttpClient, encode_form};
use crate::export::{CsvWriter, ExportError};
use crate::record::{has_header, renumber};
use crate::spreadsheet::{self, ExcelData};
use crate::types::{DownloadFile, FileType};
use crate::utils::{decode_korean, filename_from_content_disposition};

pub const MEDICINE_LIST_FILE: &str = "medicine_list_hira.csv";
pub const HOSPITAL_LIST_FILE: &str = "hospital_list.csv";
pub const PHARMACY_LIST_FILE: &str = "pharmacy_list.csv";
pub const OPENDATA_DIR: &str = "opendata_hira_data";

const HOSPITAL_FILE_PREFIX: &str = "1.병원정보서비스";
const PHARMACY_FILE_PREFIX: &str = "2.약국정보서비스";

const BOARD_PATH: &str = "/bbsDummy.do?pgmid=HIRAA030014050000";
const ATTACHMENT_PATH: &str = "/bbs/bbsCDownLoad.do";
const OPENDATA_PATH: &str = "/op/opc/selectOpenData.do?sno=11925";
const OPENDATA_DOWNLOAD_PATH: &str =
    "/dext5upload/handler/upload.dx?callType=download&url=/op/opc/selectOpenData.do";

/// Session token the upload handler expects next to the attachment code.
const OPENDATA_D00: &str = "UlpEQXhER1J2ZDI1c2IyRmtVbVZ4ZFdWemRBdGtNVEFNWHd0a01qVU1MM05vWVhKbFpDOWtZWFJoTDNWd2JHOWhaRVpwYkdWekwyWnBiR1V2T0RrNU56WXhPVVl0T0VJNFJpMURSRFU0TFRkQ05qa3RNVUZEUlRKR09UaEVOa0V5TG5wcGNBdGtNallNN0tDRTZyV3RJT3V6a2V5ZG1PeWJrQ0Ryc0k4ZzdKVzk2cld0SU8yWWhPMlpxU0F5TURJMExqRXlMbnBwY0F0a01EY01ORGN4UVVaRVF6RXRORGRCTXkxRVFUSTJMVE16UlRjdFJrUkdNMFJFTWtFd1FqTkRDdz09";

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
    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] spreadsheet::SpreadsheetError),
    #[error("Bulletin {0} has no attachment")]
    MissingAttachment(String),
    #[error("No open-data attachment found")]
    NoDownloadCode,
}

/// Crawls the 건강보험심사평가원 benefit-list board and the open-data portal.
#[derive(Debug, Clone)]
pub struct WebScraper {
    client: HttpClient,
    base_url: String,
    opendata_url: String,
    output_dir: PathBuf,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_client_config(ClientConfig::default())
    }

    pub fn with_client_config(config: ClientConfig) -> Result<Self, ScraperError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: super::BASE_URL.to_string(),
            opendata_url: super::OPENDATA_BASE_URL.to_string(),
            output_dir: PathBuf::from(crate::DEFAULT_OUTPUT_DIR),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_opendata_url(mut self, base_url: impl Into<String>) -> Self {
        self.opendata_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn csv_writer(&self, filename: &str) -> CsvWriter {
        CsvWriter::new(&self.output_dir, filename)
    }

    pub async fn fetch_board(&self) -> Result<Vec<BoardItem>, ScraperError> {
        let url = format!("{}{}", self.base_url, BOARD_PATH);
        log::info!("Fetching benefit-list board...");

        let bytes = self
            .client
            .get(&url, None, None)
            .await?
            .bytes()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        Ok(parse_board(&decode_korean(&bytes))?)
    }

    /// Downloads the first attachment of bulletin `brd_blt_no`, saves it to
    /// the output directory and reads its first worksheet.
    pub async fn download_attachment(
        &self,
        brd_blt_no: &str,
    ) -> Result<(DownloadFile, ExcelData), ScraperError> {
        let query = encode_form(&[
            ("apndNo", "1"),
            ("apndBrdBltNo", brd_blt_no),
            ("apndBrdTyNo", "1"),
            ("apndBltNo", "59"),
        ]);
        let url = format!("{}{}?{}", self.base_url, ATTACHMENT_PATH, query);
        let referer = format!("{}{}", self.base_url, BOARD_PATH);

        log::info!("Downloading attachment of bulletin {}...", brd_blt_no);
        let response = self
            .client
            .get(&url, Some(&referer), Some(DOWNLOAD_TIMEOUT))
            .await?;

        let (filename, content) = read_attachment(response).await?;
        let filename =
            filename.ok_or_else(|| ScraperError::MissingAttachment(brd_blt_no.to_string()))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&filename);
        tokio::fs::write(&path, &content).await?;
        log::info!("Saved {}", path.display());

        let excel = spreadsheet::read_bytes(&filename, &content)?;
        Ok((DownloadFile::new(filename, content), excel))
    }

    /// Fetches the newest 약제급여목록표 and writes the `id,name` CSV.
    /// `None` when the board lists nothing.
    pub async fn download(&self) -> Result<Option<DownloadResult>, ScraperError> {
        let board_items = self.fetch_board().await?;
        let Some(latest) = latest_item(&board_items) else {
            log::warn!("Benefit-list board is empty");
            return Ok(None);
        };
        log::info!("Latest bulletin: {}", latest);

        let brd_blt_no = latest
            .brd_blt_no
            .clone()
            .ok_or_else(|| ScraperError::MissingAttachment(latest.title.clone()))?;
        let (file, excel_data) = self.download_attachment(&brd_blt_no).await?;

        let items = parse_benefits(&excel_data)?;
        self.csv_writer(MEDICINE_LIST_FILE).save(&items)?;

        Ok(Some(DownloadResult {
            filename: file.filename,
            excel_data,
            board_items,
            items,
        }))
    }

    /// Re-reads benefit-list spreadsheets saved by earlier runs, in filename
    /// order. Unreadable files and spreadsheets without the 연번 header are
    /// logged and skipped.
    pub fn parse_directory(&self, dir: &Path) -> Result<Vec<BenefitItem>, ScraperError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .is_some_and(|n| FileType::detect(&n.to_string_lossy()).is_spreadsheet())
            })
            .collect();
        paths.sort();

        let mut items = Vec::new();
        for path in &paths {
            match spreadsheet::read_file(path) {
                Ok(data) if has_header::<BenefitItem>(&data.rows) => {
                    items.extend(parse_benefits(&data)?)
                }
                Ok(_) => log::warn!("Skipping {}: not a benefit list", path.display()),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        renumber(&mut items);

        log::info!("Parsed {} benefit item(s) from {}", items.len(), dir.display());
        Ok(items)
    }

    /// Code of the newest 전국 병의원 및 약국 현황 archive, if any is listed.
    pub async fn fetch_download_code(&self) -> Result<Option<String>, ScraperError> {
        let url = format!("{}{}", self.opendata_url, OPENDATA_PATH);
        log::info!("Fetching open-data page...");

        let bytes = self
            .client
            .get(&url, None, None)
            .await?
            .bytes()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        let codes = parse_download_codes(&decode_korean(&bytes))?;
        Ok(codes.into_iter().next())
    }

    pub async fn download_opendata(&self, code: &str) -> Result<DownloadFile, ScraperError> {
        let url = format!("{}{}", self.opendata_url, OPENDATA_DOWNLOAD_PATH);
        let referer = format!("{}{}", self.opendata_url, OPENDATA_PATH);
        let body = encode_form(&[("customValue", code), ("d00", OPENDATA_D00)]);

        log::info!("Downloading open-data archive {}...", code);
        let response = self
            .client
            .post_form(&url, body, Some(&referer), Some(DOWNLOAD_TIMEOUT))
            .await?;

        let (filename, content) = read_attachment(response).await?;
        let filename = filename.unwrap_or_else(|| {
            log::warn!("Archive {} carried no filename", code);
            format!("opendata_{code}.zip")
        });

        let file = DownloadFile::new(filename, content);
        log::info!("Downloaded {}", file);
        Ok(file)
    }

    /// Downloads and unpacks the newest archive, then maps and exports the
    /// hospital and pharmacy spreadsheets. With `cleanup` the extracted
    /// files are deleted afterwards.
    pub async fn opendata(&self, cleanup: bool) -> Result<OpenDataResult, ScraperError> {
        let code = self
            .fetch_download_code()
            .await?
            .ok_or(ScraperError::NoDownloadCode)?;
        let file = self.download_opendata(&code).await?;
        self.load_opendata(file, cleanup)
    }

    pub async fn hospitals(&self) -> Result<Vec<Hospital>, ScraperError> {
        Ok(self.opendata(true).await?.hospitals)
    }

    pub async fn pharmacies(&self) -> Result<Vec<Pharmacy>, ScraperError> {
        Ok(self.opendata(true).await?.pharmacies)
    }

    pub(crate) fn load_opendata(
        &self,
        file: DownloadFile,
        cleanup: bool,
    ) -> Result<OpenDataResult, ScraperError> {
        let dest_dir = self.output_dir.join(OPENDATA_DIR);
        let extracted = extract_zip(&file.content, &dest_dir)?;

        let hospital_data = read_extracted(&extracted, HOSPITAL_FILE_PREFIX)?;
        let hospitals = match &hospital_data {
            Some(data) => parse_hospitals(data)?,
            None => {
                log::warn!("Archive has no {} file", HOSPITAL_FILE_PREFIX);
                Vec::new()
            }
        };
        if hospital_data.is_some() {
            self.csv_writer(HOSPITAL_LIST_FILE).save(&hospitals)?;
        }

        let pharmacy_data = read_extracted(&extracted, PHARMACY_FILE_PREFIX)?;
        let pharmacies = match &pharmacy_data {
            Some(data) => parse_pharmacies(data)?,
            None => {
                log::warn!("Archive has no {} file", PHARMACY_FILE_PREFIX);
                Vec::new()
            }
        };
        if pharmacy_data.is_some() {
            self.csv_writer(PHARMACY_LIST_FILE).save(&pharmacies)?;
        }

        let extracted_files = extracted
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        if cleanup {
            for path in &extracted {
                if let Err(e) = std::fs::remove_file(path) {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        Ok(OpenDataResult {
            download_file: file,
            hospital_data,
            pharmacy_data,
            extracted_files,
            hospitals,
            pharmacies,
        })
    }
}

async fn read_attachment(response: Response) -> Result<(Option<String>, Vec<u8>), ScraperError> {
    let filename = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| filename_from_content_disposition(value.as_bytes()));
    let bytes = response
        .bytes()
        .await
        .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
    Ok((filename, bytes.to_vec()))
}

fn read_extracted(files: &[PathBuf], prefix: &str) -> Result<Option<ExcelData>, ScraperError> {
    let Some(path) = files.iter().find(|p| {
        p.file_name()
            .is_some_and(|n| n.to_string_lossy().contains(prefix))
    }) else {
        return Ok(None);
    };

    Ok(Some(spreadsheet::read_file(path)?))
}
