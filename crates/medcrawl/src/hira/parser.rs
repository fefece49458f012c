use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use zip::ZipArchive;

use super::types::{BenefitItem, BoardItem, Hospital, Pharmacy};
use crate::record::{RecordError, map_rows};
use crate::spreadsheet::{ExcelData, SpreadsheetError};
use crate::utils::{decode_korean, elem_text, file_name_only, normalize_whitespace, parse_query};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid selector: {0}")]
    Selector(String),
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Failed to read archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

static RE_FILE_DOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fn_fileDown\('(.+?)'\)").expect("invalid regex: fn_fileDown"));

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{css}: {e}")))
}

/// Parses the 약제급여목록표 bulletin list.
///
/// Each row becomes its cell texts with the `brdBltNo` of the title link
/// inserted at position 2 and the last cell replaced by the attachment icon
/// title.
pub fn parse_board(html: &str) -> Result<Vec<BoardItem>, ParseError> {
    let document = Html::parse_document(html);
    let row_sel = selector("div.tb-type01 > table > tbody > tr")?;
    let td_sel = selector("td")?;
    let link_sel = selector("td.col-tit a[href]")?;
    let file_sel = selector("td.col-file i[title]")?;

    let mut items = Vec::new();
    for row in document.select(&row_sel) {
        let mut cells: Vec<Option<String>> = row
            .select(&td_sel)
            .map(|td| {
                let text = normalize_whitespace(&elem_text(td));
                (!text.is_empty()).then_some(text)
            })
            .collect();
        if cells.is_empty() {
            continue;
        }

        let brd_blt_no = row
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| parse_query(href).remove("brdBltNo"));
        let file_type = row
            .select(&file_sel)
            .next()
            .and_then(|i| i.value().attr("title"))
            .map(str::to_string);

        cells.insert(cells.len().min(2), brd_blt_no);
        if let Some(last) = cells.last_mut() {
            *last = file_type;
        }

        items.push(BoardItem::from_row(&cells));
    }

    log::debug!("Parsed {} board item(s)", items.len());
    Ok(items)
}

/// Attachment codes on the open-data page, highest first.
pub fn parse_download_codes(html: &str) -> Result<Vec<String>, ParseError> {
    let document = Html::parse_document(html);
    let link_sel = selector("dl.fileList.ml00 dd ul li a[href]")?;

    let mut codes: Vec<String> = document
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| RE_FILE_DOWN.captures(href).map(|caps| caps[1].to_string()))
        .collect();
    codes.sort_by(|a, b| b.cmp(a));

    log::debug!("Download codes: {codes:?}");
    Ok(codes)
}

pub fn parse_benefits(data: &ExcelData) -> Result<Vec<BenefitItem>, ParseError> {
    Ok(map_rows(&data.rows, 1)?)
}

pub fn parse_hospitals(data: &ExcelData) -> Result<Vec<Hospital>, ParseError> {
    Ok(map_rows(&data.rows, 1)?)
}

pub fn parse_pharmacies(data: &ExcelData) -> Result<Vec<Pharmacy>, ParseError> {
    Ok(map_rows(&data.rows, 1)?)
}

/// Extracts every file of a ZIP archive flat into `dest_dir`.
///
/// Entry names that are not valid UTF-8 are decoded as EUC-KR, and only the
/// final path component is kept. Returns the written paths in archive order.
pub fn extract_zip(bytes: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>, ParseError> {
    std::fs::create_dir_all(dest_dir)?;
    let mut archive = ZipArchive::new(std::io::Cursor::new(bytes))?;

    let mut extracted = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let Some(name) = entry_file_name(entry.name_raw()) else {
            log::warn!("Skipping archive entry {} with an empty name", i);
            continue;
        };

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;

        let path = dest_dir.join(&name);
        std::fs::write(&path, &buf)?;
        log::info!("Extracted {}", path.display());
        extracted.push(path);
    }

    Ok(extracted)
}

pub(crate) fn entry_file_name(raw: &[u8]) -> Option<String> {
    file_name_only(&decode_korean(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    use chrono::Local;
    use encoding_rs::EUC_KR;
    use zip::write::SimpleFileOptions;

    use crate::hira::types::latest_item;

    fn board_fixture() -> String {
        fs::read_to_string("fixtures/hira/board.html").expect("Failed to read fixture")
    }

    fn opendata_fixture() -> String {
        fs::read_to_string("fixtures/hira/opendata.html").expect("Failed to read fixture")
    }

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    fn sheet(filename: &str, rows: Vec<Vec<Option<String>>>) -> ExcelData {
        ExcelData {
            filename: filename.to_string(),
            sheet_name: Some("Sheet1".to_string()),
            rows,
            parsed_at: Local::now(),
        }
    }

    #[test]
    fn test_parse_board() {
        let items = parse_board(&board_fixture()).expect("Failed to parse board");

        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(
            first.title,
            "약제급여목록및급여상한금액표(2025.1.1.적용)"
        );
        assert_eq!(first.brd_blt_no.as_deref(), Some("1453"));
        assert_eq!(first.date, "2024-12-27");
        assert_eq!(first.file_type.as_deref(), Some("엑셀파일"));
        assert_eq!(first.author.as_deref(), Some("약제관리실"));
        assert_eq!(first.views, Some(5821));

        let third = &items[2];
        assert_eq!(third.brd_blt_no, None, "Row without a title link");
        assert_eq!(third.file_type, None, "Row without an attachment icon");
    }

    #[test]
    fn test_latest_board_item() {
        let items = parse_board(&board_fixture()).unwrap();
        let latest = latest_item(&items).unwrap();
        assert_eq!(latest.brd_blt_no.as_deref(), Some("1453"));
    }

    #[test]
    fn test_parse_board_without_table() {
        assert!(parse_board("<html><body></body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_parse_download_codes_sorted_descending() {
        let codes = parse_download_codes(&opendata_fixture()).expect("Failed to parse codes");
        assert_eq!(codes, vec!["301122", "295053", "288470"]);
    }

    #[test]
    fn test_parse_benefits_skips_header() {
        let data = sheet(
            "약제급여목록.xlsx",
            vec![
                cells(&["연번", "투여", "분류", "주성분코드", "제품코드", "제품명", "업체명"]),
                cells(&["1", "내복", "114", "101301ATB", "645301220", "아세트아미노펜정", "(주)한국얀센"]),
                cells(&[]),
                cells(&["2", "주사", "131", "101302BIJ", "671800030", "아미카신주", "신풍제약(주)", "2mL", "병", "1019"]),
            ],
        );
        let items = parse_benefits(&data).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].product_name.as_deref(), Some("아세트아미노펜정"));
        assert_eq!(items[1].id, 2);
        assert_eq!(items[1].max_price.as_deref(), Some("1019"));
    }

    #[test]
    fn test_parse_institutions_skip_header() {
        let data = sheet(
            "2.약국정보서비스.xlsx",
            vec![
                cells(&["암호화요양기호", "요양기관명", "종별코드", "종별코드명"]),
                cells(&["JDQ4", "온누리약국", "81", "약국", "110000", "서울", "110019", "서울중랑구", "", "02063", "서울특별시 중랑구 망우로 200"]),
            ],
        );

        let pharmacies = parse_pharmacies(&data).unwrap();
        assert_eq!(pharmacies.len(), 1);
        assert_eq!(pharmacies[0].medical_institution_name.as_deref(), Some("온누리약국"));
        assert_eq!(pharmacies[0].town_village, None);
        assert_eq!(
            pharmacies[0].address.as_deref(),
            Some("서울특별시 중랑구 망우로 200")
        );

        let hospitals = parse_hospitals(&data).unwrap();
        assert_eq!(hospitals[0].type_code_name.as_deref(), Some("약국"));
    }

    #[test]
    fn test_entry_file_name() {
        let (raw, _, _) = EUC_KR.encode("전국 병의원 및 약국 현황/1.병원정보서비스.xlsx");
        assert_eq!(
            entry_file_name(&raw).as_deref(),
            Some("1.병원정보서비스.xlsx")
        );
        assert_eq!(
            entry_file_name("dir\\2.약국정보서비스.xlsx".as_bytes()).as_deref(),
            Some("2.약국정보서비스.xlsx")
        );
        assert_eq!(entry_file_name(b"folder/"), None);
        assert_eq!(entry_file_name(b"../"), None);
    }

    #[test]
    fn test_extract_zip_flattens_paths() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.add_directory("현황/", options).unwrap();
        writer.start_file("현황/1.병원정보서비스.xlsx", options).unwrap();
        writer.write_all(b"hospitals").unwrap();
        writer.start_file("2.약국정보서비스.xlsx", options).unwrap();
        writer.write_all(b"pharmacies").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("opendata_hira_data");
        let files = extract_zip(&bytes, &dest).expect("Failed to extract archive");

        assert_eq!(
            files,
            vec![
                dest.join("1.병원정보서비스.xlsx"),
                dest.join("2.약국정보서비스.xlsx")
            ]
        );
        assert_eq!(fs::read(&files[0]).unwrap(), b"hospitals");
        assert_eq!(fs::read(&files[1]).unwrap(), b"pharmacies");
    }

    #[test]
    fn test_extract_zip_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_zip(b"not a zip", dir.path()).is_err());
    }
}
