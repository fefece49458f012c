use std::path::Path;

use super::types::DrugProduct;
use crate::record::{RecordError, map_rows};
use crate::spreadsheet::{self, ExcelData, SpreadsheetError};
use crate::utils::file_name_only;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Reads an export workbook. `None` when it holds nothing beyond the header.
pub fn parse_export(filename: &str, bytes: &[u8]) -> Result<Option<ExcelData>, ParseError> {
    let data = spreadsheet::read_bytes(filename, bytes)?;
    if data.row_count() <= 1 {
        log::info!("Export {} has no data rows", filename);
        return Ok(None);
    }
    Ok(Some(data))
}

pub fn parse_products(data: &ExcelData, first_id: usize) -> Result<Vec<DrugProduct>, ParseError> {
    Ok(map_rows(&data.rows, first_id)?)
}

/// Name under which a page is saved: the served name with the index of the
/// last row it covers appended, e.g. `의약품등_제품정보_20000.xls`.
pub fn page_filename(
    served_name: Option<&str>,
    url: &str,
    page_num: u32,
    page_size: u32,
    row_count: usize,
) -> String {
    let page_size = page_size as usize;
    let page_num = page_num as usize;
    let suffix = if row_count > page_size {
        (page_num + 1) * page_size
    } else {
        page_num * page_size + row_count.saturating_sub(1)
    };

    match served_name.and_then(file_name_only) {
        Some(name) => match name.rfind(".xls") {
            Some(pos) => format!("{}_{}{}", &name[..pos], suffix, &name[pos..]),
            None => format!("{}_{}", name, suffix),
        },
        None => url
            .split('?')
            .next()
            .map(|path| path.trim_end_matches('/'))
            .and_then(file_name_only)
            .unwrap_or_else(|| "getExcel".to_string()),
    }
}

/// Orders saved pages by the row index suffix `page_filename` appends, so
/// `_100000` sorts after `_20000`. Names without a suffix sort by name.
pub fn page_order_key(path: &Path) -> (String, u64) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match stem.rsplit_once('_') {
        Some((base, suffix)) => match suffix.parse::<u64>() {
            Ok(n) => (base.to_string(), n),
            Err(_) => (stem, 0),
        },
        None => (stem, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    fn export() -> ExcelData {
        ExcelData {
            filename: "의약품등_제품정보.xls".to_string(),
            sheet_name: Some("Sheet0".to_string()),
            rows: vec![
                cells(&["품목기준코드", "제품명", "제품영문명", "업체명"]),
                cells(&["199303108", "타이레놀정500밀리그람", "Tylenol Tab. 500mg", "(주)한국얀센"]),
                cells(&["", "", "", ""]),
                cells(&["200808876", "아모잘탄정5/50밀리그램", "", "한미약품(주)", "", "20081222"]),
            ],
            parsed_at: Local::now(),
        }
    }

    #[test]
    fn test_parse_products_skips_header_and_blank_rows() {
        let products = parse_products(&export(), 1).expect("Failed to map rows");

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, 1);
        assert_eq!(products[0].item_code.as_deref(), Some("199303108"));
        assert_eq!(products[0].product_name_eng.as_deref(), Some("Tylenol Tab. 500mg"));
        assert_eq!(products[0].approval_date, None);

        assert_eq!(products[1].id, 2);
        assert_eq!(products[1].product_name_eng, None);
        assert_eq!(products[1].approval_date.as_deref(), Some("20081222"));
        assert_eq!(products[1].main_ingredient_eng, None);
    }

    #[test]
    fn test_parse_products_continues_ids() {
        let products = parse_products(&export(), 10001).unwrap();
        assert_eq!(products[0].id, 10001);
        assert_eq!(products[1].id, 10002);
    }

    #[test]
    fn test_page_filename_full_page() {
        let name = page_filename(Some("의약품등_제품정보.xls"), "", 1, 10000, 10001);
        assert_eq!(name, "의약품등_제품정보_20000.xls");
    }

    #[test]
    fn test_page_filename_last_page() {
        let name = page_filename(Some("의약품등_제품정보.xlsx"), "", 4, 10000, 2346);
        assert_eq!(name, "의약품등_제품정보_42345.xlsx");

        let name = page_filename(Some("export"), "", 0, 100, 51);
        assert_eq!(name, "export_50");
    }

    #[test]
    fn test_page_filename_falls_back_to_url() {
        let name = page_filename(
            None,
            "https://nedrug.mfds.go.kr/searchDrug/getExcel?x=1",
            0,
            10000,
            5,
        );
        assert_eq!(name, "getExcel");
    }

    #[test]
    fn test_page_filename_keeps_only_file_name() {
        let name = page_filename(Some("../../의약품.xls"), "", 0, 100, 101);
        assert_eq!(name, "의약품_100.xls");

        let name = page_filename(Some(".."), "https://nedrug.mfds.go.kr/searchDrug/getExcel", 0, 100, 5);
        assert_eq!(name, "getExcel");

        let name = page_filename(None, "https://nedrug.mfds.go.kr/..", 0, 100, 5);
        assert_eq!(name, "getExcel");
    }

    #[test]
    fn test_page_order_key_is_numeric() {
        let mut paths = vec![
            Path::new("data/의약품등_제품정보_100000.xls").to_path_buf(),
            Path::new("data/의약품등_제품정보_20000.xls").to_path_buf(),
            Path::new("data/의약품등_제품정보_110345.xls").to_path_buf(),
            Path::new("data/의약품등_제품정보_90000.xls").to_path_buf(),
        ];
        paths.sort_by_key(|p| page_order_key(p));

        let names: Vec<_> = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "의약품등_제품정보_20000.xls",
                "의약품등_제품정보_90000.xls",
                "의약품등_제품정보_100000.xls",
                "의약품등_제품정보_110345.xls",
            ]
        );
    }

    #[test]
    fn test_page_order_key_without_suffix() {
        assert_eq!(page_order_key(Path::new("getExcel")), ("getExcel".to_string(), 0));
        assert_eq!(page_order_key(Path::new("a_b.xls")), ("a_b".to_string(), 0));
        assert_eq!(page_order_key(Path::new("a_10000.xlsx")), ("a".to_string(), 10000));
    }

    #[test]
    fn test_parse_export_rejects_non_workbook() {
        assert!(parse_export("broken.xls", b"not a workbook").is_err());
    }
}
