use std::fmt::Display;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::record::{Column, Record};
use crate::types::DownloadFile;

const CANCELLED: &str = "취소";
const PROFESSIONAL: &str = "전문의약품";

/// One product row of the 의약품등 제품정보 export, in export column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugProduct {
    pub id: usize,
    pub item_code: Option<String>,
    pub product_name: Option<String>,
    pub product_name_eng: Option<String>,
    pub company_name: Option<String>,
    pub company_name_eng: Option<String>,
    pub approval_date: Option<String>,
    pub item_category: Option<String>,
    pub approval_number: Option<String>,
    pub cancel_status: Option<String>,
    pub cancel_date: Option<String>,
    pub main_ingredient: Option<String>,
    pub additives: Option<String>,
    pub item_classification: Option<String>,
    pub prescription_type: Option<String>,
    pub finished_or_raw: Option<String>,
    pub approval_type: Option<String>,
    pub manufacture_or_import: Option<String>,
    pub narcotic_classification: Option<String>,
    pub shape: Option<String>,
    pub color: Option<String>,
    pub formulation: Option<String>,
    pub major_axis: Option<String>,
    pub minor_axis: Option<String>,
    pub new_drug_status: Option<String>,
    pub standard_code_name: Option<String>,
    pub atc_code: Option<String>,
    pub bundled_drug_info: Option<String>,
    pub e_drug_info: Option<String>,
    pub import_country: Option<String>,
    pub main_ingredient_eng: Option<String>,
}

impl Record for DrugProduct {
    const NAME: &'static str = "drug product";
    const COLUMNS: &'static [Column] = &[
        Column::new("item_code", "품목기준코드"),
        Column::new("product_name", "제품명"),
        Column::new("product_name_eng", "제품영문명"),
        Column::new("company_name", "업체명"),
        Column::new("company_name_eng", "업체영문명"),
        Column::new("approval_date", "허가일"),
        Column::new("item_category", "품목구분"),
        Column::new("approval_number", "허가번호"),
        Column::new("cancel_status", "취소/취하"),
        Column::new("cancel_date", "취소/취하일자"),
        Column::new("main_ingredient", "주성분"),
        Column::new("additives", "첨가제"),
        Column::new("item_classification", "품목분류"),
        Column::new("prescription_type", "전문의약품"),
        Column::new("finished_or_raw", "완제/원료"),
        Column::new("approval_type", "허가/신고"),
        Column::new("manufacture_or_import", "제조/수입"),
        Column::new("narcotic_classification", "마약구분"),
        Column::new("shape", "모양"),
        Column::new("color", "색상"),
        Column::new("formulation", "제형"),
        Column::new("major_axis", "장축"),
        Column::new("minor_axis", "단축"),
        Column::new("new_drug_status", "신약구분"),
        Column::new("standard_code_name", "표준코드명"),
        Column::new("atc_code", "ATC코드"),
        Column::new("bundled_drug_info", "묶음의약품정보"),
        Column::new("e_drug_info", "e은약요"),
        Column::new("import_country", "수입제조국"),
        Column::new("main_ingredient_eng", "주성분영문"),
    ];
    const SUMMARY_HEADERS: &'static [&'static str] = &["name"];

    fn id(&self) -> usize {
        self.id
    }

    fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    fn summary(&self) -> Vec<Option<&str>> {
        vec![self.product_name.as_deref()]
    }
}

impl DrugProduct {
    pub fn is_cancelled(&self) -> bool {
        self.cancel_status.as_deref() == Some(CANCELLED) || self.cancel_date.is_some()
    }

    pub fn is_professional(&self) -> bool {
        self.prescription_type.as_deref() == Some(PROFESSIONAL)
    }
}

impl Display for DrugProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}]",
            self.product_name.as_deref().unwrap_or("-"),
            self.item_code.as_deref().unwrap_or("-")
        )?;
        if let Some(company) = &self.company_name {
            write!(f, " — {}", company)?;
        }
        if let Some(kind) = &self.prescription_type {
            write!(f, " · {}", kind)?;
        }
        if self.is_cancelled() {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Filters of the detail search form. Empty strings mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub item_name: String,
    pub item_name_eng: String,
    pub company_name: String,
    pub company_name_eng: String,
    pub ingredient_name: String,
    pub item_seq: String,
    pub standard_code: String,
    pub atc_code: String,
    pub cancel_code: String,
    pub etc_otc_code: String,
    pub narcotic_kind_code: String,
    pub start_permit_date: String,
    pub end_permit_date: String,
}

impl SearchParams {
    /// Builds the export form for the `page_num`-th block of `page_size` rows.
    pub fn to_payload(&self, page_num: u32, page_size: u32) -> Vec<(&'static str, String)> {
        let offset = u64::from(page_num) * u64::from(page_size);
        vec![
            ("ExcelRowdata", offset.to_string()),
            ("excelSearchCnt", page_size.to_string()),
            ("page", "1".to_string()),
            ("sort", String::new()),
            ("sortOrder", String::new()),
            ("searchYn", String::new()),
            ("searchDivision", "detail".to_string()),
            ("itemName", self.item_name.clone()),
            ("itemEngName", self.item_name_eng.clone()),
            ("entpName", self.company_name.clone()),
            ("entpEngName", self.company_name_eng.clone()),
            ("ingrName1", self.ingredient_name.clone()),
            ("ingrName2", String::new()),
            ("ingrName3", String::new()),
            ("ingrEngName", String::new()),
            ("itemSeq", self.item_seq.clone()),
            ("stdrCodeName", self.standard_code.clone()),
            ("atcCodeName", self.atc_code.clone()),
            ("indutyClassCode", String::new()),
            ("sClassNo", String::new()),
            ("narcoticKindCode", self.narcotic_kind_code.clone()),
            ("cancelCode", self.cancel_code.clone()),
            ("etcOtcCode", self.etc_otc_code.clone()),
            ("makeMaterialGb", String::new()),
            ("searchConEe", "AND".to_string()),
            ("eeDocData", String::new()),
            ("searchConUd", "AND".to_string()),
            ("udDocData", String::new()),
            ("searchConNb", "AND".to_string()),
            ("nbDocData", String::new()),
            ("startPermitDate", self.start_permit_date.clone()),
            ("endPermitDate", self.end_permit_date.clone()),
        ]
    }
}

/// Result of one export request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub page_num: u32,
    pub filename: Option<String>,
    pub download_file: Option<DownloadFile>,
    pub products: Vec<DrugProduct>,
    pub has_more: bool,
}

impl PageResult {
    pub fn empty(page_num: u32) -> Self {
        Self {
            page_num,
            filename: None,
            download_file: None,
            products: Vec::new(),
            has_more: false,
        }
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub products: Vec<DrugProduct>,
    pub page_results: Vec<PageResult>,
    pub total_pages: usize,
    pub downloaded_at: DateTime<Local>,
}

impl DownloadResult {
    pub fn total_count(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get_by_item_code(&self, item_code: &str) -> Option<&DrugProduct> {
        self.products
            .iter()
            .find(|p| p.item_code.as_deref() == Some(item_code))
    }

    pub fn filter_by_company(&self, company_name: &str) -> Vec<&DrugProduct> {
        self.products
            .iter()
            .filter(|p| {
                p.company_name
                    .as_deref()
                    .is_some_and(|c| c.contains(company_name))
            })
            .collect()
    }

    pub fn filter_active(&self) -> Vec<&DrugProduct> {
        self.products.iter().filter(|p| !p.is_cancelled()).collect()
    }

    pub fn filter_professional(&self) -> Vec<&DrugProduct> {
        self.products.iter().filter(|p| p.is_professional()).collect()
    }

    pub fn filter_general(&self) -> Vec<&DrugProduct> {
        self.products.iter().filter(|p| !p.is_professional()).collect()
    }
}

impl Display for DownloadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Pages:                 {}", self.total_pages)?;
        writeln!(f, "  Professional products: {}", self.filter_professional().len())?;
        writeln!(f, "  General products:      {}", self.filter_general().len())?;
        writeln!(f, "  Active products:       {}", self.filter_active().len())?;
        writeln!(f, "  Total:                 {}", self.total_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(code: &str, company: &str, kind: &str, cancel: Option<&str>) -> DrugProduct {
        DrugProduct {
            item_code: Some(code.to_string()),
            company_name: Some(company.to_string()),
            prescription_type: Some(kind.to_string()),
            cancel_status: cancel.map(str::to_string),
            ..Default::default()
        }
    }

    fn result() -> DownloadResult {
        DownloadResult {
            products: vec![
                product("199303108", "(주)한국얀센", "일반의약품", None),
                product("200808876", "한미약품(주)", "전문의약품", None),
                product("201405321", "한미약품(주)", "전문의약품", Some("취소")),
            ],
            page_results: Vec::new(),
            total_pages: 1,
            downloaded_at: Local::now(),
        }
    }

    #[test]
    fn test_payload_offsets() {
        let params = SearchParams {
            item_name: "타이레놀".to_string(),
            ..Default::default()
        };

        let payload = params.to_payload(2, 10000);
        assert_eq!(payload[0], ("ExcelRowdata", "20000".to_string()));
        assert_eq!(payload[1], ("excelSearchCnt", "10000".to_string()));
        assert!(payload.contains(&("itemName", "타이레놀".to_string())));
        assert!(payload.contains(&("searchDivision", "detail".to_string())));
        assert_eq!(payload.len(), 32);
    }

    #[test]
    fn test_column_order_matches_fields() {
        let value = serde_json::to_value(DrugProduct::default()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), DrugProduct::COLUMNS.len() + 1);

        let mut full = vec![Some("x".to_string()); DrugProduct::COLUMNS.len()];
        full[29] = Some("acetaminophen".to_string());
        let mapped = DrugProduct::from_row(1, &full).unwrap();
        assert_eq!(mapped.main_ingredient_eng.as_deref(), Some("acetaminophen"));
    }

    #[test]
    fn test_cancel_and_prescription_flags() {
        let r = result();
        assert!(!r.products[0].is_cancelled());
        assert!(r.products[2].is_cancelled());

        let dated = DrugProduct {
            cancel_date: Some("2020-01-01".to_string()),
            ..Default::default()
        };
        assert!(dated.is_cancelled());

        assert!(r.products[1].is_professional());
        assert!(!r.products[0].is_professional());
    }

    #[test]
    fn test_download_result_filters() {
        let r = result();
        assert_eq!(r.total_count(), 3);
        assert_eq!(
            r.get_by_item_code("200808876").and_then(|p| p.company_name.as_deref()),
            Some("한미약품(주)")
        );
        assert!(r.get_by_item_code("000").is_none());
        assert_eq!(r.filter_by_company("한미").len(), 2);
        assert_eq!(r.filter_active().len(), 2);
        assert_eq!(r.filter_professional().len(), 2);
        assert_eq!(r.filter_general().len(), 1);
    }
}
