use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{Column, Record};
use crate::spreadsheet::ExcelData;
use crate::types::DownloadFile;

const BOARD_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];

/// One row of the 병원정보서비스 spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: usize,
    pub encrypted_medical_institution_code: Option<String>,
    pub medical_institution_name: Option<String>,
    pub type_code: Option<String>,
    pub type_code_name: Option<String>,
    pub city_province_code: Option<String>,
    pub city_province_code_name: Option<String>,
    pub district_code: Option<String>,
    pub district_code_name: Option<String>,
    pub town_village: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub hospital_website: Option<String>,
    pub opening_date: Option<String>,
    pub total_doctors: Option<String>,
    pub medical_general_practitioner_count: Option<String>,
    pub medical_intern_count: Option<String>,
    pub medical_resident_count: Option<String>,
    pub medical_specialist_count: Option<String>,
    pub dental_general_practitioner_count: Option<String>,
    pub dental_intern_count: Option<String>,
    pub dental_resident_count: Option<String>,
    pub dental_specialist_count: Option<String>,
    pub korean_medicine_general_practitioner_count: Option<String>,
    pub korean_medicine_intern_count: Option<String>,
    pub korean_medicine_resident_count: Option<String>,
    pub korean_medicine_specialist_count: Option<String>,
    pub midwife_count: Option<String>,
    pub coordinate_x: Option<String>,
    pub coordinate_y: Option<String>,
}

impl Record for Hospital {
    const NAME: &'static str = "hospital";
    const COLUMNS: &'static [Column] = &[
        Column::new("encrypted_medical_institution_code", "암호화요양기호"),
        Column::new("medical_institution_name", "요양기관명"),
        Column::new("type_code", "종별코드"),
        Column::new("type_code_name", "종별코드명"),
        Column::new("city_province_code", "시도코드"),
        Column::new("city_province_code_name", "시도코드명"),
        Column::new("district_code", "시군구코드"),
        Column::new("district_code_name", "시군구코드명"),
        Column::new("town_village", "읍면동"),
        Column::new("postal_code", "우편번호"),
        Column::new("address", "주소"),
        Column::new("phone_number", "전화번호"),
        Column::new("hospital_website", "병원홈페이지"),
        Column::new("opening_date", "개설일자"),
        Column::new("total_doctors", "총의사수"),
        Column::new("medical_general_practitioner_count", "의과일반의 인원수"),
        Column::new("medical_intern_count", "의과인턴 인원수"),
        Column::new("medical_resident_count", "의과레지던트 인원수"),
        Column::new("medical_specialist_count", "의과전문의 인원수"),
        Column::new("dental_general_practitioner_count", "치과일반의 인원수"),
        Column::new("dental_intern_count", "치과인턴 인원수"),
        Column::new("dental_resident_count", "치과레지던트 인원수"),
        Column::new("dental_specialist_count", "치과전문의 인원수"),
        Column::new("korean_medicine_general_practitioner_count", "한방일반의 인원수"),
        Column::new("korean_medicine_intern_count", "한방인턴 인원수"),
        Column::new("korean_medicine_resident_count", "한방레지던트 인원수"),
        Column::new("korean_medicine_specialist_count", "한방전문의 인원수"),
        Column::new("midwife_count", "조산사 인원수"),
        Column::new("coordinate_x", "좌표(X)"),
        Column::new("coordinate_y", "좌표(Y)"),
    ];
    const SUMMARY_HEADERS: &'static [&'static str] = &["name", "address"];

    fn id(&self) -> usize {
        self.id
    }

    fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    fn summary(&self) -> Vec<Option<&str>> {
        vec![
            self.medical_institution_name.as_deref(),
            self.address.as_deref(),
        ]
    }
}

impl Hospital {
    pub fn doctor_count(&self) -> Option<u32> {
        parse_count(self.total_doctors.as_deref())
    }
}

impl Display for Hospital {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) {}",
            self.medical_institution_name.as_deref().unwrap_or("-"),
            self.type_code_name.as_deref().unwrap_or("-"),
            self.address.as_deref().unwrap_or("-")
        )
    }
}

/// One row of the 약국정보서비스 spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: usize,
    pub encrypted_medical_institution_code: Option<String>,
    pub medical_institution_name: Option<String>,
    pub type_code: Option<String>,
    pub type_code_name: Option<String>,
    pub city_province_code: Option<String>,
    pub city_province_code_name: Option<String>,
    pub district_code: Option<String>,
    pub district_code_name: Option<String>,
    pub town_village: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub opening_date: Option<String>,
    pub coordinate_x: Option<String>,
    pub coordinate_y: Option<String>,
}

impl Record for Pharmacy {
    const NAME: &'static str = "pharmacy";
    const COLUMNS: &'static [Column] = &[
        Column::new("encrypted_medical_institution_code", "암호화요양기호"),
        Column::new("medical_institution_name", "요양기관명"),
        Column::new("type_code", "종별코드"),
        Column::new("type_code_name", "종별코드명"),
        Column::new("city_province_code", "시도코드"),
        Column::new("city_province_code_name", "시도코드명"),
        Column::new("district_code", "시군구코드"),
        Column::new("district_code_name", "시군구코드명"),
        Column::new("town_village", "읍면동"),
        Column::new("postal_code", "우편번호"),
        Column::new("address", "주소"),
        Column::new("phone_number", "전화번호"),
        Column::new("opening_date", "개설일자"),
        Column::new("coordinate_x", "좌표(X)"),
        Column::new("coordinate_y", "좌표(Y)"),
    ];
    const SUMMARY_HEADERS: &'static [&'static str] = &["name", "address"];

    fn id(&self) -> usize {
        self.id
    }

    fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    fn summary(&self) -> Vec<Option<&str>> {
        vec![
            self.medical_institution_name.as_deref(),
            self.address.as_deref(),
        ]
    }
}

impl Display for Pharmacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.medical_institution_name.as_deref().unwrap_or("-"),
            self.address.as_deref().unwrap_or("-")
        )?;
        if let Some(phone) = &self.phone_number {
            write!(f, " ({})", phone)?;
        }
        Ok(())
    }
}

/// One row of the 약제급여목록표 attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitItem {
    pub id: usize,
    pub seq: Option<String>,
    pub route: Option<String>,
    pub classification: Option<String>,
    pub ingredient_code: Option<String>,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub company_name: Option<String>,
    pub standard: Option<String>,
    pub unit: Option<String>,
    pub max_price: Option<String>,
}

impl Record for BenefitItem {
    const NAME: &'static str = "benefit item";
    const COLUMNS: &'static [Column] = &[
        Column::new("seq", "연번"),
        Column::new("route", "투여"),
        Column::new("classification", "분류"),
        Column::new("ingredient_code", "주성분코드"),
        Column::new("product_code", "제품코드"),
        Column::new("product_name", "제품명"),
        Column::new("company_name", "업체명"),
        Column::new("standard", "규격"),
        Column::new("unit", "단위"),
        Column::new("max_price", "상한금액"),
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

impl Display for BenefitItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}]",
            self.product_name.as_deref().unwrap_or("-"),
            self.product_code.as_deref().unwrap_or("-")
        )?;
        if let Some(price) = &self.max_price {
            write!(f, " {}원", price)?;
        }
        Ok(())
    }
}

/// A bulletin on the 약제급여목록표 board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardItem {
    pub title: String,
    pub brd_blt_no: Option<String>,
    pub date: String,
    pub file_type: Option<String>,
    pub author: Option<String>,
    pub views: Option<u32>,
}

impl BoardItem {
    /// Builds an item from a parsed board row: title at 1, bulletin number
    /// at 2, date at 4 and the attachment type in the last cell.
    pub fn from_row(row: &[Option<String>]) -> Self {
        let text = |i: usize| row.get(i).cloned().flatten();
        let has_trailer = row.len() > 6;

        Self {
            title: text(1).unwrap_or_default(),
            brd_blt_no: text(2),
            date: text(4).unwrap_or_default(),
            file_type: row.last().cloned().flatten(),
            author: if has_trailer { text(3) } else { None },
            views: if has_trailer {
                parse_count(text(5).as_deref())
            } else {
                None
            },
        }
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        BOARD_DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(self.date.trim(), format).ok())
    }
}

impl Display for BoardItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.date, self.title)?;
        if let Some(no) = &self.brd_blt_no {
            write!(f, " #{}", no)?;
        }
        if let Some(file_type) = &self.file_type {
            write!(f, " ({})", file_type)?;
        }
        Ok(())
    }
}

/// Newest bulletin. Dates that fail to parse sort before any parsed date and
/// among themselves by their raw text.
pub fn latest_item(items: &[BoardItem]) -> Option<&BoardItem> {
    items
        .iter()
        .max_by(|a, b| (a.parsed_date(), &a.date).cmp(&(b.parsed_date(), &b.date)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub filename: String,
    pub excel_data: ExcelData,
    pub board_items: Vec<BoardItem>,
    pub items: Vec<BenefitItem>,
}

impl DownloadResult {
    pub fn latest_item(&self) -> Option<&BoardItem> {
        latest_item(&self.board_items)
    }

    pub fn total_count(&self) -> usize {
        self.items.len()
    }
}

impl Display for DownloadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "File: {}", self.filename)?;
        writeln!(f, "Board items: {}", self.board_items.len())?;
        if let Some(latest) = self.latest_item() {
            writeln!(f, "Latest: {}", latest)?;
        }
        write!(f, "Benefit items: {}", self.items.len())
    }
}

/// Outcome of the 전국 병의원 및 약국 현황 download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDataResult {
    pub download_file: DownloadFile,
    pub hospital_data: Option<ExcelData>,
    pub pharmacy_data: Option<ExcelData>,
    pub extracted_files: Vec<String>,
    pub hospitals: Vec<Hospital>,
    pub pharmacies: Vec<Pharmacy>,
}

impl OpenDataResult {
    pub fn has_hospital_data(&self) -> bool {
        self.hospital_data.as_ref().is_some_and(|d| !d.is_empty())
    }

    pub fn has_pharmacy_data(&self) -> bool {
        self.pharmacy_data.as_ref().is_some_and(|d| !d.is_empty())
    }
}

impl Display for OpenDataResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Archive: {}", self.download_file)?;
        writeln!(f, "Extracted files: {}", self.extracted_files.len())?;
        for name in &self.extracted_files {
            writeln!(f, "  {}", name)?;
        }
        writeln!(f, "Hospitals: {}", self.hospitals.len())?;
        write!(f, "Pharmacies: {}", self.pharmacies.len())
    }
}

fn parse_count(value: Option<&str>) -> Option<u32> {
    let value = value?.trim().replace(',', "");
    value
        .parse::<u32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|v| v as u32))
}
