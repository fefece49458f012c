use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::record::{Column, Record};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: usize,
    pub name: Option<String>,
    pub code: Option<String>,
    pub ingredient: Option<String>,
    pub effect: Option<String>,
    pub company: Option<String>,
    pub category: Option<String>,
    pub form: Option<String>,
    pub expert: Option<String>,
    pub insurance: Option<String>,
    pub bioequiv: Option<String>,
    pub image: Option<String>,
}

impl Record for Medicine {
    const NAME: &'static str = "medicine";
    const COLUMNS: &'static [Column] = &[
        Column::new("name", "제품명"),
        Column::new("code", "약품코드"),
        Column::new("ingredient", "성분명"),
        Column::new("effect", "효능"),
        Column::new("company", "업체명"),
        Column::new("category", "구분"),
        Column::new("form", "제형"),
        Column::new("expert", "전문/일반"),
        Column::new("insurance", "급여정보"),
        Column::new("bioequiv", "생동성"),
        Column::new("image", "식별"),
    ];
    const SUMMARY_HEADERS: &'static [&'static str] = &["name"];

    fn id(&self) -> usize {
        self.id
    }

    fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    fn summary(&self) -> Vec<Option<&str>> {
        vec![self.name.as_deref()]
    }
}

impl Display for Medicine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("-"))?;
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(company) = &self.company {
            write!(f, " — {}", company)?;
        }
        if let Some(ingredient) = &self.ingredient {
            write!(f, "\n     Ingredient: {}", ingredient)?;
        }
        match (&self.expert, &self.insurance) {
            (Some(expert), Some(insurance)) => write!(f, "\n     {} · {}", expert, insurance),
            (Some(expert), None) => write!(f, "\n     {}", expert),
            _ => Ok(()),
        }
    }
}

/// The detail-search form of the drug search page, in the order the browser
/// submits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPayload {
    pub req_page: u32,
    pub listup: u32,
    pub search_drugnm_initial: String,
    pub inner_search_word: String,
    pub origin_cnt: String,
    pub inner_search_flag: String,
    pub inner_match_value: String,
    pub input_drug_nm: String,
    pub input_upso_nm: String,
    pub cbx_sunbcnt: String,
    pub cbx_class: String,
    pub anchor_dosage_route_hidden: String,
    pub mfds_cd: String,
    pub mfds_cdword: String,
    pub input_hiraingdcd: String,
    pub search_sunb1: String,
    pub search_sunb2: String,
    pub search_sunb3: String,
    pub sunb_equals1: String,
    pub sunb_equals2: String,
    pub sunb_equals3: String,
    pub sunb_where1: String,
    pub sunb_where2: String,
    pub search_effect: String,
    pub cbx_bohtype: String,
    pub search_bohcode: String,
    pub anchor_form_info_hidden: String,
    pub cbx_narcotic: String,
    pub atccode_val: String,
    pub atccode_name: String,
    pub kpic_atc_nm_opener: String,
    pub kpic_atc_nm: String,
    pub cbx_bio: String,
    pub icode: String,
    pub ori_search_word: String,
    pub search_flag: String,
    pub movefrom: String,
    pub viewmode: String,
    pub more: String,
}

impl Default for SearchPayload {
    fn default() -> Self {
        Self {
            req_page: 1,
            listup: 1000,
            search_drugnm_initial: String::new(),
            inner_search_word: String::new(),
            origin_cnt: String::new(),
            inner_search_flag: String::new(),
            inner_match_value: String::new(),
            input_drug_nm: String::new(),
            input_upso_nm: String::new(),
            cbx_sunbcnt: "0".to_string(),
            cbx_class: "0".to_string(),
            anchor_dosage_route_hidden: String::new(),
            mfds_cd: String::new(),
            mfds_cdword: String::new(),
            input_hiraingdcd: String::new(),
            search_sunb1: String::new(),
            search_sunb2: String::new(),
            search_sunb3: String::new(),
            sunb_equals1: String::new(),
            sunb_equals2: String::new(),
            sunb_equals3: String::new(),
            sunb_where1: "and".to_string(),
            sunb_where2: "and".to_string(),
            search_effect: String::new(),
            cbx_bohtype: String::new(),
            search_bohcode: String::new(),
            anchor_form_info_hidden: String::new(),
            cbx_narcotic: String::new(),
            atccode_val: String::new(),
            atccode_name: String::new(),
            kpic_atc_nm_opener: String::new(),
            kpic_atc_nm: String::new(),
            cbx_bio: String::new(),
            icode: String::new(),
            ori_search_word: String::new(),
            search_flag: String::new(),
            movefrom: "drug".to_string(),
            viewmode: String::new(),
            more: String::new(),
        }
    }
}

impl SearchPayload {
    pub fn for_initial(initial: &str, page: u32, page_size: u32) -> Self {
        Self {
            req_page: page,
            listup: page_size,
            search_drugnm_initial: initial.to_string(),
            ..Default::default()
        }
    }

    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("req_page", self.req_page.to_string()),
            ("listup", self.listup.to_string()),
            ("search_drugnm_initial", self.search_drugnm_initial.clone()),
            ("inner_search_word", self.inner_search_word.clone()),
            ("origin_cnt", self.origin_cnt.clone()),
            ("inner_search_flag", self.inner_search_flag.clone()),
            ("inner_match_value", self.inner_match_value.clone()),
            ("input_drug_nm", self.input_drug_nm.clone()),
            ("input_upsoNm", self.input_upso_nm.clone()),
            ("cbx_sunbcnt", self.cbx_sunbcnt.clone()),
            ("cbx_class", self.cbx_class.clone()),
            (
                "anchor_dosage_route_hidden",
                self.anchor_dosage_route_hidden.clone(),
            ),
            ("mfds_cd", self.mfds_cd.clone()),
            ("mfds_cdword", self.mfds_cdword.clone()),
            ("input_hiraingdcd", self.input_hiraingdcd.clone()),
            ("search_sunb1", self.search_sunb1.clone()),
            ("search_sunb2", self.search_sunb2.clone()),
            ("search_sunb3", self.search_sunb3.clone()),
            ("sunb_equals1", self.sunb_equals1.clone()),
            ("sunb_equals2", self.sunb_equals2.clone()),
            ("sunb_equals3", self.sunb_equals3.clone()),
            ("sunb_where1", self.sunb_where1.clone()),
            ("sunb_where2", self.sunb_where2.clone()),
            ("search_effect", self.search_effect.clone()),
            ("cbx_bohtype", self.cbx_bohtype.clone()),
            ("search_bohcode", self.search_bohcode.clone()),
            ("anchor_form_info_hidden", self.anchor_form_info_hidden.clone()),
            ("cbx_narcotic", self.cbx_narcotic.clone()),
            ("atccode_val", self.atccode_val.clone()),
            ("atccode_name", self.atccode_name.clone()),
            ("kpic_atc_nm_opener", self.kpic_atc_nm_opener.clone()),
            ("kpic_atc_nm", self.kpic_atc_nm.clone()),
            ("cbx_bio", self.cbx_bio.clone()),
            ("icode", self.icode.clone()),
            ("ori_search_word", self.ori_search_word.clone()),
            ("search_flag", self.search_flag.clone()),
            ("movefrom", self.movefrom.clone()),
            ("viewmode", self.viewmode.clone()),
            ("more", self.more.clone()),
        ]
    }

    pub fn to_urlencoded(&self) -> String {
        crate::client::encode_form(&self.to_form())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_urlencoded() {
        let payload = SearchPayload::for_initial("ㄱ", 3, 1000);
        let body = payload.to_urlencoded();

        assert!(body.starts_with("req_page=3&listup=1000&search_drugnm_initial=%E3%84%B1&"));
        assert!(body.contains("&input_upsoNm=&cbx_sunbcnt=0&cbx_class=0&"));
        assert!(body.contains("&sunb_where1=and&sunb_where2=and&"));
        assert!(body.ends_with("&movefrom=drug&viewmode=&more="));
        assert_eq!(payload.to_form().len(), 39);
    }

    #[test]
    fn test_medicine_positional_mapping() {
        let row: Vec<Option<String>> = vec![
            Some("타이레놀정500밀리그람".into()),
            Some("A11AOOOOO3520".into()),
            Some("acetaminophen".into()),
            Some("해열진통제".into()),
            Some("(주)한국얀센".into()),
            Some("일반".into()),
            Some("정제".into()),
            Some("일반의약품".into()),
            None,
            Some("-".into()),
            Some("/images/drug/1.jpg".into()),
            Some("surplus".into()),
        ];

        let medicine = Medicine::from_row(7, &row).unwrap();
        assert_eq!(medicine.id, 7);
        assert_eq!(medicine.name.as_deref(), Some("타이레놀정500밀리그람"));
        assert_eq!(medicine.company.as_deref(), Some("(주)한국얀센"));
        assert_eq!(medicine.insurance, None);
        assert_eq!(medicine.image.as_deref(), Some("/images/drug/1.jpg"));
    }

    #[test]
    fn test_medicine_missing_trailing_columns() {
        let medicine = Medicine::from_row(1, &[Some("게보린정".into())]).unwrap();
        assert_eq!(medicine.name.as_deref(), Some("게보린정"));
        assert_eq!(medicine.code, None);
        assert_eq!(medicine.image, None);
    }
}
