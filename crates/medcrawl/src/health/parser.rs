use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::types::Medicine;
use crate::record::{Record, RecordError};
use crate::utils::{elem_text, normalize_whitespace};

pub(crate) const EMPTY_IMAGE_PATH: &str = "/images/img_empty3.jpg";

/// Text cells that follow the leading row-number cell.
const TEXT_CELLS: usize = 9;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid selector: {0}")]
    Selector(String),
    #[error(transparent)]
    Record(#[from] RecordError),
}

static RE_IDFY_POP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"show_idfypop\('(.+?)'\)").expect("invalid regex: show_idfypop")
});

static RE_DETAIL_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"drug_detailHref\('(.+?)'\)").expect("invalid regex: drug_detailHref")
});

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{css}: {e}")))
}

/// Parses the `#tbl_pro` result table of a search page. Ids start at
/// `first_id` and follow row order.
pub fn parse_medicine_table(html: &str, first_id: usize) -> Result<Vec<Medicine>, ParseError> {
    let document = Html::parse_document(html);
    let row_sel = selector("table#tbl_pro tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td")?;
    let img_sel = selector("td.img > img")?;
    let txt_sel = selector("td.txtL")?;

    let mut medicines = Vec::new();
    for row in document.select(&row_sel) {
        if row.select(&th_sel).next().is_some() {
            continue;
        }

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

        let code = extract_medicine_code(row, &img_sel, &txt_sel);
        let image = extract_image_url(row, &img_sel);

        cells.remove(0);
        cells.resize(TEXT_CELLS, None);
        cells.insert(1, code);
        cells.push(image);

        medicines.push(Medicine::from_row(first_id + medicines.len(), &cells)?);
    }

    log::debug!("Parsed {} medicine row(s)", medicines.len());
    Ok(medicines)
}

fn extract_medicine_code(
    row: ElementRef,
    img_sel: &Selector,
    txt_sel: &Selector,
) -> Option<String> {
    let from_image = row.select(img_sel).find_map(|img| {
        let onclick = img.value().attr("onclick")?;
        RE_IDFY_POP.captures(onclick).map(|caps| caps[1].to_string())
    });

    from_image.or_else(|| {
        row.select(txt_sel).find_map(|td| {
            let onclick = td.value().attr("onclick")?;
            RE_DETAIL_HREF
                .captures(onclick)
                .map(|caps| caps[1].to_string())
        })
    })
}

fn extract_image_url(row: ElementRef, img_sel: &Selector) -> Option<String> {
    row.select(img_sel)
        .find_map(|img| img.value().attr("src"))
        .filter(|src| *src != EMPTY_IMAGE_PATH)
        .map(str::to_string)
}
