//! Positional mapping from table or spreadsheet rows to flat records.
//!
//! Every record type declares its columns once, in the order the portal
//! emits them. A row is zipped against that list: cell `i` lands in the field
//! named by `COLUMNS[i]`, missing trailing cells stay `None` and surplus
//! cells are dropped.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::utils::row_contains;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to map row {index} onto {record}: {source}")]
    Mapping {
        record: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A field key paired with the Korean header label the portal uses for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

impl Column {
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self { key, label }
    }
}

pub trait Record: Serialize + DeserializeOwned {
    const NAME: &'static str;
    const COLUMNS: &'static [Column];
    /// Header of the short CSV export, written after `id`.
    const SUMMARY_HEADERS: &'static [&'static str];

    fn id(&self) -> usize;

    fn set_id(&mut self, id: usize);

    fn summary(&self) -> Vec<Option<&str>>;

    fn from_row(id: usize, row: &[Option<String>]) -> Result<Self, RecordError> {
        let mut fields = Map::with_capacity(Self::COLUMNS.len() + 1);
        fields.insert("id".to_string(), Value::from(id));
        for (column, cell) in Self::COLUMNS.iter().zip(row) {
            let value = match cell {
                Some(text) => Value::String(text.clone()),
                None => Value::Null,
            };
            fields.insert(column.key.to_string(), value);
        }

        serde_json::from_value(Value::Object(fields)).map_err(|source| RecordError::Mapping {
            record: Self::NAME,
            index: id,
            source,
        })
    }

    /// Label of the first column. The portal's header row always carries it,
    /// and no data row does.
    fn header_label() -> &'static str {
        Self::COLUMNS.first().map_or("", |c| c.label)
    }
}

/// Header rows sit at the top of a sheet, after at most a few title rows.
const HEADER_SCAN_ROWS: usize = 10;

/// Assigns ids 1, 2, 3, … in the current order.
pub fn renumber<R: Record>(records: &mut [R]) {
    for (i, record) in records.iter_mut().enumerate() {
        record.set_id(i + 1);
    }
}

fn is_header_row<R: Record>(row: &[Option<String>]) -> bool {
    let label = R::header_label();
    !label.is_empty() && row_contains(row, label)
}

/// Whether one of the first rows is the header `R` expects.
pub fn has_header<R: Record>(rows: &[Vec<Option<String>>]) -> bool {
    rows.iter()
        .take(HEADER_SCAN_ROWS)
        .any(|row| is_header_row::<R>(row))
}

/// Maps spreadsheet rows, skipping blank rows and any row carrying the
/// header label. Ids continue from `first_id`.
pub fn map_rows<R: Record>(
    rows: &[Vec<Option<String>>],
    first_id: usize,
) -> Result<Vec<R>, RecordError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if is_header_row::<R>(row) || row.iter().all(Option::is_none) {
            continue;
        }
        records.push(R::from_row(first_id + records.len(), row)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hira::types::{BenefitItem, Hospital};
    use crate::nedrug::types::DrugProduct;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    #[test]
    fn test_header_label_is_first_column() {
        assert_eq!(DrugProduct::header_label(), "품목기준코드");
        assert_eq!(BenefitItem::header_label(), "연번");
        assert_eq!(Hospital::header_label(), "암호화요양기호");
    }

    #[test]
    fn test_has_header_after_title_rows() {
        let rows = vec![
            cells(&["약제급여목록및급여상한금액표"]),
            cells(&[]),
            cells(&["연번", "투여", "분류"]),
            cells(&["1", "내복", "114"]),
        ];
        assert!(has_header::<BenefitItem>(&rows));
        assert!(!has_header::<DrugProduct>(&rows));
        assert!(!has_header::<BenefitItem>(&[]));
    }

    #[test]
    fn test_map_rows_skips_header_and_blank_rows() {
        let rows = vec![
            cells(&["연번", "투여", "분류"]),
            cells(&["", ""]),
            cells(&["1", "내복", "114"]),
            cells(&["2", "주사"]),
        ];
        let items: Vec<BenefitItem> = map_rows(&rows, 5).expect("Failed to map rows");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 5);
        assert_eq!(items[0].seq.as_deref(), Some("1"));
        assert_eq!(items[1].id, 6);
        assert_eq!(items[1].route.as_deref(), Some("주사"));
    }
}
