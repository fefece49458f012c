use std::collections::HashMap;
use std::sync::LazyLock;

use encoding_rs::EUC_KR;
use regex::Regex;
use scraper::ElementRef;

static RE_QUOTED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"filename="([^"]+)""#).expect("invalid regex: quoted filename")
});

static RE_EXTENDED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"filename\*=(?:UTF-8'')?([^;\s]+)").expect("invalid regex: extended filename")
});

/// Decodes text served by the portals. Valid UTF-8 is returned as is, anything
/// else is read as EUC-KR. The `encoding_rs` EUC-KR decoder covers the CP949
/// extension, so unmappable bytes become U+FFFD instead of failing.
pub fn decode_korean(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let (text, had_errors) = EUC_KR.decode_without_bom_handling(bytes);
    if had_errors {
        log::debug!("Replaced undecodable bytes while reading EUC-KR text");
    }
    text.into_owned()
}

/// Final path component of a server-supplied name, or `None` when nothing
/// usable is left (empty, `.` or `..`). Both `/` and `\` separate.
pub fn file_name_only(name: &str) -> Option<String> {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
}

/// Pulls the download filename out of a raw `Content-Disposition` header.
///
/// The portals put UTF-8 (sometimes EUC-KR) bytes straight into the header
/// and usually percent-encode them as well, so the raw bytes are decoded
/// first and percent escapes second. Only the final path component is
/// returned, so the result is safe to join onto an output directory.
pub fn filename_from_content_disposition(raw: &[u8]) -> Option<String> {
    let header = decode_korean(raw);

    let encoded = RE_QUOTED_FILENAME
        .captures(&header)
        .or_else(|| RE_EXTENDED_FILENAME.captures(&header))
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())?;

    let decoded = match urlencoding::decode(&encoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => encoded,
    };

    log::debug!("Content-Disposition: {header}");
    let Some(filename) = file_name_only(&decoded) else {
        log::warn!("Ignoring unusable download filename {decoded:?}");
        return None;
    };
    if filename != decoded {
        log::warn!("Download filename {decoded:?} reduced to {filename:?}");
    }
    log::info!("Download filename: {filename}");

    Some(filename)
}

/// Parses `?a=1&b=2` style query strings (with or without the leading path).
/// Repeated keys keep their first value.
pub fn parse_query(href: &str) -> HashMap<String, String> {
    let query = match href.split_once('?') {
        Some((_, q)) => q,
        None => href,
    };

    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

pub fn row_contains(row: &[Option<String>], needle: &str) -> bool {
    row.iter()
        .flatten()
        .any(|cell| !cell.is_empty() && cell.contains(needle))
}

pub(crate) fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
