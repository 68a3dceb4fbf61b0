use std::borrow::Cow;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252, WINDOWS_1258};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::textutil::vietnamese_count;

/// A decoding of a table file is taken once its sample holds more than this many
/// Vietnamese-range code points.
pub const TABLE_ENCODING_MIN_VIETNAMESE: usize = 50;
/// Chars inspected per candidate decoding.
pub const TABLE_ENCODING_SAMPLE_CHARS: usize = 2000;

/// A source table as retrieved: optional header row plus data rows of plain strings. Column
/// meaning is assigned later by [`super::ColumnIdentifier`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Widest of the header row and every data row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Cells of one column, skipping rows too short to have it.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .filter_map(move |r| r.get(col).map(String::as_str))
    }
}

/// Parses one CSV document. With `has_header` the first record becomes the header row.
pub fn table_from_csv(text: &str, has_header: bool) -> std::result::Result<RawTable, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(has_header)
        .trim(Trim::None)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = if has_header {
        reader.headers()?.iter().map(str::to_string).collect()
    } else {
        Vec::new()
    };
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(RawTable { headers, rows })
}

/// Parses `[{"headers": [...], "rows": [[...], ...]}, ...]`; a single object is accepted too.
pub fn tables_from_json(text: &str) -> std::result::Result<Vec<RawTable>, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<RawTable>),
        One(RawTable),
    }
    Ok(match serde_json::from_str(text)? {
        OneOrMany::Many(tables) => tables,
        OneOrMany::One(table) => vec![table],
    })
}

/// Decodes a saved table whose charset is unknown.
///
/// A byte order mark wins. Otherwise strict UTF-8, ISO-8859-1, Windows-1252 and Windows-1258
/// are tried in that order and the first one with more than
/// [`TABLE_ENCODING_MIN_VIETNAMESE`] Vietnamese-range code points is used. Short tables fall
/// back to UTF-8 when the bytes are valid UTF-8, else to Windows-1252.
pub fn decode_table_bytes(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_with_bom_removal(bytes);
        return text;
    }
    let utf8 = UTF_8.decode_without_bom_handling_and_without_replacement(bytes);
    match utf8 {
        Some(text) if rich_in_vietnamese(&text) => return text,
        _ => {}
    }
    let latin1 = encoding_rs::mem::decode_latin1(bytes);
    if rich_in_vietnamese(&latin1) {
        tracing::debug!(encoding = "ISO-8859-1", "table decoded");
        return latin1;
    }
    for encoding in [WINDOWS_1252, WINDOWS_1258] {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors && rich_in_vietnamese(&text) {
            tracing::debug!(encoding = encoding.name(), "table decoded");
            return text;
        }
    }
    match utf8 {
        Some(text) => text,
        None => {
            tracing::debug!(encoding = WINDOWS_1252.name(), "table is not UTF-8, falling back");
            WINDOWS_1252.decode_without_bom_handling(bytes).0
        }
    }
}

fn rich_in_vietnamese(text: &str) -> bool {
    vietnamese_count(text, TABLE_ENCODING_SAMPLE_CHARS) > TABLE_ENCODING_MIN_VIETNAMESE
}

/// Loads raw tables from `.json` documents or CSV files, in argument order.
pub fn load_tables(paths: &[impl AsRef<Path>], has_header: bool) -> Result<Vec<RawTable>> {
    let mut tables = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let text = decode_table_bytes(&bytes);
        let text = text.as_ref();
        let invalid = |reason: String| Error::TableInput {
            path: path.to_path_buf(),
            reason,
        };
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            tables.extend(tables_from_json(text).map_err(|e| invalid(e.to_string()))?);
        } else {
            tables.push(table_from_csv(text, has_header).map_err(|e| invalid(e.to_string()))?);
        }
    }
    Ok(tables)
}
