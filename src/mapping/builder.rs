use super::columns::{ColumnIdentifier, ColumnRoles};
use super::table::RawTable;
use super::CharacterMapping;
use crate::error::{Error, Result};
use crate::repair::repair;
use crate::textutil::single_char;

/// Per-table diagnostics. Informational only; the mapping is the product.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableReport {
    pub table: usize,
    /// `None` when the table was skipped because its columns could not be identified.
    pub roles: Option<ColumnRoles>,
    pub rows_seen: usize,
    pub rows_accepted: usize,
    /// Pairs whose legacy char was already mapped by an earlier row or table.
    pub duplicates: usize,
    pub hex_skipped: usize,
}

#[derive(Clone, Debug)]
pub struct BuiltMapping {
    pub mapping: CharacterMapping,
    pub tables: Vec<TableReport>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MapBuilder {
    identifier: ColumnIdentifier,
}

impl MapBuilder {
    #[must_use]
    pub fn new(identifier: ColumnIdentifier) -> Self {
        Self { identifier }
    }

    /// Merges every identifiable table, in order, into one mapping. Earlier tables are more
    /// authoritative: a legacy char keeps the first value it was given.
    pub fn build(&self, tables: &[RawTable]) -> Result<BuiltMapping> {
        let mut mapping = CharacterMapping::new();
        let mut reports = Vec::with_capacity(tables.len());

        for (idx, table) in tables.iter().enumerate() {
            let Some(roles) = self.identifier.identify(table) else {
                tracing::warn!(
                    width = table.width(),
                    rows = table.rows.len(),
                    "{}; table skipped",
                    Error::ColumnIdentificationFailed { table: idx }
                );
                reports.push(TableReport {
                    table: idx,
                    rows_seen: table.rows.len(),
                    ..TableReport::default()
                });
                continue;
            };
            let report = extract_pairs(idx, table, roles, &mut mapping);
            tracing::info!(
                table = idx,
                legacy_column = roles.legacy,
                unicode_column = roles.unicode,
                hex = roles.unicode_is_hex,
                rows_seen = report.rows_seen,
                rows_accepted = report.rows_accepted,
                duplicates = report.duplicates,
                hex_skipped = report.hex_skipped,
                "table merged"
            );
            reports.push(report);
        }

        if mapping.is_empty() {
            return Err(Error::NoMappingFound);
        }
        tracing::info!(entries = mapping.len(), "mapping built");
        Ok(BuiltMapping {
            mapping,
            tables: reports,
        })
    }
}

fn extract_pairs(
    idx: usize,
    table: &RawTable,
    roles: ColumnRoles,
    mapping: &mut CharacterMapping,
) -> TableReport {
    let mut report = TableReport {
        table: idx,
        roles: Some(roles),
        ..TableReport::default()
    };

    for row in 0..table.rows.len() {
        report.rows_seen += 1;
        let (Some(unicode_raw), Some(legacy_raw)) =
            (table.cell(row, roles.unicode), table.cell(row, roles.legacy))
        else {
            continue;
        };
        let unicode_text = repair(unicode_raw.trim());
        let legacy_text = repair(legacy_raw.trim());
        let (unicode_text, legacy_text) = (unicode_text.trim(), legacy_text.trim());
        if is_blank(unicode_text) || is_blank(legacy_text) {
            continue;
        }

        let unicode = if roles.unicode_is_hex {
            match parse_unicode_hex(unicode_text) {
                Ok(ch) => Some(ch),
                Err(e) => {
                    tracing::debug!(table = idx, row, "{e}");
                    report.hex_skipped += 1;
                    continue;
                }
            }
        } else if has_code_point_prefix(unicode_text) {
            parse_unicode_hex(unicode_text)
                .ok()
                .or_else(|| single_char(unicode_text))
        } else {
            single_char(unicode_text)
        };

        let (Some(legacy), Some(unicode)) = (single_char(legacy_text), unicode) else {
            continue;
        };
        if mapping.insert(legacy, unicode) {
            report.rows_accepted += 1;
        } else {
            report.duplicates += 1;
        }
    }
    report
}

/// Accepts `U+1EA1`, `u1ea1`, `0x1EA1` and bare `1EA1`.
pub fn parse_unicode_hex(value: &str) -> Result<char> {
    let upper = value.trim().to_ascii_uppercase();
    let digits = upper
        .strip_prefix("U+")
        .or_else(|| upper.strip_prefix("0X"))
        .or_else(|| upper.strip_prefix('U'))
        .unwrap_or(&upper);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::HexParseSkipped {
            value: value.to_string(),
        });
    }
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| Error::HexParseSkipped {
            value: value.to_string(),
        })
}

fn has_code_point_prefix(text: &str) -> bool {
    text.len() > 2 && text.is_char_boundary(2) && text[..2].eq_ignore_ascii_case("U+")
}

/// Empty cells, and the "nan" that spreadsheet exports write for them.
fn is_blank(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case("nan")
}
