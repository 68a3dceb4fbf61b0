use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::table::RawTable;
use crate::textutil::{is_vietnamese_range, single_char};

/// Winning scores below this mean the table is not a mapping table.
pub const MIN_COLUMN_SCORE: f64 = 0.2;
/// A "VIET"-style header column is trusted once this many of its first rows hold a single
/// accented Latin character.
pub const VIET_HEADER_SAMPLE_ROWS: usize = 10;
pub const VIET_HEADER_MIN_HITS: usize = 3;

/// Glyphs that show up frequently in legacy (.VnTime) text.
pub const LEGACY_GLYPHS: &str =
    "µ¸¶·¹¨»¾¼½Æ©ÇÊÈÉË®ÌÐÎÏÑªÒÕÓÔÖ×ÝØÜÞßãáâä«åèæçé¬êíëìîïóñòôõøö÷ùúýûüþ¡¢§£¤¥¦";

static LEGACY_SET: Lazy<HashSet<char>> = Lazy::new(|| LEGACY_GLYPHS.chars().collect());

const LEGACY_TOKEN: &str = "TCVN3";
const UNICODE_TOKEN: &str = "UNICODE";
const HEX_TOKEN: &str = "HEX";
const VIET_HEADERS: [&str; 2] = ["VIET", "V"];

/// Which column of a raw table holds what.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnRoles {
    pub legacy: usize,
    pub unicode: usize,
    /// Unicode cells are code points such as `U+1EA1` rather than characters.
    pub unicode_is_hex: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnIdentifier {
    min_score: f64,
}

impl Default for ColumnIdentifier {
    fn default() -> Self {
        Self {
            min_score: MIN_COLUMN_SCORE,
        }
    }
}

impl ColumnIdentifier {
    #[must_use]
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    pub fn identify(&self, table: &RawTable) -> Option<ColumnRoles> {
        if table.width() < 2 {
            return None;
        }
        self.by_headers(table).or_else(|| self.by_content(table))
    }

    fn by_headers(&self, table: &RawTable) -> Option<ColumnRoles> {
        let headers: Vec<String> = table
            .headers
            .iter()
            .map(|h| h.trim().to_uppercase())
            .collect();
        let legacy = headers
            .iter()
            .position(|h| h.contains(LEGACY_TOKEN) && !h.contains(HEX_TOKEN))?;

        for (idx, h) in headers.iter().enumerate() {
            let viet_like = VIET_HEADERS.contains(&h.as_str())
                || (idx == 0 && !h.contains(LEGACY_TOKEN) && !h.contains(HEX_TOKEN));
            if viet_like && idx != legacy && viet_sample_hits(table, idx) >= VIET_HEADER_MIN_HITS
            {
                return Some(ColumnRoles {
                    legacy,
                    unicode: idx,
                    unicode_is_hex: false,
                });
            }
        }

        let mut hex_column = None;
        for (idx, h) in headers.iter().enumerate() {
            if !h.contains(UNICODE_TOKEN) {
                continue;
            }
            if !h.contains(HEX_TOKEN) {
                return Some(ColumnRoles {
                    legacy,
                    unicode: idx,
                    unicode_is_hex: false,
                });
            }
            hex_column.get_or_insert(idx);
        }
        if let Some(unicode) = hex_column {
            return Some(ColumnRoles {
                legacy,
                unicode,
                unicode_is_hex: true,
            });
        }

        // Legacy header known, Unicode column unlabeled: let content decide that role only.
        let scored = self.by_content(table)?;
        (scored.unicode != legacy).then_some(ColumnRoles {
            legacy,
            unicode: scored.unicode,
            unicode_is_hex: false,
        })
    }

    fn by_content(&self, table: &RawTable) -> Option<ColumnRoles> {
        let width = table.width();
        let unicode_scores: Vec<f64> = (0..width)
            .map(|c| column_score(table, c, is_vietnamese_range))
            .collect();
        let legacy_scores: Vec<f64> = (0..width)
            .map(|c| column_score(table, c, |ch| LEGACY_SET.contains(&ch)))
            .collect();

        let unicode = argmax(&unicode_scores, None)?;
        let mut legacy = argmax(&legacy_scores, None)?;
        if legacy == unicode {
            legacy = argmax(&legacy_scores, Some(unicode))?;
        }

        if unicode_scores[unicode] < self.min_score || legacy_scores[legacy] < self.min_score {
            tracing::debug!(
                unicode,
                legacy,
                unicode_score = unicode_scores[unicode],
                legacy_score = legacy_scores[legacy],
                "column scores below threshold"
            );
            return None;
        }
        Some(ColumnRoles {
            legacy,
            unicode,
            unicode_is_hex: false,
        })
    }
}

/// Share of single-character cells in `col` that satisfy `accept`.
fn column_score(table: &RawTable, col: usize, accept: impl Fn(char) -> bool) -> f64 {
    let mut singles = 0usize;
    let mut hits = 0usize;
    for value in table.column(col) {
        if let Some(ch) = single_char(value.trim()) {
            singles += 1;
            if accept(ch) {
                hits += 1;
            }
        }
    }
    if singles == 0 {
        0.0
    } else {
        hits as f64 / singles as f64
    }
}

fn viet_sample_hits(table: &RawTable, col: usize) -> usize {
    table
        .column(col)
        .take(VIET_HEADER_SAMPLE_ROWS)
        .filter(|v| single_char(v.trim()).is_some_and(is_vietnamese_range))
        .count()
}

/// Index of the highest score; earliest column wins ties.
fn argmax(scores: &[f64], exclude: Option<usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &s) in scores.iter().enumerate() {
        if Some(i) == exclude {
            continue;
        }
        if best.map_or(true, |b| s > scores[b]) {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(headers: &[&str], columns: &[&[&str]]) -> RawTable {
        let height = columns.iter().map(|c| c.len()).max().unwrap_or(0);
        let rows = (0..height)
            .map(|r| {
                columns
                    .iter()
                    .map(|c| c.get(r).copied().unwrap_or_default().to_string())
                    .collect()
            })
            .collect();
        RawTable::new(headers.iter().map(|h| h.to_string()).collect(), rows)
    }

    const VIET: &[&str] = &["ả", "ạ", "ầ", "ấ", "ậ", "ẩ", "ẫ", "ằ", "ắ", "ặ"];
    const LEGACY: &[&str] = &["¶", "¹", "·", "¸", "µ", "¨", "»", "¾", "¼", "½"];
    const NUMBERS: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"];
    const HEX: &[&str] = &[
        "U+1EA3", "U+1EA1", "U+1EA7", "U+1EA5", "U+1EAD", "U+1EA9", "U+1EAB", "U+1EB1", "U+1EAF",
        "U+1EB7",
    ];

    #[test]
    fn content_scoring_finds_positions() {
        let t = table(&[], &[VIET, NUMBERS, NUMBERS, LEGACY]);
        let roles = ColumnIdentifier::default().identify(&t).unwrap();
        assert_eq!(
            roles,
            ColumnRoles {
                legacy: 3,
                unicode: 0,
                unicode_is_hex: false
            }
        );
    }

    #[test]
    fn content_scoring_rejects_non_mapping_tables() {
        let t = table(&[], &[NUMBERS, NUMBERS, &["a", "b", "c"]]);
        assert_eq!(ColumnIdentifier::default().identify(&t), None);
    }

    #[test]
    fn threshold_is_tunable() {
        let mostly_ascii: &[&str] = &["a", "b", "c", "d", "e", "ả"];
        let t = table(&[], &[mostly_ascii, LEGACY]);
        assert_eq!(ColumnIdentifier::default().identify(&t), None);
        assert!(ColumnIdentifier::new(0.1).identify(&t).is_some());
    }

    #[test]
    fn viet_header_is_preferred() {
        let t = table(&["Viet", "Unicode", "TCVN3 Hex", "TCVN3"], &[VIET, VIET, HEX, LEGACY]);
        let roles = ColumnIdentifier::default().identify(&t).unwrap();
        assert_eq!((roles.legacy, roles.unicode, roles.unicode_is_hex), (3, 0, false));
    }

    #[test]
    fn plain_unicode_header_beats_hex() {
        let t = table(
            &["STT", "Unicode Hex", "Unicode", "TCVN3"],
            &[NUMBERS, HEX, VIET, LEGACY],
        );
        let roles = ColumnIdentifier::default().identify(&t).unwrap();
        assert_eq!((roles.legacy, roles.unicode, roles.unicode_is_hex), (3, 2, false));
    }

    #[test]
    fn hex_only_header_marks_hex() {
        let t = table(&["STT", "unicode hex", "tcvn3"], &[NUMBERS, HEX, LEGACY]);
        let roles = ColumnIdentifier::default().identify(&t).unwrap();
        assert_eq!((roles.legacy, roles.unicode, roles.unicode_is_hex), (2, 1, true));
    }

    #[test]
    fn legacy_header_with_unlabeled_unicode_column() {
        let t = table(&["No", "Char", "TCVN3"], &[NUMBERS, VIET, LEGACY]);
        let roles = ColumnIdentifier::default().identify(&t).unwrap();
        assert_eq!((roles.legacy, roles.unicode, roles.unicode_is_hex), (2, 1, false));
    }

    #[test]
    fn same_column_winning_both_roles_keeps_unicode() {
        // Column 0 holds chars that are both accented Latin and legacy glyphs; the tie-break
        // gives it the Unicode role and hands the legacy role to the runner-up.
        let both: &[&str] = &["á", "â", "ã", "ä", "å"];
        let legacy_ish: &[&str] = &["µ", "¸", "¶", "á", "â"];
        let t = table(&[], &[both, legacy_ish]);
        let roles = ColumnIdentifier::default().identify(&t).unwrap();
        assert_eq!((roles.legacy, roles.unicode), (1, 0));

        // Known weak spot: when the true legacy column also scores highest as Unicode, the
        // runner-up for the legacy role scores zero and the table is rejected.
        let glyphs_above_c0: &[&str] = &["Æ", "Ç", "Ê", "È", "É"];
        let t = table(&[], &[glyphs_above_c0, VIET]);
        assert_eq!(ColumnIdentifier::default().identify(&t), None);
    }
}
