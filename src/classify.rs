//! Decides whether a cell already holds readable Unicode Vietnamese/Latin text.
//!
//! Legacy glyphs are ordinary Latin-1 code points (µ, ¸, Ð, ...) that the legacy font draws as
//! Vietnamese letters. As Unicode they fall outside the Vietnamese alphabet, so any letter that
//! is not in the whitelist marks the string as legacy-encoded.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::textutil::{has_letter, is_separated_number};

const VIETNAMESE_LETTERS: &str = concat!(
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡ",
    "ùúụủũưừứựửữỳýỵỷỹđ",
    "ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴÈÉẸẺẼÊỀẾỆỂỄÌÍỊỈĨ",
    "ÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠÙÚỤỦŨƯỪỨỰỬỮỲÝỴỶỸĐ",
);

const DIGITS_AND_PUNCTUATION: &str = concat!(
    " 0123456789.,;:!?\"'()[]{}-_/\\|@#%&*+=…",
    "“”‘’\n\t€$¥£₫%‰°±×÷",
);

static WHITELIST: Lazy<HashSet<char>> = Lazy::new(|| {
    VIETNAMESE_LETTERS
        .chars()
        .chain(DIGITS_AND_PUNCTUATION.chars())
        .collect()
});

/// Separator, punctuation, control/format and symbol categories.
static NEUTRAL_CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{Z}\p{P}\p{C}\p{S}]$").expect("neutral category"));

pub fn is_already_unicode(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    if !has_letter(text) {
        return true;
    }
    let mut buf = [0u8; 4];
    text.chars().all(|ch| {
        WHITELIST.contains(&ch) || NEUTRAL_CATEGORY_RE.is_match(ch.encode_utf8(&mut buf))
    })
}

/// Cells that never need review: blanks, numbers/dates with separators, or text without any
/// letter or digit.
pub fn is_likely_non_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || is_separated_number(trimmed) {
        return true;
    }
    !trimmed.chars().any(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_letterless_text_is_unicode() {
        assert!(is_already_unicode(""));
        assert!(is_already_unicode("   "));
        assert!(is_already_unicode("12345"));
        assert!(is_already_unicode("2024-11-09"));
        assert!(is_already_unicode("---"));
    }

    #[test]
    fn vietnamese_unicode_passes() {
        assert!(is_already_unicode("Nguyễn Văn A"));
        assert!(is_already_unicode("Hà Nội"));
        assert!(is_already_unicode("Hello World 123"));
        assert!(is_already_unicode("Giá: 1,000,000đ"));
        assert!(is_already_unicode("Email: test@example.com"));
        assert!(is_already_unicode("Tổng: 50% (100/200)"));
        assert!(is_already_unicode("Giá ₫ «trọn gói»"));
    }

    #[test]
    fn legacy_glyphs_fail() {
        assert!(!is_already_unicode("Hµ Néi"));
        assert!(!is_already_unicode("Thµnh phè"));
        assert!(!is_already_unicode("§µ N½ng"));
    }

    #[test]
    fn foreign_letters_are_flagged() {
        // Accepted tradeoff: real text in another alphabet looks like legacy glyphs.
        assert!(!is_already_unicode("Ελλάδα"));
    }

    #[test]
    fn non_text_detection() {
        assert!(is_likely_non_text(""));
        assert!(is_likely_non_text("1,234.56"));
        assert!(is_likely_non_text("10:30"));
        assert!(is_likely_non_text("- - -"));
        assert!(!is_likely_non_text("A1"));
        assert!(!is_likely_non_text("Hà Nội"));
    }
}
