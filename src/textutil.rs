use once_cell::sync::Lazy;
use regex::Regex;

/// Latin-1 Supplement capitals through the end of Latin Extended Additional: every precomposed
/// Vietnamese letter lives in this block.
pub const VIETNAMESE_FIRST: char = '\u{00C0}';
pub const VIETNAMESE_LAST: char = '\u{1EF9}';

static LETTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}").expect("letter"));
static DIGIT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[.,\-/:]*[0-9][0-9.,\-/:]*$").expect("digits"));

#[inline]
pub fn is_vietnamese_range(ch: char) -> bool {
    (VIETNAMESE_FIRST..=VIETNAMESE_LAST).contains(&ch)
}

/// Counts Vietnamese-range code points among the first `limit` chars.
pub fn vietnamese_count(text: &str, limit: usize) -> usize {
    text.chars()
        .take(limit)
        .filter(|c| is_vietnamese_range(*c))
        .count()
}

pub fn has_letter(text: &str) -> bool {
    LETTER_RE.is_match(text)
}

/// Numbers, dates and times written with the usual separators ("1,234.56", "2024-11-09").
pub fn is_separated_number(text: &str) -> bool {
    DIGIT_RUN_RE.is_match(text)
}

/// Returns the char when `text` is exactly one Unicode scalar value.
pub fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(first)
}

/// Truncates for log lines without splitting a char.
pub fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
