//! Repair of double-encoded text: UTF-8 bytes that were decoded one byte at a time as
//! Latin-1 / Windows-1252, so that "À" shows up as "Ã€" and "ệ" as "á»‡".

use std::borrow::Cow;

use encoding_rs::{UTF_8, WINDOWS_1252};

use crate::textutil::vietnamese_count;

/// A whole-string re-decode is accepted outright once it yields this many Vietnamese-range
/// code points within the sample window.
pub const DOUBLE_ENCODING_MIN_VIETNAMESE: usize = 10;
/// Window (in chars) used when comparing Vietnamese density before and after a re-decode.
pub const REPAIR_SAMPLE_CHARS: usize = 500;

/// Mis-decoded UTF-8 lead bytes 0xC2..=0xC6 plus 0xE1/0xE2 (Latin Extended Additional,
/// general punctuation).
const TELLTALE_CHARS: [char; 7] = ['Â', 'Ã', 'Ä', 'Å', 'Æ', 'á', 'â'];

/// Lead bytes handled by the pairwise fallback.
const PAIR_LEADS: std::ops::RangeInclusive<u8> = 0xC2..=0xC6;
const CONTINUATION: std::ops::RangeInclusive<u8> = 0x80..=0xBF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepairAttempt {
    Fixed(String),
    NoFix,
}

type Strategy = fn(&str) -> RepairAttempt;

const STRATEGIES: [Strategy; 2] = [redecode_whole, repair_pairs];

/// Best-effort repair. Returns the input untouched unless one strategy finds a plausible fix.
pub fn repair(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| TELLTALE_CHARS.contains(&c)) {
        return Cow::Borrowed(text);
    }
    for strategy in STRATEGIES {
        if let RepairAttempt::Fixed(fixed) = strategy(text) {
            return Cow::Owned(fixed);
        }
    }
    Cow::Borrowed(text)
}

/// Re-encodes the full string to single bytes and decodes it as strict UTF-8.
pub fn redecode_whole(text: &str) -> RepairAttempt {
    let mut bytes = Vec::with_capacity(text.len());
    let mut via_windows = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let Some((b, windows)) = single_byte(ch) else {
            return RepairAttempt::NoFix;
        };
        bytes.push(b);
        via_windows.push(windows);
    }
    let Some(fixed) = UTF_8.decode_without_bom_handling_and_without_replacement(&bytes) else {
        return RepairAttempt::NoFix;
    };
    if fixed == text || !is_plausible_fix(text, &fixed) {
        return RepairAttempt::NoFix;
    }
    let strong = vietnamese_count(&fixed, REPAIR_SAMPLE_CHARS) >= DOUBLE_ENCODING_MIN_VIETNAMESE;
    if !strong && has_ambiguous_pair(&bytes, &via_windows) {
        return RepairAttempt::NoFix;
    }
    RepairAttempt::Fixed(fixed.into_owned())
}

/// Two-byte sequences closed by Windows-1252 punctuation read the same as a capital followed by
/// a quote or dash ("NGÃ”"), so short text containing one is left alone.
fn has_ambiguous_pair(bytes: &[u8], via_windows: &[bool]) -> bool {
    let mut i = 0usize;
    while i < bytes.len() {
        let width = match bytes[i] {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        if width == 2 && via_windows.get(i + 1).copied().unwrap_or(false) {
            return true;
        }
        i += width;
    }
    false
}

/// Replaces mis-decoded two-byte sequences in place, leaving the rest untouched.
pub fn repair_pairs(text: &str) -> RepairAttempt {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut i = 0usize;
    while i < chars.len() {
        if let Some(&next) = chars.get(i + 1) {
            if let Some(ch) = decode_pair(chars[i], next) {
                out.push(ch);
                changed = true;
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    if changed && is_plausible_fix(text, &out) {
        RepairAttempt::Fixed(out)
    } else {
        RepairAttempt::NoFix
    }
}

/// Only Latin-1 continuations (U+0080..=U+00BF) count here, and the pair must decode to a
/// letter: "Ã”" or "Â–" next to real text is punctuation, not a broken sequence.
fn decode_pair(lead: char, cont: char) -> Option<char> {
    let lead = u8::try_from(lead).ok().filter(|b| PAIR_LEADS.contains(b))?;
    let cont = u8::try_from(cont).ok().filter(|b| CONTINUATION.contains(b))?;
    std::str::from_utf8(&[lead, cont])
        .ok()?
        .chars()
        .next()
        .filter(|c| c.is_alphabetic())
}

/// Byte a char had before being mis-decoded: identity for U+0000..=U+00FF, Windows-1252 for
/// the printable characters it places in 0x80..=0x9F. The flag marks the Windows-1252 case.
fn single_byte(ch: char) -> Option<(u8, bool)> {
    if let Ok(b) = u8::try_from(ch) {
        return Some((b, false));
    }
    let mut buf = [0u8; 4];
    let (bytes, _, had_errors) = WINDOWS_1252.encode(ch.encode_utf8(&mut buf));
    match (had_errors, bytes.as_ref()) {
        (false, [b]) => Some((*b, true)),
        _ => None,
    }
}

fn is_plausible_fix(original: &str, fixed: &str) -> bool {
    let after = vietnamese_count(fixed, REPAIR_SAMPLE_CHARS);
    if after == 0 {
        return false;
    }
    if after >= DOUBLE_ENCODING_MIN_VIETNAMESE {
        return true;
    }
    let before = vietnamese_count(original, REPAIR_SAMPLE_CHARS);
    let before_len = original.chars().count().min(REPAIR_SAMPLE_CHARS).max(1);
    let after_len = fixed.chars().count().min(REPAIR_SAMPLE_CHARS).max(1);
    after * before_len > before * after_len
}
