mod builder;
mod columns;
mod table;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::textutil::single_char;

pub use builder::{BuiltMapping, MapBuilder, TableReport};
pub use columns::{ColumnIdentifier, ColumnRoles, LEGACY_GLYPHS, MIN_COLUMN_SCORE};
pub use table::{decode_table_bytes, load_tables, table_from_csv, tables_from_json, RawTable};

pub const CSV_LEGACY_HEADER: &str = "TCVN3";
pub const CSV_UNICODE_HEADER: &str = "UNICODE";

/// Ordered legacy → Unicode character table. The first value inserted for a key is permanent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharacterMapping {
    pairs: Vec<(char, char)>,
    index: HashMap<char, usize>,
}

impl CharacterMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `legacy → unicode` unless `legacy` is already mapped. Returns whether the pair
    /// was added.
    pub fn insert(&mut self, legacy: char, unicode: char) -> bool {
        if self.index.contains_key(&legacy) {
            return false;
        }
        self.index.insert(legacy, self.pairs.len());
        self.pairs.push((legacy, unicode));
        true
    }

    #[must_use]
    pub fn get(&self, legacy: char) -> Option<char> {
        self.index.get(&legacy).map(|&i| self.pairs[i].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.pairs.iter().copied()
    }

    /// SHA-256 over the ordered pairs, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 4];
        for (legacy, unicode) in &self.pairs {
            hasher.update(legacy.encode_utf8(&mut buf).as_bytes());
            hasher.update(b"=");
            hasher.update(unicode.encode_utf8(&mut buf).as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_csv(&self) -> Result<String> {
        let bytes = self.write_csv(Vec::new()).map_err(csv_to_io)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    fn write_csv(&self, out: Vec<u8>) -> csv::Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record([CSV_LEGACY_HEADER, CSV_UNICODE_HEADER])?;
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        for (legacy, unicode) in &self.pairs {
            wtr.write_record([&*legacy.encode_utf8(&mut a), &*unicode.encode_utf8(&mut b)])?;
        }
        wtr.into_inner().map_err(|e| e.into_error().into())
    }

    pub fn from_csv(text: &str) -> std::result::Result<Self, String> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::None)
            .from_reader(text.as_bytes());
        let headers = rdr.headers().map_err(|e| e.to_string())?.clone();
        let col = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| format!("missing column {name}"))
        };
        let legacy_col = col(CSV_LEGACY_HEADER)?;
        let unicode_col = col(CSV_UNICODE_HEADER)?;

        let mut mapping = Self::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| e.to_string())?;
            let legacy = record.get(legacy_col).unwrap_or_default();
            let unicode = record.get(unicode_col).unwrap_or_default();
            let pair = single_char(legacy).zip(single_char(unicode)).ok_or_else(|| {
                format!("row {}: expected single characters, got {legacy:?} -> {unicode:?}", i + 2)
            })?;
            mapping.insert(pair.0, pair.1);
        }
        Ok(mapping)
    }

    /// Writes the mapping; `.csv` paths get the two-column form, anything else JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = if is_csv_path(path) {
            self.to_csv()?
        } else {
            self.to_json()?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Loads a persisted mapping. Missing, unreadable, malformed or empty files all fail with
    /// [`Error::MappingLoadFailed`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::load_failed(path, e))?;
        let text = text.trim_start_matches('\u{FEFF}');
        let mapping = if is_csv_path(path) {
            Self::from_csv(text).map_err(|e| Error::load_failed(path, e))?
        } else {
            Self::from_json(text).map_err(|e| Error::load_failed(path, e))?
        };
        if mapping.is_empty() {
            return Err(Error::load_failed(path, "mapping is empty"));
        }
        Ok(mapping)
    }

    /// Tries each candidate in order and returns the first that exists.
    pub fn load_first(candidates: &[&Path]) -> Result<Self> {
        for path in candidates {
            if path.exists() {
                return Self::load(path);
            }
        }
        let shown = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let first = candidates.first().copied().unwrap_or_else(|| Path::new(""));
        Err(Error::load_failed(
            first,
            format!("no mapping file found (tried: {shown})"),
        ))
    }
}

impl FromIterator<(char, char)> for CharacterMapping {
    fn from_iter<I: IntoIterator<Item = (char, char)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (legacy, unicode) in iter {
            mapping.insert(legacy, unicode);
        }
        mapping
    }
}

impl Serialize for CharacterMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        for (legacy, unicode) in &self.pairs {
            map.serialize_entry(&*legacy.encode_utf8(&mut a), &*unicode.encode_utf8(&mut b))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CharacterMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(MappingVisitor)
    }
}

struct MappingVisitor;

impl<'de> Visitor<'de> for MappingVisitor {
    type Value = CharacterMapping;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of single-character keys and values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut mapping = CharacterMapping::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            let pair = single_char(&key).zip(single_char(&value)).ok_or_else(|| {
                <A::Error as serde::de::Error>::custom(format!(
                    "expected single characters, got {key:?} -> {value:?}"
                ))
            })?;
            mapping.insert(pair.0, pair.1);
        }
        Ok(mapping)
    }
}

fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn csv_to_io(e: csv::Error) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CharacterMapping {
        [('µ', 'à'), ('¸', 'á'), ('Ð', 'Đ'), ('é', 'ộ')].into_iter().collect()
    }

    #[test]
    fn first_insert_wins() {
        let mut m = CharacterMapping::new();
        assert!(m.insert('µ', 'à'));
        assert!(!m.insert('µ', 'x'));
        assert_eq!(m.get('µ'), Some('à'));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn json_keeps_insertion_order_and_raw_code_points() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"µ\": \"à\""), "{json}");
        let positions: Vec<usize> = ["\"µ\"", "\"¸\"", "\"Ð\"", "\"é\""]
            .iter()
            .map(|k| json.find(k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(CharacterMapping::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn json_rejects_multi_char_entries() {
        assert!(CharacterMapping::from_json(r#"{"ab": "c"}"#).is_err());
    }

    #[test]
    fn json_duplicate_keys_keep_first() {
        let m = CharacterMapping::from_json(r#"{"µ": "à", "µ": "x"}"#).unwrap();
        assert_eq!(m.get('µ'), Some('à'));
    }

    #[test]
    fn csv_form_loads_back() {
        let csv = sample().to_csv().unwrap();
        assert_eq!(csv.lines().next(), Some("TCVN3,UNICODE"));
        assert_eq!(CharacterMapping::from_csv(&csv).unwrap(), sample());
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let a: CharacterMapping = [('µ', 'à'), ('¸', 'á')].into_iter().collect();
        let b: CharacterMapping = [('¸', 'á'), ('µ', 'à')].into_iter().collect();
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn load_failures_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            CharacterMapping::load(&missing),
            Err(Error::MappingLoadFailed { .. })
        ));

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "{}").unwrap();
        assert!(matches!(
            CharacterMapping::load(&empty),
            Err(Error::MappingLoadFailed { .. })
        ));

        let csv_path = dir.path().join("map.csv");
        sample().save(&csv_path).unwrap();
        let json_path = dir.path().join("map.json");
        let loaded = CharacterMapping::load_first(&[&json_path, &csv_path]).unwrap();
        assert_eq!(loaded, sample());
    }
}
