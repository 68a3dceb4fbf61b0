//! Single-pass legacy → Unicode substitution.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::mapping::CharacterMapping;

/// Keys below this code point live in the dense table.
const DENSE_LIMIT: usize = 0x100;

/// A compiled mapping. Every key is one char, so matching never backtracks: each input char
/// is looked up once and either replaced or copied through.
#[derive(Clone, Debug)]
pub struct Transducer {
    dense: Box<[Option<char>; DENSE_LIMIT]>,
    sparse: HashMap<char, char>,
}

impl Transducer {
    #[must_use]
    pub fn compile(mapping: &CharacterMapping) -> Self {
        let mut dense = Box::new([None; DENSE_LIMIT]);
        let mut sparse = HashMap::new();
        for (legacy, unicode) in mapping.iter() {
            match dense.get_mut(legacy as usize) {
                Some(slot) => *slot = Some(unicode),
                None => {
                    sparse.insert(legacy, unicode);
                }
            }
        }
        Self { dense, sparse }
    }

    #[inline]
    fn lookup(&self, ch: char) -> Option<char> {
        match self.dense.get(ch as usize) {
            Some(slot) => *slot,
            None => self.sparse.get(&ch).copied(),
        }
    }

    /// Replaces every mapped char. Borrows the input when nothing matched.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let Some((start, _)) = text
            .char_indices()
            .find(|&(_, ch)| self.lookup(ch).is_some())
        else {
            return Cow::Borrowed(text);
        };
        let mut out = String::with_capacity(text.len() + 8);
        out.push_str(&text[..start]);
        for ch in text[start..].chars() {
            out.push(self.lookup(ch).unwrap_or(ch));
        }
        Cow::Owned(out)
    }
}
