//! Character Vocabulary and Corpus Encoding
//!
//! A character-level model has the simplest possible tokenizer: every
//! distinct character in the corpus is one token. This module builds that
//! vocabulary and converts text to and from sequences of token ids.
//!
//! ## How Ids Are Assigned
//!
//! 1. **Collect**: Gather every distinct `char` in the text
//! 2. **Sort**: Order them by Unicode code point
//! 3. **Number**: The i-th character in sorted order gets id `i`
//!
//! Sorting makes the mapping a pure function of the character *set*: the
//! same corpus always yields the same ids, so a saved model stays valid
//! against a vocabulary rebuilt from the same text.
//!
//! ```text
//! Text:   "hello"
//! Sorted: ['e', 'h', 'l', 'o']
//! Ids:      0    1    2    3
//! Encode: "hello" -> [1, 0, 2, 2, 3]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use puck::Vocabulary;
//!
//! let vocab = Vocabulary::from_text("To be, or not to be");
//! let ids = vocab.encode("not to be").unwrap();
//! assert_eq!(vocab.decode(&ids).unwrap(), "not to be");
//! ```
//!
//! ## Text Cleaning
//!
//! Raw corpora (Project Gutenberg in particular) contain characters that are
//! rare enough to waste output units. [`strip_chars`] removes a chosen set
//! of characters before the vocabulary is built. No character set is removed
//! by default; the vocabulary is whatever remains after cleaning.

use crate::error::{PuckError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Bidirectional mapping between characters and integer ids
///
/// Serialized as the sorted character list; the reverse index is rebuilt on
/// load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<char>", into = "Vec<char>")]
pub struct Vocabulary {
    /// Characters in ascending code-point order; position is the id
    chars: Vec<char>,
    /// Reverse lookup: character -> id
    index: HashMap<char, usize>,
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.chars == other.chars
    }
}

impl Eq for Vocabulary {}

impl TryFrom<Vec<char>> for Vocabulary {
    type Error = String;

    fn try_from(chars: Vec<char>) -> std::result::Result<Self, Self::Error> {
        Vocabulary::from_chars(chars).map_err(|err| err.to_string())
    }
}

impl From<Vocabulary> for Vec<char> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.chars
    }
}

impl Vocabulary {
    /// Build the vocabulary from every distinct character in `text`
    ///
    /// ```rust
    /// # use puck::Vocabulary;
    /// let vocab = Vocabulary::from_text("abcabc");
    /// assert_eq!(vocab.size(), 3);
    /// assert_eq!(vocab.char_to_ix('c'), Some(2));
    /// ```
    pub fn from_text(text: &str) -> Self {
        let unique: BTreeSet<char> = text.chars().collect();
        let chars: Vec<char> = unique.into_iter().collect();
        Self::build(chars)
    }

    /// Rebuild a vocabulary from an explicit character list
    ///
    /// The list must already be strictly ascending (which also rules out
    /// duplicates); this is the form stored in checkpoints.
    pub fn from_chars(chars: Vec<char>) -> Result<Self> {
        if let Some(pair) = chars.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PuckError::InvalidInput(format!(
                "vocabulary characters must be strictly ascending, found {:?} before {:?}",
                pair[0], pair[1]
            )));
        }
        Ok(Self::build(chars))
    }

    fn build(chars: Vec<char>) -> Self {
        let index = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { chars, index }
    }

    /// Number of distinct characters (V)
    pub fn size(&self) -> usize {
        self.chars.len()
    }

    /// True if the vocabulary has no characters
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The characters in id order
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Id of a character, if present
    pub fn char_to_ix(&self, c: char) -> Option<usize> {
        self.index.get(&c).copied()
    }

    /// Character for an id, if in range
    pub fn ix_to_char(&self, ix: usize) -> Option<char> {
        self.chars.get(ix).copied()
    }

    /// Encode text as a sequence of ids, one per character
    ///
    /// # Errors
    ///
    /// [`PuckError::UnknownCharacter`] with the character position (counted in
    /// characters, not bytes) of the first character missing from the
    /// vocabulary.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.chars()
            .enumerate()
            .map(|(position, ch)| {
                self.char_to_ix(ch)
                    .ok_or(PuckError::UnknownCharacter { ch, position })
            })
            .collect()
    }

    /// Decode a sequence of ids back to text
    ///
    /// # Errors
    ///
    /// [`PuckError::UnknownIndex`] for the first id outside `[0, V)`.
    pub fn decode(&self, ids: &[usize]) -> Result<String> {
        ids.iter()
            .map(|&index| {
                self.ix_to_char(index).ok_or(PuckError::UnknownIndex {
                    index,
                    vocab_size: self.size(),
                })
            })
            .collect()
    }

    /// Print the vocabulary, escaping whitespace so it is visible
    pub fn print_summary(&self) {
        let shown: String = self
            .chars
            .iter()
            .map(|c| match c {
                '\n' => "\\n".to_string(),
                '\t' => "\\t".to_string(),
                ' ' => "␣".to_string(),
                c => c.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!("Vocabulary: {} characters", self.size());
        println!("  {}", shown);
    }
}

/// Remove every character in `remove` from `text`
///
/// ```rust
/// # use puck::vocabulary::strip_chars;
/// assert_eq!(strip_chars("Thou [art] fool", "[]"), "Thou art fool");
/// ```
pub fn strip_chars(text: &str, remove: &str) -> String {
    let remove: BTreeSet<char> = remove.chars().collect();
    text.chars().filter(|c| !remove.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONNET: &str = "Shall I compare thee to a summer's day?\n\
                          Thou art more lovely and more temperate:";

    #[test]
    fn test_vocab_size_is_distinct_chars() {
        let vocab = Vocabulary::from_text(SONNET);
        let distinct: BTreeSet<char> = SONNET.chars().collect();
        assert_eq!(vocab.size(), distinct.len());
    }

    #[test]
    fn test_char_round_trip() {
        let vocab = Vocabulary::from_text(SONNET);
        for c in SONNET.chars() {
            let ix = vocab.char_to_ix(c).unwrap();
            assert_eq!(vocab.ix_to_char(ix), Some(c));
        }
    }

    #[test]
    fn test_ids_follow_code_point_order() {
        let vocab = Vocabulary::from_text("cab\n");
        assert_eq!(vocab.chars(), &['\n', 'a', 'b', 'c']);
        assert_eq!(vocab.char_to_ix('\n'), Some(0));
        assert_eq!(vocab.char_to_ix('c'), Some(3));
    }

    #[test]
    fn test_same_char_set_same_mapping() {
        let a = Vocabulary::from_text("the quick fox");
        let b = Vocabulary::from_text("xof kciuq eht");
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let text = "Über allen Gipfeln ist Ruh, in allen Wipfeln spürest du";
        let vocab = Vocabulary::from_text(text);
        let ids = vocab.encode(text).unwrap();
        assert_eq!(ids.len(), text.chars().count());
        assert_eq!(vocab.decode(&ids).unwrap(), text);
    }

    #[test]
    fn test_encode_unknown_character_reports_position() {
        let vocab = Vocabulary::from_text("abc");
        match vocab.encode("abxc") {
            Err(PuckError::UnknownCharacter { ch, position }) => {
                assert_eq!(ch, 'x');
                assert_eq!(position, 2);
            }
            other => panic!("expected UnknownCharacter, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_out_of_range() {
        let vocab = Vocabulary::from_text("abc");
        assert!(matches!(
            vocab.decode(&[0, 3]),
            Err(PuckError::UnknownIndex {
                index: 3,
                vocab_size: 3
            })
        ));
    }

    #[test]
    fn test_from_chars_rejects_unsorted() {
        assert!(Vocabulary::from_chars(vec!['b', 'a']).is_err());
        assert!(Vocabulary::from_chars(vec!['a', 'a']).is_err());
        assert!(Vocabulary::from_chars(vec!['a', 'b']).is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let vocab = Vocabulary::from_text(SONNET);
        let json = serde_json::to_string(&vocab).unwrap();
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vocab);
        assert_eq!(back.char_to_ix('?'), vocab.char_to_ix('?'));
    }

    #[test]
    fn test_strip_chars() {
        assert_eq!(strip_chars("a_b-c", "_-"), "abc");
        assert_eq!(strip_chars("unchanged", ""), "unchanged");
    }

    #[test]
    fn test_empty_text() {
        let vocab = Vocabulary::from_text("");
        assert!(vocab.is_empty());
        assert_eq!(vocab.encode("").unwrap(), Vec::<usize>::new());
    }
}
