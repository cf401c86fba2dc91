//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! is [`PuckError`]. The variants map onto the ways a training run can go
//! wrong:
//!
//! - **I/O and serialization**: the corpus or a checkpoint could not be read
//!   or written. These are fatal before training starts.
//! - **Lookup errors**: a character or index is missing from the vocabulary.
//!   With a vocabulary built from the same corpus this cannot happen, but it
//!   can when a checkpoint is resumed against a different text.
//! - **Numerical instability**: a logit, probability or loss became NaN or
//!   infinite. There is no recovery; rerun with a smaller learning rate.
//! - **Invalid input/configuration**: shapes or hyperparameters that make the
//!   computation meaningless.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PuckError>;

/// Errors produced by vocabulary, model, training and checkpoint code
#[derive(Debug)]
pub enum PuckError {
    /// Reading or writing a file failed
    Io(std::io::Error),
    /// A checkpoint or vocabulary file could not be (de)serialized
    Serialization(serde_json::Error),
    /// A character in the text has no vocabulary entry
    UnknownCharacter { ch: char, position: usize },
    /// An index is outside `[0, vocab_size)`
    UnknownIndex { index: usize, vocab_size: usize },
    /// Arguments to a forward/backward/sample call are inconsistent
    InvalidInput(String),
    /// Hyperparameters are out of range
    InvalidConfig(String),
    /// The encoded corpus cannot hold a single training window
    CorpusTooShort { len: usize, required: usize },
    /// A non-finite value appeared during the forward pass
    NumericalInstability { step: usize, detail: String },
    /// A checkpoint was resumed against a different vocabulary
    VocabularyMismatch { expected: usize, found: usize },
    /// A loaded tensor has the wrong shape for the model configuration
    ShapeMismatch {
        name: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

impl fmt::Display for PuckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PuckError::Io(err) => write!(f, "I/O error: {}", err),
            PuckError::Serialization(err) => write!(f, "serialization error: {}", err),
            PuckError::UnknownCharacter { ch, position } => write!(
                f,
                "character {:?} at position {} is not in the vocabulary",
                ch, position
            ),
            PuckError::UnknownIndex { index, vocab_size } => write!(
                f,
                "index {} is out of range for a vocabulary of {} characters",
                index, vocab_size
            ),
            PuckError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            PuckError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            PuckError::CorpusTooShort { len, required } => write!(
                f,
                "corpus has {} characters but at least {} are required",
                len, required
            ),
            PuckError::NumericalInstability { step, detail } => write!(
                f,
                "numerical instability at time step {}: {} (try a lower learning rate)",
                step, detail
            ),
            PuckError::VocabularyMismatch { expected, found } => write!(
                f,
                "vocabulary mismatch: checkpoint has {} characters, corpus yields {}",
                expected, found
            ),
            PuckError::ShapeMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "tensor {} has shape {:?}, expected {:?}",
                name, found, expected
            ),
        }
    }
}

impl std::error::Error for PuckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PuckError::Io(err) => Some(err),
            PuckError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PuckError {
    fn from(err: std::io::Error) -> Self {
        PuckError::Io(err)
    }
}

impl From<serde_json::Error> for PuckError {
    fn from(err: serde_json::Error) -> Self {
        PuckError::Serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_names_the_character() {
        let err = PuckError::UnknownCharacter {
            ch: 'ß',
            position: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("'ß'"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "shakespeare.txt");
        let err = PuckError::from(missing);
        assert!(matches!(err, PuckError::Io(_)));
        assert!(err.source().is_some());
    }
}
