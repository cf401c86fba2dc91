//! Checkpoints
//!
//! A checkpoint captures everything needed to continue a training run
//! exactly where it stopped: the vocabulary, the model weights, the Adagrad
//! accumulators and the loop state (iteration, window pointer, smoothed loss
//! and carried hidden state).
//!
//! ## File Format
//!
//! Checkpoints are pretty-printed JSON written with `serde_json`. The top
//! level object carries a `format_version` so that files written by a newer
//! layout are rejected instead of being misread.
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "vocabulary": ["\n", " ", "!", ...],
//!   "training": { "seq_length": 25, ... },
//!   "model": { "config": {...}, "wxh": {"shape": [H, V], "data": [...]}, ... },
//!   "optimizer": { "mem_wxh": {...}, ..., "steps": 1200 },
//!   "state": { "iteration": 1200, "pointer": 475, "smooth_loss": 61.3, "hprev": [...] }
//! }
//! ```
//!
//! JSON is larger than a binary dump, but a character RNN has few enough
//! parameters (about 23k for H = 100, V = 65) that the difference does not
//! matter, and the file can be inspected by hand.

use crate::error::{PuckError, Result};
use crate::model::CharRnn;
use crate::optimizer::AdagradOptimizer;
use crate::train::{Trainer, TrainerState, TrainingConfig};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Current checkpoint layout version
pub const FORMAT_VERSION: u32 = 1;

/// Saved training run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub vocabulary: Vocabulary,
    pub training: TrainingConfig,
    pub model: CharRnn,
    pub optimizer: AdagradOptimizer,
    pub state: TrainerState,
}

impl Checkpoint {
    /// Capture the current state of `trainer`
    pub fn from_trainer(trainer: &Trainer, vocabulary: &Vocabulary) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            vocabulary: vocabulary.clone(),
            training: trainer.config.clone(),
            model: trainer.model.clone(),
            optimizer: trainer.optimizer.clone(),
            state: trainer.state(),
        }
    }

    /// Write the checkpoint to `path` as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read and validate a checkpoint
    ///
    /// # Errors
    ///
    /// - [`PuckError::Io`] / [`PuckError::Serialization`] for unreadable files
    /// - [`PuckError::InvalidInput`] for an unsupported `format_version`
    /// - [`PuckError::ShapeMismatch`] / [`PuckError::VocabularyMismatch`] if the
    ///   parts don't fit together
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: Checkpoint = serde_json::from_reader(reader)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Check that the saved parts are consistent with each other
    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(PuckError::InvalidInput(format!(
                "unsupported checkpoint format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        if self.vocabulary.size() != self.model.vocab_size() {
            return Err(PuckError::VocabularyMismatch {
                expected: self.model.vocab_size(),
                found: self.vocabulary.size(),
            });
        }
        self.model.validate()?;
        self.optimizer.validate_for(&self.model)?;
        self.model.check_hidden(&self.state.hprev)?;
        Ok(())
    }

    /// Continue training with `config`
    ///
    /// `vocabulary` is the vocabulary built from the corpus about to be
    /// trained on. It must be identical to the saved one, otherwise the
    /// character ids would mean something else and training would silently
    /// learn garbage. The optimizer picks up `config.learning_rate`.
    pub fn resume(self, vocabulary: &Vocabulary, config: TrainingConfig) -> Result<Trainer> {
        if *vocabulary != self.vocabulary {
            return Err(PuckError::VocabularyMismatch {
                expected: self.vocabulary.size(),
                found: vocabulary.size(),
            });
        }

        let mut optimizer = self.optimizer;
        optimizer.learning_rate = config.learning_rate;
        Trainer::from_parts(self.model, optimizer, config, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RnnConfig;

    fn checkpoint() -> Checkpoint {
        let vocab = Vocabulary::from_text("abc");
        let model = CharRnn::from_seed(RnnConfig::new(3, 4), 0).unwrap();
        let trainer = Trainer::new(model, TrainingConfig::tiny()).unwrap();
        Checkpoint::from_trainer(&trainer, &vocab)
    }

    #[test]
    fn test_validate_accepts_fresh_checkpoint() {
        assert!(checkpoint().validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut ckpt = checkpoint();
        ckpt.format_version = 99;
        assert!(matches!(ckpt.validate(), Err(PuckError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_wrong_hidden_length() {
        let mut ckpt = checkpoint();
        ckpt.state.hprev.push(0.0);
        assert!(ckpt.validate().is_err());
    }

    #[test]
    fn test_resume_rejects_different_vocabulary() {
        // Same size, different characters
        let other = Vocabulary::from_text("xyz");
        assert!(matches!(
            checkpoint().resume(&other, TrainingConfig::tiny()),
            Err(PuckError::VocabularyMismatch { .. })
        ));
    }

    #[test]
    fn test_resume_uses_new_learning_rate() {
        let vocab = Vocabulary::from_text("abc");
        let config = TrainingConfig {
            learning_rate: 0.05,
            ..TrainingConfig::tiny()
        };
        let trainer = checkpoint().resume(&vocab, config).unwrap();
        assert_eq!(trainer.optimizer.learning_rate, 0.05);
    }
}
