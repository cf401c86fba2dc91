//! Training Loop
//!
//! This module drives the whole model: it slides a fixed-length window over
//! the encoded corpus, runs forward and backward passes, applies Adagrad and
//! reports progress.
//!
//! ## How Windows Are Read
//!
//! The corpus is consumed in consecutive, non-overlapping windows. The
//! target of every position is the next character:
//!
//! ```text
//! Corpus:     [t, o, _, b, e, _, o, r, _, n, o, t]
//! seq_length: 4
//!
//! Iter 0:  inputs [t, o, _, b]  targets [o, _, b, e]   (p = 0)
//! Iter 1:  inputs [e, _, o, r]  targets [_, o, r, _]   (p = 4)
//! Iter 2:  p + 4 + 1 >= 12  ->  reset to p = 0, h = 0
//! ```
//!
//! The hidden state at the end of one window seeds the next, so the network
//! can carry context across window boundaries even though gradients are only
//! propagated back `seq_length` steps (truncated BPTT).
//!
//! ## State Machine
//!
//! Every iteration first checks whether the next window would run off the
//! end of the corpus (or whether this is the very first iteration). If so,
//! the pointer goes back to 0 and the hidden state to zeros *before* the
//! window is read. The pointer therefore always satisfies
//! `p + seq_length + 1 <= corpus.len()` when a window is sliced.
//!
//! ## Stopping
//!
//! The loop never decides on its own when to stop. A [`StoppingPolicy`] is
//! consulted before every iteration; [`MaxIterations`], [`MaxDuration`],
//! [`LossBelow`] and [`AnyOf`] cover the common cases.
//!
//! ## Example
//!
//! ```rust
//! use puck::train::{MaxIterations, Trainer, TrainingConfig};
//! use puck::{CharRnn, RnnConfig, TrainingLogger, Vocabulary};
//!
//! let text = "to be or not to be ".repeat(20);
//! let vocab = Vocabulary::from_text(&text);
//! let corpus = vocab.encode(&text).unwrap();
//!
//! let model = CharRnn::from_seed(RnnConfig::tiny(vocab.size()), 1).unwrap();
//! let config = TrainingConfig { sample_every: 0, log_every: 0, ..TrainingConfig::default() };
//! let mut trainer = Trainer::new(model, config).unwrap();
//!
//! let mut logger = TrainingLogger::console().quiet();
//! let summary = trainer
//!     .train(&corpus, &vocab, &mut MaxIterations(50), &mut logger)
//!     .unwrap();
//! assert_eq!(summary.iterations, 50);
//! ```

use crate::error::{PuckError, Result};
use crate::gradients::compute_grad_norm;
use crate::model::CharRnn;
use crate::optimizer::AdagradOptimizer;
use crate::sampler;
use crate::training_logger::TrainingLogger;
use crate::vocabulary::Vocabulary;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Training hyperparameters
///
/// # Common Configurations
///
/// - **Default**: The classic character-RNN settings (25-step windows,
///   learning rate 0.1, a sample every 100 iterations)
/// - **Tiny**: Short windows and sparse output for quick experiments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of time steps per window (truncated BPTT length)
    pub seq_length: usize,
    /// Adagrad base learning rate
    pub learning_rate: f64,
    /// Draw a sample every N iterations (0 disables sampling)
    pub sample_every: usize,
    /// Number of characters per sample
    pub sample_length: usize,
    /// Log progress every N iterations (0 disables progress lines)
    pub log_every: usize,
    /// Seed for the sampling RNG
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seq_length: 25,
            learning_rate: 1e-1,
            sample_every: 100,
            sample_length: 200,
            log_every: 100,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a tiny configuration for quick experiments
    pub fn tiny() -> Self {
        Self {
            seq_length: 16,
            learning_rate: 1e-1,
            sample_every: 500,
            sample_length: 100,
            log_every: 500,
            seed: 42,
        }
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.seq_length == 0 {
            return Err(PuckError::InvalidConfig(
                "seq_length must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PuckError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Smallest corpus (in characters) that holds one window plus its shifted target
    ///
    /// A corpus of exactly this length is valid; every iteration then
    /// resets to the start.
    pub fn min_corpus_len(&self) -> usize {
        self.seq_length + 1
    }
}

/// Snapshot handed to a [`StoppingPolicy`] before each iteration
#[derive(Clone, Debug)]
pub struct TrainingProgress {
    /// Iterations completed so far (including any before a resume)
    pub iteration: usize,
    /// Current smoothed window loss
    pub smooth_loss: f64,
    /// Loss of the most recent window, if any ran in this call
    pub last_loss: Option<f64>,
    /// Wall-clock time spent in the current `train` call
    pub elapsed: Duration,
}

/// Decides when the training loop ends
///
/// Implement this to plug in custom criteria (validation loss, a signal
/// handler flag, ...).
pub trait StoppingPolicy {
    /// Return `true` to stop before running another iteration
    fn should_stop(&mut self, progress: &TrainingProgress) -> bool;
}

/// Stop once the iteration counter reaches this value
#[derive(Clone, Copy, Debug)]
pub struct MaxIterations(pub usize);

impl StoppingPolicy for MaxIterations {
    fn should_stop(&mut self, progress: &TrainingProgress) -> bool {
        progress.iteration >= self.0
    }
}

/// Stop after a wall-clock budget
#[derive(Clone, Copy, Debug)]
pub struct MaxDuration(pub Duration);

impl StoppingPolicy for MaxDuration {
    fn should_stop(&mut self, progress: &TrainingProgress) -> bool {
        progress.elapsed >= self.0
    }
}

/// Stop when the smoothed loss falls below a threshold
///
/// The smoothed loss is a *window* loss (summed over `seq_length`
/// characters), so the threshold is in the same units.
#[derive(Clone, Copy, Debug)]
pub struct LossBelow(pub f64);

impl StoppingPolicy for LossBelow {
    fn should_stop(&mut self, progress: &TrainingProgress) -> bool {
        progress.smooth_loss < self.0
    }
}

/// Stop as soon as any of the wrapped policies says so
pub struct AnyOf(pub Vec<Box<dyn StoppingPolicy>>);

impl StoppingPolicy for AnyOf {
    fn should_stop(&mut self, progress: &TrainingProgress) -> bool {
        // Every policy sees every check, even after one has fired
        self.0
            .iter_mut()
            .fold(false, |stop, policy| policy.should_stop(progress) || stop)
    }
}

/// Everything that changes between iterations, apart from model and optimizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub iteration: usize,
    pub pointer: usize,
    pub smooth_loss: f64,
    pub hprev: Vec<f64>,
}

/// What happened in one iteration
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Index of this iteration (0 for the first)
    pub iteration: usize,
    /// Corpus position of the first input character
    pub window_start: usize,
    /// Whether the pointer and hidden state were reset before reading
    pub reset: bool,
    /// Window loss (sum over `seq_length` characters)
    pub loss: f64,
    /// Smoothed loss after this iteration
    pub smooth_loss: f64,
    /// L2 norm of the clipped gradients
    pub grad_norm: f64,
    /// Sampled character ids, on sampling iterations
    pub sample: Option<Vec<usize>>,
}

/// Result of [`Trainer::train`]
#[derive(Clone, Debug)]
pub struct TrainingSummary {
    /// Iteration counter when training stopped
    pub iterations: usize,
    /// Iterations run by this call
    pub iterations_run: usize,
    pub smooth_loss: f64,
    pub last_loss: Option<f64>,
    pub elapsed: Duration,
}

/// Owns the model, the optimizer and the loop state
pub struct Trainer {
    pub model: CharRnn,
    pub optimizer: AdagradOptimizer,
    pub config: TrainingConfig,
    pointer: usize,
    hprev: Vec<f64>,
    iteration: usize,
    smooth_loss: f64,
    rng: StdRng,
}

impl Trainer {
    /// Start training a fresh model
    ///
    /// The smoothed loss starts at the loss of a uniform predictor,
    /// `-ln(1/V) * seq_length`.
    pub fn new(model: CharRnn, config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = AdagradOptimizer::new(&model, config.learning_rate);
        let state = TrainerState {
            iteration: 0,
            pointer: 0,
            smooth_loss: -(1.0 / model.vocab_size() as f64).ln() * config.seq_length as f64,
            hprev: model.zero_hidden(),
        };
        Self::from_parts(model, optimizer, config, state)
    }

    /// Rebuild a trainer from saved parts (used when resuming a checkpoint)
    pub fn from_parts(
        model: CharRnn,
        optimizer: AdagradOptimizer,
        config: TrainingConfig,
        state: TrainerState,
    ) -> Result<Self> {
        config.validate()?;
        model.validate()?;
        optimizer.validate_for(&model)?;
        model.check_hidden(&state.hprev)?;

        // Offset the sampling stream so a resumed run doesn't replay old samples
        let rng = StdRng::seed_from_u64(config.seed.wrapping_add(state.iteration as u64));
        Ok(Self {
            model,
            optimizer,
            config,
            pointer: state.pointer,
            hprev: state.hprev,
            iteration: state.iteration,
            smooth_loss: state.smooth_loss,
            rng,
        })
    }

    /// Snapshot of the loop state
    pub fn state(&self) -> TrainerState {
        TrainerState {
            iteration: self.iteration,
            pointer: self.pointer,
            smooth_loss: self.smooth_loss,
            hprev: self.hprev.clone(),
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn smooth_loss(&self) -> f64 {
        self.smooth_loss
    }

    /// Current hidden state carried between windows
    pub fn hidden(&self) -> &[f64] {
        &self.hprev
    }

    /// Run one iteration on `corpus`
    ///
    /// # Errors
    ///
    /// [`PuckError::CorpusTooShort`] if the corpus can't hold a window,
    /// plus anything the forward pass reports (unknown ids, numerical
    /// instability).
    pub fn step(&mut self, corpus: &[usize]) -> Result<StepReport> {
        let seq_length = self.config.seq_length;
        if corpus.len() < self.config.min_corpus_len() {
            return Err(PuckError::CorpusTooShort {
                len: corpus.len(),
                required: self.config.min_corpus_len(),
            });
        }

        let reset = self.iteration == 0 || self.pointer + seq_length + 1 >= corpus.len();
        if reset {
            self.pointer = 0;
            self.hprev = self.model.zero_hidden();
        }

        let p = self.pointer;
        let inputs = &corpus[p..p + seq_length];
        let targets = &corpus[p + 1..p + seq_length + 1];

        let every = self.config.sample_every;
        let sample = if every > 0 && self.iteration % every == 0 {
            Some(sampler::sample(
                &self.model,
                &self.hprev,
                inputs[0],
                self.config.sample_length,
                &mut self.rng,
            )?)
        } else {
            None
        };

        let (loss, grads, hnext) = self
            .model
            .loss_and_gradients(inputs, targets, &self.hprev)?;
        self.smooth_loss = self.smooth_loss * 0.999 + loss * 0.001;
        let grad_norm = compute_grad_norm(&grads);
        self.optimizer.step(&mut self.model, &grads);

        let report = StepReport {
            iteration: self.iteration,
            window_start: p,
            reset,
            loss,
            smooth_loss: self.smooth_loss,
            grad_norm,
            sample,
        };

        self.hprev = hnext;
        self.pointer += seq_length;
        self.iteration += 1;
        Ok(report)
    }

    /// Train until `policy` says stop
    ///
    /// Progress is logged every `log_every` iterations and on every sampling
    /// iteration; samples are decoded with `vocab`.
    pub fn train(
        &mut self,
        corpus: &[usize],
        vocab: &Vocabulary,
        policy: &mut dyn StoppingPolicy,
        logger: &mut TrainingLogger,
    ) -> Result<TrainingSummary> {
        if vocab.size() != self.model.vocab_size() {
            return Err(PuckError::VocabularyMismatch {
                expected: self.model.vocab_size(),
                found: vocab.size(),
            });
        }

        let start = Instant::now();
        let first_iteration = self.iteration;
        let mut last_loss = None;

        loop {
            let progress = TrainingProgress {
                iteration: self.iteration,
                smooth_loss: self.smooth_loss,
                last_loss,
                elapsed: start.elapsed(),
            };
            if policy.should_stop(&progress) {
                break;
            }

            let report = self.step(corpus)?;
            last_loss = Some(report.loss);

            let sample_text = report
                .sample
                .as_ref()
                .map(|ids| vocab.decode(ids))
                .transpose()?;
            let every = self.config.log_every;
            let log_due = every > 0 && report.iteration % every == 0;
            if log_due || sample_text.is_some() {
                logger.log(
                    report.iteration,
                    report.loss,
                    report.smooth_loss,
                    self.config.seq_length,
                    report.grad_norm,
                    sample_text.as_deref(),
                )?;
            }
        }

        Ok(TrainingSummary {
            iterations: self.iteration,
            iterations_run: self.iteration - first_iteration,
            smooth_loss: self.smooth_loss,
            last_loss,
            elapsed: start.elapsed(),
        })
    }
}

/// Fraction of next-character predictions (argmax) that match the corpus
///
/// Runs through `corpus` from a zero hidden state, predicting `corpus[t+1]`
/// from `corpus[..=t]`.
pub fn next_char_accuracy(model: &CharRnn, corpus: &[usize]) -> Result<f64> {
    if corpus.len() < 2 {
        return Err(PuckError::CorpusTooShort {
            len: corpus.len(),
            required: 2,
        });
    }

    let mut h = model.zero_hidden();
    let mut correct = 0usize;
    for pair in corpus.windows(2) {
        let (predicted, hidden) = model.predict_next(pair[0], &h)?;
        if predicted == pair[1] {
            correct += 1;
        }
        h = hidden;
    }
    Ok(correct as f64 / (corpus.len() - 1) as f64)
}

/// Average per-character loss over consecutive windows of `corpus`
///
/// The hidden state is carried from window to window, as in training.
pub fn evaluate_loss(model: &CharRnn, corpus: &[usize], seq_length: usize) -> Result<f64> {
    if seq_length == 0 || corpus.len() < seq_length + 1 {
        return Err(PuckError::CorpusTooShort {
            len: corpus.len(),
            required: seq_length + 1,
        });
    }

    let mut h = model.zero_hidden();
    let mut total = 0.0;
    let mut count = 0usize;
    let mut p = 0;
    while p + seq_length + 1 <= corpus.len() {
        let inputs = &corpus[p..p + seq_length];
        let targets = &corpus[p + 1..p + seq_length + 1];
        let pass = model.forward(inputs, targets, &h)?;
        total += pass.loss;
        count += seq_length;
        h = pass.final_hidden;
        p += seq_length;
    }
    Ok(total / count as f64)
}

/// Split encoded text into training and validation parts
///
/// The validation part is taken from the end so the two never overlap.
///
/// ```rust
/// # use puck::train::train_val_split;
/// let ids = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
/// let (train, val) = train_val_split(&ids, 0.2);
/// assert_eq!(train.len(), 8);
/// assert_eq!(val.len(), 2);
/// ```
pub fn train_val_split(ids: &[usize], val_fraction: f64) -> (&[usize], &[usize]) {
    let fraction = val_fraction.clamp(0.0, 1.0);
    let split_idx = ((ids.len() as f64) * (1.0 - fraction)) as usize;
    ids.split_at(split_idx.min(ids.len()))
}
