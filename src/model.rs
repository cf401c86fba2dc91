//! Vanilla RNN Model
//!
//! This module implements the character-level recurrent network: its
//! parameters, the forward pass with cross-entropy loss, and
//! backpropagation through time (BPTT).
//!
//! ## Architecture
//!
//! A single hidden layer with a `tanh` nonlinearity, read out by a linear
//! layer and a softmax over the vocabulary:
//!
//! ```text
//! x_t  = one_hot(input[t])                     [V]
//! h_t  = tanh(Wxh · x_t + Whh · h_{t-1} + bh)  [H]
//! y_t  = Why · h_t + by                        [V]  (logits)
//! p_t  = softmax(y_t)                          [V]  (next-char distribution)
//! loss = Σ_t -ln p_t[target[t]]
//! ```
//!
//! The hidden state `h` is the network's memory: it carries information
//! from every character seen so far into the prediction of the next one.
//!
//! ## Parameters
//!
//! | Name | Shape  | Role                     |
//! |------|--------|--------------------------|
//! | Wxh  | [H, V] | input → hidden           |
//! | Whh  | [H, H] | hidden → hidden (memory) |
//! | Why  | [V, H] | hidden → output          |
//! | bh   | [H, 1] | hidden bias              |
//! | by   | [V, 1] | output bias              |
//!
//! `Wxh · x_t` with a one-hot `x_t` is just column `input[t]` of `Wxh`, so
//! inputs are kept as indices and the one-hot vectors are never built.
//!
//! ## Backpropagation Through Time
//!
//! The forward pass caches every hidden state and probability vector. The
//! backward pass walks the sequence in reverse and applies the chain rule:
//!
//! ```text
//! dy      = p_t;  dy[target] -= 1          (softmax + cross-entropy)
//! dWhy   += dy · h_tᵀ;   dby += dy
//! dh      = Whyᵀ · dy + dh_next            (from output and from the future)
//! dhraw   = (1 - h_t²) ⊙ dh                (tanh derivative)
//! dbh    += dhraw
//! dWxh   += dhraw · x_tᵀ
//! dWhh   += dhraw · h_{t-1}ᵀ
//! dh_next = Whhᵀ · dhraw                   (flows to step t-1)
//! ```
//!
//! Gradients are clipped element-wise to `[-5, 5]` before they are returned
//! (see [`crate::gradients`]).

use crate::error::{PuckError, Result};
use crate::gradients::{clip_gradients, RnnGradients, GRAD_CLIP};
use crate::tensor::{argmax, log_sum_exp, softmax, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Standard deviation of the initial weight matrices
pub const INIT_STD: f64 = 0.01;

/// Model dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnnConfig {
    /// Number of distinct characters (V)
    pub vocab_size: usize,
    /// Size of the hidden state (H)
    pub hidden_size: usize,
}

impl RnnConfig {
    pub fn new(vocab_size: usize, hidden_size: usize) -> Self {
        Self {
            vocab_size,
            hidden_size,
        }
    }

    /// The classic setting: 100 hidden units
    ///
    /// Large enough to learn spelling and punctuation on a Shakespeare-sized
    /// corpus in a few thousand iterations on a laptop.
    pub fn notebook(vocab_size: usize) -> Self {
        Self::new(vocab_size, 100)
    }

    /// A tiny model for quick experiments and tests
    pub fn tiny(vocab_size: usize) -> Self {
        Self::new(vocab_size, 16)
    }

    /// Reject zero-sized dimensions
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(PuckError::InvalidConfig(
                "vocab_size must be at least 1".to_string(),
            ));
        }
        if self.hidden_size == 0 {
            return Err(PuckError::InvalidConfig(
                "hidden_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Activations cached by the forward pass for use by the backward pass
///
/// All sequences are indexed by time step `0..T`. The hidden state *before*
/// step 0 is kept separately in `initial_hidden`.
#[derive(Clone, Debug)]
pub struct ForwardCache {
    /// Hidden state entering step 0 (`hprev`)
    pub initial_hidden: Vec<f64>,
    /// Input character ids (the one-hot positions)
    pub inputs: Vec<usize>,
    /// `h_t` for each step
    pub hidden_states: Vec<Vec<f64>>,
    /// `softmax(y_t)` for each step
    pub probs: Vec<Vec<f64>>,
}

impl ForwardCache {
    /// Number of time steps
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Hidden state feeding into step `t` (`h_{t-1}`)
    pub fn previous_hidden(&self, t: usize) -> &[f64] {
        if t == 0 {
            &self.initial_hidden
        } else {
            &self.hidden_states[t - 1]
        }
    }
}

/// Result of [`CharRnn::forward`]
#[derive(Clone, Debug)]
pub struct ForwardPass {
    /// Summed cross-entropy over the sequence
    pub loss: f64,
    /// Cached activations for backpropagation
    pub cache: ForwardCache,
    /// `h_{T-1}`, the state that seeds the next window
    pub final_hidden: Vec<f64>,
}

/// A single-layer character-level RNN
///
/// Parameters are public so the optimizer, checkpoints and gradient checks
/// can reach them directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharRnn {
    pub config: RnnConfig,
    pub wxh: Tensor,
    pub whh: Tensor,
    pub why: Tensor,
    pub bh: Tensor,
    pub by: Tensor,
}

impl CharRnn {
    /// Create a model with weights drawn from N(0, 0.01²) and zero biases
    ///
    /// Small initial weights keep `tanh` in its linear region and the initial
    /// output distribution close to uniform, so the first loss is roughly
    /// `-ln(1/V)` per character.
    pub fn new<R: Rng + ?Sized>(config: RnnConfig, rng: &mut R) -> Result<Self> {
        Self::with_init_std(config, INIT_STD, rng)
    }

    /// Create a model from a fixed seed
    ///
    /// ```rust
    /// # use puck::{CharRnn, RnnConfig};
    /// let a = CharRnn::from_seed(RnnConfig::new(5, 8), 42).unwrap();
    /// let b = CharRnn::from_seed(RnnConfig::new(5, 8), 42).unwrap();
    /// assert_eq!(a.wxh, b.wxh);
    /// ```
    pub fn from_seed(config: RnnConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new(config, &mut rng)
    }

    /// Create a model with a custom weight standard deviation
    pub fn with_init_std<R: Rng + ?Sized>(
        config: RnnConfig,
        std: f64,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        if !std.is_finite() || std < 0.0 {
            return Err(PuckError::InvalidConfig(format!(
                "initial weight std must be finite and non-negative, got {}",
                std
            )));
        }
        let (h, v) = (config.hidden_size, config.vocab_size);
        Ok(Self {
            config,
            wxh: Tensor::random_normal(vec![h, v], std, rng),
            whh: Tensor::random_normal(vec![h, h], std, rng),
            why: Tensor::random_normal(vec![v, h], std, rng),
            bh: Tensor::zeros(vec![h, 1]),
            by: Tensor::zeros(vec![v, 1]),
        })
    }

    /// Check that every parameter has the shape implied by `config`
    ///
    /// Used after deserializing a model from disk.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        let (h, v) = (self.config.hidden_size, self.config.vocab_size);
        let expected: [(&'static str, Vec<usize>); 5] = [
            ("wxh", vec![h, v]),
            ("whh", vec![h, h]),
            ("why", vec![v, h]),
            ("bh", vec![h, 1]),
            ("by", vec![v, 1]),
        ];
        for ((name, tensor), (_, shape)) in self.parameters().into_iter().zip(expected) {
            if tensor.shape != shape {
                return Err(PuckError::ShapeMismatch {
                    name,
                    expected: shape,
                    found: tensor.shape.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    /// A zero hidden state (the state at the start of the corpus)
    pub fn zero_hidden(&self) -> Vec<f64> {
        vec![0.0; self.config.hidden_size]
    }

    /// Total number of trainable scalars
    ///
    /// `H·V + H·H + V·H + H + V`
    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|(_, t)| t.len()).sum()
    }

    /// The five parameter tensors, named, in a fixed order
    pub fn parameters(&self) -> [(&'static str, &Tensor); 5] {
        [
            ("wxh", &self.wxh),
            ("whh", &self.whh),
            ("why", &self.why),
            ("bh", &self.bh),
            ("by", &self.by),
        ]
    }

    /// Mutable access to the five parameter tensors, same order as [`CharRnn::parameters`]
    pub fn parameters_mut(&mut self) -> [(&'static str, &mut Tensor); 5] {
        [
            ("wxh", &mut self.wxh),
            ("whh", &mut self.whh),
            ("why", &mut self.why),
            ("bh", &mut self.bh),
            ("by", &mut self.by),
        ]
    }

    /// One recurrent step without any checks
    ///
    /// Returns `(h_t, y_t)`. `input` must be `< V` and `h_prev` must have
    /// length `H`.
    pub(crate) fn step(&self, input: usize, h_prev: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let xh = self.wxh.column(input);
        let hh = self.whh.matvec(h_prev);
        let hidden: Vec<f64> = xh
            .iter()
            .zip(&hh)
            .zip(&self.bh.data)
            .map(|((a, b), c)| (a + b + c).tanh())
            .collect();

        let mut logits = self.why.matvec(&hidden);
        for (y, b) in logits.iter_mut().zip(&self.by.data) {
            *y += b;
        }
        (hidden, logits)
    }

    /// Most likely next character after `input`, plus the updated hidden state
    pub fn predict_next(&self, input: usize, h_prev: &[f64]) -> Result<(usize, Vec<f64>)> {
        self.check_index(input)?;
        self.check_hidden(h_prev)?;
        let (hidden, logits) = self.step(input, h_prev);
        Ok((argmax(&logits), hidden))
    }

    /// Run the network over a sequence and compute the summed cross-entropy
    ///
    /// # Arguments
    ///
    /// * `inputs` - Character ids fed to the network, length T ≥ 1
    /// * `targets` - The character expected after each input, length T
    /// * `hprev` - Hidden state before the first step, length H
    ///
    /// # Errors
    ///
    /// - [`PuckError::InvalidInput`] for mismatched lengths, an empty
    ///   sequence or a wrongly sized `hprev`
    /// - [`PuckError::UnknownIndex`] for an out-of-range id
    /// - [`PuckError::NumericalInstability`] if any logit or step loss is
    ///   not finite
    pub fn forward(
        &self,
        inputs: &[usize],
        targets: &[usize],
        hprev: &[f64],
    ) -> Result<ForwardPass> {
        if inputs.is_empty() {
            return Err(PuckError::InvalidInput(
                "sequence must contain at least one step".to_string(),
            ));
        }
        if inputs.len() != targets.len() {
            return Err(PuckError::InvalidInput(format!(
                "inputs ({}) and targets ({}) differ in length",
                inputs.len(),
                targets.len()
            )));
        }
        for &ix in inputs.iter().chain(targets) {
            self.check_index(ix)?;
        }
        self.check_hidden(hprev)?;

        let steps = inputs.len();
        let mut hidden_states = Vec::with_capacity(steps);
        let mut probs = Vec::with_capacity(steps);
        let mut loss = 0.0;

        let mut h = hprev.to_vec();
        for (t, (&input, &target)) in inputs.iter().zip(targets).enumerate() {
            let (hidden, logits) = self.step(input, &h);
            if logits.iter().any(|y| !y.is_finite()) {
                return Err(PuckError::NumericalInstability {
                    step: t,
                    detail: "non-finite logits".to_string(),
                });
            }

            // -ln softmax(y)[target], taken in log space so a confident
            // wrong prediction doesn't underflow to ln(0)
            let step_loss = log_sum_exp(&logits) - logits[target];
            if !step_loss.is_finite() {
                return Err(PuckError::NumericalInstability {
                    step: t,
                    detail: format!("step loss is {}", step_loss),
                });
            }
            loss += step_loss;

            h = hidden.clone();
            hidden_states.push(hidden);
            probs.push(softmax(&logits));
        }

        Ok(ForwardPass {
            loss,
            final_hidden: h,
            cache: ForwardCache {
                initial_hidden: hprev.to_vec(),
                inputs: inputs.to_vec(),
                hidden_states,
                probs,
            },
        })
    }

    /// Backpropagation through time, followed by element-wise clipping to `[-5, 5]`
    pub fn backward(&self, cache: &ForwardCache, targets: &[usize]) -> Result<RnnGradients> {
        let mut grads = self.backward_unclipped(cache, targets)?;
        clip_gradients(&mut grads, GRAD_CLIP);
        Ok(grads)
    }

    /// Backpropagation through time without clipping
    ///
    /// Exposed for gradient checking; training always goes through
    /// [`CharRnn::backward`].
    pub fn backward_unclipped(
        &self,
        cache: &ForwardCache,
        targets: &[usize],
    ) -> Result<RnnGradients> {
        if targets.len() != cache.len() {
            return Err(PuckError::InvalidInput(format!(
                "cache has {} steps but {} targets were given",
                cache.len(),
                targets.len()
            )));
        }
        for &ix in targets {
            self.check_index(ix)?;
        }

        let mut grads = RnnGradients::zeros(&self.config);
        let mut dh_next = self.zero_hidden();

        for t in (0..cache.len()).rev() {
            let h_t = &cache.hidden_states[t];

            // Softmax + cross-entropy: dL/dy = p - one_hot(target)
            let mut dy = cache.probs[t].clone();
            dy[targets[t]] -= 1.0;

            grads.why.add_outer(&dy, h_t);
            grads.by.add_vector(&dy);

            // Backprop into h from the output and from step t+1
            let mut dh = self.why.matvec_transposed(&dy);
            for (d, n) in dh.iter_mut().zip(&dh_next) {
                *d += n;
            }

            // Through tanh
            let dhraw: Vec<f64> = dh
                .iter()
                .zip(h_t)
                .map(|(d, h)| (1.0 - h * h) * d)
                .collect();

            grads.bh.add_vector(&dhraw);
            grads.wxh.add_to_column(cache.inputs[t], &dhraw);
            grads.whh.add_outer(&dhraw, cache.previous_hidden(t));

            dh_next = self.whh.matvec_transposed(&dhraw);
        }

        Ok(grads)
    }

    /// Forward pass plus clipped gradients in one call
    ///
    /// Returns `(loss, gradients, final_hidden)`.
    pub fn loss_and_gradients(
        &self,
        inputs: &[usize],
        targets: &[usize],
        hprev: &[f64],
    ) -> Result<(f64, RnnGradients, Vec<f64>)> {
        let pass = self.forward(inputs, targets, hprev)?;
        let grads = self.backward(&pass.cache, targets)?;
        Ok((pass.loss, grads, pass.final_hidden))
    }

    pub(crate) fn check_index(&self, ix: usize) -> Result<()> {
        if ix >= self.config.vocab_size {
            return Err(PuckError::UnknownIndex {
                index: ix,
                vocab_size: self.config.vocab_size,
            });
        }
        Ok(())
    }

    pub(crate) fn check_hidden(&self, h: &[f64]) -> Result<()> {
        if h.len() != self.config.hidden_size {
            return Err(PuckError::InvalidInput(format!(
                "hidden state has length {}, expected {}",
                h.len(),
                self.config.hidden_size
            )));
        }
        Ok(())
    }
}
