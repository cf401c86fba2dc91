//! Adagrad Optimizer
//!
//! This module implements Adagrad, the adaptive-learning-rate optimizer used
//! to train the character RNN.
//!
//! ## What is Adagrad?
//!
//! Adagrad gives every parameter its own effective learning rate. It keeps a
//! running sum of each parameter's squared gradients and divides the update
//! by the square root of that sum:
//!
//! - Parameters that receive large or frequent gradients take smaller steps
//! - Parameters that are rarely updated (e.g. the `Wxh` column of an
//!   uncommon character) keep taking large steps
//!
//! ## Algorithm
//!
//! For each parameter θ with gradient g and accumulator m (initially 0):
//!
//! ```text
//! m = m + g²                      # accumulate squared gradient
//! θ = θ - α * g / √(m + ε)        # scaled update
//! ```
//!
//! where:
//! - α (learning_rate) = 0.1 in the classic character-RNN setting
//! - ε (epsilon) = 1e-8, prevents division by zero
//!
//! ## Monotone Decay
//!
//! The accumulator only grows and is never reset, so every parameter's
//! effective step size `α / √m` shrinks monotonically over the run. This is
//! what lets a fairly large base learning rate be used safely.
//!
//! ## Example
//!
//! ```rust
//! use puck::{AdagradOptimizer, CharRnn, RnnConfig};
//!
//! let mut model = CharRnn::from_seed(RnnConfig::new(3, 4), 0).unwrap();
//! let mut optimizer = AdagradOptimizer::new(&model, 0.1);
//!
//! let (loss, grads, _) = model
//!     .loss_and_gradients(&[0, 1, 2], &[1, 2, 0], &model.zero_hidden())
//!     .unwrap();
//! optimizer.step(&mut model, &grads);
//! assert_eq!(optimizer.steps, 1);
//! # assert!(loss > 0.0);
//! ```

use crate::error::{PuckError, Result};
use crate::gradients::RnnGradients;
use crate::model::CharRnn;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Numerical stability constant added under the square root
pub const EPSILON: f64 = 1e-8;

/// Adagrad optimizer state
///
/// Holds one squared-gradient accumulator per model parameter, shaped
/// exactly like the parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdagradOptimizer {
    pub mem_wxh: Tensor,
    pub mem_whh: Tensor,
    pub mem_why: Tensor,
    pub mem_bh: Tensor,
    pub mem_by: Tensor,

    /// Base learning rate α
    pub learning_rate: f64,
    /// Stability constant ε
    pub epsilon: f64,
    /// Number of updates applied so far
    pub steps: usize,
}

impl AdagradOptimizer {
    /// Create an optimizer for `model` with all accumulators at zero
    pub fn new(model: &CharRnn, learning_rate: f64) -> Self {
        Self {
            mem_wxh: Tensor::zeros_like(&model.wxh),
            mem_whh: Tensor::zeros_like(&model.whh),
            mem_why: Tensor::zeros_like(&model.why),
            mem_bh: Tensor::zeros_like(&model.bh),
            mem_by: Tensor::zeros_like(&model.by),
            learning_rate,
            epsilon: EPSILON,
            steps: 0,
        }
    }

    /// The five accumulators, in parameter order
    pub fn memories(&self) -> [(&'static str, &Tensor); 5] {
        [
            ("wxh", &self.mem_wxh),
            ("whh", &self.mem_whh),
            ("why", &self.mem_why),
            ("bh", &self.mem_bh),
            ("by", &self.mem_by),
        ]
    }

    fn memories_mut(&mut self) -> [&mut Tensor; 5] {
        [
            &mut self.mem_wxh,
            &mut self.mem_whh,
            &mut self.mem_why,
            &mut self.mem_bh,
            &mut self.mem_by,
        ]
    }

    /// Check that every accumulator matches the corresponding parameter shape
    pub fn validate_for(&self, model: &CharRnn) -> Result<()> {
        for ((name, mem), (_, param)) in self.memories().into_iter().zip(model.parameters()) {
            if mem.shape != param.shape {
                return Err(PuckError::ShapeMismatch {
                    name,
                    expected: param.shape.clone(),
                    found: mem.shape.clone(),
                });
            }
        }
        Ok(())
    }

    /// Apply one Adagrad update to every parameter of `model`
    ///
    /// The gradients are expected to be clipped already.
    pub fn step(&mut self, model: &mut CharRnn, grads: &RnnGradients) {
        let (lr, eps) = (self.learning_rate, self.epsilon);

        for ((mem, (_, param)), (_, grad)) in self
            .memories_mut()
            .into_iter()
            .zip(model.parameters_mut())
            .zip(grads.tensors())
        {
            adagrad_update(&mut param.data, &grad.data, &mut mem.data, lr, eps);
        }

        self.steps += 1;
    }
}

/// Adagrad update for one flat parameter buffer
///
/// ```text
/// mem[i]   += grad[i]²
/// param[i] -= lr * grad[i] / √(mem[i] + eps)
/// ```
pub fn adagrad_update(params: &mut [f64], grads: &[f64], mem: &mut [f64], lr: f64, eps: f64) {
    debug_assert_eq!(params.len(), grads.len());
    debug_assert_eq!(params.len(), mem.len());

    for ((p, &g), m) in params.iter_mut().zip(grads).zip(mem.iter_mut()) {
        *m += g * g;
        *p -= lr * g / (*m + eps).sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RnnConfig;

    #[test]
    fn test_new_accumulators_are_zero() {
        let model = CharRnn::from_seed(RnnConfig::new(5, 3), 1).unwrap();
        let opt = AdagradOptimizer::new(&model, 0.1);
        for (_, mem) in opt.memories() {
            assert!(mem.data.iter().all(|&m| m == 0.0));
        }
        assert!(opt.validate_for(&model).is_ok());
    }

    #[test]
    fn test_update_moves_against_gradient() {
        let mut params = vec![1.0, -2.0, 0.5, 3.0];
        let before = params.clone();
        let grads = vec![0.3, -1.5, 0.0, 4.0];
        let mut mem = vec![0.0; 4];

        adagrad_update(&mut params, &grads, &mut mem, 0.1, EPSILON);

        for i in 0..4 {
            if grads[i] == 0.0 {
                assert_eq!(params[i], before[i]);
                assert_eq!(mem[i], 0.0);
            } else {
                assert!(mem[i] > 0.0);
                let moved = params[i] - before[i];
                assert!(
                    moved * grads[i] < 0.0,
                    "element {} moved with the gradient",
                    i
                );
            }
        }
    }

    #[test]
    fn test_first_step_size_is_learning_rate() {
        // With m = g², the first update is lr * g / |g| = lr * sign(g)
        let mut params = vec![0.0, 0.0];
        let mut mem = vec![0.0, 0.0];
        adagrad_update(&mut params, &[2.0, -0.01], &mut mem, 0.1, EPSILON);
        assert!((params[0] + 0.1).abs() < 1e-6);
        assert!((params[1] - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_effective_step_decays() {
        let mut params = vec![0.0];
        let mut mem = vec![0.0];
        let mut previous = f64::INFINITY;
        for _ in 0..5 {
            let before = params[0];
            adagrad_update(&mut params, &[1.0], &mut mem, 0.1, EPSILON);
            let step = (params[0] - before).abs();
            assert!(step < previous);
            previous = step;
        }
        assert!((mem[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_updates_model_and_memory() {
        let mut model = CharRnn::from_seed(RnnConfig::new(3, 4), 9).unwrap();
        let before = model.clone();
        let mut opt = AdagradOptimizer::new(&model, 0.1);

        let (_, grads, _) = model
            .loss_and_gradients(&[0, 1, 2], &[1, 2, 0], &model.zero_hidden())
            .unwrap();
        opt.step(&mut model, &grads);

        assert_eq!(opt.steps, 1);
        for (((name, g), (_, p_after)), (_, p_before)) in grads
            .tensors()
            .into_iter()
            .zip(model.parameters())
            .zip(before.parameters())
        {
            for i in 0..g.len() {
                if g.data[i] != 0.0 {
                    let moved = p_after.data[i] - p_before.data[i];
                    assert!(
                        moved * g.data[i] < 0.0,
                        "{}[{}] moved with the gradient",
                        name,
                        i
                    );
                }
            }
        }
        assert!(opt.mem_by.data.iter().all(|&m| m > 0.0));
    }
}
