//! Gradient Storage and Clipping
//!
//! Backpropagation produces one gradient tensor per model parameter. This
//! module holds them ([`RnnGradients`]) together with the two operations the
//! training loop applies to them:
//!
//! - **Gradient norm**: a single number summarising the update size, logged
//!   for monitoring
//! - **Gradient clipping**: bounding every gradient element before the
//!   optimizer sees it
//!
//! ## Why Clip?
//!
//! A vanilla RNN multiplies by `Whh` once per time step. Backpropagating
//! through that recurrence can grow gradients exponentially with the sequence
//! length, and a single exploding step is enough to throw the weights into a
//! region where `tanh` saturates or the softmax overflows:
//!
//! ```text
//! Iter 4000: loss = 52.1
//! Iter 4001: loss = 388.0  (exploding gradient)
//! Iter 4002: loss = NaN    (training failed)
//! ```
//!
//! ## Algorithm
//!
//! Clipping here is **element-wise**, not by global norm:
//!
//! ```text
//! for every gradient element g:
//!     g = clamp(g, -5, 5)
//! ```
//!
//! Unlike norm clipping this can change the gradient direction. For the
//! small character model that hardly matters.

use crate::model::RnnConfig;
use crate::tensor::Tensor;

/// Bound applied to every gradient element: values are clamped to `[-5, 5]`
pub const GRAD_CLIP: f64 = 5.0;

/// Gradients for every parameter of a [`CharRnn`](crate::model::CharRnn)
///
/// Shapes match the parameters exactly:
/// - `wxh`: `[H, V]`
/// - `whh`: `[H, H]`
/// - `why`: `[V, H]`
/// - `bh`: `[H, 1]`
/// - `by`: `[V, 1]`
#[derive(Clone, Debug)]
pub struct RnnGradients {
    pub wxh: Tensor,
    pub whh: Tensor,
    pub why: Tensor,
    pub bh: Tensor,
    pub by: Tensor,
}

impl RnnGradients {
    /// All-zero gradients for a model with the given configuration
    pub fn zeros(config: &RnnConfig) -> Self {
        let (h, v) = (config.hidden_size, config.vocab_size);
        Self {
            wxh: Tensor::zeros(vec![h, v]),
            whh: Tensor::zeros(vec![h, h]),
            why: Tensor::zeros(vec![v, h]),
            bh: Tensor::zeros(vec![h, 1]),
            by: Tensor::zeros(vec![v, 1]),
        }
    }

    /// The five gradient tensors, named, in parameter order
    pub fn tensors(&self) -> [(&'static str, &Tensor); 5] {
        [
            ("wxh", &self.wxh),
            ("whh", &self.whh),
            ("why", &self.why),
            ("bh", &self.bh),
            ("by", &self.by),
        ]
    }

    /// Mutable access to the five gradient tensors, in parameter order
    pub fn tensors_mut(&mut self) -> [(&'static str, &mut Tensor); 5] {
        [
            ("wxh", &mut self.wxh),
            ("whh", &mut self.whh),
            ("why", &mut self.why),
            ("bh", &mut self.bh),
            ("by", &mut self.by),
        ]
    }

    /// Largest absolute gradient element across all tensors
    pub fn max_abs(&self) -> f64 {
        self.tensors()
            .iter()
            .fold(0.0, |m, (_, t)| m.max(t.max_abs()))
    }
}

/// Compute the L2 norm of all gradients
///
/// ```text
/// norm = √(Σ g²) over every element of every gradient tensor
/// ```
///
/// Used for monitoring only; clipping is element-wise.
pub fn compute_grad_norm(grads: &RnnGradients) -> f64 {
    grads
        .tensors()
        .iter()
        .map(|(_, t)| t.sum_squares())
        .sum::<f64>()
        .sqrt()
}

/// Clamp every gradient element to `[-limit, limit]` in place
///
/// The training loop always calls this with [`GRAD_CLIP`].
///
/// # Example
///
/// ```rust
/// # use puck::gradients::{clip_gradients, RnnGradients};
/// # use puck::RnnConfig;
/// let mut grads = RnnGradients::zeros(&RnnConfig::new(3, 2));
/// grads.why.data[0] = 12.0;
/// grads.bh.data[1] = -7.5;
/// clip_gradients(&mut grads, 5.0);
/// assert_eq!(grads.why.data[0], 5.0);
/// assert_eq!(grads.bh.data[1], -5.0);
/// ```
pub fn clip_gradients(grads: &mut RnnGradients, limit: f64) {
    for (_, tensor) in grads.tensors_mut() {
        tensor.clamp_in_place(-limit, limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_match_parameter_shapes() {
        let grads = RnnGradients::zeros(&RnnConfig::new(7, 4));
        assert_eq!(grads.wxh.shape, vec![4, 7]);
        assert_eq!(grads.whh.shape, vec![4, 4]);
        assert_eq!(grads.why.shape, vec![7, 4]);
        assert_eq!(grads.bh.shape, vec![4, 1]);
        assert_eq!(grads.by.shape, vec![7, 1]);
    }

    #[test]
    fn test_grad_norm() {
        let mut grads = RnnGradients::zeros(&RnnConfig::new(2, 2));
        grads.wxh.data[0] = 3.0;
        grads.by.data[1] = 4.0;
        assert!((compute_grad_norm(&grads) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_bounds_every_tensor() {
        let mut grads = RnnGradients::zeros(&RnnConfig::new(3, 3));
        for (i, (_, t)) in grads.tensors_mut().into_iter().enumerate() {
            for (j, x) in t.data.iter_mut().enumerate() {
                *x = ((i * 31 + j * 7) as f64 - 20.0) * 1.5;
            }
        }
        clip_gradients(&mut grads, GRAD_CLIP);
        assert!(grads.max_abs() <= GRAD_CLIP);
    }

    #[test]
    fn test_clip_leaves_small_values_untouched() {
        let mut grads = RnnGradients::zeros(&RnnConfig::new(2, 2));
        grads.whh.data[3] = -4.999;
        clip_gradients(&mut grads, GRAD_CLIP);
        assert_eq!(grads.whh.data[3], -4.999);
    }
}
