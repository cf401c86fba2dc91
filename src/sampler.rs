//! Text Generation by Sampling
//!
//! Once trained, the RNN is a next-character distribution. Generating text
//! means running it autoregressively: feed a character, get a distribution,
//! draw the next character from it, feed that back in.
//!
//! ```text
//! x = one_hot(seed)
//! repeat n times:
//!     h = tanh(Wxh · x + Whh · h + bh)
//!     p = softmax(Why · h + by)
//!     ix ~ Categorical(p)        # a random draw, not argmax
//!     x = one_hot(ix)
//! ```
//!
//! ## Why Sample Instead of Argmax?
//!
//! Always taking the most likely character makes the model fall into short
//! loops ("the the the the"). Drawing from the distribution keeps the output
//! varied and shows what the model has actually learned, including its
//! uncertainty.
//!
//! ## Temperature
//!
//! [`sample_with_temperature`] divides the logits by a temperature before
//! the softmax. Values below 1.0 make the output more conservative, values
//! above 1.0 more adventurous. [`sample`] is temperature 1.0.
//!
//! ## Reproducibility
//!
//! All randomness comes from the caller's `Rng`. Two calls with identically
//! seeded generators, the same model, hidden state and seed character
//! produce the same sequence.

use crate::error::{PuckError, Result};
use crate::model::CharRnn;
use crate::tensor::softmax;
use crate::vocabulary::Vocabulary;
use rand::Rng;

/// Draw `n` character ids from the model, starting after `seed_ix`
///
/// `h` is the hidden state to start from; it is copied, never modified.
///
/// # Errors
///
/// [`PuckError::UnknownIndex`] if `seed_ix >= V`, [`PuckError::InvalidInput`]
/// if `h` has the wrong length.
///
/// # Example
///
/// ```rust
/// use puck::{sampler, CharRnn, RnnConfig};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let model = CharRnn::from_seed(RnnConfig::new(4, 8), 1).unwrap();
/// let mut rng = StdRng::seed_from_u64(7);
/// let ids = sampler::sample(&model, &model.zero_hidden(), 0, 20, &mut rng).unwrap();
/// assert_eq!(ids.len(), 20);
/// assert!(ids.iter().all(|&ix| ix < 4));
/// ```
pub fn sample<R: Rng + ?Sized>(
    model: &CharRnn,
    h: &[f64],
    seed_ix: usize,
    n: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    sample_with_temperature(model, h, seed_ix, n, 1.0, rng)
}

/// Like [`sample`], with logits divided by `temperature` before the softmax
pub fn sample_with_temperature<R: Rng + ?Sized>(
    model: &CharRnn,
    h: &[f64],
    seed_ix: usize,
    n: usize,
    temperature: f64,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(PuckError::InvalidInput(format!(
            "temperature must be positive, got {}",
            temperature
        )));
    }
    model.check_index(seed_ix)?;
    model.check_hidden(h)?;

    let mut h = h.to_vec();
    let mut x = seed_ix;
    let mut ixes = Vec::with_capacity(n);

    for t in 0..n {
        let (hidden, mut logits) = model.step(x, &h);
        h = hidden;

        if temperature != 1.0 {
            for y in logits.iter_mut() {
                *y /= temperature;
            }
        }
        let p = softmax(&logits);
        if p.iter().any(|v| !v.is_finite()) {
            return Err(PuckError::NumericalInstability {
                step: t,
                detail: "non-finite sampling distribution".to_string(),
            });
        }

        x = draw_categorical(&p, rng);
        ixes.push(x);
    }

    Ok(ixes)
}

/// Draw one index from a categorical distribution
///
/// Walks the cumulative distribution until it passes a uniform draw in
/// `[0, 1)`. If rounding leaves the total slightly below the draw, the last
/// index with non-zero probability is returned.
pub fn draw_categorical<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> usize {
    let r: f64 = rng.random();
    let mut cumsum = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return i;
        }
    }
    probs
        .iter()
        .rposition(|&p| p > 0.0)
        .unwrap_or(probs.len().saturating_sub(1))
}

/// Prime the model with `prompt`, then sample `n` more characters
///
/// The prompt is fed through the network from a zero hidden state; sampling
/// starts after its last character. Returns the prompt followed by the
/// generated text.
///
/// # Errors
///
/// [`PuckError::InvalidInput`] for an empty prompt,
/// [`PuckError::UnknownCharacter`] if the prompt uses characters the model
/// never saw.
pub fn generate_text<R: Rng + ?Sized>(
    model: &CharRnn,
    vocab: &Vocabulary,
    prompt: &str,
    n: usize,
    temperature: f64,
    rng: &mut R,
) -> Result<String> {
    let ids = vocab.encode(prompt)?;
    let (&last, context) = ids.split_last().ok_or_else(|| {
        PuckError::InvalidInput("prompt must contain at least one character".to_string())
    })?;

    let mut h = model.zero_hidden();
    for &ix in context {
        model.check_index(ix)?;
        h = model.step(ix, &h).0;
    }

    let generated = sample_with_temperature(model, &h, last, n, temperature, rng)?;
    let mut text = prompt.to_string();
    text.push_str(&vocab.decode(&generated)?);
    Ok(text)
}
