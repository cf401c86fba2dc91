//! Dense Matrices for the RNN
//!
//! This module provides the small tensor type that backs every parameter,
//! gradient and optimizer accumulator in the crate. A character-level RNN
//! only ever needs rank-2 tensors (weight matrices and column vectors), so
//! the operations here are the handful a single recurrent step requires.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f64>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (`[rows, cols]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! Vectors that flow through the network (hidden states, logits,
//! probabilities) are plain `Vec<f64>` / `&[f64]` slices. Matrices are
//! `Tensor`s.
//!
//! ## Example
//!
//! ```rust
//! use puck::Tensor;
//!
//! // W is 2x3, x has 3 elements
//! let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let y = w.matvec(&[1.0, 0.0, 1.0]);
//! assert_eq!(y, vec![4.0, 10.0]);
//! ```
//!
//! ## Why f64?
//!
//! The training loop is tiny and the gradient check compares analytic
//! gradients against central differences. In single precision the
//! finite-difference estimate is dominated by rounding error, so the whole
//! crate works in double precision.
//!
//! ## Performance
//!
//! Matrix-vector products over large matrices (a Shakespeare vocabulary with
//! a few hundred hidden units) are split across output rows with Rayon. Each
//! output element is still a sequential dot product, so parallel and
//! sequential results are bitwise identical.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Work threshold (rows × cols) above which matrix-vector products run in parallel
const PARALLEL_THRESHOLD: usize = 16_384;

/// A row-major matrix of `f64` values
///
/// # Fields
///
/// - `data`: Flat array of values
/// - `shape`: Dimensions (e.g., `[100, 65]` for Wxh with H=100, V=65)
/// - `strides`: Step sizes for each dimension (computed from shape)
///
/// # Memory Layout
///
/// For shape `[2, 3]`, data is stored as:
/// `[row0_col0, row0_col1, row0_col2, row1_col0, row1_col1, row1_col2]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorData", into = "TensorData")]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f64>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

/// On-disk form of a tensor; strides are recomputed on load
#[derive(Serialize, Deserialize)]
struct TensorData {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<TensorData> for Tensor {
    type Error = String;

    fn try_from(raw: TensorData) -> Result<Self, Self::Error> {
        let expected: usize = raw.shape.iter().product();
        if raw.data.len() != expected {
            return Err(format!(
                "tensor data length {} doesn't match shape {:?}",
                raw.data.len(),
                raw.shape
            ));
        }
        Ok(Tensor::new(raw.data, raw.shape))
    }
}

impl From<Tensor> for TensorData {
    fn from(tensor: Tensor) -> Self {
        TensorData {
            shape: tensor.shape,
            data: tensor.data,
        }
    }
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length
    ///
    /// # Example
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.shape, vec![2, 2]);
    /// ```
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let tensor = Tensor::zeros(vec![3, 4]);
    /// assert_eq!(tensor.data.len(), 12);
    /// assert!(tensor.data.iter().all(|&x| x == 0.0));
    /// ```
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Create a zero tensor with the same shape as `other`
    pub fn zeros_like(other: &Tensor) -> Self {
        Self::zeros(other.shape.clone())
    }

    /// Create a tensor with entries drawn from N(0, std²)
    ///
    /// # Panics
    ///
    /// Panics if `std` is negative or not finite.
    pub fn random_normal<R: Rng + ?Sized>(shape: Vec<usize>, std: f64, rng: &mut R) -> Self {
        let normal = Normal::new(0.0, std)
            .expect("standard deviation must be finite and >= 0");
        let size: usize = shape.iter().product();
        let data = (0..size).map(|_| normal.sample(rng)).collect();
        Self::new(data, shape)
    }

    /// Compute strides from shape (row-major layout)
    ///
    /// For shape `[d0, d1]`, strides are `[d1, 1]`
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Number of rows of a rank-2 tensor
    pub fn rows(&self) -> usize {
        assert_eq!(self.shape.len(), 2, "rows() requires a 2D tensor");
        self.shape[0]
    }

    /// Number of columns of a rank-2 tensor
    pub fn cols(&self) -> usize {
        assert_eq!(self.shape.len(), 2, "cols() requires a 2D tensor");
        self.shape[1]
    }

    /// Element at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.strides[0] + col]
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Matrix-vector product `self · v`
    ///
    /// For `self` of shape `[m, k]` and `v` of length `k`, returns a vector of
    /// length `m` where `out[i] = Σ_j self[i, j] * v[j]`.
    ///
    /// # Performance
    ///
    /// - **Small matrices** (< 16K elements): Sequential computation
    /// - **Large matrices**: Output rows computed in parallel
    ///
    /// # Panics
    ///
    /// Panics if `v.len()` doesn't match the number of columns
    pub fn matvec(&self, v: &[f64]) -> Vec<f64> {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(
            k,
            v.len(),
            "Matrix-vector dimensions incompatible: [{}, {}] @ [{}]",
            m,
            k,
            v.len()
        );

        let row_dot = |row: &[f64]| -> f64 { row.iter().zip(v).map(|(a, b)| a * b).sum() };

        if m * k >= PARALLEL_THRESHOLD {
            return self.data.par_chunks(k).map(row_dot).collect();
        }
        self.data.chunks(k).map(row_dot).collect()
    }

    /// Transposed matrix-vector product `selfᵀ · v`
    ///
    /// For `self` of shape `[m, k]` and `v` of length `m`, returns a vector of
    /// length `k`. Used by backpropagation (`Whyᵀ · dy`, `Whhᵀ · dhraw`)
    /// without materialising the transpose.
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    /// assert_eq!(w.matvec_transposed(&[1.0, 1.0]), vec![5.0, 7.0, 9.0]);
    /// ```
    pub fn matvec_transposed(&self, v: &[f64]) -> Vec<f64> {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(
            m,
            v.len(),
            "Transposed matrix-vector dimensions incompatible: [{}, {}]ᵀ @ [{}]",
            m,
            k,
            v.len()
        );

        let mut out = vec![0.0; k];
        for (row, &scale) in self.data.chunks(k).zip(v) {
            if scale == 0.0 {
                continue;
            }
            for (o, &w) in out.iter_mut().zip(row) {
                *o += w * scale;
            }
        }
        out
    }

    /// Column `col` as a vector
    ///
    /// Multiplying a matrix by a one-hot vector selects a single column; this
    /// is how `Wxh · x_t` is computed.
    pub fn column(&self, col: usize) -> Vec<f64> {
        let (m, k) = (self.rows(), self.cols());
        assert!(
            col < k,
            "column {} out of range for shape [{}, {}]",
            col,
            m,
            k
        );
        (0..m).map(|row| self.data[row * k + col]).collect()
    }

    /// Accumulate the outer product: `self += a · bᵀ`
    pub fn add_outer(&mut self, a: &[f64], b: &[f64]) {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(m, a.len(), "outer product rows mismatch");
        assert_eq!(k, b.len(), "outer product cols mismatch");

        for (row, &a_val) in self.data.chunks_mut(k).zip(a) {
            if a_val == 0.0 {
                continue;
            }
            for (r, &b_val) in row.iter_mut().zip(b) {
                *r += a_val * b_val;
            }
        }
    }

    /// Accumulate `v` into column `col`: `self[:, col] += v`
    ///
    /// Equivalent to `add_outer(v, one_hot(col))`.
    pub fn add_to_column(&mut self, col: usize, v: &[f64]) {
        let (m, k) = (self.rows(), self.cols());
        assert!(
            col < k,
            "column {} out of range for shape [{}, {}]",
            col,
            m,
            k
        );
        assert_eq!(m, v.len(), "column length mismatch");
        for (row, &val) in v.iter().enumerate() {
            self.data[row * k + col] += val;
        }
    }

    /// Accumulate a vector into a column tensor of shape `[n, 1]`
    pub fn add_vector(&mut self, v: &[f64]) {
        assert_eq!(self.data.len(), v.len(), "vector length mismatch");
        for (x, &y) in self.data.iter_mut().zip(v) {
            *x += y;
        }
    }

    /// Clamp every element to `[lo, hi]` in place
    pub fn clamp_in_place(&mut self, lo: f64, hi: f64) {
        for x in self.data.iter_mut() {
            *x = x.clamp(lo, hi);
        }
    }

    /// Sum of squared elements
    pub fn sum_squares(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }

    /// Largest absolute element (0.0 for an empty tensor)
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, x| m.max(x.abs()))
    }
}

/// Numerically stable softmax over a vector of logits
///
/// ```text
/// softmax(x)[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
/// ```
///
/// Subtracting the maximum prevents overflow in `exp()` while producing the
/// same distribution.
///
/// ```rust
/// # use puck::tensor::softmax;
/// let p = softmax(&[1.0, 2.0, 3.0]);
/// assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
/// assert!(p[2] > p[1] && p[1] > p[0]);
/// ```
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp_values: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exp_values.iter().sum();
    exp_values.into_iter().map(|v| v / sum).collect()
}

/// `ln Σ exp(x[i])`, computed without overflow
///
/// `log_sum_exp(y) - y[k]` is the cross-entropy `-ln softmax(y)[k]`, and
/// stays finite even when `softmax(y)[k]` underflows to zero.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let sum: f64 = values.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Index of the largest element (first one on ties)
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_strides_row_major() {
        let t = Tensor::zeros(vec![3, 5]);
        assert_eq!(t.strides, vec![5, 1]);
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 5);
    }

    #[test]
    #[should_panic(expected = "doesn't match shape")]
    fn test_new_rejects_bad_length() {
        Tensor::new(vec![1.0, 2.0, 3.0], vec![2, 2]);
    }

    #[test]
    fn test_matvec_and_transpose_agree() {
        let w = Tensor::new(vec![1.0, -2.0, 0.5, 3.0, 4.0, -1.0], vec![2, 3]);
        let v = [2.0, 1.0, -4.0];
        assert_eq!(w.matvec(&v), vec![-2.0, 14.0]);

        // wᵀ·u equals the explicit sum of columns weighted by u
        let u = [1.0, -1.0];
        assert_eq!(w.matvec_transposed(&u), vec![-2.0, -6.0, 1.5]);
    }

    #[test]
    fn test_parallel_matvec_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = Tensor::random_normal(vec![200, 100], 1.0, &mut rng);
        let v: Vec<f64> = (0..100).map(|i| (i as f64).sin()).collect();

        let parallel = w.matvec(&v);
        let sequential: Vec<f64> = (0..200)
            .map(|i| (0..100).map(|j| w.get(i, j) * v[j]).sum())
            .collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_column_selects_one_hot_product() {
        let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        assert_eq!(w.column(1), w.matvec(&[0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_add_outer_and_column() {
        let mut a = Tensor::zeros(vec![2, 3]);
        a.add_outer(&[1.0, 2.0], &[0.0, 1.0, 0.0]);

        let mut b = Tensor::zeros(vec![2, 3]);
        b.add_to_column(1, &[1.0, 2.0]);

        assert_eq!(a, b);
        assert_eq!(b.get(1, 1), 2.0);
    }

    #[test]
    fn test_clamp_and_max_abs() {
        let mut t = Tensor::new(vec![-9.0, 0.5, 7.0, -1.0], vec![4, 1]);
        t.clamp_in_place(-5.0, 5.0);
        assert_eq!(t.data, vec![-5.0, 0.5, 5.0, -1.0]);
        assert_eq!(t.max_abs(), 5.0);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let p = softmax(&[1000.0, 1000.0, -1000.0]);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!(p[2] < 1e-300);
    }

    #[test]
    fn test_log_sum_exp() {
        let y = [0.5, -1.0, 2.0];
        let direct = y.iter().map(|x: &f64| x.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&y) - direct).abs() < 1e-12);

        // Cross-entropy of a target whose probability underflows to 0
        let y = [800.0, 0.0, 0.0];
        assert_eq!(softmax(&y)[1], 0.0);
        assert!((log_sum_exp(&y) - y[1] - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
    }

    #[test]
    fn test_serde_recomputes_strides() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2]);
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("strides"));
        let back: Tensor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_deserialize_rejects_bad_shape() {
        let json = r#"{"shape":[2,2],"data":[1.0,2.0,3.0]}"#;
        assert!(serde_json::from_str::<Tensor>(json).is_err());
    }
}
