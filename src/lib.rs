//! Puck: Educational Character-Level RNN
//!
//! A vanilla recurrent neural network that learns to write text one
//! character at a time, implemented from scratch in Rust for educational
//! purposes. Every gradient is derived by hand and every update is explicit.
//! Named after the mischievous sprite of *A Midsummer Night's Dream*.
//!
//! # Modules
//!
//! - [`vocabulary`] - Character vocabulary and corpus encoding
//! - [`tensor`] - Minimal 1-D/2-D tensor with the products the RNN needs
//! - [`model`] - Parameters, forward pass and backpropagation through time
//! - [`gradients`] - Gradient container and element-wise clipping
//! - [`optimizer`] - Adagrad
//! - [`sampler`] - Autoregressive text generation
//! - [`train`] - Windowed training loop and stopping policies
//! - [`training_logger`] - Console and CSV progress logging
//! - [`checkpoint`] - Save and resume training runs
//! - [`error`] - Error type shared by the crate
//!
//! # Example
//!
//! ```rust,no_run
//! use puck::{CharRnn, MaxIterations, RnnConfig, Trainer, TrainingConfig, TrainingLogger, Vocabulary};
//!
//! let text = std::fs::read_to_string("shakespeare.txt").unwrap();
//! let vocab = Vocabulary::from_text(&text);
//! let corpus = vocab.encode(&text).unwrap();
//!
//! let model = CharRnn::from_seed(RnnConfig::notebook(vocab.size()), 42).unwrap();
//! let mut trainer = Trainer::new(model, TrainingConfig::default()).unwrap();
//! let mut logger = TrainingLogger::console();
//!
//! trainer
//!     .train(&corpus, &vocab, &mut MaxIterations(10_000), &mut logger)
//!     .unwrap();
//! ```

pub mod checkpoint;
pub mod error;
pub mod gradients;
pub mod model;
pub mod optimizer;
pub mod sampler;
pub mod tensor;
pub mod train;
pub mod training_logger;
pub mod vocabulary;

// Re-export main types for convenience
pub use checkpoint::Checkpoint;
pub use error::{PuckError, Result};
pub use gradients::RnnGradients;
pub use model::{CharRnn, RnnConfig};
pub use optimizer::AdagradOptimizer;
pub use tensor::Tensor;
pub use train::{
    AnyOf, LossBelow, MaxDuration, MaxIterations, StoppingPolicy, Trainer, TrainingConfig,
};
pub use training_logger::TrainingLogger;
pub use vocabulary::Vocabulary;
