//! Training Logger
//!
//! Tracks training progress on the console and, optionally, in a CSV file
//! for later plotting.
//!
//! ## Example
//!
//! ```rust,no_run
//! use puck::TrainingLogger;
//!
//! let mut logger = TrainingLogger::with_csv("training_log.csv")
//!     .expect("Failed to create logger");
//!
//! // iteration, loss, smooth loss, sequence length, gradient norm, sample
//! logger.log(100, 78.2, 80.1, 25, 12.4, Some("Thou art"))
//!     .expect("Failed to log");
//! ```
//!
//! ## CSV Format
//!
//! - `iteration`: Training iteration number
//! - `elapsed_seconds`: Time since the logger was created
//! - `loss`: Loss of this iteration's window (summed over its characters)
//! - `smooth_loss`: Exponential moving average of the window loss
//! - `perplexity`: `exp(smooth_loss / seq_length)`, per character
//! - `grad_norm`: L2 norm of the clipped gradients
//! - `sample`: Generated text sample, if one was drawn this iteration
//!
//! ## Perplexity
//!
//! Per-character perplexity is the effective number of characters the model
//! is choosing between:
//!
//! - **Untrained model**: perplexity ≈ V (uniform over the vocabulary)
//! - **Trained on Shakespeare**: perplexity drops to roughly 4-6
//! - **Perfect model**: perplexity = 1.0

use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Console and CSV logger for training metrics
pub struct TrainingLogger {
    log_file: Option<File>,
    console: bool,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Log to the console only
    pub fn console() -> Self {
        let now = Instant::now();
        Self {
            log_file: None,
            console: true,
            start_time: now,
            last_log_time: now,
        }
    }

    /// Log to the console and to a CSV file at `log_path`
    ///
    /// Creates (or truncates) the file and writes the header row.
    pub fn with_csv<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let mut log_file = File::create(log_path)?;
        writeln!(
            log_file,
            "iteration,elapsed_seconds,loss,smooth_loss,perplexity,grad_norm,sample"
        )?;

        let mut logger = Self::console();
        logger.log_file = Some(log_file);
        Ok(logger)
    }

    /// Disable console output (CSV output, if any, is kept)
    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    /// Record one iteration
    pub fn log(
        &mut self,
        iteration: usize,
        loss: f64,
        smooth_loss: f64,
        seq_length: usize,
        grad_norm: f64,
        sample: Option<&str>,
    ) -> Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let perplexity = (smooth_loss / seq_length.max(1) as f64).exp();

        if let Some(file) = self.log_file.as_mut() {
            let sample_escaped = sample.map(|s| s.replace('"', "\"\"")).unwrap_or_default();
            writeln!(
                file,
                "{},{:.2},{:.4},{:.4},{:.4},{:.4},\"{}\"",
                iteration, elapsed, loss, smooth_loss, perplexity, grad_norm, sample_escaped
            )?;
            // Keep the log usable if training dies with NaN
            file.flush()?;
        }

        if self.console {
            let step_time = self.last_log_time.elapsed().as_secs_f64();
            println!(
                "Iter {:6} | Time: {:7.1}s (+{:.1}s) | Loss: {:8.4} | Smooth: {:8.4} | Perplexity: {:6.2} | Grad: {:.3}",
                iteration, elapsed, step_time, loss, smooth_loss, perplexity, grad_norm
            );
            if let Some(text) = sample {
                println!("----\n{}\n----", text);
            }
        }

        self.last_log_time = Instant::now();
        Ok(())
    }
}
