//! Train a Character-Level RNN
//!
//! Train on any plain-text file using a named preset, or override individual
//! settings on the command line.
//!
//! ## Usage
//!
//! ```bash
//! # List available presets
//! cargo run --release --example train -- --list-presets
//!
//! # The classic notebook settings (H=100, 25-step windows, lr 0.1)
//! cargo run --release --example train -- --preset notebook --data shakespeare.txt
//!
//! # Stop after ten minutes or once the smoothed loss is low enough
//! cargo run --release --example train -- --preset notebook \
//!     --max-seconds 600 --target-loss 40 --checkpoint puck.json
//!
//! # Report held-out loss on the last 10% of the text
//! cargo run --release --example train -- --preset tiny --val-fraction 0.1
//!
//! # Continue a previous run
//! cargo run --release --example train -- --resume puck.json --steps 50000
//! ```
//!
//! ## Prerequisites
//!
//! Download Shakespeare corpus:
//! ```bash
//! curl -o shakespeare.txt https://www.gutenberg.org/files/100/100-0.txt
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use puck::train::{evaluate_loss, next_char_accuracy, train_val_split};
use puck::vocabulary::strip_chars;
use puck::{
    AnyOf, CharRnn, Checkpoint, LossBelow, MaxDuration, MaxIterations, RnnConfig, StoppingPolicy,
    Trainer, TrainingConfig, TrainingLogger, Vocabulary,
};
use std::fs;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "train", about = "Train a character-level RNN on a text file")]
struct Args {
    /// Named preset (see --list-presets)
    #[arg(long, default_value = "notebook")]
    preset: String,

    /// List available presets and exit
    #[arg(long)]
    list_presets: bool,

    /// Path to training text file
    #[arg(long, default_value = "shakespeare.txt")]
    data: String,

    // Model and training parameters (override the preset)
    /// Hidden state size
    #[arg(long)]
    hidden: Option<usize>,

    /// Characters per training window
    #[arg(long)]
    seq_length: Option<usize>,

    /// Adagrad learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Stop after this many iterations
    #[arg(long)]
    steps: Option<usize>,

    /// Stop after this many seconds of wall-clock time
    #[arg(long)]
    max_seconds: Option<u64>,

    /// Stop once the smoothed window loss drops below this value
    #[arg(long)]
    target_loss: Option<f64>,

    /// Print a sample every N iterations (0 disables)
    #[arg(long)]
    sample_every: Option<usize>,

    /// Characters per sample
    #[arg(long)]
    sample_length: Option<usize>,

    /// Seed for weight initialisation and sampling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Characters to remove from the text before training
    #[arg(long)]
    strip: Option<String>,

    /// Fraction of the text (taken from the end) held out for evaluation
    #[arg(long, default_value = "0.0")]
    val_fraction: f64,

    // Output
    /// Write per-iteration metrics to this CSV file
    #[arg(long)]
    log_csv: Option<String>,

    /// Save a checkpoint here when training stops
    #[arg(long)]
    checkpoint: Option<String>,

    /// Resume from a checkpoint written by --checkpoint
    #[arg(long)]
    resume: Option<String>,
}

struct Preset {
    name: &'static str,
    hidden: usize,
    seq_length: usize,
    lr: f64,
    steps: usize,
    sample_every: usize,
    description: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "notebook",
        hidden: 100,
        seq_length: 25,
        lr: 0.1,
        steps: 100_000,
        sample_every: 1000,
        description: "Classic character-RNN settings (~23k params for V=65)",
    },
    Preset {
        name: "tiny",
        hidden: 16,
        seq_length: 16,
        lr: 0.1,
        steps: 5_000,
        sample_every: 500,
        description: "Quick smoke run, seconds on any machine",
    },
    Preset {
        name: "large",
        hidden: 512,
        seq_length: 50,
        lr: 0.05,
        steps: 200_000,
        sample_every: 2000,
        description: "Wider hidden state, longer windows (parallel matvec kicks in)",
    },
];

fn print_presets() {
    println!("\nAvailable presets:\n");
    println!(
        "  {:<10} {:>6} {:>6} {:>6} {:>8}   {}",
        "NAME", "HIDDEN", "SEQ", "LR", "STEPS", "DESCRIPTION"
    );
    println!("  {}", "-".repeat(80));
    for p in PRESETS {
        println!(
            "  {:<10} {:>6} {:>6} {:>6.3} {:>8}   {}",
            p.name, p.hidden, p.seq_length, p.lr, p.steps, p.description
        );
    }
    println!("\nUsage: cargo run --release --example train -- --preset <NAME>");
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_presets {
        print_presets();
        return Ok(());
    }

    let preset = PRESETS
        .iter()
        .find(|p| p.name == args.preset)
        .with_context(|| {
            format!(
                "Unknown preset '{}'. Use --list-presets to see available options.",
                args.preset
            )
        })?;

    let hidden = args.hidden.unwrap_or(preset.hidden);
    let steps = args.steps.unwrap_or(preset.steps);
    let sample_every = args.sample_every.unwrap_or(preset.sample_every);
    let log_every = if sample_every >= 10 { sample_every / 10 } else { 100 };
    let config = TrainingConfig {
        seq_length: args.seq_length.unwrap_or(preset.seq_length),
        learning_rate: args.lr.unwrap_or(preset.lr),
        sample_every,
        sample_length: args.sample_length.unwrap_or(200),
        log_every,
        seed: args.seed,
    };

    // ========================================================================
    // 1. Load Training Data
    // ========================================================================
    println!("\n{}", "=".repeat(70));
    println!("1. Loading Training Data");
    println!("{}", "=".repeat(70));
    println!();

    let mut text = fs::read_to_string(&args.data).with_context(|| {
        if args.data == "shakespeare.txt" {
            format!(
                "{} not found. Download with:\n  \
                 curl -o shakespeare.txt https://www.gutenberg.org/files/100/100-0.txt",
                args.data
            )
        } else {
            format!("{} not found.", args.data)
        }
    })?;
    if let Some(ref remove) = args.strip {
        text = strip_chars(&text, remove);
    }

    let vocab = Vocabulary::from_text(&text);
    let corpus = vocab.encode(&text)?;
    println!(
        "Loaded: {} ({} characters, {} unique)",
        args.data,
        corpus.len(),
        vocab.size()
    );
    vocab.print_summary();

    let (train_ids, val_ids) = train_val_split(&corpus, args.val_fraction);
    println!("  Training:    {} characters", train_ids.len());
    println!("  Validation:  {} characters", val_ids.len());

    if train_ids.len() < config.min_corpus_len() {
        bail!(
            "{} leaves {} training characters; at least {} are needed for seq_length {}",
            args.data,
            train_ids.len(),
            config.min_corpus_len(),
            config.seq_length
        );
    }

    // ========================================================================
    // 2. Model
    // ========================================================================
    println!("\n{}", "=".repeat(70));
    println!("2. Model");
    println!("{}", "=".repeat(70));
    println!();

    let mut trainer = if let Some(ref path) = args.resume {
        println!("Resuming from checkpoint: {}", path);
        let checkpoint = Checkpoint::load(path)
            .with_context(|| format!("Failed to load {}", path))?;
        checkpoint
            .resume(&vocab, config)
            .context("Checkpoint does not match this corpus")?
    } else {
        let model = CharRnn::from_seed(RnnConfig::new(vocab.size(), hidden), args.seed)?;
        Trainer::new(model, config)?
    };

    let num_params = trainer.model.num_parameters();
    println!("  Vocabulary:  {}", trainer.model.vocab_size());
    println!("  Hidden size: {}", trainer.model.hidden_size());
    println!("  Parameters:  {}", num_params);
    println!("  Iteration:   {}", trainer.iteration());

    // ========================================================================
    // 3. Train
    // ========================================================================
    println!("\n{}", "=".repeat(70));
    println!("3. Training");
    println!("{}", "=".repeat(70));
    println!();

    let mut policies: Vec<Box<dyn StoppingPolicy>> = vec![Box::new(MaxIterations(steps))];
    if let Some(seconds) = args.max_seconds {
        policies.push(Box::new(MaxDuration(Duration::from_secs(seconds))));
    }
    if let Some(threshold) = args.target_loss {
        policies.push(Box::new(LossBelow(threshold)));
    }
    let mut policy = AnyOf(policies);

    let mut logger = match args.log_csv {
        Some(ref path) => TrainingLogger::with_csv(path)
            .with_context(|| format!("Failed to create {}", path))?,
        None => TrainingLogger::console(),
    };

    let summary = trainer.train(train_ids, &vocab, &mut policy, &mut logger)?;

    println!("\n{}", "=".repeat(70));
    println!("Training Complete");
    println!("{}", "=".repeat(70));
    println!(
        "  Iterations:  {} ({} this run)",
        summary.iterations, summary.iterations_run
    );
    println!("  Smooth loss: {:.4}", summary.smooth_loss);
    println!("  Time:        {:.1}s", summary.elapsed.as_secs_f64());

    // Held-out text, scored per character from a zero hidden state
    let seq_length = trainer.config.seq_length;
    if val_ids.len() > seq_length {
        let val_loss = evaluate_loss(&trainer.model, val_ids, seq_length)?;
        let accuracy = next_char_accuracy(&trainer.model, val_ids)?;
        println!(
            "  Val loss:    {:.4} per char (perplexity {:.2})",
            val_loss,
            val_loss.exp()
        );
        println!("  Val acc:     {:.1}%", accuracy * 100.0);
    } else if !val_ids.is_empty() {
        let needed = seq_length + 1;
        println!("  Validation:  skipped, fewer than {} characters", needed);
    }

    if let Some(ref path) = args.checkpoint {
        Checkpoint::from_trainer(&trainer, &vocab)
            .save(path)
            .with_context(|| format!("Failed to save {}", path))?;
        println!("  Checkpoint:  {}", path);
    }

    Ok(())
}
