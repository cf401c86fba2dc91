//! Generate Text from a Trained Checkpoint
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example generate -- --checkpoint puck.json \
//!     --prompt "ROMEO:" --length 500 --temperature 0.8
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use puck::{sampler, Checkpoint};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser)]
#[command(name = "generate", about = "Sample text from a trained character RNN")]
struct Args {
    /// Checkpoint written by the train example
    #[arg(long)]
    checkpoint: String,

    /// Text to prime the hidden state with
    #[arg(long, default_value = "\n")]
    prompt: String,

    /// Number of characters to generate
    #[arg(long, default_value = "500")]
    length: usize,

    /// Sampling temperature (lower is more conservative)
    #[arg(long, default_value = "1.0")]
    temperature: f64,

    /// Seed for the sampling RNG
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let checkpoint = Checkpoint::load(&args.checkpoint)
        .with_context(|| format!("Failed to load {}", args.checkpoint))?;
    println!(
        "Loaded {} (iteration {}, {} parameters)",
        args.checkpoint,
        checkpoint.state.iteration,
        checkpoint.model.num_parameters()
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let text = sampler::generate_text(
        &checkpoint.model,
        &checkpoint.vocabulary,
        &args.prompt,
        args.length,
        args.temperature,
        &mut rng,
    )
    .context("Failed to generate text")?;

    println!("----\n{}\n----", text);
    Ok(())
}
