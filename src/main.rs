//! DAFX CLI - Offline Effect Rendering
//!
//! Command-line interface for running WAV files through the DAFX effect units.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use dafx::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("DAFX v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("DAFX v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Render {
            effect,
            input,
            output,
            params,
            block_size,
            bit_depth,
        } => commands::render(
            &effect,
            &input,
            &output,
            params.as_deref(),
            block_size,
            bit_depth,
        )
        .with_context(|| format!("render {} failed for {}", effect, input.display())),
        Commands::Split {
            input,
            low,
            high,
            cutoff,
            order,
            block_size,
            bit_depth,
        } => commands::split(&input, &low, &high, cutoff, order, block_size, bit_depth)
            .with_context(|| format!("split failed for {}", input.display())),
        Commands::Curve {
            effect,
            params,
            block_size,
            sample_rate,
        } => commands::curve(&effect, params.as_deref(), block_size, sample_rate)
            .with_context(|| format!("curve failed for {}", effect)),
        Commands::List => commands::list().context("list failed"),
    }
}
