//! CLI Module
//!
//! Command-line adapter: renders WAV files through the DSP units.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::{DEFAULT_CASCADE_ORDER, DEFAULT_SAMPLE_RATE};

/// DAFX effects processor
#[derive(Parser, Debug)]
#[command(name = "dafx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a WAV file through one effect, each channel independently
    #[command(name = "render")]
    Render {
        /// Effect name (see `list`)
        #[arg(short, long)]
        effect: String,

        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with effect parameters
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Samples per processing block
        #[arg(short, long, default_value_t = 256)]
        block_size: usize,

        /// Output bit depth (16, 24 or 32 for float)
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,
    },

    /// Split a WAV file into low and high bands
    #[command(name = "split")]
    Split {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file for the low band
        #[arg(long)]
        low: PathBuf,

        /// Output WAV file for the high band
        #[arg(long)]
        high: PathBuf,

        /// Crossover frequency in Hz
        #[arg(short, long, default_value_t = 2000.0)]
        cutoff: f32,

        /// Number of cascaded biquads per band
        #[arg(long, default_value_t = DEFAULT_CASCADE_ORDER)]
        order: usize,

        /// Samples per processing block
        #[arg(short, long, default_value_t = 256)]
        block_size: usize,

        /// Output bit depth (16, 24 or 32 for float)
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,
    },

    /// Print a transfer curve as JSON
    #[command(name = "curve")]
    Curve {
        /// Curve source: dynamics (overdrive) or softclip
        #[arg(short, long)]
        effect: String,

        /// JSON file with effect parameters
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Number of curve points
        #[arg(short, long, default_value_t = 256)]
        block_size: usize,

        /// Sample rate the effect is configured for
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: f32,
    },

    /// List available effects
    #[command(name = "list")]
    List,
}
