//! DAFX - Digital Audio Effects
//!
//! Stateful, block-oriented effect units built from a small set of primitives:
//! - Primitives: biquad and first-order filters, integer-sample delay line, LFO
//! - Composites: Linkwitz-Riley crossover, Crybaby wah, tremolo, vibrato
//! - Waveshaping: overdrive dynamics (compressor/expander) and soft clipper
//!
//! # Processing model
//!
//! Every unit is created for a fixed `ProcessConfig` (sample rate and block
//! size), keeps its state between calls, and processes exactly one block per
//! call. Parameters may be changed between blocks.

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;

pub use error::{DafxError, Result};
