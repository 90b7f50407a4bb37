//! Audio Engine Module
//!
//! Adapters around the DSP units:
//! - WAV file I/O
//! - Offline block rendering

pub mod io;
pub mod render;

pub use io::{read_wav, write_wav, WavAudio};
pub use render::{render_crossover, render_effect};
