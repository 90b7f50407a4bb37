//! Offline block rendering
//!
//! Drives whole signals through units in fixed-size blocks. The last partial
//! block is zero-padded on the way in and trimmed on the way out, so every call
//! into a unit sees exactly `block_size` samples.

use crate::dsp::{Crossover, Effect};

/// Run `input` through `effect` block by block
pub fn render_effect(effect: &mut dyn Effect, input: &[f32]) -> Vec<f32> {
    let block_size = effect.config().block_size;
    let mut output = Vec::with_capacity(input.len());
    let mut in_block = vec![0.0; block_size];
    let mut out_block = vec![0.0; block_size];

    for chunk in input.chunks(block_size) {
        in_block[..chunk.len()].copy_from_slice(chunk);
        in_block[chunk.len()..].fill(0.0);
        effect.process(&in_block, &mut out_block);
        output.extend_from_slice(&out_block[..chunk.len()]);
    }

    output
}

/// Split `input` into low and high bands block by block
pub fn render_crossover(crossover: &mut Crossover, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let block_size = crossover.config().block_size;
    let mut low = Vec::with_capacity(input.len());
    let mut high = Vec::with_capacity(input.len());
    let mut in_block = vec![0.0; block_size];
    let mut low_block = vec![0.0; block_size];
    let mut high_block = vec![0.0; block_size];

    for chunk in input.chunks(block_size) {
        in_block[..chunk.len()].copy_from_slice(chunk);
        in_block[chunk.len()..].fill(0.0);
        crossover.process_block(&in_block, &mut low_block, &mut high_block);
        low.extend_from_slice(&low_block[..chunk.len()]);
        high.extend_from_slice(&high_block[..chunk.len()]);
    }

    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{IntegerSampleDelayLine, ProcessConfig};

    #[test]
    fn test_partial_last_block_is_trimmed() {
        let config = ProcessConfig::new(48000.0, 16).unwrap();
        let mut line = IntegerSampleDelayLine::new(config).unwrap();
        line.set_delay_ms(0.0);

        let input: Vec<f32> = (0..37).map(|i| i as f32).collect();
        let output = render_effect(&mut line, &input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_crossover_bands_have_input_length() {
        let config = ProcessConfig::new(48000.0, 32).unwrap();
        let mut crossover = Crossover::new(config).unwrap();
        let input = vec![0.25; 100];
        let (low, high) = render_crossover(&mut crossover, &input);
        assert_eq!(low.len(), 100);
        assert_eq!(high.len(), 100);
    }
}
