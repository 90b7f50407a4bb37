//! WAV file I/O for the command-line adapter
//!
//! Reads integer (8/16/24/32-bit) and float WAV files into per-channel `f32`
//! buffers and writes them back as 16/24-bit integer or 32-bit float. The
//! sample rate is carried through unchanged.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{DafxError, Result};

/// Decoded audio: one `Vec<f32>` per channel
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// De-interleaved channel data, all of equal length
    pub channels: Vec<Vec<f32>>,
}

impl WavAudio {
    /// Wrap a single channel
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel
    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Read a WAV file into per-channel float buffers
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
/// * `UnsupportedFormat` - If the integer bit depth is not 8, 16, 24 or 32
pub fn read_wav(path: &Path) -> Result<WavAudio> {
    if !path.exists() {
        return Err(DafxError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let reader = WavReader::open(path).map_err(|e| DafxError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    log::debug!(
        "read {}: {} Hz, {} channel(s), {}-bit {:?}",
        path.display(),
        spec.sample_rate,
        channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    Ok(WavAudio {
        sample_rate: spec.sample_rate,
        channels: deinterleave(&samples, channels),
    })
}

/// Write per-channel float buffers to a WAV file
///
/// `bit_depth` selects 16 or 24-bit integer, or 32-bit float output.
pub fn write_wav(audio: &WavAudio, path: &Path, bit_depth: u16) -> Result<()> {
    let sample_format = match bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        _ => {
            return Err(DafxError::UnsupportedFormat {
                format: format!("{}-bit output (only 16, 24, 32 supported)", bit_depth),
            })
        }
    };

    let spec = WavSpec {
        channels: audio.num_channels() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: bit_depth,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec).map_err(io_error)?;
    for sample in interleave(&audio.channels) {
        match bit_depth {
            16 => {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(io_error)?;
            }
            24 => {
                // 24-bit is stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(io_error)?;
            }
            _ => writer.write_sample(sample).map_err(io_error)?,
        }
    }
    writer.finalize().map_err(io_error)?;

    log::debug!(
        "wrote {}: {} frames, {}-bit",
        path.display(),
        audio.num_frames(),
        bit_depth
    );
    Ok(())
}

fn io_error(e: hound::Error) -> DafxError {
    match e {
        hound::Error::IoError(io) => DafxError::Io(io),
        other => DafxError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| DafxError::InvalidAudio {
                    reason: format!("Failed to read float samples: {}", e),
                    source: Some(Box::new(e)),
                });
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => {
            return Err(DafxError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            })
        }
    };

    // hound widens every integer depth to i32
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (v as f64 / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| DafxError::InvalidAudio {
            reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
            source: Some(Box::new(e)),
        })
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for (i, sample) in samples.iter().take(frames * channels).enumerate() {
        result[i % channels].push(*sample);
    }

    result
}

/// Interleave channels from [[L,L,...], [R,R,...]] to [L,R,L,R,...]
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut result = Vec::with_capacity(frames * channels.len());

    for frame in 0..frames {
        for channel in channels {
            result.push(channel[frame]);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sine(frequency: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * frequency * i as f32 / 48000.0).sin())
            .collect()
    }

    #[test]
    fn test_interleave_deinterleave() {
        let left = vec![1.0, 2.0, 3.0, 4.0];
        let right = vec![5.0, 6.0, 7.0, 8.0];

        let interleaved = interleave(&[left.clone(), right.clone()]);
        assert_eq!(interleaved, vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0]);

        let channels = deinterleave(&interleaved, 2);
        assert_eq!(channels[0], left);
        assert_eq!(channels[1], right);
    }

    #[test]
    fn test_stereo_24bit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let audio = WavAudio {
            sample_rate: 48000,
            channels: vec![sine(440.0, 4800), sine(880.0, 4800)],
        };

        write_wav(&audio, &path, 24).unwrap();
        let read = read_wav(&path).unwrap();

        assert_eq!(read.sample_rate, 48000);
        assert_eq!(read.num_channels(), 2);
        assert_eq!(read.num_frames(), 4800);
        for (orig, back) in audio.channels.iter().zip(&read.channels) {
            for (a, b) in orig.iter().zip(back) {
                assert!((a - b).abs() < 1e-5, "Sample mismatch: {} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_float_file_is_lossless() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let audio = WavAudio::mono(44100, sine(1000.0, 1000));

        write_wav(&audio, &path, 32).unwrap();
        assert_eq!(read_wav(&path).unwrap(), audio);
    }

    #[test]
    fn test_16bit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("16bit.wav");
        let audio = WavAudio::mono(48000, sine(1000.0, 1000));

        write_wav(&audio, &path, 16).unwrap();
        let read = read_wav(&path).unwrap();
        for (a, b) in audio.channels[0].iter().zip(&read.channels[0]) {
            assert!((a - b).abs() < 1e-4, "Sample mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_errors() {
        let err = read_wav(Path::new("/nonexistent/path/audio.wav")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");

        let dir = tempdir().unwrap();
        let audio = WavAudio::mono(48000, vec![0.0; 16]);
        let err = write_wav(&audio, &dir.path().join("x.wav"), 12).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }
}
