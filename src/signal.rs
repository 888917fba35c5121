//! Signal primitives: PCM sample decoding, channel reduction and
//! log-energy computation.
//!
//! Raw audio bytes are little-endian signed integers of 1, 2 or 4 bytes per
//! sample, with channels interleaved sample by sample.

use crate::error::{AudsplitError, Result};
use std::str::FromStr;

/// Floor applied to the root-mean-square before taking the logarithm,
/// so that an all-zero window has a finite energy instead of -inf.
const RMS_FLOOR: f64 = 1e-10;

/// Log energy of a perfectly silent window (`20 * log10(RMS_FLOOR)`).
pub const SILENCE_ENERGY: f64 = -200.0;

/// Channel reduction policy applied between a multi-channel source and the
/// energy computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelector {
    /// Validate each channel independently; a window is valid if any
    /// channel passes (the maximum per-channel energy is used).
    Any,
    /// Use one channel, selected by zero-based index.
    Index(usize),
    /// Mix all channels down to their arithmetic mean.
    Mix,
}

impl Default for ChannelSelector {
    fn default() -> Self {
        ChannelSelector::Any
    }
}

impl FromStr for ChannelSelector {
    type Err = AudsplitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "any" => Ok(ChannelSelector::Any),
            "mix" | "avg" | "average" => Ok(ChannelSelector::Mix),
            other => match other.parse::<usize>() {
                Ok(index) => Ok(ChannelSelector::Index(index)),
                Err(_) => Err(AudsplitError::ConfigInvalidValue {
                    key: "channel".to_string(),
                    message: format!(
                        "expected \"any\", \"mix\" or a channel index, got \"{}\"",
                        other
                    ),
                }),
            },
        }
    }
}

impl ChannelSelector {
    /// Validates this selector against the number of channels of a stream.
    pub fn validate(&self, channels: u16) -> Result<()> {
        if let ChannelSelector::Index(index) = self
            && *index >= channels as usize
        {
            return Err(AudsplitError::AudioParameter {
                message: format!(
                    "channel index {} out of range for {} channel(s)",
                    index, channels
                ),
            });
        }
        Ok(())
    }
}

/// Decodes little-endian signed PCM bytes into f64 samples.
///
/// `sample_width` must be 1, 2 or 4 bytes and `data` must contain a whole
/// number of samples.
pub fn to_samples(data: &[u8], sample_width: u16) -> Result<Vec<f64>> {
    let width = sample_width as usize;
    if !matches!(width, 1 | 2 | 4) {
        return Err(AudsplitError::AudioParameter {
            message: format!("sample width must be 1, 2 or 4 bytes, got {}", sample_width),
        });
    }
    if data.len() % width != 0 {
        return Err(AudsplitError::AudioParameter {
            message: format!(
                "data length {} is not a multiple of sample width {}",
                data.len(),
                width
            ),
        });
    }
    let samples = match width {
        1 => data.iter().map(|&b| b as i8 as f64).collect(),
        2 => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f64)
            .collect(),
        _ => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
    };
    Ok(samples)
}

/// Extracts one channel from interleaved samples.
pub fn channel_lane(samples: &[f64], channels: u16, index: usize) -> Vec<f64> {
    samples
        .iter()
        .skip(index)
        .step_by(channels as usize)
        .copied()
        .collect()
}

/// Mixes interleaved samples down to the arithmetic mean across channels.
pub fn mix_channels(samples: &[f64], channels: u16) -> Vec<f64> {
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f64>() / ch as f64)
        .collect()
}

/// Computes the log energy of a window of samples:
/// `20 * log10(max(sqrt(mean(x^2)), floor))`.
///
/// Accumulation is done in f64 so that large 16-bit windows cannot
/// overflow the sum of squares.
pub fn log_energy(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return SILENCE_ENERGY;
    }
    let sum_squares: f64 = samples.iter().map(|&x| x * x).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    20.0 * rms.max(RMS_FLOOR).log10()
}

/// Log energy of an interleaved multi-channel window under a reduction
/// policy. `Any` reduces to the maximum of the per-channel energies.
pub fn reduced_energy(samples: &[f64], channels: u16, selector: ChannelSelector) -> f64 {
    if channels <= 1 {
        return log_energy(samples);
    }
    match selector {
        ChannelSelector::Any => (0..channels as usize)
            .map(|c| log_energy(&channel_lane(samples, channels, c)))
            .fold(f64::NEG_INFINITY, f64::max),
        ChannelSelector::Index(index) => log_energy(&channel_lane(samples, channels, index)),
        ChannelSelector::Mix => log_energy(&mix_channels(samples, channels)),
    }
}
