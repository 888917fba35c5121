//! Frame validation: the predicate that drives the stream tokenizer.
//!
//! A validator maps a frame to a boolean verdict. The reference
//! implementation thresholds the log energy of a PCM window; any type
//! with the same one-method shape works for symbolic streams.

use crate::error::Result;
use crate::signal::{self, ChannelSelector};

/// Predicate over frames.
///
/// Implementations must be pure: the verdict may depend only on the frame
/// and on configuration fixed before the tokenization run. Symbolic
/// streams implement this on a small predicate type; no hierarchy is
/// needed.
pub trait FrameValidator<F> {
    /// Returns true if `frame` is part of an event.
    fn is_valid(&self, frame: &F) -> bool;
}

/// Validator based on the log energy of a PCM analysis window.
///
/// A window of `N` samples is valid when
/// `10 * log10(mean(x^2)) >= energy_threshold`. Multi-channel windows are
/// reduced to one energy value by the configured [`ChannelSelector`]
/// before thresholding.
#[derive(Debug, Clone)]
pub struct EnergyValidator {
    energy_threshold: f64,
    sample_width: u16,
    channels: u16,
    selector: ChannelSelector,
}

impl EnergyValidator {
    /// Creates a validator for the given stream parameters.
    ///
    /// # Arguments
    /// * `energy_threshold` - minimum log energy of a valid window
    /// * `sample_width` - bytes per sample (1, 2 or 4)
    /// * `channels` - number of interleaved channels
    /// * `selector` - channel reduction policy
    pub fn new(
        energy_threshold: f64,
        sample_width: u16,
        channels: u16,
        selector: ChannelSelector,
    ) -> Result<Self> {
        // Fail early on parameters that would make every frame undecodable.
        signal::to_samples(&[], sample_width)?;
        selector.validate(channels)?;
        Ok(Self {
            energy_threshold,
            sample_width,
            channels,
            selector,
        })
    }

    /// Computes the reduced log energy of a window of raw PCM bytes.
    ///
    /// Windows that fail to decode (wrong length for the sample width) are
    /// treated as silent.
    pub fn energy_of(&self, frame: &[u8]) -> f64 {
        match signal::to_samples(frame, self.sample_width) {
            Ok(samples) => signal::reduced_energy(&samples, self.channels, self.selector),
            Err(_) => signal::SILENCE_ENERGY,
        }
    }

    /// Returns the current energy threshold.
    pub fn energy_threshold(&self) -> f64 {
        self.energy_threshold
    }

    /// Updates the energy threshold for subsequent runs.
    pub fn set_energy_threshold(&mut self, threshold: f64) {
        self.energy_threshold = threshold;
    }
}

impl FrameValidator<Vec<u8>> for EnergyValidator {
    fn is_valid(&self, frame: &Vec<u8>) -> bool {
        self.energy_of(frame) >= self.energy_threshold
    }
}
