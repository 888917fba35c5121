//! Event types emitted by the tokenizer.
//!
//! [`Event`] is the generic token: a run of frames plus the index span it
//! covers. [`AudioEvent`] carries the concatenated PCM payload of a
//! detection together with its audio parameters and second-domain bounds.

use crate::error::{AudsplitError, Result};
use std::path::Path;

/// A finalized detection over a generic frame stream.
///
/// `start` and `end` are zero-based frame indices, both inclusive.
/// `frames` holds the raw frame payloads in input order, including any
/// tolerated non-valid frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<F> {
    /// Frame payloads in original order.
    pub frames: Vec<F>,
    /// Index of the first frame of the event.
    pub start: usize,
    /// Index of the last frame of the event (inclusive).
    pub end: usize,
}

impl<F> Event<F> {
    /// Number of frames in the event.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True if the event carries no frames. Never the case for events
    /// delivered by the tokenizer.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A detected audio event: contiguous analysis windows that passed the
/// duration and silence-tolerance rules.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEvent {
    /// Concatenated raw PCM payload of the event's frames.
    pub data: Vec<u8>,
    /// Index of the first analysis window.
    pub start_frame: usize,
    /// Index of the last analysis window (inclusive).
    pub end_frame: usize,
    /// Event start in seconds from the beginning of the stream.
    pub start: f64,
    /// Event end in seconds from the beginning of the stream.
    pub end: f64,
    /// Sampling rate of the payload in Hz.
    pub sampling_rate: u32,
    /// Bytes per sample of the payload.
    pub sample_width: u16,
    /// Number of interleaved channels in the payload.
    pub channels: u16,
}

impl AudioEvent {
    /// Event duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Number of sample frames (one sample per channel) in the payload.
    pub fn len_samples(&self) -> usize {
        self.data.len() / (self.sample_width as usize * self.channels as usize)
    }

    /// Writes the payload to a WAV file.
    pub fn save_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_wav(
            path.as_ref(),
            &self.data,
            self.sampling_rate,
            self.sample_width,
            self.channels,
        )
    }

    /// Writes the payload to a headerless raw PCM file.
    pub fn save_raw<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Writes raw little-endian signed PCM bytes to a WAV file.
pub fn write_wav(
    path: &Path,
    data: &[u8],
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: sampling_rate,
        bits_per_sample: sample_width * 8,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| {
        AudsplitError::WavFormat {
            message: format!("failed to create WAV file: {}", e),
        }
    })?;
    let write_err = |e: hound::Error| AudsplitError::WavFormat {
        message: format!("failed to write WAV samples: {}", e),
    };
    match sample_width {
        1 => {
            for &byte in data {
                writer.write_sample(byte as i8).map_err(write_err)?;
            }
        }
        2 => {
            for chunk in data.chunks_exact(2) {
                let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
                writer.write_sample(sample).map_err(write_err)?;
            }
        }
        4 => {
            for chunk in data.chunks_exact(4) {
                let sample = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                writer.write_sample(sample).map_err(write_err)?;
            }
        }
        other => {
            return Err(AudsplitError::AudioParameter {
                message: format!("sample width must be 1, 2 or 4 bytes, got {}", other),
            });
        }
    }
    writer.finalize().map_err(|e| AudsplitError::WavFormat {
        message: format!("failed to finalize WAV file: {}", e),
    })?;
    Ok(())
}
