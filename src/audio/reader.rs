//! Source wrappers and the analysis-window scanner.
//!
//! [`RecordingSource`] makes any source rewindable by caching the bytes it
//! reads; [`LimitedSource`] caps how much data a source may produce;
//! [`FrameReader`] slices the byte stream into fixed-size, possibly
//! overlapping analysis windows and is the [`FrameSource`] fed to the
//! tokenizer.

use crate::audio::source::{AudioSource, BufferSource};
use crate::error::{AudsplitError, Result};
use crate::tokenizer::FrameSource;
use tracing::debug;

/// Wrapper that records every byte read from the inner source.
///
/// Before the first rewind, reads are served by the inner source and
/// cached. A rewind switches the wrapper to replay mode: all subsequent
/// reads are served from the in-memory cache and the recorded bytes
/// become available through [`data`](Self::data).
pub struct RecordingSource<S: AudioSource> {
    inner: S,
    cache: Vec<u8>,
    replay: Option<BufferSource>,
}

impl<S: AudioSource> RecordingSource<S> {
    /// Wraps `inner`, recording everything it produces.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Vec::new(),
            replay: None,
        }
    }

    /// The recorded bytes. `None` until the first rewind.
    pub fn data(&self) -> Option<&[u8]> {
        self.replay.as_ref().map(|buffer| buffer.data())
    }
}

impl<S: AudioSource> AudioSource for RecordingSource<S> {
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        if let Some(buffer) = &mut self.replay {
            return buffer.read(size);
        }
        let block = self.inner.read(size)?;
        if let Some(bytes) = &block {
            self.cache.extend_from_slice(bytes);
        }
        Ok(block)
    }

    fn sampling_rate(&self) -> u32 {
        self.inner.sampling_rate()
    }

    fn sample_width(&self) -> u16 {
        self.inner.sample_width()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn rewind(&mut self) -> Result<()> {
        match &mut self.replay {
            Some(buffer) => buffer.rewind(),
            None => {
                let data = std::mem::take(&mut self.cache);
                debug!(bytes = data.len(), "switching recorder to replay mode");
                self.replay = Some(BufferSource::new(
                    data,
                    self.inner.sampling_rate(),
                    self.inner.sample_width(),
                    self.inner.channels(),
                )?);
                Ok(())
            }
        }
    }

    fn is_rewindable(&self) -> bool {
        true
    }
}

/// Wrapper that bounds the amount of data read from the inner source.
///
/// Once `round(max_read * sampling_rate)` sample frames have been
/// produced, the wrapper reports end of stream.
pub struct LimitedSource<S: AudioSource> {
    inner: S,
    max_samples: u64,
    read_samples: u64,
}

impl<S: AudioSource> LimitedSource<S> {
    /// Wraps `inner`, limiting it to `max_read` seconds of audio.
    pub fn new(inner: S, max_read: f64) -> Result<Self> {
        if max_read <= 0.0 {
            return Err(AudsplitError::AudioParameter {
                message: format!("max_read must be > 0, got {}", max_read),
            });
        }
        let max_samples = (max_read * inner.sampling_rate() as f64).round() as u64;
        Ok(Self {
            inner,
            max_samples,
            read_samples: 0,
        })
    }
}

impl<S: AudioSource> AudioSource for LimitedSource<S> {
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        let remaining = self.max_samples.saturating_sub(self.read_samples);
        if remaining == 0 {
            return Ok(None);
        }
        let size = std::cmp::min(size as u64, remaining) as usize;
        match self.inner.read(size)? {
            Some(block) => {
                self.read_samples += (block.len() / self.frame_width()) as u64;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    fn sampling_rate(&self) -> u32 {
        self.inner.sampling_rate()
    }

    fn sample_width(&self) -> u16 {
        self.inner.sample_width()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()?;
        self.read_samples = 0;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        self.inner.is_rewindable()
    }
}

/// Slices a byte source into fixed-size analysis windows.
///
/// A window covers `block_size` sample frames and consecutive windows are
/// `hop_size` frames apart (`hop_size == block_size` means no overlap).
/// The k-th window covers samples `[k*hop, k*hop + block)`. A trailing
/// stretch shorter than a full window is never exposed.
#[derive(Debug)]
pub struct FrameReader<S: AudioSource> {
    source: S,
    block_size: usize,
    hop_size: usize,
    /// Tail of the previous window reused by the next one when
    /// overlapping.
    carry: Vec<u8>,
    started: bool,
    exhausted: bool,
}

impl<S: AudioSource> FrameReader<S> {
    /// Creates a reader of non-overlapping windows of `block_size` sample
    /// frames.
    pub fn new(source: S, block_size: usize) -> Result<Self> {
        Self::with_hop(source, block_size, block_size)
    }

    /// Creates a reader with explicit block and hop sizes in sample
    /// frames. `0 < hop_size <= block_size`.
    pub fn with_hop(source: S, block_size: usize, hop_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(AudsplitError::AudioParameter {
                message: "block size must be > 0".to_string(),
            });
        }
        if hop_size == 0 || hop_size > block_size {
            return Err(AudsplitError::AudioParameter {
                message: format!(
                    "hop size must be in 1..={}, got {}",
                    block_size, hop_size
                ),
            });
        }
        Ok(Self {
            source,
            block_size,
            hop_size,
            carry: Vec::new(),
            started: false,
            exhausted: false,
        })
    }

    /// Creates a reader whose window covers `block_dur` seconds
    /// (`samples = round(rate * dur)`).
    pub fn from_duration(source: S, block_dur: f64) -> Result<Self> {
        let block_size = duration_to_samples(source.sampling_rate(), block_dur, "block_dur")?;
        Self::new(source, block_size)
    }

    /// Creates a reader from window and hop durations in seconds.
    pub fn from_durations(source: S, block_dur: f64, hop_dur: f64) -> Result<Self> {
        let block_size = duration_to_samples(source.sampling_rate(), block_dur, "block_dur")?;
        let hop_size = duration_to_samples(source.sampling_rate(), hop_dur, "hop_dur")?;
        Self::with_hop(source, block_size, hop_size)
    }

    /// Window size in sample frames.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Advance between consecutive windows in sample frames.
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Window duration in seconds.
    pub fn block_dur(&self) -> f64 {
        self.block_size as f64 / self.source.sampling_rate() as f64
    }

    /// Advance between consecutive windows in seconds.
    pub fn hop_dur(&self) -> f64 {
        self.hop_size as f64 / self.source.sampling_rate() as f64
    }

    /// Sampling rate of the underlying source in Hz.
    pub fn sampling_rate(&self) -> u32 {
        self.source.sampling_rate()
    }

    /// Bytes per sample of the underlying source.
    pub fn sample_width(&self) -> u16 {
        self.source.sample_width()
    }

    /// Channel count of the underlying source.
    pub fn channels(&self) -> u16 {
        self.source.channels()
    }

    /// The wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the wrapped source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// True if the underlying source supports rewinding.
    pub fn is_rewindable(&self) -> bool {
        self.source.is_rewindable()
    }

    /// Rewinds the underlying source and resets the framing state.
    ///
    /// Fails for sources that are neither seekable nor recording.
    pub fn rewind(&mut self) -> Result<()> {
        self.source.rewind()?;
        self.carry.clear();
        self.started = false;
        self.exhausted = false;
        debug!("frame reader rewound");
        Ok(())
    }

    /// Reads exactly `samples` sample frames, or `None` when the stream
    /// cannot fill them (the partial tail is dropped).
    fn fill_block(&mut self, samples: usize) -> Result<Option<Vec<u8>>> {
        let frame_width = self.source.frame_width();
        let wanted = samples * frame_width;
        let mut buf = Vec::with_capacity(wanted);
        while buf.len() < wanted {
            let missing = (wanted - buf.len()).div_ceil(frame_width);
            match self.source.read(missing)? {
                Some(bytes) if !bytes.is_empty() => buf.extend_from_slice(&bytes),
                _ => return Ok(None),
            }
        }
        Ok(Some(buf))
    }
}

impl<S: AudioSource> FrameSource for FrameReader<S> {
    type Frame = Vec<u8>;

    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        let overlapping = self.hop_size < self.block_size;
        let frame = if !self.started {
            self.fill_block(self.block_size)?
        } else if overlapping {
            match self.fill_block(self.hop_size)? {
                Some(fresh) => {
                    let mut frame = std::mem::take(&mut self.carry);
                    frame.extend_from_slice(&fresh);
                    Some(frame)
                }
                None => None,
            }
        } else {
            self.fill_block(self.block_size)?
        };
        match frame {
            Some(frame) => {
                self.started = true;
                if overlapping {
                    let hop_bytes = self.hop_size * self.source.frame_width();
                    self.carry = frame[hop_bytes..].to_vec();
                }
                Ok(Some(frame))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

/// Converts a duration in seconds to a sample count, rejecting durations
/// that do not cover at least one sample.
fn duration_to_samples(sampling_rate: u32, duration: f64, key: &str) -> Result<usize> {
    if duration <= 0.0 {
        return Err(AudsplitError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!("must be > 0, got {}", duration),
        });
    }
    let samples = (duration * sampling_rate as f64).round() as usize;
    if samples == 0 {
        return Err(AudsplitError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!(
                "{} is too small for sampling rate {}; it should cover at \
                 least one sample (1/{})",
                duration, sampling_rate, sampling_rate
            ),
        });
    }
    Ok(samples)
}
