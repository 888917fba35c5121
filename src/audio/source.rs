//! Byte-level audio sources.

use crate::error::{AudsplitError, Result};

/// A source of raw interleaved PCM bytes.
///
/// `read` is sized in sample frames (one sample per channel); a request
/// for `size` frames returns at most `size * sample_width * channels`
/// bytes. Once `None` has been returned the stream is exhausted and every
/// further call returns `None`.
pub trait AudioSource: Send {
    /// Reads up to `size` sample frames. Returns `None` at end of stream.
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>>;

    /// Sampling rate in Hz.
    fn sampling_rate(&self) -> u32;

    /// Bytes per sample (1, 2 or 4).
    fn sample_width(&self) -> u16;

    /// Number of interleaved channels.
    fn channels(&self) -> u16;

    /// Bytes per sample frame (all channels).
    fn frame_width(&self) -> usize {
        self.sample_width() as usize * self.channels() as usize
    }

    /// Resets the source to its start.
    ///
    /// Only seekable or recording sources support this; the default
    /// implementation fails.
    fn rewind(&mut self) -> Result<()> {
        Err(AudsplitError::RewindUnsupported {
            message: "source is not seekable and does not record".to_string(),
        })
    }

    /// True if `rewind` is supported.
    fn is_rewindable(&self) -> bool {
        false
    }
}

impl<T: AudioSource + ?Sized> AudioSource for Box<T> {
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        (**self).read(size)
    }

    fn sampling_rate(&self) -> u32 {
        (**self).sampling_rate()
    }

    fn sample_width(&self) -> u16 {
        (**self).sample_width()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn frame_width(&self) -> usize {
        (**self).frame_width()
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn is_rewindable(&self) -> bool {
        (**self).is_rewindable()
    }
}

/// Checks audio parameters shared by in-memory and raw file sources.
pub(crate) fn check_audio_parameters(
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
) -> Result<()> {
    if sampling_rate == 0 {
        return Err(AudsplitError::AudioParameter {
            message: "sampling rate must be > 0".to_string(),
        });
    }
    if !matches!(sample_width, 1 | 2 | 4) {
        return Err(AudsplitError::AudioParameter {
            message: format!("sample width must be 1, 2 or 4 bytes, got {}", sample_width),
        });
    }
    if channels == 0 {
        return Err(AudsplitError::AudioParameter {
            message: "channel count must be > 0".to_string(),
        });
    }
    Ok(())
}

/// In-memory audio source over a byte buffer. Always rewindable.
#[derive(Debug, Clone)]
pub struct BufferSource {
    data: Vec<u8>,
    position: usize,
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
}

impl BufferSource {
    /// Creates a source over raw interleaved PCM bytes.
    ///
    /// The buffer must hold a whole number of sample frames.
    pub fn new(data: Vec<u8>, sampling_rate: u32, sample_width: u16, channels: u16) -> Result<Self> {
        check_audio_parameters(sampling_rate, sample_width, channels)?;
        let frame_width = sample_width as usize * channels as usize;
        if data.len() % frame_width != 0 {
            return Err(AudsplitError::AudioParameter {
                message: format!(
                    "buffer length {} is not a multiple of the frame width {}",
                    data.len(),
                    frame_width
                ),
            });
        }
        Ok(Self {
            data,
            position: 0,
            sampling_rate,
            sample_width,
            channels,
        })
    }

    /// Creates a 16-bit source from interleaved samples.
    pub fn from_samples_i16(samples: &[i16], sampling_rate: u32, channels: u16) -> Result<Self> {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, sampling_rate, 2, channels)
    }

    /// The underlying bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl AudioSource for BufferSource {
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let wanted = size * self.frame_width();
        let end = std::cmp::min(self.position + wanted, self.data.len());
        let block = self.data[self.position..end].to_vec();
        self.position = end;
        Ok(Some(block))
    }

    fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    fn sample_width(&self) -> u16 {
        self.sample_width
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        true
    }
}
