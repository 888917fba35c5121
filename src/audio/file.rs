//! File-backed audio sources: headerless raw PCM and WAV.

use crate::audio::source::{AudioSource, check_audio_parameters};
use crate::error::{AudsplitError, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Streaming source over a headerless raw PCM file.
///
/// Raw data is little-endian signed integers of `sample_width` bytes with
/// channels interleaved sample by sample; the audio parameters must be
/// supplied by the caller. Rewindable via seek.
pub struct RawFileSource {
    reader: BufReader<File>,
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
    exhausted: bool,
}

impl RawFileSource {
    /// Opens a raw PCM file with the given audio parameters.
    pub fn open<P: AsRef<Path>>(
        path: P,
        sampling_rate: u32,
        sample_width: u16,
        channels: u16,
    ) -> Result<Self> {
        check_audio_parameters(sampling_rate, sample_width, channels)?;
        let file = File::open(path.as_ref()).map_err(|e| AudsplitError::AudioRead {
            message: format!("failed to open {}: {}", path.as_ref().display(), e),
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            sampling_rate,
            sample_width,
            channels,
            exhausted: false,
        })
    }
}

impl AudioSource for RawFileSource {
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        let wanted = size * self.frame_width();
        let mut buf = vec![0u8; wanted];
        let mut filled = 0;
        while filled < wanted {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .map_err(|e| AudsplitError::AudioRead {
                    message: format!("raw file read failed: {}", e),
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        // A truncated file may end mid-frame; drop the partial tail.
        buf.truncate(filled - filled % self.frame_width());
        if buf.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(buf))
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
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| AudsplitError::AudioRead {
                message: format!("raw file seek failed: {}", e),
            })?;
        self.exhausted = false;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        true
    }
}

/// Streaming source over a WAV file, decoded with `hound`.
///
/// Supports 16- and 32-bit integer PCM. Samples are re-encoded to the raw
/// little-endian byte layout used throughout the crate. Rewindable by
/// reopening the file.
pub struct WavFileSource {
    reader: hound::WavReader<BufReader<File>>,
    path: PathBuf,
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
}

impl WavFileSource {
    /// Opens a WAV file, reading the audio parameters from its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = hound::WavReader::open(&path).map_err(|e| AudsplitError::WavFormat {
            message: format!("failed to open {}: {}", path.display(), e),
        })?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int
            || !matches!(spec.bits_per_sample, 16 | 32)
        {
            return Err(AudsplitError::WavFormat {
                message: format!(
                    "unsupported WAV encoding ({} bits, {:?}); only 16- and 32-bit \
                     integer PCM are supported",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }
        Ok(Self {
            sampling_rate: spec.sample_rate,
            sample_width: spec.bits_per_sample / 8,
            channels: spec.channels,
            reader,
            path,
        })
    }
}

impl AudioSource for WavFileSource {
    fn read(&mut self, size: usize) -> Result<Option<Vec<u8>>> {
        let wanted = size * self.channels as usize;
        let mut buf = Vec::with_capacity(wanted * self.sample_width as usize);
        let read_err = |e: hound::Error| AudsplitError::AudioRead {
            message: format!("WAV read failed: {}", e),
        };
        if self.sample_width == 2 {
            let mut samples = self.reader.samples::<i16>();
            for _ in 0..wanted {
                match samples.next() {
                    Some(sample) => buf.extend_from_slice(&sample.map_err(read_err)?.to_le_bytes()),
                    None => break,
                }
            }
        } else {
            let mut samples = self.reader.samples::<i32>();
            for _ in 0..wanted {
                match samples.next() {
                    Some(sample) => buf.extend_from_slice(&sample.map_err(read_err)?.to_le_bytes()),
                    None => break,
                }
            }
        }
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(buf))
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
        let reopened = Self::open(&self.path)?;
        self.reader = reopened.reader;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audsplit_{}_{}", std::process::id(), name))
    }

    fn write_test_wav(path: &Path, samples: &[i16], sampling_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: sampling_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_raw_file_source_reads_and_rewinds() {
        let path = temp_path("source.raw");
        let samples: Vec<i16> = (0..100).collect();
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        std::fs::write(&path, &bytes).unwrap();

        let mut source = RawFileSource::open(&path, 8000, 2, 1).unwrap();
        assert_eq!(source.sampling_rate(), 8000);
        assert!(source.is_rewindable());

        let first = source.read(40).unwrap().unwrap();
        assert_eq!(first.len(), 80);
        let second = source.read(40).unwrap().unwrap();
        let third = source.read(40).unwrap().unwrap();
        assert_eq!(third.len(), 40); // 20 samples remain
        assert!(source.read(40).unwrap().is_none());
        assert!(source.read(40).unwrap().is_none());

        source.rewind().unwrap();
        assert_eq!(source.read(40).unwrap().unwrap(), first);
        assert_ne!(first, second);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_raw_file_source_drops_partial_trailing_sample() {
        let path = temp_path("truncated.raw");
        // 5 whole 16-bit samples plus one dangling byte.
        std::fs::write(&path, vec![1u8; 11]).unwrap();
        let mut source = RawFileSource::open(&path, 8000, 2, 1).unwrap();
        let block = source.read(100).unwrap().unwrap();
        assert_eq!(block.len(), 10);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_raw_file_source_missing_file() {
        assert!(RawFileSource::open("/nonexistent/audio.raw", 8000, 2, 1).is_err());
    }

    #[test]
    fn test_wav_file_source_metadata_and_content() {
        let path = temp_path("source.wav");
        let samples: Vec<i16> = (0..200).map(|i| i * 3).collect();
        write_test_wav(&path, &samples, 16000, 1);

        let mut source = WavFileSource::open(&path).unwrap();
        assert_eq!(source.sampling_rate(), 16000);
        assert_eq!(source.sample_width(), 2);
        assert_eq!(source.channels(), 1);

        let mut collected = Vec::new();
        while let Some(block) = source.read(64).unwrap() {
            collected.extend_from_slice(&block);
        }
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(collected, expected);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_wav_file_source_rewind_replays() {
        let path = temp_path("rewind.wav");
        let samples: Vec<i16> = (0..50).collect();
        write_test_wav(&path, &samples, 8000, 1);

        let mut source = WavFileSource::open(&path).unwrap();
        let first = source.read(50).unwrap().unwrap();
        assert!(source.read(1).unwrap().is_none());
        source.rewind().unwrap();
        assert_eq!(source.read(50).unwrap().unwrap(), first);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_wav_file_source_stereo_frame_width() {
        let path = temp_path("stereo.wav");
        let samples: Vec<i16> = (0..100).collect();
        write_test_wav(&path, &samples, 16000, 2);

        let mut source = WavFileSource::open(&path).unwrap();
        assert_eq!(source.channels(), 2);
        assert_eq!(source.frame_width(), 4);
        // 10 sample frames = 20 samples = 40 bytes.
        assert_eq!(source.read(10).unwrap().unwrap().len(), 40);

        std::fs::remove_file(&path).unwrap();
    }
}
