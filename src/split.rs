//! The high-level split operation: detect audio events in a frame stream.
//!
//! Wires a [`FrameReader`] to an [`EnergyValidator`] and a
//! [`StreamTokenizer`], translating second-domain tuning parameters into
//! frame counts.

use crate::audio::{AudioSource, FrameReader};
use crate::defaults;
use crate::error::{AudsplitError, Result};
use crate::event::{AudioEvent, Event};
use crate::signal::ChannelSelector;
use crate::tokenizer::{StreamTokenizer, TokenizerConfig, TokenizerMode};
use crate::validator::EnergyValidator;
use tracing::{debug, info};

/// Guards window-count arithmetic against floating point error:
/// `0.3 / 0.1 = 2.9999999999999996` would floor to 2 instead of 3.
const DURATION_EPSILON: f64 = 1e-10;

/// Second-domain tuning for audio event detection.
///
/// The analysis window duration is a property of the [`FrameReader`], not
/// of this configuration; durations here are converted to window counts
/// against the reader's actual window size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Minimum duration in seconds of a detected event.
    pub min_dur: f64,
    /// Maximum duration in seconds of a detected event; longer activity
    /// is split. `f64::INFINITY` disables the limit.
    pub max_dur: f64,
    /// Maximum duration in seconds of continuous silence tolerated inside
    /// an event.
    pub max_silence: f64,
    /// Log-energy threshold above which an analysis window is valid.
    pub energy_threshold: f64,
    /// Remove trailing silence from detected events.
    pub drop_trailing_silence: bool,
    /// Reject events shorter than `min_dur` even when they continue an
    /// event that was split at `max_dur`.
    pub strict_min_dur: bool,
    /// Channel reduction used for validation. Detected events always
    /// carry all channels of the input.
    pub channel: ChannelSelector,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_dur: defaults::MIN_DUR,
            max_dur: defaults::MAX_DUR,
            max_silence: defaults::MAX_SILENCE,
            energy_threshold: defaults::ENERGY_THRESHOLD,
            drop_trailing_silence: false,
            strict_min_dur: false,
            channel: ChannelSelector::Any,
        }
    }
}

impl SplitConfig {
    /// Converts this configuration to frame counts for windows of
    /// `analysis_window` seconds.
    pub fn tokenizer_config(&self, analysis_window: f64) -> Result<TokenizerConfig> {
        if self.min_dur <= 0.0 {
            return Err(invalid("min_dur", format!("must be > 0, got {}", self.min_dur)));
        }
        if self.max_dur <= 0.0 {
            return Err(invalid("max_dur", format!("must be > 0, got {}", self.max_dur)));
        }
        if self.max_silence < 0.0 {
            return Err(invalid(
                "max_silence",
                format!("must be >= 0, got {}", self.max_silence),
            ));
        }
        let min_length = duration_to_windows(self.min_dur, analysis_window, Rounding::Ceil);
        let max_length = duration_to_windows(self.max_dur, analysis_window, Rounding::Floor);
        let max_continuous_silence =
            duration_to_windows(self.max_silence, analysis_window, Rounding::Floor);

        if min_length > max_length {
            return Err(invalid(
                "min_dur",
                format!(
                    "{} s gives {} analysis window(s), more than the {} \
                     window(s) of max_dur ({} s)",
                    self.min_dur, min_length, max_length, self.max_dur
                ),
            ));
        }
        if max_length != usize::MAX && max_continuous_silence >= max_length {
            return Err(invalid(
                "max_silence",
                format!(
                    "{} s gives {} analysis window(s), not fewer than the {} \
                     window(s) of max_dur ({} s)",
                    self.max_silence, max_continuous_silence, max_length, self.max_dur
                ),
            ));
        }

        let mut mode = TokenizerMode::NORMAL;
        if self.drop_trailing_silence {
            mode = mode | TokenizerMode::DROP_TRAILING_SILENCE;
        }
        if self.strict_min_dur {
            mode = mode | TokenizerMode::STRICT_MIN_LENGTH;
        }
        Ok(TokenizerConfig {
            min_length,
            max_length,
            max_continuous_silence,
            init_min: 0,
            init_max_silence: 0,
            mode,
        })
    }
}

fn invalid(key: &str, message: String) -> AudsplitError {
    AudsplitError::ConfigInvalidValue {
        key: key.to_string(),
        message,
    }
}

#[derive(Debug, Clone, Copy)]
enum Rounding {
    /// Round up: a fraction of a window still needs a whole window.
    Ceil,
    /// Round down, with an epsilon to absorb floating point error.
    Floor,
}

/// Number of analysis windows covering `duration` seconds. Zero maps to
/// zero; any positive duration needs at least the rounded window count.
fn duration_to_windows(duration: f64, analysis_window: f64, rounding: Rounding) -> usize {
    if duration == 0.0 {
        return 0;
    }
    let ratio = duration / analysis_window;
    match rounding {
        Rounding::Ceil => ratio.ceil() as usize,
        Rounding::Floor => (ratio + DURATION_EPSILON).floor() as usize,
    }
}

/// Detects audio events in `reader` and returns them in stream order.
pub fn split<S: AudioSource>(
    reader: &mut FrameReader<S>,
    config: &SplitConfig,
) -> Result<Vec<AudioEvent>> {
    let mut events = Vec::new();
    split_with(reader, config, |event| events.push(event))?;
    Ok(events)
}

/// Detects audio events in `reader`, invoking `on_event` synchronously as
/// each event is finalized.
///
/// Never buffers more than the in-progress event; on a read error, events
/// detected up to the failing window are delivered before the error is
/// returned.
pub fn split_with<S, C>(reader: &mut FrameReader<S>, config: &SplitConfig, mut on_event: C) -> Result<()>
where
    S: AudioSource,
    C: FnMut(AudioEvent),
{
    let tokenizer_config = config.tokenizer_config(reader.block_dur())?;
    debug!(
        min_length = tokenizer_config.min_length,
        max_length = tokenizer_config.max_length,
        max_continuous_silence = tokenizer_config.max_continuous_silence,
        energy_threshold = config.energy_threshold,
        "starting split"
    );
    let validator = EnergyValidator::new(
        config.energy_threshold,
        reader.sample_width(),
        reader.channels(),
        config.channel,
    )?;
    let mut tokenizer = StreamTokenizer::new(validator, tokenizer_config)?;

    let hop_dur = reader.hop_dur();
    let sampling_rate = reader.sampling_rate();
    let sample_width = reader.sample_width();
    let channels = reader.channels();
    tokenizer.tokenize_with(reader, |token| {
        let event = to_audio_event(token, hop_dur, sampling_rate, sample_width, channels);
        info!(
            start = event.start,
            end = event.end,
            "detected audio event"
        );
        on_event(event);
    })
}

/// Maps a frame-domain token onto the time axis and concatenates its
/// payload.
fn to_audio_event(
    token: Event<Vec<u8>>,
    hop_dur: f64,
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
) -> AudioEvent {
    let start = token.start as f64 * hop_dur;
    let data: Vec<u8> = token.frames.concat();
    let samples = data.len() / (sample_width as usize * channels as usize);
    let duration = samples as f64 / sampling_rate as f64;
    AudioEvent {
        data,
        start_frame: token.start,
        end_frame: token.end,
        start,
        end: start + duration,
        sampling_rate,
        sample_width,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSource;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_duration_to_windows_ceil() {
        assert_eq!(duration_to_windows(0.2, 0.05, Rounding::Ceil), 4);
        assert_eq!(duration_to_windows(0.21, 0.05, Rounding::Ceil), 5);
        assert_eq!(duration_to_windows(0.01, 0.05, Rounding::Ceil), 1);
        assert_eq!(duration_to_windows(0.0, 0.05, Rounding::Ceil), 0);
    }

    #[test]
    fn test_duration_to_windows_floor_absorbs_fp_error() {
        // 0.3 / 0.1 is 2.9999999999999996 in f64.
        assert_eq!(duration_to_windows(0.3, 0.1, Rounding::Floor), 3);
        assert_eq!(duration_to_windows(0.3, 0.05, Rounding::Floor), 6);
        assert_eq!(duration_to_windows(0.24, 0.05, Rounding::Floor), 4);
    }

    #[test]
    fn test_infinite_max_dur_disables_limit() {
        let config = SplitConfig {
            max_dur: f64::INFINITY,
            max_silence: f64::INFINITY,
            ..SplitConfig::default()
        };
        let tokenizer_config = config.tokenizer_config(0.05).unwrap();
        assert_eq!(tokenizer_config.max_length, usize::MAX);
        assert_eq!(tokenizer_config.max_continuous_silence, usize::MAX);
    }

    #[test]
    fn test_tokenizer_config_conversion() {
        let config = SplitConfig::default();
        let tokenizer_config = config.tokenizer_config(0.05).unwrap();
        assert_eq!(tokenizer_config.min_length, 4);
        assert_eq!(tokenizer_config.max_length, 100);
        assert_eq!(tokenizer_config.max_continuous_silence, 6);
        assert!(!tokenizer_config.mode.contains(TokenizerMode::STRICT_MIN_LENGTH));
    }

    #[test]
    fn test_mode_flags_propagate() {
        let config = SplitConfig {
            drop_trailing_silence: true,
            strict_min_dur: true,
            ..SplitConfig::default()
        };
        let mode = config.tokenizer_config(0.05).unwrap().mode;
        assert!(mode.contains(TokenizerMode::DROP_TRAILING_SILENCE));
        assert!(mode.contains(TokenizerMode::STRICT_MIN_LENGTH));
    }

    #[test]
    fn test_rejects_non_positive_durations() {
        let bad_min = SplitConfig {
            min_dur: 0.0,
            ..SplitConfig::default()
        };
        assert!(bad_min.tokenizer_config(0.05).is_err());

        let bad_max = SplitConfig {
            max_dur: -1.0,
            ..SplitConfig::default()
        };
        assert!(bad_max.tokenizer_config(0.05).is_err());

        let bad_silence = SplitConfig {
            max_silence: -0.1,
            ..SplitConfig::default()
        };
        assert!(bad_silence.tokenizer_config(0.05).is_err());
    }

    #[test]
    fn test_rejects_min_dur_above_max_dur() {
        let config = SplitConfig {
            min_dur: 2.0,
            max_dur: 1.0,
            ..SplitConfig::default()
        };
        assert!(config.tokenizer_config(0.05).is_err());
    }

    #[test]
    fn test_rejects_max_silence_not_below_max_dur() {
        let config = SplitConfig {
            max_dur: 0.5,
            max_silence: 0.5,
            ..SplitConfig::default()
        };
        assert!(config.tokenizer_config(0.05).is_err());
    }

    /// 16kHz mono test signal: silence / tone / silence / tone / silence.
    fn make_signal() -> BufferSource {
        let mut samples = Vec::new();
        samples.extend(vec![0i16; 3200]); // 0.0 - 0.2 s
        samples.extend(vec![10000i16; 8000]); // 0.2 - 0.7 s
        samples.extend(vec![0i16; 4800]); // 0.7 - 1.0 s
        samples.extend(vec![10000i16; 5600]); // 1.0 - 1.35 s
        samples.extend(vec![0i16; 1600]); // 1.35 - 1.45 s
        BufferSource::from_samples_i16(&samples, 16000, 1).unwrap()
    }

    #[test]
    fn test_split_detects_two_events() {
        let mut reader = FrameReader::from_duration(make_signal(), 0.05).unwrap();
        let config = SplitConfig {
            max_silence: 0.2,
            ..SplitConfig::default()
        };
        let events = split(&mut reader, &config).unwrap();
        assert_eq!(events.len(), 2);

        // First event: frames 4..=17 (four trailing silent windows kept).
        assert_eq!((events[0].start_frame, events[0].end_frame), (4, 17));
        assert_close(events[0].start, 0.2);
        assert_close(events[0].end, 0.9);

        // Second event runs to end of stream: frames 20..=28.
        assert_eq!((events[1].start_frame, events[1].end_frame), (20, 28));
        assert_close(events[1].start, 1.0);
        assert_close(events[1].end, 1.45);
    }

    #[test]
    fn test_split_drop_trailing_silence() {
        let mut reader = FrameReader::from_duration(make_signal(), 0.05).unwrap();
        let config = SplitConfig {
            max_silence: 0.2,
            drop_trailing_silence: true,
            ..SplitConfig::default()
        };
        let events = split(&mut reader, &config).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start_frame, events[0].end_frame), (4, 13));
        assert_close(events[0].end, 0.7);
        assert_eq!((events[1].start_frame, events[1].end_frame), (20, 26));
        assert_close(events[1].end, 1.35);
    }

    #[test]
    fn test_split_payload_matches_input_bytes() {
        let mut reader = FrameReader::from_duration(make_signal(), 0.05).unwrap();
        let config = SplitConfig {
            max_silence: 0.0,
            ..SplitConfig::default()
        };
        let events = split(&mut reader, &config).unwrap();
        assert_eq!(events.len(), 2);
        // With no tolerated silence the first event is exactly the tone.
        let expected: Vec<u8> = vec![10000i16; 8000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        assert_eq!(events[0].data, expected);
    }

    #[test]
    fn test_split_with_streams_in_order() {
        let mut reader = FrameReader::from_duration(make_signal(), 0.05).unwrap();
        let config = SplitConfig {
            max_silence: 0.2,
            ..SplitConfig::default()
        };
        let mut starts = Vec::new();
        split_with(&mut reader, &config, |event| starts.push(event.start_frame)).unwrap();
        assert_eq!(starts, vec![4, 20]);
    }

    #[test]
    fn test_split_long_event_is_chunked() {
        let samples = vec![10000i16; 16000]; // one second of tone
        let source = BufferSource::from_samples_i16(&samples, 16000, 1).unwrap();
        let mut reader = FrameReader::from_duration(source, 0.05).unwrap();
        let config = SplitConfig {
            min_dur: 0.2,
            max_dur: 0.3,
            max_silence: 0.0,
            ..SplitConfig::default()
        };
        let events = split(&mut reader, &config).unwrap();
        // 20 windows split into chunks of 6; the two-window remainder is
        // below min_dur but kept because it continues a split event.
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].end_frame - events[0].start_frame + 1, 6);
        assert_eq!(events[3].end_frame - events[3].start_frame + 1, 2);
        for window in events.windows(2) {
            assert_eq!(window[1].start_frame, window[0].end_frame + 1);
        }
    }

    #[test]
    fn test_split_stereo_any_vs_selected_channel() {
        // Channel 0 silent, channel 1 loud for half a second.
        let mut samples = Vec::new();
        samples.extend((0..3200).flat_map(|_| [0i16, 0]));
        samples.extend((0..8000).flat_map(|_| [0i16, 10000]));
        samples.extend((0..3200).flat_map(|_| [0i16, 0]));
        let make_reader = || {
            let source =
                BufferSource::from_samples_i16(&samples, 16000, 2).unwrap();
            FrameReader::from_duration(source, 0.05).unwrap()
        };
        let base = SplitConfig {
            max_silence: 0.0,
            ..SplitConfig::default()
        };

        let any = split(&mut make_reader(), &base).unwrap();
        assert_eq!(any.len(), 1);
        assert_eq!(any[0].channels, 2);
        // Events retain all channels: interleaved stereo payload.
        assert_eq!(any[0].len_samples(), 8000);

        let silent_channel = SplitConfig {
            channel: ChannelSelector::Index(0),
            ..base
        };
        assert!(split(&mut make_reader(), &silent_channel).unwrap().is_empty());

        let loud_channel = SplitConfig {
            channel: ChannelSelector::Index(1),
            ..base
        };
        assert_eq!(split(&mut make_reader(), &loud_channel).unwrap().len(), 1);
    }

    #[test]
    fn test_split_runs_again_after_rewind() {
        let mut reader = FrameReader::from_duration(make_signal(), 0.05).unwrap();
        let config = SplitConfig {
            max_silence: 0.2,
            ..SplitConfig::default()
        };
        let first = split(&mut reader, &config).unwrap();
        reader.rewind().unwrap();
        let second = split(&mut reader, &config).unwrap();
        assert_eq!(first, second);
    }
}
