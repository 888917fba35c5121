//! Event output: duration formatting, printed lines and file export.

use crate::error::{AudsplitError, Result};
use crate::event::{AudioEvent, write_wav};
use std::path::Path;

/// Renders durations in seconds according to a format string.
///
/// Two whole-string forms are recognized: `%S` (seconds with millisecond
/// precision) and `%I` (whole milliseconds). Otherwise the string is a
/// template over the directives `%h` (hours), `%m` (minutes), `%s`
/// (seconds) and `%i` (milliseconds), which can be placed anywhere in
/// surrounding text, e.g. `%h:%m:%s.%i`.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationFormat {
    /// Absolute seconds with three decimals.
    Seconds,
    /// Whole milliseconds.
    Milliseconds,
    /// Template of literal text and time directives.
    Directives(Vec<TimePiece>),
}

/// One element of a directive-based duration template.
#[derive(Debug, Clone, PartialEq)]
pub enum TimePiece {
    Literal(String),
    Hours,
    Minutes,
    Seconds,
    Millis,
}

impl DurationFormat {
    /// Parses a format string, rejecting unknown directives.
    pub fn parse(fmt: &str) -> Result<Self> {
        match fmt {
            "%S" => return Ok(DurationFormat::Seconds),
            "%I" => return Ok(DurationFormat::Milliseconds),
            _ => {}
        }
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = fmt.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let directive = match chars.next() {
                Some('h') => TimePiece::Hours,
                Some('m') => TimePiece::Minutes,
                Some('s') => TimePiece::Seconds,
                Some('i') => TimePiece::Millis,
                other => {
                    let directive = match other {
                        Some(c) => format!("%{}", c),
                        None => "%".to_string(),
                    };
                    return Err(AudsplitError::InvalidTimeFormat { directive });
                }
            };
            if !literal.is_empty() {
                pieces.push(TimePiece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(directive);
        }
        if !literal.is_empty() {
            pieces.push(TimePiece::Literal(literal));
        }
        Ok(DurationFormat::Directives(pieces))
    }

    /// Formats a duration in seconds.
    pub fn format(&self, seconds: f64) -> String {
        match self {
            DurationFormat::Seconds => format!("{:.3}", seconds),
            DurationFormat::Milliseconds => format!("{}", (seconds * 1000.0) as u64),
            DurationFormat::Directives(pieces) => {
                let millis = (seconds * 1000.0) as u64;
                let (hrs, millis) = (millis / 3_600_000, millis % 3_600_000);
                let (mins, millis) = (millis / 60_000, millis % 60_000);
                let (secs, millis) = (millis / 1000, millis % 1000);
                let mut out = String::new();
                for piece in pieces {
                    match piece {
                        TimePiece::Literal(text) => out.push_str(text),
                        TimePiece::Hours => out.push_str(&format!("{:02}", hrs)),
                        TimePiece::Minutes => out.push_str(&format!("{:02}", mins)),
                        TimePiece::Seconds => out.push_str(&format!("{:02}", secs)),
                        TimePiece::Millis => out.push_str(&format!("{:03}", millis)),
                    }
                }
                out
            }
        }
    }
}

/// Renders one event line from a template with `{id}`, `{start}`, `{end}`
/// and `{duration}` placeholders. `id` is 1-based.
pub fn format_event_line(
    template: &str,
    id: usize,
    event: &AudioEvent,
    time_format: &DurationFormat,
) -> String {
    template
        .replace("{id}", &id.to_string())
        .replace("{start}", &time_format.format(event.start))
        .replace("{end}", &time_format.format(event.end))
        .replace("{duration}", &time_format.format(event.duration()))
}

/// Expands an output file name template for one event. Times are rendered
/// as seconds with three decimals.
pub fn event_filename(template: &str, id: usize, event: &AudioEvent) -> String {
    template
        .replace("{id}", &id.to_string())
        .replace("{start}", &format!("{:.3}", event.start))
        .replace("{end}", &format!("{:.3}", event.end))
        .replace("{duration}", &format!("{:.3}", event.duration()))
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Saves one event to `path`, as WAV when the extension is `.wav` and as
/// headerless raw PCM otherwise.
pub fn save_event<P: AsRef<Path>>(path: P, event: &AudioEvent) -> Result<()> {
    if has_wav_extension(path.as_ref()) {
        event.save_wav(path)
    } else {
        event.save_raw(path)
    }
}

/// Saves a whole captured stream to `path`, as WAV when the extension is
/// `.wav` and as headerless raw PCM otherwise. `data` is written
/// byte-identical to what was read from the source.
pub fn save_stream<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    sampling_rate: u32,
    sample_width: u16,
    channels: u16,
) -> Result<()> {
    let path = path.as_ref();
    if has_wav_extension(path) {
        write_wav(path, data, sampling_rate, sample_width, channels)
    } else {
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(start: f64, end: f64) -> AudioEvent {
        AudioEvent {
            data: vec![0u8; 320],
            start_frame: 0,
            end_frame: 0,
            start,
            end,
            sampling_rate: 16000,
            sample_width: 2,
            channels: 1,
        }
    }

    #[test]
    fn test_seconds_format() {
        let fmt = DurationFormat::parse("%S").unwrap();
        assert_eq!(fmt.format(123.589), "123.589");
        assert_eq!(fmt.format(123.0), "123.000");
    }

    #[test]
    fn test_milliseconds_format() {
        let fmt = DurationFormat::parse("%I").unwrap();
        assert_eq!(fmt.format(1.25), "1250");
    }

    #[test]
    fn test_directive_format() {
        let fmt = DurationFormat::parse("%h:%m:%s.%i").unwrap();
        assert_eq!(fmt.format(3600.0 + 120.0 + 3.25), "01:02:03.250");
    }

    #[test]
    fn test_directives_in_surrounding_text() {
        let fmt = DurationFormat::parse("%h hrs, %m min, %s sec and %i ms").unwrap();
        assert_eq!(
            fmt.format(3600.0 + 120.0 + 3.25),
            "01 hrs, 02 min, 03 sec and 250 ms"
        );
    }

    #[test]
    fn test_plain_text_format_has_no_directives() {
        let fmt = DurationFormat::parse("no directives").unwrap();
        assert_eq!(fmt.format(42.0), "no directives");
    }

    #[test]
    fn test_unknown_directive_is_rejected() {
        let err = DurationFormat::parse("%h:%z").unwrap_err();
        assert_eq!(err.to_string(), "Unknown time format directive '%z'");
        assert!(DurationFormat::parse("%").is_err());
    }

    #[test]
    fn test_format_event_line_defaults() {
        let event = make_event(1.5, 2.75);
        let time = DurationFormat::parse("%S").unwrap();
        let line = format_event_line("{start} {end}", 1, &event, &time);
        assert_eq!(line, "1.500 2.750");
    }

    #[test]
    fn test_format_event_line_all_placeholders() {
        let event = make_event(0.5, 2.0);
        let time = DurationFormat::parse("%S").unwrap();
        let line = format_event_line("{id}: {start}-{end} ({duration})", 3, &event, &time);
        assert_eq!(line, "3: 0.500-2.000 (1.500)");
    }

    #[test]
    fn test_event_filename_expansion() {
        let event = make_event(1.0, 2.5);
        let name = event_filename("event_{id}_{start}-{end}.wav", 2, &event);
        assert_eq!(name, "event_2_1.000-2.500.wav");
    }

    #[test]
    fn test_save_event_by_extension() {
        let event = make_event(0.0, 0.01);
        let wav_path = std::env::temp_dir().join("audsplit_out_event.wav");
        let raw_path = std::env::temp_dir().join("audsplit_out_event.pcm");

        save_event(&wav_path, &event).unwrap();
        assert!(hound::WavReader::open(&wav_path).is_ok());

        save_event(&raw_path, &event).unwrap();
        assert_eq!(std::fs::read(&raw_path).unwrap(), event.data);

        std::fs::remove_file(&wav_path).unwrap();
        std::fs::remove_file(&raw_path).unwrap();
    }

    #[test]
    fn test_save_stream_raw_is_byte_identical() {
        let path = std::env::temp_dir().join("audsplit_out_stream.raw");
        let data: Vec<u8> = (0..64).collect();
        save_stream(&path, &data, 16000, 2, 1).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), data);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_stream_wav_roundtrip() {
        let path = std::env::temp_dir().join("audsplit_out_stream.wav");
        let samples: Vec<i16> = (0..100).collect();
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        save_stream(&path, &data, 8000, 2, 1).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let reloaded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(reloaded, samples);
        std::fs::remove_file(&path).unwrap();
    }
}
