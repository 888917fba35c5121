//! Command-line interface for audsplit
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Audio activity detection: split audio into events by signal energy
#[derive(Parser, Debug)]
#[command(name = "audsplit", version, about = "Split audio streams into events by signal energy")]
pub struct Cli {
    /// Input audio file (.wav, or raw PCM). Use "-" to read raw audio from stdin
    pub input: PathBuf,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress event lines (quiet mode)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Minimum duration of a detected event in seconds
    #[arg(short = 'n', long, value_name = "SECONDS")]
    pub min_dur: Option<f64>,

    /// Maximum duration of a detected event in seconds
    #[arg(short = 'm', long, value_name = "SECONDS")]
    pub max_dur: Option<f64>,

    /// Maximum continuous silence within an event in seconds
    #[arg(short = 's', long, value_name = "SECONDS")]
    pub max_silence: Option<f64>,

    /// Analysis window duration in seconds
    #[arg(short = 'a', long, value_name = "SECONDS")]
    pub analysis_window: Option<f64>,

    /// Log-energy threshold for a valid analysis window
    #[arg(short = 'e', long, value_name = "DB")]
    pub energy_threshold: Option<f64>,

    /// Remove trailing silence from detected events
    #[arg(short = 'D', long)]
    pub drop_trailing_silence: bool,

    /// Reject events shorter than min-dur even after a max-dur split
    #[arg(long)]
    pub strict_min_dur: bool,

    /// Channel used for detection: any, mix, or a channel index
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Sampling rate of raw input in Hz
    #[arg(short = 'r', long, value_name = "HZ")]
    pub sampling_rate: Option<u32>,

    /// Sample width of raw input in bytes (1, 2 or 4)
    #[arg(short = 'w', long, value_name = "BYTES")]
    pub sample_width: Option<u16>,

    /// Number of channels of raw input
    #[arg(short = 'c', long, value_name = "COUNT")]
    pub channels: Option<u16>,

    /// Maximum amount of audio to read. Examples: 30, 90s, 2m30s
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub max_read: Option<f64>,

    /// Record the stream while reading (keeps a rewindable copy in memory)
    #[arg(long)]
    pub record: bool,

    /// Save each detected event to a file; template may use {id}, {start},
    /// {end} and {duration}
    #[arg(short = 'o', long, value_name = "TEMPLATE")]
    pub save_detections_as: Option<String>,

    /// Save the whole captured stream to a file (.wav or raw)
    #[arg(short = 'O', long, value_name = "PATH")]
    pub save_stream: Option<PathBuf>,

    /// Event line format; may use {id}, {start}, {end} and {duration}
    #[arg(long, value_name = "FORMAT")]
    pub printf: Option<String>,

    /// Time format for event lines: %S (seconds), %I (milliseconds), or a
    /// template over %h %m %s %i
    #[arg(long, value_name = "FORMAT")]
    pub time_format: Option<String>,
}

/// Parse a duration string into seconds.
///
/// Supports bare numbers (seconds, fractions allowed) and any format
/// accepted by `humantime`: single-unit (`30s`, `5m`, `2h`) and compound
/// (`1h30m`, `2m30s`).
fn parse_duration_secs(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        if secs <= 0.0 {
            return Err("duration must be > 0".to_string());
        }
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs_f64())
        .map_err(|e| e.to_string())
}

impl Cli {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(min_dur) = self.min_dur {
            config.detection.min_dur = min_dur;
        }
        if let Some(max_dur) = self.max_dur {
            config.detection.max_dur = max_dur;
        }
        if let Some(max_silence) = self.max_silence {
            config.detection.max_silence = max_silence;
        }
        if let Some(analysis_window) = self.analysis_window {
            config.detection.analysis_window = analysis_window;
        }
        if let Some(energy_threshold) = self.energy_threshold {
            config.detection.energy_threshold = energy_threshold;
        }
        if self.drop_trailing_silence {
            config.detection.drop_trailing_silence = true;
        }
        if self.strict_min_dur {
            config.detection.strict_min_dur = true;
        }
        if let Some(channel) = &self.channel {
            config.detection.channel = channel.clone();
        }
        if let Some(sampling_rate) = self.sampling_rate {
            config.input.sampling_rate = sampling_rate;
        }
        if let Some(sample_width) = self.sample_width {
            config.input.sample_width = sample_width;
        }
        if let Some(channels) = self.channels {
            config.input.channels = channels;
        }
        if let Some(max_read) = self.max_read {
            config.input.max_read = Some(max_read);
        }
        if self.record {
            config.input.record = true;
        }
        if let Some(template) = &self.save_detections_as {
            config.output.save_detections_as = Some(template.clone());
        }
        if let Some(path) = &self.save_stream {
            config.output.save_stream = Some(path.display().to_string());
        }
        if let Some(printf) = &self.printf {
            config.output.print_format = printf.clone();
        }
        if let Some(time_format) = &self.time_format {
            config.output.time_format = time_format.clone();
        }
    }
}
