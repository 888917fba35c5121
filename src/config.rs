//! Configuration file support.
//!
//! Settings live in a TOML file with `[detection]`, `[input]` and
//! `[output]` sections; every key has a default, so a partial (or absent)
//! file is fine. Command-line flags override file values.

use crate::defaults;
use crate::error::{AudsplitError, Result};
use crate::output::DurationFormat;
use crate::signal::ChannelSelector;
use crate::split::SplitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Event detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_dur: f64,
    pub max_dur: f64,
    pub max_silence: f64,
    pub analysis_window: f64,
    pub energy_threshold: f64,
    pub drop_trailing_silence: bool,
    pub strict_min_dur: bool,
    /// Channel used for detection: "any", "mix" or a channel index.
    pub channel: String,
}

/// Parameters of headerless raw input (ignored for WAV files, which carry
/// their own).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub sampling_rate: u32,
    pub sample_width: u16,
    pub channels: u16,
    /// Maximum amount of audio to read, in seconds.
    pub max_read: Option<f64>,
    /// Record the stream while reading (enables whole-stream export).
    pub record: bool,
}

/// Printed and saved output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub time_format: String,
    pub print_format: String,
    /// File name template for per-event export; `{id}`, `{start}`,
    /// `{end}` and `{duration}` are expanded per event.
    pub save_detections_as: Option<String>,
    /// Path for whole-stream export (implies recording).
    pub save_stream: Option<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_dur: defaults::MIN_DUR,
            max_dur: defaults::MAX_DUR,
            max_silence: defaults::MAX_SILENCE,
            analysis_window: defaults::ANALYSIS_WINDOW,
            energy_threshold: defaults::ENERGY_THRESHOLD,
            drop_trailing_silence: false,
            strict_min_dur: false,
            channel: "any".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sampling_rate: defaults::SAMPLE_RATE,
            sample_width: defaults::SAMPLE_WIDTH,
            channels: defaults::CHANNELS,
            max_read: None,
            record: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            time_format: defaults::TIME_FORMAT.to_string(),
            print_format: defaults::PRINT_FORMAT.to_string(),
            save_detections_as: None,
            save_stream: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudsplitError::ConfigFileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and parseable string fields.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: String| AudsplitError::ConfigInvalidValue {
            key: key.to_string(),
            message,
        };
        if self.detection.min_dur <= 0.0 {
            return Err(invalid("detection.min_dur", "must be > 0".to_string()));
        }
        if self.detection.max_dur <= 0.0 {
            return Err(invalid("detection.max_dur", "must be > 0".to_string()));
        }
        if self.detection.max_silence < 0.0 {
            return Err(invalid("detection.max_silence", "must be >= 0".to_string()));
        }
        if self.detection.analysis_window <= 0.0 {
            return Err(invalid(
                "detection.analysis_window",
                "must be > 0".to_string(),
            ));
        }
        self.detection.channel()?;
        DurationFormat::parse(&self.output.time_format)?;
        if self.input.sampling_rate == 0 {
            return Err(invalid("input.sampling_rate", "must be > 0".to_string()));
        }
        if !matches!(self.input.sample_width, 1 | 2 | 4) {
            return Err(invalid(
                "input.sample_width",
                "must be 1, 2 or 4 bytes".to_string(),
            ));
        }
        if self.input.channels == 0 {
            return Err(invalid("input.channels", "must be > 0".to_string()));
        }
        if let Some(max_read) = self.input.max_read
            && max_read <= 0.0
        {
            return Err(invalid("input.max_read", "must be > 0".to_string()));
        }
        Ok(())
    }

    /// True if the stream must be recorded while reading.
    pub fn needs_recording(&self) -> bool {
        self.input.record || self.output.save_stream.is_some()
    }
}

impl DetectionConfig {
    /// Parses the configured channel selector.
    pub fn channel(&self) -> Result<ChannelSelector> {
        self.channel.parse()
    }

    /// Builds the second-domain split configuration.
    pub fn split_config(&self) -> Result<SplitConfig> {
        Ok(SplitConfig {
            min_dur: self.min_dur,
            max_dur: self.max_dur,
            max_silence: self.max_silence,
            energy_threshold: self.energy_threshold,
            drop_trailing_silence: self.drop_trailing_silence,
            strict_min_dur: self.strict_min_dur,
            channel: self.channel()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.min_dur, 0.2);
        assert_eq!(config.input.sampling_rate, 16000);
        assert_eq!(config.output.time_format, "%S");
        assert!(!config.needs_recording());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [detection]
            energy_threshold = 42.0

            [output]
            time_format = "%h:%m:%s.%i"
            "#,
        )
        .unwrap();
        assert_eq!(config.detection.energy_threshold, 42.0);
        assert_eq!(config.detection.min_dur, 0.2);
        assert_eq!(config.output.time_format, "%h:%m:%s.%i");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.detection.min_dur = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detection.analysis_window = -0.05;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detection.channel = "loudest".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.time_format = "%x".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.max_read = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_stream_implies_recording() {
        let mut config = Config::default();
        config.output.save_stream = Some("capture.wav".to_string());
        assert!(config.needs_recording());
    }

    #[test]
    fn test_split_config_conversion() {
        let mut config = Config::default();
        config.detection.channel = "1".to_string();
        config.detection.drop_trailing_silence = true;
        let split = config.detection.split_config().unwrap();
        assert_eq!(split.channel, ChannelSelector::Index(1));
        assert!(split.drop_trailing_silence);
        assert_eq!(split.energy_threshold, 50.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/audsplit.toml").unwrap_err();
        assert!(matches!(err, AudsplitError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn test_load_parses_file() {
        let path = std::env::temp_dir().join("audsplit_test_config.toml");
        std::fs::write(
            &path,
            "[detection]\nmax_dur = 10.0\n\n[input]\nsampling_rate = 8000\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.detection.max_dur, 10.0);
        assert_eq!(config.input.sampling_rate, 8000);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }
}
