//! Error types for audsplit.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudsplitError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Audio data errors
    #[error("Invalid audio parameter: {message}")]
    AudioParameter { message: String },

    #[error("Audio read failed: {message}")]
    AudioRead { message: String },

    #[error("Rewind not supported: {message}")]
    RewindUnsupported { message: String },

    #[error("WAV format error: {message}")]
    WavFormat { message: String },

    // Output formatting errors
    #[error("Unknown time format directive '{directive}'")]
    InvalidTimeFormat { directive: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, AudsplitError>;
