//! Audio input: byte sources and the analysis-window scanner.
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ AudioSource  │──▶│ Recording /   │──▶│ FrameReader  │──▶ frames
//! │ (file/buffer)│   │ Limited wraps │   │ (block, hop) │
//! └──────────────┘   └───────────────┘   └──────────────┘
//! ```
//!
//! Sources yield raw interleaved PCM bytes; wrappers add recording and
//! read-limiting; [`FrameReader`] slices the byte stream into fixed-size,
//! possibly overlapping analysis windows.

pub mod file;
pub mod reader;
pub mod source;

pub use file::{RawFileSource, WavFileSource};
pub use reader::{FrameReader, LimitedSource, RecordingSource};
pub use source::{AudioSource, BufferSource};
