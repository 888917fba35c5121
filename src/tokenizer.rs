//! Stream tokenizer: extracts events from a frame stream on the fly.
//!
//! The tokenizer consumes frames in order, applies a [`FrameValidator`]
//! to each one and emits [`Event`]s: contiguous frame runs that satisfy
//! duration and silence-tolerance constraints. It is a bounded-memory,
//! push-driven state machine: at most `max_length` frames are buffered at
//! any moment and a processing step never blocks.

use crate::error::{AudsplitError, Result};
use crate::event::Event;
use crate::validator::FrameValidator;
use std::ops::BitOr;
use tracing::debug;

/// A source of frames for [`StreamTokenizer::tokenize`].
///
/// `read` returns the next frame, or `None` once the stream is exhausted.
/// After `None` has been returned, further calls keep returning `None`.
pub trait FrameSource {
    type Frame;

    /// Reads the next frame from the source.
    fn read(&mut self) -> Result<Option<Self::Frame>>;
}

/// Frame source over the characters of a string, one character per frame.
///
/// Useful for symbolic streams and for exercising the tokenizer without
/// audio data.
#[derive(Debug, Clone)]
pub struct StringSource {
    chars: Vec<char>,
    position: usize,
}

impl StringSource {
    /// Creates a source yielding the characters of `data` in order.
    pub fn new(data: &str) -> Self {
        Self {
            chars: data.chars().collect(),
            position: 0,
        }
    }
}

impl FrameSource for StringSource {
    type Frame = char;

    fn read(&mut self) -> Result<Option<char>> {
        match self.chars.get(self.position) {
            Some(&c) => {
                self.position += 1;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }
}

/// Bitmask of tokenizer behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenizerMode(u8);

impl TokenizerMode {
    /// No flags: keep trailing silence, accept a short event when it
    /// continues a forcibly closed one.
    pub const NORMAL: TokenizerMode = TokenizerMode(0);

    /// Reject events shorter than `min_length` even when they continue an
    /// event that was forcibly closed at `max_length`.
    pub const STRICT_MIN_LENGTH: TokenizerMode = TokenizerMode(2);

    /// Remove tolerated trailing non-valid frames from delivered events.
    /// Does not apply to events closed by reaching `max_length`.
    pub const DROP_TRAILING_SILENCE: TokenizerMode = TokenizerMode(4);

    const KNOWN_BITS: u8 = 2 | 4;

    /// Builds a mode from raw bits, rejecting unknown flags.
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            return Err(AudsplitError::ConfigInvalidValue {
                key: "mode".to_string(),
                message: format!("unknown mode bits in {:#04x}", bits),
            });
        }
        Ok(TokenizerMode(bits))
    }

    /// Raw bit representation of this mode.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if every flag of `other` is set in this mode.
    pub fn contains(self, other: TokenizerMode) -> bool {
        self.0 & other.0 == other.0
    }

    fn strict_min_length(self) -> bool {
        self.contains(Self::STRICT_MIN_LENGTH)
    }

    fn drop_trailing_silence(self) -> bool {
        self.contains(Self::DROP_TRAILING_SILENCE)
    }
}

impl BitOr for TokenizerMode {
    type Output = TokenizerMode;

    fn bitor(self, rhs: TokenizerMode) -> TokenizerMode {
        TokenizerMode(self.0 | rhs.0)
    }
}

/// Configuration for one tokenization run. Immutable once the tokenizer
/// is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Minimum number of frames of a delivered event, tolerated non-valid
    /// frames included.
    pub min_length: usize,
    /// Maximum number of frames of an event; reaching it forcibly closes
    /// the event. Use `usize::MAX` for no limit.
    pub max_length: usize,
    /// Maximum number of consecutive non-valid frames tolerated inside a
    /// confirmed event.
    pub max_continuous_silence: usize,
    /// Number of valid frames that must be gathered before non-valid
    /// frames can be tolerated. Zero means a single valid frame confirms.
    pub init_min: usize,
    /// Maximum consecutive non-valid frames tolerated while gathering the
    /// first `init_min` valid frames.
    pub init_max_silence: usize,
    /// Behavior flags.
    pub mode: TokenizerMode,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: usize::MAX,
            max_continuous_silence: 0,
            init_min: 0,
            init_max_silence: 0,
            mode: TokenizerMode::NORMAL,
        }
    }
}

impl TokenizerConfig {
    fn validate(&self) -> Result<()> {
        if self.min_length < 1 {
            return Err(AudsplitError::ConfigInvalidValue {
                key: "min_length".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if self.max_length < self.min_length {
            return Err(AudsplitError::ConfigInvalidValue {
                key: "max_length".to_string(),
                message: format!("must be >= min_length ({})", self.min_length),
            });
        }
        // An unbounded event length (usize::MAX) tolerates any silence run
        // and any confirmation count.
        if self.max_length != usize::MAX {
            if self.max_continuous_silence >= self.max_length {
                return Err(AudsplitError::ConfigInvalidValue {
                    key: "max_continuous_silence".to_string(),
                    message: format!("must be < max_length ({})", self.max_length),
                });
            }
            if self.init_min >= self.max_length {
                return Err(AudsplitError::ConfigInvalidValue {
                    key: "init_min".to_string(),
                    message: format!("must be < max_length ({})", self.max_length),
                });
            }
        }
        Ok(())
    }
}

/// Tokenizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// No event in progress.
    Idle,
    /// Candidate event gathering its first `init_min` valid frames.
    PossibleStart,
    /// Confirmed event, last frame valid.
    Active,
    /// Confirmed event inside a tolerated silence run.
    MaybeSilence,
}

/// The stream tokenizer state machine.
///
/// Generic over the frame type `F` and the validator `V`. A tokenizer
/// instance is owned by one driver; state is reset at every
/// [`tokenize`](Self::tokenize) entry and can be reset manually with
/// [`reset`](Self::reset) when driving [`process`](Self::process)
/// directly.
pub struct StreamTokenizer<F, V> {
    config: TokenizerConfig,
    validator: V,
    status: Status,
    /// Frames gathered since the current event started.
    buffer: Vec<F>,
    /// Index of the first frame in `buffer`.
    start: usize,
    /// Index assigned to the next processed frame.
    current: usize,
    /// Valid frames gathered during the confirmation phase.
    init_count: usize,
    /// Consecutive non-valid frames at the tail of `buffer`.
    silence_run: usize,
    /// End index of the previous delivery, if it was forcibly closed at
    /// `max_length`. Grants the `min_length` exemption to a directly
    /// adjacent follow-up event.
    last_truncated_end: Option<usize>,
}

impl<F, V: FrameValidator<F>> StreamTokenizer<F, V> {
    /// Creates a tokenizer, validating the configuration.
    pub fn new(validator: V, config: TokenizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            validator,
            status: Status::Idle,
            buffer: Vec::new(),
            start: 0,
            current: 0,
            init_count: 0,
            silence_run: 0,
            last_truncated_end: None,
        })
    }

    /// Returns the configuration of this tokenizer.
    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Returns a reference to the validator.
    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Returns a mutable reference to the validator, e.g. to adjust an
    /// energy threshold between runs.
    pub fn validator_mut(&mut self) -> &mut V {
        &mut self.validator
    }

    /// Clears all per-run state.
    pub fn reset(&mut self) {
        self.status = Status::Idle;
        self.buffer.clear();
        self.start = 0;
        self.current = 0;
        self.init_count = 0;
        self.silence_run = 0;
        self.last_truncated_end = None;
    }

    /// Processes one frame and returns a finalized event, if any.
    ///
    /// Frames must be pushed in stream order; the frame index is assigned
    /// internally, starting at zero after a [`reset`](Self::reset).
    pub fn process(&mut self, frame: F) -> Option<Event<F>> {
        let valid = self.validator.is_valid(&frame);
        let event = self.step(frame, valid);
        self.current += 1;
        event
    }

    /// Finalizes the stream, possibly emitting one last event.
    ///
    /// Idempotent: a second flush with no intervening frames yields
    /// nothing. An unconfirmed candidate (confirmation phase still in
    /// progress) is discarded.
    pub fn flush(&mut self) -> Option<Event<F>> {
        match self.status {
            Status::Active | Status::MaybeSilence => self.close_event(false),
            Status::PossibleStart => {
                self.buffer.clear();
                self.silence_run = 0;
                self.status = Status::Idle;
                None
            }
            Status::Idle => None,
        }
    }

    /// Reads `source` to exhaustion and returns all events in order.
    ///
    /// On a source read error the in-progress event is flushed internally
    /// and the error is returned; use
    /// [`tokenize_with`](Self::tokenize_with) to still receive the events
    /// delivered before the failure.
    pub fn tokenize<S>(&mut self, source: &mut S) -> Result<Vec<Event<F>>>
    where
        S: FrameSource<Frame = F>,
    {
        let mut events = Vec::new();
        self.tokenize_with(source, |event| events.push(event))?;
        Ok(events)
    }

    /// Reads `source` to exhaustion, invoking `on_event` synchronously at
    /// the moment each event is finalized.
    ///
    /// Events are delivered in strictly increasing start order and never
    /// overlap. On a read error, the pending event (if any) is flushed and
    /// delivered before the error is returned.
    pub fn tokenize_with<S, C>(&mut self, source: &mut S, mut on_event: C) -> Result<()>
    where
        S: FrameSource<Frame = F>,
        C: FnMut(Event<F>),
    {
        self.reset();
        loop {
            match source.read() {
                Ok(Some(frame)) => {
                    if let Some(event) = self.process(frame) {
                        on_event(event);
                    }
                }
                Ok(None) => {
                    if let Some(event) = self.flush() {
                        on_event(event);
                    }
                    return Ok(());
                }
                Err(err) => {
                    if let Some(event) = self.flush() {
                        on_event(event);
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One state-machine transition for the frame at index `self.current`.
    fn step(&mut self, frame: F, valid: bool) -> Option<Event<F>> {
        match self.status {
            Status::Idle => {
                if !valid {
                    return None;
                }
                self.init_count = 1;
                self.silence_run = 0;
                self.start = self.current;
                self.buffer.push(frame);
                if self.init_count >= self.config.init_min {
                    self.status = Status::Active;
                    if self.buffer.len() >= self.config.max_length {
                        return self.close_event(true);
                    }
                } else if self.buffer.len() >= self.config.max_length {
                    self.abandon_candidate();
                } else {
                    self.status = Status::PossibleStart;
                }
            }
            Status::PossibleStart => {
                if valid {
                    self.silence_run = 0;
                    self.init_count += 1;
                    self.buffer.push(frame);
                    if self.init_count >= self.config.init_min {
                        self.status = Status::Active;
                        if self.buffer.len() >= self.config.max_length {
                            return self.close_event(true);
                        }
                    } else if self.buffer.len() >= self.config.max_length {
                        self.abandon_candidate();
                    }
                } else {
                    self.silence_run += 1;
                    if self.silence_run > self.config.init_max_silence
                        || self.buffer.len() + 1 >= self.config.max_length
                    {
                        self.abandon_candidate();
                    } else {
                        self.buffer.push(frame);
                    }
                }
            }
            Status::Active => {
                if valid {
                    self.buffer.push(frame);
                    if self.buffer.len() >= self.config.max_length {
                        return self.close_event(true);
                    }
                } else if self.config.max_continuous_silence == 0 {
                    return self.close_event(false);
                } else {
                    self.silence_run = 1;
                    self.buffer.push(frame);
                    self.status = Status::MaybeSilence;
                    if self.buffer.len() >= self.config.max_length {
                        return self.close_event(true);
                    }
                }
            }
            Status::MaybeSilence => {
                if valid {
                    self.silence_run = 0;
                    self.buffer.push(frame);
                    self.status = Status::Active;
                    if self.buffer.len() >= self.config.max_length {
                        return self.close_event(true);
                    }
                } else if self.silence_run >= self.config.max_continuous_silence {
                    // Silence overflow; the overflowing frame is dropped.
                    return self.close_event(false);
                } else {
                    self.silence_run += 1;
                    self.buffer.push(frame);
                    if self.buffer.len() >= self.config.max_length {
                        return self.close_event(true);
                    }
                }
            }
        }
        None
    }

    /// Drops an unconfirmed candidate without emission.
    fn abandon_candidate(&mut self) {
        self.buffer.clear();
        self.silence_run = 0;
        self.status = Status::Idle;
    }

    /// Closes the in-progress event and decides delivery.
    ///
    /// `truncated` is true when the close was forced by `max_length`;
    /// truncated events keep their trailing silence and arm the
    /// `min_length` exemption for a directly adjacent follow-up.
    fn close_event(&mut self, truncated: bool) -> Option<Event<F>> {
        self.status = Status::Idle;
        if !truncated && self.config.mode.drop_trailing_silence() && self.silence_run > 0 {
            let keep = self.buffer.len() - self.silence_run;
            self.buffer.truncate(keep);
        }
        let continues_truncated = self
            .last_truncated_end
            .is_some_and(|end| end + 1 == self.start);
        let deliver = self.buffer.len() >= self.config.min_length
            || (!self.buffer.is_empty()
                && !self.config.mode.strict_min_length()
                && continues_truncated);
        self.silence_run = 0;
        if deliver {
            let frames = std::mem::take(&mut self.buffer);
            let start = self.start;
            let end = start + frames.len() - 1;
            self.last_truncated_end = if truncated { Some(end) } else { None };
            debug!(start, end, frames = frames.len(), truncated, "event closed");
            Some(Event { frames, start, end })
        } else {
            self.buffer.clear();
            self.last_truncated_end = None;
            None
        }
    }
}
