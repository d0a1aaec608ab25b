//! Playback cursor state machine.
//!
//! A monotonically advancing read position into the log, driven by an
//! external tick. The index never decreases except through
//! [`PlaybackCursor::reset`].

use serde::Serialize;

/// Configuration for playback advancement.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Events revealed per tick at rate 1. Default: 100.
    pub base_increment: usize,

    /// Highest accepted rate multiplier. Default: 25.
    pub max_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_increment: 100,
            max_rate: 25,
        }
    }
}

/// Playback mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Not playing; a fresh or finished replay.
    Stopped,
    /// Advancing on every tick.
    Playing,
    /// Holding position; resumable.
    Paused,
}

/// The cursor into the event log.
///
/// Transitions: `start()` (Stopped/Paused → Playing), `pause()`
/// (Playing → Paused), `reset()` (any → Stopped at index 0). `advance()`
/// moves the index forward by `rate * base_increment` while Playing and
/// clamps an overrun to the last valid index, transitioning to Stopped.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    index: usize,
    mode: PlaybackMode,
    rate: u32,
    len: usize,
    config: PlaybackConfig,
}

impl PlaybackCursor {
    /// Creates a stopped cursor at index 0 for a log of `len` events.
    #[must_use]
    pub fn new(len: usize, config: PlaybackConfig) -> Self {
        Self {
            index: 0,
            mode: PlaybackMode::Stopped,
            rate: 1,
            len,
            config,
        }
    }

    /// Current read position. Always `< len` for non-empty logs.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Current rate multiplier.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Begins or resumes playback. No effect on an empty log.
    pub fn start(&mut self) {
        if self.len == 0 {
            return;
        }
        if matches!(self.mode, PlaybackMode::Stopped | PlaybackMode::Paused) {
            self.mode = PlaybackMode::Playing;
        }
    }

    /// Pauses playback, holding the current index.
    pub fn pause(&mut self) {
        if self.mode == PlaybackMode::Playing {
            self.mode = PlaybackMode::Paused;
        }
    }

    /// Stops playback and rewinds to index 0. The only transition that
    /// moves the index backward.
    pub fn reset(&mut self) {
        self.mode = PlaybackMode::Stopped;
        self.index = 0;
    }

    /// Sets the rate multiplier, clamped to `1..=max_rate`.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate.clamp(1, self.config.max_rate);
    }

    /// Advances by one tick while Playing; returns the new index.
    ///
    /// An advance past the end clamps to `len - 1` and stops playback;
    /// that is end-of-replay, not an error.
    pub fn advance(&mut self) -> usize {
        if self.mode != PlaybackMode::Playing {
            return self.index;
        }
        let step = self.config.base_increment * self.rate as usize;
        let next = self.index.saturating_add(step);
        if next >= self.len {
            self.index = self.len.saturating_sub(1);
            self.mode = PlaybackMode::Stopped;
        } else {
            self.index = next;
        }
        self.index
    }

    /// Moves the cursor forward to `index` (clamped to the log), without
    /// changing mode. Backward seeks are ignored; reset first.
    pub fn seek(&mut self, index: usize) {
        let clamped = index.min(self.len.saturating_sub(1));
        if clamped > self.index {
            self.index = clamped;
        }
    }
}
