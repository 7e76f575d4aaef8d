use std::fmt;

/// Identifies one scheduled chunk for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(u64);

impl HandleId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A chunk that has been handed to the output device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackHandle {
    pub id: HandleId,
    /// Start time on the output clock, in seconds
    pub start_at: f64,
    /// Length in seconds
    pub duration: f64,
}

impl PlaybackHandle {
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// The earliest time the next chunk may start
///
/// Chunks are laid end to end: each starts where the previous one ends, or
/// immediately if the output clock has already passed that point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayheadCursor {
    next_start: f64,
}

impl PlayheadCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start time for a chunk scheduled at output time `now`
    pub fn next_start(&self, now: f64) -> f64 {
        self.next_start.max(now)
    }

    /// Record a chunk placed at `start_at`
    pub fn advance(&mut self, start_at: f64, duration: f64) {
        self.next_start = self.next_start.max(start_at + duration.max(0.0));
    }

    /// Forget all scheduled audio (after an interruption)
    pub fn reset(&mut self) {
        self.next_start = 0.0;
    }

    pub fn position(&self) -> f64 {
        self.next_start
    }
}
