//! Gapless playback of streamed speech
//!
//! Decoded chunks are placed back to back on the output device clock and
//! tracked until they finish or are interrupted.

/// Playback error types
pub mod error;

/// Handle ids and the playhead cursor
pub mod handle;

/// Chunk scheduler
pub mod scheduler;

pub use error::{PlaybackError, PlaybackResult};
pub use handle::{HandleId, PlaybackHandle, PlayheadCursor};
pub use scheduler::PlaybackScheduler;
