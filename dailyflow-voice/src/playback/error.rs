use crate::audio::error::{AudioError, DecodeError};
use thiserror::Error;

/// Playback errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The chunk payload could not be decoded
    #[error("Invalid audio chunk: {0}")]
    Decode(#[from] DecodeError),

    /// The chunk decoded to zero frames
    #[error("Audio chunk contains no samples")]
    EmptyChunk,

    /// The output device rejected the chunk
    #[error("Output device error: {0}")]
    Output(#[from] AudioError),
}

/// Result type for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;
