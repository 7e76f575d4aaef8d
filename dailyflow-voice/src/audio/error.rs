use thiserror::Error;

/// Audio-related errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio input device found
    #[error("No audio input device found")]
    DeviceNotFound,

    /// No audio output device found
    #[error("No audio output device found")]
    OutputDeviceNotFound,

    /// The platform refused access to the microphone
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildFailed(String),

    /// Audio stream error
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Resampling failed
    #[error("Resampling failed: {0}")]
    ResampleFailed(String),

    /// Device name is invalid
    #[error("Device name is invalid UTF-8")]
    InvalidDeviceName,

    /// Failed to get device configuration
    #[error("Failed to get device configuration: {0}")]
    ConfigError(String),

    /// The output command queue is full
    #[error("Output command queue is full")]
    QueueFull,

    /// Inbound payload could not be decoded
    #[error("Failed to decode audio payload: {0}")]
    Decode(#[from] DecodeError),

    /// cpal error
    #[error("cpal error: {0}")]
    CpalError(#[from] cpal::DevicesError),

    /// Default config error
    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),

    /// Supported config error
    #[error("Supported config error: {0}")]
    SupportedConfigError(#[from] cpal::SupportedStreamConfigsError),
}

impl AudioError {
    /// Whether this error means the microphone cannot be used at all
    pub fn is_microphone_unavailable(&self) -> bool {
        matches!(self, AudioError::DeviceNotFound | AudioError::PermissionDenied(_))
    }
}

/// Errors produced while decoding an inbound PCM16 payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid base64
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Byte length does not cover a whole number of frames
    #[error("Payload of {len} bytes is not a multiple of {frame_bytes} ({channels} channel(s) x 2 bytes)")]
    Misaligned {
        len: usize,
        channels: u16,
        frame_bytes: usize,
    },

    /// Channel count of zero was requested
    #[error("Channel count must be at least 1")]
    NoChannels,
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
