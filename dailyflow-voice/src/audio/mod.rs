/// Backend seam that opens microphone and speaker
pub mod backend;

/// Lock-free command queue feeding the output callback
pub mod buffer;

/// Audio capture and streaming
pub mod capture;

/// PCM16 / base64 wire codec
pub mod codec;

/// Audio device enumeration and management
pub mod device;

/// Audio-related error types
pub mod error;

/// Scheduled speaker output
pub mod output;

/// Microphone to transport pipeline
pub mod pipeline;

/// Audio resampling
pub mod resampler;

// Re-export commonly used types
pub use backend::{AudioBackend, CpalBackend};
pub use capture::{AudioCapture, InputStream};
pub use codec::{
    decode_inbound, encode_outbound, AudioFrame, DecodedAudio, INPUT_MIME_TYPE, INPUT_SAMPLE_RATE,
    OUTPUT_SAMPLE_RATE,
};
pub use device::{
    get_default_input_device, get_default_output_device, list_input_devices, list_output_devices,
    AudioDevice, DeviceKind,
};
pub use error::{AudioError, AudioResult, DecodeError};
pub use output::{CpalOutput, OutputDevice};
pub use pipeline::{CapturePipeline, SampleChunker, DEFAULT_CHUNK_SAMPLES};
pub use resampler::AudioResampler;
