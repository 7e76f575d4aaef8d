use crate::audio::capture::{AudioCapture, InputStream};
use crate::audio::codec::OUTPUT_SAMPLE_RATE;
use crate::audio::error::AudioResult;
use crate::audio::output::{CpalOutput, OutputDevice};
use crate::playback::HandleId;
use crate::state::config::AudioConfig;
use tokio::sync::mpsc;

/// Opens the microphone and speaker for a session
///
/// Each call returns a fresh device; dropping it releases the hardware.
pub trait AudioBackend {
    type Input: InputStream;
    type Output: OutputDevice;

    /// Acquire the microphone
    ///
    /// Fails with `AudioError::PermissionDenied` or `AudioError::DeviceNotFound`
    /// when capture is not possible.
    fn open_input(&mut self) -> AudioResult<Self::Input>;

    /// Acquire the speaker; finished chunks are reported on `ended`
    fn open_output(&mut self, ended: mpsc::UnboundedSender<HandleId>) -> AudioResult<Self::Output>;
}

/// Real hardware through cpal
#[derive(Debug, Clone)]
pub struct CpalBackend {
    input_device_id: Option<String>,
    output_device_id: Option<String>,
    output_rate: u32,
}

impl CpalBackend {
    /// Default devices, 24kHz speech
    pub fn new() -> Self {
        Self {
            input_device_id: None,
            output_device_id: None,
            output_rate: OUTPUT_SAMPLE_RATE,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new()
            .with_input_device(config.input_device_id.clone())
            .with_output_device(config.output_device_id.clone())
    }

    pub fn with_input_device(mut self, device_id: Option<String>) -> Self {
        self.input_device_id = device_id;
        self
    }

    pub fn with_output_device(mut self, device_id: Option<String>) -> Self {
        self.output_device_id = device_id;
        self
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    type Input = AudioCapture;
    type Output = CpalOutput;

    fn open_input(&mut self) -> AudioResult<AudioCapture> {
        AudioCapture::new(self.input_device_id.as_deref())
    }

    fn open_output(&mut self, ended: mpsc::UnboundedSender<HandleId>) -> AudioResult<CpalOutput> {
        CpalOutput::open(self.output_device_id.as_deref(), self.output_rate, ended)
    }
}
