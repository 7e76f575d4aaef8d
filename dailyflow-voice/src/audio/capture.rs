use crate::audio::device::resolve_input_device;
use crate::audio::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BuildStreamError, Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A source of mono microphone samples
///
/// Implementations push buffers of f32 samples at `sample_rate()` into the
/// sender until stopped. Pushing must never block the producer.
///
/// cpal streams are not `Send`, so inputs live on the session thread that
/// opened them.
pub trait InputStream {
    /// Native rate of the samples pushed to the sender
    fn sample_rate(&self) -> u32;

    /// Begin delivering samples
    fn start(&mut self, sender: mpsc::Sender<Vec<f32>>) -> AudioResult<()>;

    /// Stop delivering samples; safe to call repeatedly
    fn stop(&mut self);

    fn is_capturing(&self) -> bool;
}

/// Audio capture manager
///
/// Manages the cpal input stream. Multi-channel devices are downmixed to mono
/// inside the callback so consumers always receive a single plane.
pub struct AudioCapture {
    /// The audio input stream (None when stopped)
    stream: Option<Stream>,
    /// Sample rate of the input device
    sample_rate: u32,
    /// Number of device channels
    channels: u16,
    sample_format: SampleFormat,
    device: Device,
    config: StreamConfig,
}

impl AudioCapture {
    /// Open a microphone
    ///
    /// # Arguments
    /// * `device_id` - Optional device ID. If None, uses the default input device.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceNotFound` if no device is available.
    /// Returns `AudioError::DefaultConfigError` if unable to get device config.
    ///
    /// # Example
    /// ```no_run
    /// use dailyflow_voice::audio::capture::{AudioCapture, InputStream};
    ///
    /// let capture = AudioCapture::new(None).unwrap();
    /// println!("Microphone runs at {} Hz", capture.sample_rate());
    /// ```
    pub fn new(device_id: Option<&str>) -> AudioResult<Self> {
        let device = resolve_input_device(device_id)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let config = device.default_input_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        let sample_format = config.sample_format();

        info!(
            "Device config: {} Hz, {} channels, {:?}",
            sample_rate, channels, sample_format
        );

        let stream_config = StreamConfig {
            channels,
            sample_rate: config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            stream: None,
            sample_rate,
            channels,
            sample_format,
            device,
            config: stream_config,
        })
    }

    /// Get the number of device channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn build_stream<T>(&self, sender: mpsc::Sender<Vec<f32>>) -> AudioResult<Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = self.channels as usize;

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    // A full channel means the consumer is behind; drop this batch.
                    let _ = sender.try_send(downmix(data, channels));
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(map_build_error)
    }
}

impl InputStream for AudioCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, sender: mpsc::Sender<Vec<f32>>) -> AudioResult<()> {
        if self.stream.is_some() {
            warn!("Audio capture already started");
            return Ok(());
        }

        info!("Starting audio capture");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(sender)?,
            SampleFormat::I16 => self.build_stream::<i16>(sender)?,
            SampleFormat::U16 => self.build_stream::<u16>(sender)?,
            other => {
                return Err(AudioError::ConfigError(format!(
                    "Unsupported input sample format: {:?}",
                    other
                )));
            }
        };

        stream.play().map_err(|e| {
            let message = e.to_string();
            if looks_like_permission_error(&message) {
                AudioError::PermissionDenied(message)
            } else {
                AudioError::StreamError(message)
            }
        })?;

        self.stream = Some(stream);
        info!("Audio capture started successfully");

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio capture");
            drop(stream);
            debug!("Audio capture stopped");
        }
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Average interleaved frames into mono f32
pub(crate) fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    if channels <= 1 {
        return data.iter().map(|&s| f32::from_sample(s)).collect();
    }

    data.chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / channels as f32)
        .collect()
}

fn map_build_error(err: BuildStreamError) -> AudioError {
    match err {
        BuildStreamError::DeviceNotAvailable => {
            AudioError::PermissionDenied("input device is not available".to_string())
        }
        other => {
            let message = other.to_string();
            if looks_like_permission_error(&message) {
                AudioError::PermissionDenied(message)
            } else {
                AudioError::StreamBuildFailed(message)
            }
        }
    }
}

fn looks_like_permission_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["permission", "denied", "not authorized", "access"]
        .iter()
        .any(|needle| lower.contains(needle))
}
