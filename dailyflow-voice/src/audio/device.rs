use crate::audio::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, SupportedStreamConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Direction of an audio endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Input,
    Output,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Device identifier (unique name)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Microphone or speaker
    pub kind: DeviceKind,
    /// Whether this is the host's default device for its direction
    pub is_default: bool,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
}

const COMMON_RATES: [u32; 8] = [8000, 16000, 22050, 24000, 32000, 44100, 48000, 96000];

/// List all available input devices
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if no input devices are found.
/// Returns `AudioError::CpalError` if there's an error accessing devices.
///
/// # Example
/// ```no_run
/// use dailyflow_voice::audio::device::list_input_devices;
///
/// for device in list_input_devices().unwrap() {
///     println!("Microphone: {} ({})", device.name, device.id);
/// }
/// ```
pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let devices: Vec<Device> = host.input_devices()?.collect();

    if devices.is_empty() {
        return Err(AudioError::DeviceNotFound);
    }

    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    describe_all(devices, DeviceKind::Input, default_name)
}

/// List all available output devices
///
/// # Errors
/// Returns `AudioError::OutputDeviceNotFound` if no output devices are found.
pub fn list_output_devices() -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let devices: Vec<Device> = host.output_devices()?.collect();

    if devices.is_empty() {
        return Err(AudioError::OutputDeviceNotFound);
    }

    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    describe_all(devices, DeviceKind::Output, default_name)
}

/// Get the default input device
pub fn get_default_input_device() -> AudioResult<AudioDevice> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or(AudioError::DeviceNotFound)?;

    describe(&device, DeviceKind::Input, true)
}

/// Get the default output device
pub fn get_default_output_device() -> AudioResult<AudioDevice> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::OutputDeviceNotFound)?;

    describe(&device, DeviceKind::Output, true)
}

/// Resolve the microphone to capture from
///
/// `None` selects the host default.
pub(crate) fn resolve_input_device(device_id: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => find_input_device(&host, id),
        None => host.default_input_device().ok_or(AudioError::DeviceNotFound),
    }
}

/// Resolve the speaker to play through
pub(crate) fn resolve_output_device(device_id: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => find_output_device(&host, id),
        None => host
            .default_output_device()
            .ok_or(AudioError::OutputDeviceNotFound),
    }
}

/// Find an input device by its ID (name)
pub(crate) fn find_input_device(host: &Host, device_id: &str) -> AudioResult<Device> {
    host.input_devices()?
        .find(|device| device.name().is_ok_and(|name| name == device_id))
        .ok_or(AudioError::DeviceNotFound)
}

/// Find an output device by its ID (name)
pub(crate) fn find_output_device(host: &Host, device_id: &str) -> AudioResult<Device> {
    host.output_devices()?
        .find(|device| device.name().is_ok_and(|name| name == device_id))
        .ok_or(AudioError::OutputDeviceNotFound)
}

/// Pick an output configuration, preferring `rate` in f32
///
/// Falls back to the device default when no f32 range covers the rate.
pub(crate) fn preferred_output_config(device: &Device, rate: u32) -> AudioResult<SupportedStreamConfig> {
    let wanted = SampleRate(rate);

    if let Ok(ranges) = device.supported_output_configs() {
        let matching = ranges
            .filter(|range| range.sample_format() == SampleFormat::F32)
            .filter(|range| range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate())
            .min_by_key(|range| range.channels());

        if let Some(range) = matching {
            debug!("Output device supports {} Hz f32 natively", rate);
            return Ok(range.with_sample_rate(wanted));
        }
    }

    Ok(device.default_output_config()?)
}

fn describe_all(
    devices: Vec<Device>,
    kind: DeviceKind,
    default_name: Option<String>,
) -> AudioResult<Vec<AudioDevice>> {
    devices
        .iter()
        .map(|device| {
            let name = device.name().map_err(|_| AudioError::InvalidDeviceName)?;
            let is_default = default_name.as_deref() == Some(name.as_str());
            describe(device, kind, is_default)
        })
        .collect()
}

fn describe(device: &Device, kind: DeviceKind, is_default: bool) -> AudioResult<AudioDevice> {
    let name = device.name().map_err(|_| AudioError::InvalidDeviceName)?;

    Ok(AudioDevice {
        id: name.clone(),
        name,
        kind,
        is_default,
        sample_rates: supported_sample_rates(device, kind),
    })
}

/// Get supported sample rates for a device
fn supported_sample_rates(device: &Device, kind: DeviceKind) -> Vec<u32> {
    let ranges: Vec<(SampleRate, SampleRate)> = match kind {
        DeviceKind::Input => device
            .supported_input_configs()
            .map(|configs| {
                configs
                    .map(|c| (c.min_sample_rate(), c.max_sample_rate()))
                    .collect()
            })
            .unwrap_or_default(),
        DeviceKind::Output => device
            .supported_output_configs()
            .map(|configs| {
                configs
                    .map(|c| (c.min_sample_rate(), c.max_sample_rate()))
                    .collect()
            })
            .unwrap_or_default(),
    };

    let mut rates: Vec<u32> = COMMON_RATES
        .iter()
        .copied()
        .filter(|&rate| {
            ranges
                .iter()
                .any(|(min, max)| *min <= SampleRate(rate) && SampleRate(rate) <= *max)
        })
        .collect();

    if rates.is_empty() {
        let fallback = match kind {
            DeviceKind::Input => device.default_input_config().ok(),
            DeviceKind::Output => device.default_output_config().ok(),
        };
        if let Some(config) = fallback {
            rates.push(config.sample_rate().0);
        }
    }

    rates.sort_unstable();
    rates
}
