use crate::audio::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, info};

/// Audio resampler for converting between sample rates
///
/// Uses high-quality sinc interpolation. When the input and output rates are
/// equal no filter is created and samples pass through untouched.
///
/// Two modes are offered:
/// * [`process`](Self::process) streams arbitrary-length input, holding back
///   samples until a full internal chunk is available (microphone path).
/// * [`resample_all`](Self::resample_all) converts one self-contained buffer,
///   compensating the filter delay and flushing the tail (speech playback path).
pub struct AudioResampler {
    stage: Option<SincStage>,
    /// Samples waiting for a full chunk
    pending: Vec<f32>,
    input_rate: u32,
    output_rate: u32,
}

struct SincStage {
    resampler: SincFixedIn<f32>,
    /// Input buffer for rubato (channels x samples)
    input_buffer: Vec<Vec<f32>>,
    /// Output buffer for rubato (channels x samples)
    output_buffer: Vec<Vec<f32>>,
    /// Number of input samples per chunk
    chunk_size: usize,
}

impl SincStage {
    fn run(&mut self) -> AudioResult<usize> {
        let (_, produced) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;
        Ok(produced)
    }
}

impl AudioResampler {
    /// Create a new audio resampler
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if either rate is zero or rubato
    /// rejects the configuration.
    ///
    /// # Example
    /// ```no_run
    /// use dailyflow_voice::audio::resampler::AudioResampler;
    ///
    /// // Microphone at 48kHz, service expects 16kHz
    /// let resampler = AudioResampler::new(48000, 16000).unwrap();
    /// ```
    pub fn new(input_rate: u32, output_rate: u32) -> AudioResult<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(AudioError::ResampleFailed(format!(
                "Invalid sample rates: {} Hz -> {} Hz",
                input_rate, output_rate
            )));
        }

        info!("Creating resampler: {} Hz -> {} Hz", input_rate, output_rate);

        if input_rate == output_rate {
            info!("Input and output rates are the same, using passthrough mode");
            return Ok(Self {
                stage: None,
                pending: Vec::new(),
                input_rate,
                output_rate,
            });
        }

        let ratio = output_rate as f64 / input_rate as f64;
        debug!("Resample ratio: {:.6}", ratio);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        // 10ms of input per rubato call
        let chunk_size = (input_rate / 100).max(1) as usize;

        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
            .map_err(|e| AudioError::ResampleFailed(format!("Failed to create resampler: {}", e)))?;

        let input_buffer = resampler.input_buffer_allocate(true);
        let output_buffer = resampler.output_buffer_allocate(true);

        info!(
            "Resampler created: chunk_size={}, output_size={}",
            chunk_size,
            resampler.output_frames_max()
        );

        Ok(Self {
            stage: Some(SincStage {
                resampler,
                input_buffer,
                output_buffer,
                chunk_size,
            }),
            pending: Vec::new(),
            input_rate,
            output_rate,
        })
    }

    /// Stream samples of any length through the resampler
    ///
    /// Returns whatever output the accumulated input allows; may be empty.
    pub fn process(&mut self, input: &[f32]) -> AudioResult<Vec<f32>> {
        let Some(stage) = self.stage.as_mut() else {
            return Ok(input.to_vec());
        };

        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        let mut consumed = 0;
        while self.pending.len() - consumed >= stage.chunk_size {
            stage.input_buffer[0]
                .copy_from_slice(&self.pending[consumed..consumed + stage.chunk_size]);
            consumed += stage.chunk_size;

            let produced = stage.run()?;
            output.extend_from_slice(&stage.output_buffer[0][..produced]);
        }
        self.pending.drain(..consumed);

        Ok(output)
    }

    /// Resample one complete buffer
    ///
    /// The result holds `round(len * ratio)` samples aligned with the input
    /// and the tail is flushed with silence. Internal state is reset before
    /// and after, so calls are independent.
    pub fn resample_all(&mut self, input: &[f32]) -> AudioResult<Vec<f32>> {
        let ratio = self.ratio();
        let Some(stage) = self.stage.as_mut() else {
            return Ok(input.to_vec());
        };

        if input.is_empty() {
            return Ok(Vec::new());
        }

        stage.resampler.reset();

        // After a reset rubato already reads half a filter behind the first
        // input sample. What remains is an offset of `ratio - 1` output frames.
        let lead = (ratio - 1.0).round().max(0.0) as usize;
        let expected = (input.len() as f64 * ratio).round() as usize;
        let wanted = expected + lead;
        // Half a filter of input is held back until the zero flush pushes it out
        let held_back = (stage.resampler.output_delay() as f64 / ratio).ceil() as usize;
        let max_calls = (input.len() + held_back) / stage.chunk_size + 3;

        let mut output = Vec::with_capacity(wanted + stage.resampler.output_frames_max());
        let mut offset = 0;
        for _ in 0..max_calls {
            if output.len() >= wanted {
                break;
            }

            let buffer = &mut stage.input_buffer[0];
            buffer.fill(0.0);
            if offset < input.len() {
                let end = (offset + stage.chunk_size).min(input.len());
                buffer[..end - offset].copy_from_slice(&input[offset..end]);
            }
            offset += stage.chunk_size;

            let produced = stage.run()?;
            output.extend_from_slice(&stage.output_buffer[0][..produced]);
        }

        stage.resampler.reset();

        let mut aligned: Vec<f32> = output.into_iter().skip(lead).take(expected).collect();
        aligned.resize(expected, 0.0);
        Ok(aligned)
    }

    /// Reset the resampler state and drop pending samples
    pub fn reset(&mut self) {
        debug!("Resetting resampler");
        self.pending.clear();

        if let Some(stage) = self.stage.as_mut() {
            stage.resampler.reset();
            for channel in &mut stage.input_buffer {
                channel.fill(0.0);
            }
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.stage.is_none()
    }

    /// Samples held back waiting for a full chunk
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn ratio(&self) -> f64 {
        self.output_rate as f64 / self.input_rate as f64
    }

    /// Get the input sample rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Get the output sample rate
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Number of input samples per internal rubato call (0 in passthrough)
    pub fn chunk_size(&self) -> usize {
        self.stage.as_ref().map_or(0, |s| s.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f32, rate: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn test_passthrough_same_rate() {
        let mut resampler = AudioResampler::new(16000, 16000).unwrap();
        assert!(resampler.is_passthrough());
        assert_eq!(resampler.chunk_size(), 0);

        let input = vec![0.25f32; 123];
        assert_eq!(resampler.process(&input).unwrap(), input);
        assert_eq!(resampler.resample_all(&input).unwrap(), input);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(AudioResampler::new(0, 16000).is_err());
        assert!(AudioResampler::new(48000, 0).is_err());
    }

    #[test]
    fn test_streaming_48k_to_16k() {
        let mut resampler = AudioResampler::new(48000, 16000).unwrap();
        assert_eq!(resampler.chunk_size(), 480);

        let mut total = 0;
        for _ in 0..10 {
            total += resampler.process(&sine(480, 440.0, 48000.0)).unwrap().len();
        }

        assert!(
            (total as i32 - 1600).abs() < 100,
            "Expected ~1600 samples, got {}",
            total
        );
    }

    #[test]
    fn test_streaming_holds_back_partial_chunk() {
        let mut resampler = AudioResampler::new(48000, 16000).unwrap();

        let first = resampler.process(&vec![0.5f32; 200]).unwrap();
        assert!(first.is_empty());
        assert_eq!(resampler.pending_len(), 200);

        let second = resampler.process(&vec![0.5f32; 400]).unwrap();
        assert!(!second.is_empty());
        assert_eq!(resampler.pending_len(), 120);

        resampler.reset();
        assert_eq!(resampler.pending_len(), 0);
    }

    #[test]
    fn test_resample_all_exact_length() {
        let mut resampler = AudioResampler::new(24000, 48000).unwrap();

        let output = resampler.resample_all(&sine(12_000, 300.0, 24000.0)).unwrap();
        assert_eq!(output.len(), 24_000);

        // Independent calls give identical results
        let again = resampler.resample_all(&sine(12_000, 300.0, 24000.0)).unwrap();
        assert_eq!(output, again);
    }

    #[test]
    fn test_resample_all_preserves_signal() {
        let mut resampler = AudioResampler::new(24000, 44100).unwrap();

        let output = resampler.resample_all(&sine(2400, 440.0, 24000.0)).unwrap();
        assert_eq!(output.len(), 4410);

        let middle = &output[1000..3000];
        let peak = middle.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(peak > 0.8 && peak <= 1.05, "peak amplitude {}", peak);
    }

    #[test]
    fn test_resample_all_keeps_the_onset() {
        let mut resampler = AudioResampler::new(24000, 48000).unwrap();

        // A chunk that starts loud must not lose its first milliseconds
        let mut input = vec![0.0f32; 2400];
        input[..240].fill(0.8);
        let output = resampler.resample_all(&input).unwrap();

        assert!(output[20..400].iter().all(|v| (v - 0.8).abs() < 0.1));
        assert!(output[600..].iter().all(|v| v.abs() < 0.05));
    }

    #[test]
    fn test_resample_all_empty() {
        let mut resampler = AudioResampler::new(24000, 48000).unwrap();
        assert!(resampler.resample_all(&[]).unwrap().is_empty());
    }
}
