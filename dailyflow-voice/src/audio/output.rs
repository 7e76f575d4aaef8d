use crate::audio::buffer::{CommandQueue, CommandReceiver, CommandSender, OutputCommand, ScheduledVoice};
use crate::audio::codec::DecodedAudio;
use crate::audio::device::{preferred_output_config, resolve_output_device};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::resampler::AudioResampler;
use crate::playback::HandleId;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A speaker that plays decoded speech at precise times
///
/// Times are seconds on the device's own monotonic clock, which starts at
/// zero when the device opens. A chunk whose start time has already passed
/// plays from the point it would have reached, so later chunks stay gapless.
pub trait OutputDevice {
    /// Current position of the device clock in seconds
    fn current_time(&self) -> f64;

    /// Schedule `audio` to begin at `start_at`
    fn play_at(&mut self, id: HandleId, audio: &DecodedAudio, start_at: f64) -> AudioResult<()>;

    /// Silence every scheduled chunk, whether or not it has started
    fn stop_all(&mut self);
}

/// cpal-backed speaker output
///
/// Decoded chunks are downmixed, resampled to the device rate if needed, and
/// handed to the audio callback through a lock-free command queue. The
/// callback mixes every voice whose start frame has been reached and reports
/// each finished voice on the `ended` channel.
pub struct CpalOutput {
    _stream: Stream,
    commands: CommandSender,
    /// Frames rendered since the stream opened
    clock: Arc<AtomicU64>,
    device_rate: u32,
    channels: u16,
    resampler: AudioResampler,
}

impl CpalOutput {
    /// Open a speaker for audio produced at `source_rate`
    ///
    /// # Arguments
    /// * `device_id` - Optional device ID. If None, uses the default output device.
    /// * `source_rate` - Rate of the decoded speech (24kHz for the Live API)
    /// * `ended` - Receives the id of every chunk that finishes playing
    pub fn open(
        device_id: Option<&str>,
        source_rate: u32,
        ended: mpsc::UnboundedSender<HandleId>,
    ) -> AudioResult<Self> {
        let device = resolve_output_device(device_id)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {}", device_name);

        let config = preferred_output_config(&device, source_rate)?;
        let device_rate = config.sample_rate().0;
        let channels = config.channels();
        info!(
            "Output config: {} Hz, {} channels, {:?}",
            device_rate,
            channels,
            config.sample_format()
        );

        let resampler = AudioResampler::new(source_rate, device_rate)?;
        let stream_config = StreamConfig {
            channels,
            sample_rate: config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let (commands, receiver) = CommandQueue::with_default_capacity();
        let clock = Arc::new(AtomicU64::new(0));
        let mixer = Mixer::new(receiver, Arc::clone(&clock), channels as usize, ended);

        let stream = match config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, mixer)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, mixer)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, mixer)?,
            other => {
                return Err(AudioError::ConfigError(format!(
                    "Unsupported output sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            commands,
            clock,
            device_rate,
            channels,
            resampler,
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn send(&mut self, command: OutputCommand) {
        if let Err(e) = self.commands.send(command) {
            warn!("Dropping output command: {}", e);
        }
    }
}

impl OutputDevice for CpalOutput {
    fn current_time(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.device_rate as f64
    }

    fn play_at(&mut self, id: HandleId, audio: &DecodedAudio, start_at: f64) -> AudioResult<()> {
        let mono = self.resampler.resample_all(&audio.to_mono())?;
        let samples = interleave(&mono, self.channels as usize);
        let start_frame = (start_at.max(0.0) * self.device_rate as f64).round() as u64;

        debug!(
            handle = %id,
            start_frame,
            frames = mono.len(),
            "Scheduling voice"
        );

        self.commands.send(OutputCommand::Play(ScheduledVoice {
            id,
            start_frame,
            samples,
        }))
    }

    fn stop_all(&mut self) {
        self.send(OutputCommand::StopAll);
    }
}

fn build_stream<T>(device: &cpal::Device, config: &StreamConfig, mut mixer: Mixer) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| mixer.render(data),
            move |err| {
                error!("Audio output stream error: {}", err);
            },
            Some(Duration::from_millis(200)),
        )
        .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))
}

/// Copy a mono plane into every device channel
fn interleave(mono: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return mono.to_vec();
    }

    let mut out = Vec::with_capacity(mono.len() * channels);
    for &sample in mono {
        out.extend(std::iter::repeat_n(sample, channels));
    }
    out
}

struct Voice {
    id: HandleId,
    start_frame: u64,
    /// Interleaved device-channel samples
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self, channels: usize) -> u64 {
        self.start_frame + (self.samples.len() / channels) as u64
    }
}

/// Callback-side state: pending voices and the frame clock
struct Mixer {
    commands: CommandReceiver,
    voices: Vec<Voice>,
    clock: Arc<AtomicU64>,
    channels: usize,
    ended: mpsc::UnboundedSender<HandleId>,
}

impl Mixer {
    fn new(
        commands: CommandReceiver,
        clock: Arc<AtomicU64>,
        channels: usize,
        ended: mpsc::UnboundedSender<HandleId>,
    ) -> Self {
        Self {
            commands,
            voices: Vec::with_capacity(32),
            clock,
            channels: channels.max(1),
            ended,
        }
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                // A late voice keeps its start frame; render skips what already passed
                OutputCommand::Play(voice) => self.voices.push(Voice {
                    id: voice.id,
                    start_frame: voice.start_frame,
                    samples: voice.samples,
                }),
                OutputCommand::StopAll => self.voices.clear(),
            }
        }
    }

    fn render<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.channels;
        let base = self.clock.load(Ordering::Acquire);
        self.apply_commands();

        let frames = data.len() / channels;
        for (offset, frame) in data.chunks_exact_mut(channels).enumerate() {
            let now = base + offset as u64;
            for (channel, out) in frame.iter_mut().enumerate() {
                let mut mixed = 0.0f32;
                for voice in &self.voices {
                    if now < voice.start_frame {
                        continue;
                    }
                    let index = (now - voice.start_frame) as usize * channels + channel;
                    if let Some(&sample) = voice.samples.get(index) {
                        mixed += sample;
                    }
                }
                *out = T::from_sample(mixed.clamp(-1.0, 1.0));
            }
        }

        let end = base + frames as u64;
        self.clock.store(end, Ordering::Release);

        let Self { voices, ended, .. } = self;
        voices.retain(|voice| {
            let finished = voice.end_frame(channels) <= end;
            if finished {
                let _ = ended.send(voice.id);
            }
            !finished
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer(channels: usize) -> (CommandSender, Mixer, mpsc::UnboundedReceiver<HandleId>) {
        let (sender, receiver) = CommandQueue::new(16);
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let mixer = Mixer::new(receiver, Arc::new(AtomicU64::new(0)), channels, ended_tx);
        (sender, mixer, ended_rx)
    }

    fn play(sender: &mut CommandSender, id: u64, start_frame: u64, samples: Vec<f32>) {
        sender
            .send(OutputCommand::Play(ScheduledVoice {
                id: HandleId::new(id),
                start_frame,
                samples,
            }))
            .unwrap();
    }

    #[test]
    fn test_voice_starts_at_frame() {
        let (mut sender, mut mixer, mut ended) = mixer(1);
        play(&mut sender, 1, 2, vec![0.5, 0.25]);

        let mut out = [1.0f32; 6];
        mixer.render(&mut out);

        assert_eq!(out, [0.0, 0.0, 0.5, 0.25, 0.0, 0.0]);
        assert_eq!(mixer.clock.load(Ordering::Acquire), 6);
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(1));
        assert!(mixer.voices.is_empty());
    }

    #[test]
    fn test_back_to_back_voices_are_gapless() {
        let (mut sender, mut mixer, mut ended) = mixer(1);
        play(&mut sender, 1, 0, vec![0.1; 3]);
        play(&mut sender, 2, 3, vec![0.2; 3]);

        let mut out = [0.0f32; 6];
        mixer.render(&mut out);

        assert_eq!(out, [0.1, 0.1, 0.1, 0.2, 0.2, 0.2]);
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(1));
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(2));
    }

    #[test]
    fn test_voice_spanning_callbacks() {
        let (mut sender, mut mixer, mut ended) = mixer(2);
        play(&mut sender, 7, 1, interleave(&[0.3, 0.4, 0.5], 2));

        let mut first = [0.0f32; 4];
        mixer.render(&mut first);
        assert_eq!(first, [0.0, 0.0, 0.3, 0.3]);
        assert!(ended.try_recv().is_err());

        let mut second = [0.0f32; 4];
        mixer.render(&mut second);
        assert_eq!(second, [0.4, 0.4, 0.5, 0.5]);
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(7));
    }

    #[test]
    fn test_stop_silences_without_ending() {
        let (mut sender, mut mixer, mut ended) = mixer(1);
        play(&mut sender, 1, 0, vec![0.5; 8]);
        play(&mut sender, 2, 0, vec![0.25; 8]);

        let mut out = [0.0f32; 2];
        mixer.render(&mut out);
        assert_eq!(out, [0.75, 0.75]);

        sender.send(OutputCommand::StopAll).unwrap();
        mixer.render(&mut out);
        assert_eq!(out, [0.0, 0.0]);
        assert!(ended.try_recv().is_err());
    }

    #[test]
    fn test_late_voice_keeps_its_timeline() {
        let (mut sender, mut mixer, mut ended) = mixer(1);

        let mut out = [0.0f32; 4];
        mixer.render(&mut out);

        // Both were meant to start before the clock reached them
        play(&mut sender, 1, 2, vec![0.1, 0.2, 0.3]);
        play(&mut sender, 2, 5, vec![0.4, 0.4]);
        mixer.render(&mut out);

        assert_eq!(out, [0.3, 0.4, 0.4, 0.0]);
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(1));
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(2));
    }

    #[test]
    fn test_voice_entirely_in_the_past_ends_silently() {
        let (mut sender, mut mixer, mut ended) = mixer(1);

        let mut out = [0.0f32; 4];
        mixer.render(&mut out);

        play(&mut sender, 3, 0, vec![0.5, 0.5]);
        mixer.render(&mut out);

        assert_eq!(out, [0.0; 4]);
        assert_eq!(ended.try_recv().unwrap(), HandleId::new(3));
    }

    #[test]
    fn test_mix_is_clamped() {
        let (mut sender, mut mixer, _ended) = mixer(1);
        play(&mut sender, 1, 0, vec![0.9]);
        play(&mut sender, 2, 0, vec![0.9]);

        let mut out = [0i16; 1];
        mixer.render(&mut out);
        assert_eq!(out[0], i16::MAX);
    }

    #[test]
    fn test_interleave() {
        assert_eq!(interleave(&[0.1, 0.2], 2), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(interleave(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }
}
