use crate::audio::codec::DecodedAudio;
use crate::audio::output::OutputDevice;
use crate::playback::error::{PlaybackError, PlaybackResult};
use crate::playback::handle::{HandleId, PlaybackHandle, PlayheadCursor};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Places decoded speech chunks back to back on an output device
///
/// Every scheduled chunk stays in the active set until the device reports it
/// finished ([`complete`](Self::complete)) or the model interrupts
/// ([`interrupt`](Self::interrupt)).
pub struct PlaybackScheduler<O: OutputDevice> {
    output: O,
    cursor: PlayheadCursor,
    active: BTreeMap<HandleId, PlaybackHandle>,
    next_id: u64,
    /// Rate of inbound payloads
    sample_rate: u32,
    /// Channel count of inbound payloads
    channels: u16,
}

impl<O: OutputDevice> PlaybackScheduler<O> {
    pub fn new(output: O, sample_rate: u32, channels: u16) -> Self {
        Self {
            output,
            cursor: PlayheadCursor::new(),
            active: BTreeMap::new(),
            next_id: 1,
            sample_rate,
            channels,
        }
    }

    /// Decode a base64 PCM16 payload and schedule it
    ///
    /// # Errors
    /// `PlaybackError::Decode` for malformed payloads; nothing is scheduled.
    pub fn enqueue_payload(&mut self, payload: &str) -> PlaybackResult<PlaybackHandle> {
        let audio = DecodedAudio::from_base64(payload, self.sample_rate, self.channels)?;
        self.schedule(audio)
    }

    /// Schedule decoded audio right after everything already scheduled
    pub fn schedule(&mut self, audio: DecodedAudio) -> PlaybackResult<PlaybackHandle> {
        if audio.is_empty() {
            return Err(PlaybackError::EmptyChunk);
        }

        let now = self.output.current_time();
        let start_at = self.cursor.next_start(now);
        let duration = audio.duration_secs();
        let id = HandleId::new(self.next_id);

        self.output.play_at(id, &audio, start_at)?;

        self.next_id += 1;
        self.cursor.advance(start_at, duration);

        let handle = PlaybackHandle {
            id,
            start_at,
            duration,
        };
        self.active.insert(id, handle);

        debug!(
            handle = %id,
            start_at,
            duration,
            active = self.active.len(),
            "Scheduled audio chunk"
        );

        Ok(handle)
    }

    /// Record that a chunk finished playing
    ///
    /// Returns `true` when this completion leaves nothing scheduled.
    pub fn complete(&mut self, id: HandleId) -> bool {
        if self.active.remove(&id).is_none() {
            return false;
        }

        debug!(handle = %id, remaining = self.active.len(), "Audio chunk finished");
        self.active.is_empty()
    }

    /// Stop every scheduled chunk and rewind the cursor
    ///
    /// Returns how many chunks were cut off.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.active.len();
        if stopped > 0 {
            self.output.stop_all();
        }
        self.active.clear();
        self.cursor.reset();

        info!(stopped, "Playback interrupted");
        stopped
    }

    /// Silence the device and forget all state
    pub fn reset(&mut self) {
        self.output.stop_all();
        self.active.clear();
        self.cursor.reset();
    }

    pub fn is_playing(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_handles(&self) -> impl Iterator<Item = &PlaybackHandle> {
        self.active.values()
    }

    /// Earliest start time for the next chunk
    pub fn cursor(&self) -> f64 {
        self.cursor.position()
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::{encode_outbound, OUTPUT_SAMPLE_RATE};
    use crate::audio::error::{AudioError, AudioResult};

    #[derive(Default)]
    struct FakeSpeaker {
        now: f64,
        played: Vec<(HandleId, f64, usize)>,
        stop_all_calls: usize,
        reject: bool,
    }

    impl OutputDevice for FakeSpeaker {
        fn current_time(&self) -> f64 {
            self.now
        }

        fn play_at(&mut self, id: HandleId, audio: &DecodedAudio, start_at: f64) -> AudioResult<()> {
            if self.reject {
                return Err(AudioError::QueueFull);
            }
            self.played.push((id, start_at, audio.frame_count()));
            Ok(())
        }

        fn stop_all(&mut self) {
            self.stop_all_calls += 1;
        }
    }

    fn scheduler_at(now: f64) -> PlaybackScheduler<FakeSpeaker> {
        let speaker = FakeSpeaker {
            now,
            ..Default::default()
        };
        PlaybackScheduler::new(speaker, OUTPUT_SAMPLE_RATE, 1)
    }

    fn silence(frames: usize) -> String {
        encode_outbound(&vec![0.0; frames])
    }

    #[test]
    fn test_chunks_play_back_to_back() {
        let mut scheduler = scheduler_at(2.0);

        let a = scheduler.enqueue_payload(&silence(12_000)).unwrap();
        let b = scheduler.enqueue_payload(&silence(7_200)).unwrap();
        let c = scheduler.enqueue_payload(&silence(4_800)).unwrap();

        assert!((a.start_at - 2.0).abs() < 1e-9);
        assert!((b.start_at - 2.5).abs() < 1e-9);
        assert!((c.start_at - 2.8).abs() < 1e-9);
        assert!((scheduler.cursor() - 3.0).abs() < 1e-9);
        assert_eq!(scheduler.active_count(), 3);
        assert_eq!(scheduler.output().played.len(), 3);
    }

    #[test]
    fn test_late_chunk_starts_now() {
        let mut scheduler = scheduler_at(1.0);
        scheduler.enqueue_payload(&silence(2_400)).unwrap();

        scheduler.output.now = 5.0;
        let late = scheduler.enqueue_payload(&silence(2_400)).unwrap();
        assert_eq!(late.start_at, 5.0);
        assert!((scheduler.cursor() - 5.1).abs() < 1e-9);
    }

    #[test]
    fn test_completion_reports_idle_once_empty() {
        let mut scheduler = scheduler_at(0.0);
        let a = scheduler.enqueue_payload(&silence(240)).unwrap();
        let b = scheduler.enqueue_payload(&silence(240)).unwrap();

        assert!(!scheduler.complete(a.id));
        assert!(scheduler.is_playing());
        assert!(scheduler.complete(b.id));
        assert!(!scheduler.is_playing());

        // Unknown or repeated completions are ignored
        assert!(!scheduler.complete(b.id));
    }

    #[test]
    fn test_interrupt_stops_everything() {
        let mut scheduler = scheduler_at(0.5);
        let ids: Vec<HandleId> = (0..3)
            .map(|_| scheduler.enqueue_payload(&silence(2_400)).unwrap().id)
            .collect();

        assert_eq!(scheduler.interrupt(), 3);
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.cursor(), 0.0);
        assert_eq!(scheduler.output().stop_all_calls, 1);

        // Completions for stopped chunks arrive late and are ignored
        assert!(!scheduler.complete(ids[0]));

        let next = scheduler.enqueue_payload(&silence(2_400)).unwrap();
        assert_eq!(next.start_at, 0.5);
    }

    #[test]
    fn test_invalid_payload_is_not_scheduled() {
        let mut scheduler = scheduler_at(0.0);
        let odd = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [0u8; 3]);

        assert!(matches!(
            scheduler.enqueue_payload(&odd),
            Err(PlaybackError::Decode(_))
        ));
        assert!(matches!(
            scheduler.enqueue_payload("***"),
            Err(PlaybackError::Decode(_))
        ));
        assert!(matches!(
            scheduler.enqueue_payload(""),
            Err(PlaybackError::EmptyChunk)
        ));
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.cursor(), 0.0);
    }

    #[test]
    fn test_output_failure_leaves_cursor() {
        let mut scheduler = scheduler_at(1.0);
        scheduler.output.reject = true;

        assert!(matches!(
            scheduler.enqueue_payload(&silence(240)),
            Err(PlaybackError::Output(_))
        ));
        assert_eq!(scheduler.cursor(), 0.0);
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_stereo_duration() {
        let mut scheduler = PlaybackScheduler::new(FakeSpeaker::default(), OUTPUT_SAMPLE_RATE, 2);
        let handle = scheduler.enqueue_payload(&silence(4_800)).unwrap();
        assert!((handle.duration - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_reset_silences_device() {
        let mut scheduler = scheduler_at(0.0);
        scheduler.enqueue_payload(&silence(240)).unwrap();

        scheduler.reset();
        assert_eq!(scheduler.output().stop_all_calls, 1);
        assert!(!scheduler.is_playing());
    }
}
