use crate::audio::capture::InputStream;
use crate::audio::codec::{AudioFrame, INPUT_SAMPLE_RATE};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::resampler::AudioResampler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Samples per outbound chunk (256ms @ 16kHz)
pub const DEFAULT_CHUNK_SAMPLES: usize = 4096;

/// Splits a sample stream into fixed-size chunks
#[derive(Debug)]
pub struct SampleChunker {
    pending: Vec<f32>,
    chunk_samples: usize,
}

impl SampleChunker {
    pub fn new(chunk_samples: usize) -> Self {
        let chunk_samples = chunk_samples.max(1);
        Self {
            pending: Vec::with_capacity(chunk_samples * 2),
            chunk_samples,
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
    }

    /// Take the next full chunk, if one is ready
    pub fn pop_chunk(&mut self) -> Option<Vec<f32>> {
        if self.pending.len() < self.chunk_samples {
            return None;
        }
        Some(self.pending.drain(..self.chunk_samples).collect())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn chunk_samples(&self) -> usize {
        self.chunk_samples
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Microphone to transport pipeline
///
/// This pipeline:
/// 1. Receives mono samples from an [`InputStream`]
/// 2. Resamples them to 16kHz
/// 3. Accumulates fixed-size chunks
/// 4. Encodes each chunk as base64 PCM16
/// 5. Hands the payload to the transport's audio channel
///
/// A chunk is dropped, never queued, once the transport side has gone away.
pub struct CapturePipeline<I: InputStream> {
    input: I,
    chunk_samples: usize,
    /// Processing task handle
    processing_task: Option<JoinHandle<()>>,
    /// Stop signal sender
    stop_signal: Option<oneshot::Sender<()>>,
    is_running: bool,
    chunks_sent: Arc<AtomicU64>,
}

impl<I: InputStream> CapturePipeline<I> {
    pub fn new(input: I, chunk_samples: usize) -> Self {
        info!(
            "Creating capture pipeline: {} Hz input, {} samples per chunk",
            input.sample_rate(),
            chunk_samples
        );

        Self {
            input,
            chunk_samples: chunk_samples.max(1),
            processing_task: None,
            stop_signal: None,
            is_running: false,
            chunks_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start capturing and streaming to `output`
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the pipeline is already running, the resampler cannot
    /// be built, or the microphone refuses to start.
    pub fn start(&mut self, output: mpsc::UnboundedSender<String>) -> AudioResult<()> {
        if self.is_running {
            return Err(AudioError::StreamBuildFailed(
                "Pipeline already running".to_string(),
            ));
        }

        info!("Starting capture pipeline");

        let resampler = AudioResampler::new(self.input.sample_rate(), INPUT_SAMPLE_RATE)?;
        let chunker = SampleChunker::new(self.chunk_samples);

        let (internal_tx, internal_rx) = mpsc::channel(100);
        let (stop_tx, stop_rx) = oneshot::channel();

        self.input.start(internal_tx)?;

        let chunks_sent = Arc::clone(&self.chunks_sent);
        let processing_task = tokio::spawn(processing_loop(
            internal_rx,
            output,
            stop_rx,
            resampler,
            chunker,
            chunks_sent,
        ));

        self.processing_task = Some(processing_task);
        self.stop_signal = Some(stop_tx);
        self.is_running = true;

        info!("Capture pipeline started");
        Ok(())
    }

    /// Stop capturing; no chunk is sent after this returns
    pub fn stop(&mut self) {
        if !self.is_running {
            return;
        }

        info!("Stopping capture pipeline");
        self.input.stop();

        if let Some(stop_tx) = self.stop_signal.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.processing_task.take() {
            task.abort();
        }

        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Chunks handed to the transport so far
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent.load(Ordering::Relaxed)
    }
}

impl<I: InputStream> Drop for CapturePipeline<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn processing_loop(
    mut input_rx: mpsc::Receiver<Vec<f32>>,
    output: mpsc::UnboundedSender<String>,
    mut stop_rx: oneshot::Receiver<()>,
    mut resampler: AudioResampler,
    mut chunker: SampleChunker,
    chunks_sent: Arc<AtomicU64>,
) {
    debug!(
        "Processing loop started: {} Hz -> {} Hz",
        resampler.input_rate(),
        resampler.output_rate()
    );

    loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => {
                info!("Stop signal received");
                break;
            }

            received = input_rx.recv() => {
                let Some(samples) = received else {
                    info!("Input channel closed");
                    break;
                };

                let resampled = match resampler.process(&samples) {
                    Ok(resampled) => resampled,
                    Err(e) => {
                        error!("Resampling error: {}", e);
                        continue;
                    }
                };

                chunker.push(&resampled);
                while let Some(chunk) = chunker.pop_chunk() {
                    let frame = AudioFrame::new(chunk, INPUT_SAMPLE_RATE);
                    if output.send(frame.to_base64()).is_err() {
                        debug!("Transport closed, dropping captured audio");
                        return;
                    }
                    chunks_sent.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    debug!("Processing loop finished");
}
