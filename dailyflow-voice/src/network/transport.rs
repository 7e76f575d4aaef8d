//! Live transport seam
//!
//! The session controller talks to the service only through
//! [`LiveConnector`] and [`LiveLink`], and hears back through [`LiveEvent`]s.

use crate::network::connection::{LiveConfig, LiveConnection};
use crate::network::error::{NetworkError, NetworkResult};
use crate::network::tasks::{receiver_task, sender_task};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the transport reports to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// The server acknowledged setup; the session is live
    Opened,
    /// One base64 PCM16 chunk of model speech
    Audio(String),
    /// The user interrupted the model
    Interrupted,
    /// The model finished its turn
    TurnComplete,
    /// The server will disconnect soon (time left, if given)
    GoAway(Option<String>),
    /// The connection ended cleanly (close reason, if any)
    Closed(Option<String>),
    /// The connection failed
    Error(String),
}

/// An open connection to the service
pub trait LiveLink {
    /// A handle the capture pipeline pushes encoded chunks into
    fn audio_sender(&self) -> mpsc::UnboundedSender<String>;

    /// Queue one encoded chunk
    ///
    /// # Errors
    /// `NetworkError::ConnectionClosed` once the link is closed; the chunk is dropped.
    fn send_audio(&self, payload: String) -> NetworkResult<()>;

    /// Close the connection; no events are delivered afterwards
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Opens links to the service
pub trait LiveConnector {
    type Link: LiveLink;

    /// Connect and send setup
    ///
    /// Resolves once the connection is established. The server's
    /// acknowledgment arrives later as `LiveEvent::Opened` on `events`.
    fn connect(
        &self,
        events: mpsc::UnboundedSender<LiveEvent>,
    ) -> impl Future<Output = NetworkResult<Self::Link>>;
}

/// Connects to the Gemini Live API
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    api_key: String,
    config: LiveConfig,
}

impl GeminiConnector {
    pub fn new(api_key: impl Into<String>, config: LiveConfig) -> Self {
        Self {
            api_key: api_key.into(),
            config,
        }
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }
}

impl LiveConnector for GeminiConnector {
    type Link = GeminiLink;

    async fn connect(&self, events: mpsc::UnboundedSender<LiveEvent>) -> NetworkResult<GeminiLink> {
        let mut connection = LiveConnection::connect(&self.api_key, &self.config).await?;
        connection.send(&self.config.setup_message()).await?;
        debug!("Setup sent for {}", self.config.model_path());

        let (writer, reader) = connection.split();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let open = Arc::new(AtomicBool::new(true));

        let sender_events = events.clone();
        let sender_open = Arc::clone(&open);
        let sender = tokio::spawn(async move {
            if let Err(e) = sender_task(writer, audio_rx, close_rx, sender_events).await {
                warn!("Sender task failed: {}", e);
                sender_open.store(false, Ordering::Release);
            }
        });

        let receiver_open = Arc::clone(&open);
        let receiver = tokio::spawn(async move {
            if let Err(e) = receiver_task(reader, events).await {
                warn!("Receiver task failed: {}", e);
            }
            receiver_open.store(false, Ordering::Release);
        });

        Ok(GeminiLink {
            audio_tx,
            close_tx: Some(close_tx),
            open,
            sender: Some(sender),
            receiver: Some(receiver),
        })
    }
}

/// A live Gemini session backed by two tasks
pub struct GeminiLink {
    audio_tx: mpsc::UnboundedSender<String>,
    close_tx: Option<oneshot::Sender<()>>,
    open: Arc<AtomicBool>,
    sender: Option<JoinHandle<()>>,
    receiver: Option<JoinHandle<()>>,
}

impl LiveLink for GeminiLink {
    fn audio_sender(&self) -> mpsc::UnboundedSender<String> {
        self.audio_tx.clone()
    }

    fn send_audio(&self, payload: String) -> NetworkResult<()> {
        if !self.is_open() {
            return Err(NetworkError::ConnectionClosed);
        }
        self.audio_tx
            .send(payload)
            .map_err(|_| NetworkError::ConnectionClosed)
    }

    fn close(&mut self) {
        let was_open = self.open.swap(false, Ordering::AcqRel);

        // Stop event delivery first, then let the sender flush a close frame
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        self.sender.take();

        if was_open {
            info!("Live link closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.audio_tx.is_closed()
    }
}

impl Drop for GeminiLink {
    fn drop(&mut self) {
        self.close();
    }
}
