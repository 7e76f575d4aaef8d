//! Session lifecycle controller
//!
//! Owns one voice session at a time: the microphone, the speaker, the live
//! link and the playback schedule. Everything that happens to a session
//! arrives as a [`SessionMessage`] and is handled to completion before the
//! next one is looked at.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audio::backend::AudioBackend;
use crate::audio::pipeline::CapturePipeline;
use crate::network::error::NetworkError;
use crate::network::transport::{LiveConnector, LiveEvent, LiveLink};
use crate::playback::{HandleId, PlaybackError, PlaybackScheduler};
use crate::state::{SessionState, StateManager, StateTransitionContext};

use super::assistant::SessionCommand;
use super::{SessionConfig, SessionError, SessionResult};

/// Something the controller has to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    /// An event from the live link
    Live(LiveEvent),
    /// The speaker finished a scheduled chunk
    PlaybackEnded(HandleId),
    /// The server did not acknowledge setup in time
    ConnectTimeout,
}

/// Resources held while a session is open
struct ActiveSession<B: AudioBackend, C: LiveConnector> {
    link: C::Link,
    events: mpsc::UnboundedReceiver<LiveEvent>,
    completions: mpsc::UnboundedReceiver<HandleId>,
    /// Opened during `open()`, moved into the pipeline on acknowledgment
    microphone: Option<B::Input>,
    capture: Option<CapturePipeline<B::Input>>,
    scheduler: PlaybackScheduler<B::Output>,
    /// Cleared once the server acknowledges setup
    deadline: Option<Instant>,
}

impl<B: AudioBackend, C: LiveConnector> ActiveSession<B, C> {
    /// Stop capture, silence playback and close the link
    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.microphone.take();

        let cancelled = self.scheduler.active_count();
        self.scheduler.reset();
        self.link.close();

        debug!(cancelled, "Session resources released");
    }
}

/// Drives the session state machine
///
/// Audio devices come from an [`AudioBackend`] and the service connection
/// from a [`LiveConnector`], so both can be replaced in tests.
pub struct SessionController<B: AudioBackend, C: LiveConnector> {
    backend: B,
    connector: C,
    config: SessionConfig,
    context: StateTransitionContext,
    active: Option<ActiveSession<B, C>>,
}

impl<B: AudioBackend, C: LiveConnector> SessionController<B, C> {
    pub fn new(
        backend: B,
        connector: C,
        config: SessionConfig,
        state_manager: Arc<StateManager>,
    ) -> Self {
        Self {
            backend,
            connector,
            config,
            context: StateTransitionContext::new(state_manager),
            active: None,
        }
    }

    /// Open a new session
    ///
    /// Tears down any session that is still open, then acquires the
    /// microphone and speaker and connects. Returns once the connection is
    /// up; the session becomes `Connected` when the server acknowledges
    /// setup.
    ///
    /// # Errors
    /// * `SessionError::PermissionDenied` if the microphone cannot be used
    /// * `SessionError::Audio` if the speaker cannot be opened
    /// * `SessionError::Transport` if the connection fails or times out
    ///
    /// Every error leaves the state at `Error` with all devices released.
    pub async fn open(&mut self) -> SessionResult<()> {
        self.open_or_cancel(std::future::pending()).await
    }

    /// Open a new session, abandoning the handshake if `cancel` resolves first
    ///
    /// A cancelled open releases both devices, leaves the state at `Idle`
    /// and returns `SessionError::Cancelled`.
    pub async fn open_or_cancel<F>(&mut self, cancel: F) -> SessionResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.active.is_some() {
            info!("Closing previous session before reopening");
            self.teardown();
        }

        let current = self.context.current();
        if !(current.is_idle() || current.is_error()) {
            self.context.complete();
        }

        self.context.begin_connecting()?;
        let deadline = self.config.connect_timeout.map(|timeout| Instant::now() + timeout);

        info!("Opening voice session");

        let microphone = match self.backend.open_input() {
            Ok(microphone) => microphone,
            Err(e) => return Err(self.fail(SessionError::from_microphone(e))),
        };

        let (ended_tx, completions) = mpsc::unbounded_channel();
        let output = match self.backend.open_output(ended_tx) {
            Ok(output) => output,
            Err(e) => return Err(self.fail(SessionError::Audio(e))),
        };
        let scheduler = PlaybackScheduler::new(
            output,
            self.config.output_sample_rate,
            self.config.output_channels,
        );

        let (events_tx, events) = mpsc::unbounded_channel();
        let timeout_ms = self.config.connect_timeout_ms();
        let connect = self.connector.connect(events_tx);
        let connect = async move {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, connect)
                    .await
                    .unwrap_or_else(|_| Err(NetworkError::Timeout(timeout_ms))),
                None => connect.await,
            }
        };

        let connected = tokio::select! {
            connected = connect => Some(connected),
            () = cancel => None,
        };

        let link = match connected {
            Some(Ok(link)) => link,
            Some(Err(e)) => {
                drop(scheduler);
                drop(microphone);
                return Err(self.fail(SessionError::Transport(e)));
            }
            None => {
                drop(scheduler);
                drop(microphone);
                info!("Open cancelled before the connection was established");
                self.context.complete();
                return Err(SessionError::Cancelled);
            }
        };

        self.active = Some(ActiveSession {
            link,
            events,
            completions,
            microphone: Some(microphone),
            capture: None,
            scheduler,
            deadline,
        });

        info!("Connection established, waiting for setup acknowledgment");
        Ok(())
    }

    /// Close the session
    ///
    /// Valid from any state and idempotent; always ends in `Idle`.
    pub fn close(&mut self) {
        if self.active.is_some() {
            info!("Closing voice session");
        }
        self.teardown();
        self.context.complete();
    }

    /// Wait for the next thing the open session has to react to
    ///
    /// Never resolves while no session is open.
    pub async fn next_message(&mut self) -> SessionMessage {
        let Some(active) = self.active.as_mut() else {
            return std::future::pending().await;
        };

        let deadline = active.deadline;
        tokio::select! {
            event = active.events.recv() => {
                SessionMessage::Live(event.unwrap_or(LiveEvent::Closed(None)))
            }
            Some(id) = active.completions.recv() => SessionMessage::PlaybackEnded(id),
            _ = wait_until(deadline) => SessionMessage::ConnectTimeout,
        }
    }

    pub fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Live(event) => self.handle_live_event(event),
            SessionMessage::PlaybackEnded(id) => self.handle_playback_ended(id),
            SessionMessage::ConnectTimeout => self.handle_connect_timeout(),
        }
    }

    /// Serve commands until shutdown, interleaving session messages
    ///
    /// Commands keep being read while a connection is pending; any command
    /// that arrives then cancels the pending open and is served next.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!("Voice session loop started");

        let mut deferred: Option<Option<SessionCommand>> = None;
        loop {
            let command = match deferred.take() {
                Some(command) => command,
                None => tokio::select! {
                    command = commands.recv() => command,
                    message = self.next_message() => {
                        self.handle_message(message);
                        continue;
                    }
                },
            };

            match command {
                Some(SessionCommand::Open { reply }) => {
                    let mut interrupting = None;
                    let result = self
                        .open_or_cancel(async {
                            interrupting = Some(commands.recv().await);
                        })
                        .await;
                    let _ = reply.send(result);
                    deferred = interrupting;
                }
                Some(SessionCommand::Close) => self.close(),
                Some(SessionCommand::Shutdown) | None => {
                    self.close();
                    break;
                }
            }
        }

        info!("Voice session loop stopped");
    }

    pub fn handle_live_event(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Opened => self.handle_opened(),
            LiveEvent::Audio(payload) => self.handle_audio(&payload),
            LiveEvent::Interrupted => self.handle_interrupted(),
            LiveEvent::TurnComplete => debug!("Model turn complete"),
            LiveEvent::GoAway(time_left) => {
                warn!(time_left = ?time_left, "Server is going away");
            }
            LiveEvent::Closed(reason) => {
                info!(reason = ?reason, "Live session closed by server");
                self.teardown();
                self.context.complete();
            }
            LiveEvent::Error(message) => {
                self.fail(SessionError::Transport(NetworkError::ServerError(message)));
            }
        }
    }

    fn handle_opened(&mut self) {
        if !self.context.current().is_connecting() {
            debug!("Ignoring setup acknowledgment outside of Connecting");
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(microphone) = active.microphone.take() else {
            return;
        };
        active.deadline = None;

        if let Err(e) = self.context.mark_connected() {
            self.fail(SessionError::State(e));
            return;
        }

        let mut capture = CapturePipeline::new(microphone, self.config.capture_chunk_samples);
        match capture.start(active.link.audio_sender()) {
            Ok(()) => {
                active.capture = Some(capture);
                info!("Session connected, microphone streaming");
            }
            Err(e) => {
                drop(capture);
                self.fail(SessionError::from_microphone(e));
            }
        }
    }

    fn handle_audio(&mut self, payload: &str) {
        if !self.context.current().is_connected() {
            debug!("Dropping audio received outside of a connected session");
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };

        match active.scheduler.enqueue_payload(payload) {
            Ok(_) => {
                self.context.set_speaking(true);
            }
            Err(PlaybackError::Decode(e)) => warn!("Dropping malformed audio chunk: {}", e),
            Err(PlaybackError::EmptyChunk) => debug!("Ignoring empty audio chunk"),
            Err(e) => warn!("Failed to schedule audio chunk: {}", e),
        }
    }

    fn handle_interrupted(&mut self) {
        if let Some(active) = self.active.as_mut() {
            let stopped = active.scheduler.interrupt();
            debug!(stopped, "Barge-in flushed playback");
        }
        self.context.set_speaking(false);
    }

    fn handle_playback_ended(&mut self, id: HandleId) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.scheduler.complete(id) {
            debug!("Playback idle");
            self.context.set_speaking(false);
        }
    }

    fn handle_connect_timeout(&mut self) {
        if !self.context.current().is_connecting() {
            return;
        }
        let timeout_ms = self.config.connect_timeout_ms();
        self.fail(SessionError::Transport(NetworkError::Timeout(timeout_ms)));
    }

    /// Release everything and enter `Error`
    fn fail(&mut self, err: SessionError) -> SessionError {
        error!(error = %err, "Voice session failed");
        self.teardown();
        self.context.report_error(err.to_string());
        err
    }

    fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.release();
        }
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.context.current()
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        self.context.state_manager()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether devices and a link are currently held
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether microphone audio is streaming
    pub fn is_capturing(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|active| active.capture.as_ref())
            .is_some_and(|capture| capture.is_running())
    }

    pub fn scheduler(&self) -> Option<&PlaybackScheduler<B::Output>> {
        self.active.as_ref().map(|active| &active.scheduler)
    }

    pub fn link(&self) -> Option<&C::Link> {
        self.active.as_ref().map(|active| &active.link)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
