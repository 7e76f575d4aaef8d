//! Voice assistant handle
//!
//! cpal streams cannot leave the thread that built them, so the controller
//! lives on a dedicated thread with its own single-threaded runtime. The
//! handle talks to it over a command channel.

use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::audio::backend::{AudioBackend, CpalBackend};
use crate::network::connection::LiveConfig;
use crate::network::transport::{GeminiConnector, LiveConnector};
use crate::state::config::AppConfig;
use crate::state::{SessionState, StateManager};

use super::controller::SessionController;
use super::{SessionConfig, SessionError, SessionResult};

/// Commands accepted by the session thread
#[derive(Debug)]
pub enum SessionCommand {
    /// Open a session; the outcome is sent back on `reply`
    Open {
        reply: oneshot::Sender<SessionResult<()>>,
    },
    /// Close the current session, if any
    Close,
    /// Close and stop the session thread
    Shutdown,
}

/// Handle to a voice assistant running on its own thread
///
/// Dropping the handle closes any open session and joins the thread.
pub struct VoiceAssistant {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state_manager: Arc<StateManager>,
    thread: Option<thread::JoinHandle<()>>,
}

impl VoiceAssistant {
    /// Start the session thread
    ///
    /// # Errors
    /// `SessionError::Runtime` if the runtime or the thread cannot be created.
    pub fn spawn<B, C>(backend: B, connector: C, config: SessionConfig) -> SessionResult<Self>
    where
        B: AudioBackend + Send + 'static,
        C: LiveConnector + Send + 'static,
    {
        let state_manager = Arc::new(StateManager::new());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread_state = Arc::clone(&state_manager);
        let thread = thread::Builder::new()
            .name("voice-session".to_string())
            .spawn(move || {
                let controller = SessionController::new(backend, connector, config, thread_state);
                runtime.block_on(controller.run(command_rx));
                debug!("Voice session thread finished");
            })?;

        info!("Voice assistant started");

        Ok(Self {
            commands,
            state_manager,
            thread: Some(thread),
        })
    }

    /// Start an assistant on the configured devices and the Gemini Live API
    pub fn from_config(config: &AppConfig) -> SessionResult<Self> {
        let session = SessionConfig::from_app_config(config);
        let live: LiveConfig = config.api.live_config(config.session.connect_timeout_ms);
        let connector = GeminiConnector::new(config.api.resolved_api_key(), live);
        let backend = CpalBackend::from_config(&config.audio);

        Self::spawn(backend, connector, session)
    }

    /// Open a session
    ///
    /// Resolves once the connection is established (or has failed). The
    /// state becomes `Connected` when the server acknowledges setup; watch
    /// [`subscribe`](Self::subscribe) for that.
    pub async fn open(&self) -> SessionResult<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Open { reply })?;
        reply_rx.await.map_err(|_| SessionError::Shutdown)?
    }

    /// Close the current session
    pub fn close(&self) -> SessionResult<()> {
        self.send(SessionCommand::Close)
    }

    /// Current session state
    pub fn state(&self) -> Arc<SessionState> {
        self.state_manager.current()
    }

    /// Receive every subsequent state change
    pub fn subscribe(&self) -> mpsc::Receiver<SessionState> {
        self.state_manager.subscribe()
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    /// Close any session and wait for the session thread to exit
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn send(&self, command: SessionCommand) -> SessionResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Shutdown)
    }

    fn stop_thread(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        let _ = self.commands.send(SessionCommand::Shutdown);
        if thread.join().is_err() {
            warn!("Voice session thread panicked");
        }
        info!("Voice assistant stopped");
    }
}

impl Drop for VoiceAssistant {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
