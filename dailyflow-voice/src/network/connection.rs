//! WebSocket connection to the Gemini Live API
//!
//! This module provides the bidirectional streaming client used for voice
//! conversations.

use crate::audio::codec::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use crate::network::error::{NetworkError, NetworkResult};
use crate::network::messages::{
    ClientMessage, GenerationConfig, Modality, ServerMessage, SetupMessage, SpeechConfig,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, StatusCode},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the WebSocket stream
pub type WsWriter = SplitSink<WsStream, Message>;

/// Read half of the WebSocket stream
pub type WsReader = SplitStream<WsStream>;

/// Bidirectional streaming endpoint of the Live API
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Native-audio model used for voice conversations
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Prebuilt voice used for replies
pub const DEFAULT_VOICE: &str = "Zephyr";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for a Live API session
///
/// # Example
/// ```no_run
/// use dailyflow_voice::network::LiveConfig;
///
/// let config = LiveConfig::new()
///     .with_voice("Puck")
///     .with_timeout(5000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// WebSocket endpoint
    pub endpoint: String,

    /// Model name, with or without the `models/` prefix
    pub model: String,

    /// Prebuilt voice; `None` lets the service choose
    pub voice_name: Option<String>,

    /// Rate of outbound microphone audio in Hz
    pub input_sample_rate: u32,

    /// Rate of inbound speech in Hz
    pub output_sample_rate: u32,

    /// WebSocket handshake timeout in milliseconds
    pub timeout_ms: u64,
}

impl LiveConfig {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice_name: Some(DEFAULT_VOICE.to_string()),
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            timeout_ms: 10000, // 10 seconds default
        }
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the prebuilt voice
    pub fn with_voice(mut self, voice_name: impl Into<String>) -> Self {
        self.voice_name = Some(voice_name.into());
        self
    }

    /// Point at a different server (tests, proxies)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set handshake timeout in milliseconds
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Validate and return the WebSocket URL
    pub fn build_url(&self) -> NetworkResult<String> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("wss://") || endpoint.starts_with("ws://")) {
            return Err(NetworkError::InvalidConfig(format!(
                "Endpoint must be a ws:// or wss:// URL: {}",
                endpoint
            )));
        }
        Ok(endpoint.to_string())
    }

    /// Model name in the `models/...` form the service expects
    pub fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// The first message sent on a new connection
    pub fn setup_message(&self) -> ClientMessage {
        ClientMessage::Setup(SetupMessage {
            model: self.model_path(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
                speech_config: self.voice_name.as_deref().map(SpeechConfig::prebuilt),
            },
        })
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket connection to the Live API
///
/// Manages the WebSocket connection lifecycle and provides methods for
/// sending and receiving messages.
#[derive(Debug)]
pub struct LiveConnection {
    /// WebSocket stream
    ws_stream: WsStream,

    /// Whether the connection is open
    is_open: bool,
}

impl LiveConnection {
    /// Connect to the Live API
    ///
    /// Establishes the WebSocket with the API key in the request headers.
    /// The `setup` message is not sent here.
    ///
    /// # Errors
    /// * `NetworkError::MissingApiKey` for an empty key
    /// * `NetworkError::Timeout` if the handshake exceeds `timeout_ms`
    /// * `NetworkError::AuthenticationFailed` on HTTP 401/403
    pub async fn connect(api_key: &str, config: &LiveConfig) -> NetworkResult<Self> {
        if api_key.trim().is_empty() {
            return Err(NetworkError::MissingApiKey);
        }

        info!("Connecting to Gemini Live API");

        let url = config.build_url()?;
        debug!("Connection URL: {}", url);

        let mut request = url.as_str().into_client_request()?;
        let key = HeaderValue::from_str(api_key.trim())
            .map_err(|e| NetworkError::InvalidConfig(format!("Invalid API key: {}", e)))?;
        request.headers_mut().insert(API_KEY_HEADER, key);

        let timeout = tokio::time::Duration::from_millis(config.timeout_ms);

        let (ws_stream, response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| NetworkError::Timeout(config.timeout_ms))?
            .map_err(|e| {
                if let tokio_tungstenite::tungstenite::Error::Http(resp) = &e {
                    if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                        return NetworkError::AuthenticationFailed;
                    }
                }
                NetworkError::ConnectionFailed(e.to_string())
            })?;

        info!("Connected to Gemini Live API (status: {})", response.status());

        Ok(Self {
            ws_stream,
            is_open: true,
        })
    }

    /// Serialize a message to JSON and send it as a text frame
    pub async fn send<T: Serialize>(&mut self, message: &T) -> NetworkResult<()> {
        if !self.is_open {
            return Err(NetworkError::ConnectionClosed);
        }

        let json = serde_json::to_string(message)?;
        debug!("Sending message: {} bytes", json.len());

        self.ws_stream.send(Message::Text(json.into())).await?;

        Ok(())
    }

    /// Receive the next server message
    ///
    /// The service delivers JSON in both text and binary frames.
    ///
    /// # Returns
    /// * `Ok(Some(message))` - A message was received
    /// * `Ok(None)` - Connection closed gracefully
    /// * `Err(error)` - An error occurred
    pub async fn recv(&mut self) -> NetworkResult<Option<ServerMessage>> {
        while self.is_open {
            match self.ws_stream.next().await {
                Some(Ok(Message::Text(text))) => return ServerMessage::parse(&text).map(Some),
                Some(Ok(Message::Binary(data))) => {
                    let message = serde_json::from_slice(&data)?;
                    return Ok(Some(message));
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Received close frame: {:?}", frame);
                    self.is_open = false;
                }
                Some(Ok(Message::Ping(data))) => {
                    debug!("Received ping, sending pong");
                    self.ws_stream.send(Message::Pong(data)).await?;
                }
                Some(Ok(msg)) => {
                    debug!("Ignoring control frame: {:?}", msg);
                }
                Some(Err(e)) => {
                    self.is_open = false;
                    return Err(NetworkError::WebSocketError(e));
                }
                None => {
                    info!("WebSocket stream ended");
                    self.is_open = false;
                }
            }
        }

        Ok(None)
    }

    /// Close the WebSocket connection
    pub async fn close(&mut self) -> NetworkResult<()> {
        if !self.is_open {
            return Ok(());
        }

        info!("Closing WebSocket connection");
        if let Err(e) = self.ws_stream.close(None).await {
            warn!("Error while closing WebSocket: {}", e);
        }
        self.is_open = false;

        Ok(())
    }

    /// Check if the connection is open
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Split the connection into separate write and read halves
    pub fn split(self) -> (WsWriter, WsReader) {
        self.ws_stream.split()
    }
}
