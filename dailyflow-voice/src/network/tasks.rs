//! Async tasks for sending and receiving WebSocket messages
//!
//! The sender task streams microphone chunks to the server; the receiver
//! task turns server frames into [`LiveEvent`]s for the session controller.

use crate::network::connection::{WsReader, WsWriter};
use crate::network::error::{NetworkError, NetworkResult};
use crate::network::messages::{ClientMessage, ServerMessage};
use crate::network::transport::LiveEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Translate one server message into session events
///
/// Order matters: the open acknowledgment comes first, then every audio
/// part of the model turn, then `Interrupted`, so audio carried alongside an
/// interruption is scheduled before the flush.
pub fn server_events(message: &ServerMessage) -> Vec<LiveEvent> {
    let mut events = Vec::new();

    if message.is_setup_complete() {
        events.push(LiveEvent::Opened);
    }

    events.extend(
        message
            .audio_payloads()
            .map(|payload| LiveEvent::Audio(payload.to_string())),
    );

    if message.is_interrupted() {
        events.push(LiveEvent::Interrupted);
    }
    if message.is_turn_complete() {
        events.push(LiveEvent::TurnComplete);
    }
    if let Some(go_away) = &message.go_away {
        events.push(LiveEvent::GoAway(go_away.time_left.clone()));
    }

    events
}

/// Sender task that streams audio chunks over the WebSocket
///
/// Runs until the close signal fires or every audio sender is dropped, then
/// sends a close frame. A failed write is fatal for the session and is
/// reported on `events` as `LiveEvent::Error`.
///
/// # Arguments
/// * `ws_writer` - The write half of the WebSocket stream
/// * `audio_rx` - Receiver for base64 PCM16 chunks
/// * `close_rx` - Fires when the session closes the link
/// * `events` - Where a send failure is reported
pub async fn sender_task(
    mut ws_writer: WsWriter,
    mut audio_rx: mpsc::UnboundedReceiver<String>,
    mut close_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<LiveEvent>,
) -> NetworkResult<()> {
    info!("Sender task started");

    let mut chunk_count = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = &mut close_rx => {
                debug!("Close requested");
                break;
            }

            chunk = audio_rx.recv() => {
                let Some(audio_base64) = chunk else {
                    debug!("Audio channel closed");
                    break;
                };

                chunk_count += 1;
                let json = serde_json::to_string(&ClientMessage::audio(audio_base64))?;

                if let Err(e) = ws_writer.send(Message::Text(json.into())).await {
                    error!("Failed to send audio chunk #{}: {}", chunk_count, e);
                    let _ = events.send(LiveEvent::Error(format!("Send failed: {}", e)));
                    return Err(NetworkError::WebSocketError(e));
                }

                debug!("Audio chunk #{} sent", chunk_count);
            }
        }
    }

    info!("Sender task completed: {} chunks sent", chunk_count);

    if let Err(e) = ws_writer.close().await {
        warn!("Failed to close WebSocket writer: {}", e);
    }

    Ok(())
}

/// Receiver task that reads server frames and forwards session events
///
/// Malformed frames are logged and skipped. The task always finishes by
/// emitting either `Closed` (clean end) or `Error` (transport failure),
/// unless the event receiver has already gone away.
pub async fn receiver_task(
    mut ws_reader: WsReader,
    events: mpsc::UnboundedSender<LiveEvent>,
) -> NetworkResult<()> {
    info!("Receiver task started");

    let mut message_count = 0u64;

    while let Some(frame) = ws_reader.next().await {
        let parsed = match frame {
            Ok(Message::Text(text)) => ServerMessage::parse(&text),
            Ok(Message::Binary(data)) => {
                serde_json::from_slice::<ServerMessage>(&data).map_err(NetworkError::from)
            }
            Ok(Message::Close(frame)) => {
                info!("Received close frame: {:?}", frame);
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|reason| !reason.is_empty());
                let _ = events.send(LiveEvent::Closed(reason));
                return Ok(());
            }
            Ok(Message::Ping(data)) => {
                debug!("Received ping, length: {} bytes", data.len());
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                error!("WebSocket error: {}", e);
                let _ = events.send(LiveEvent::Error(e.to_string()));
                return Err(NetworkError::WebSocketError(e));
            }
        };

        let message = match parsed {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping malformed server message: {}", e);
                continue;
            }
        };

        message_count += 1;
        for event in server_events(&message) {
            if events.send(event).is_err() {
                debug!("Event receiver dropped, stopping receiver task");
                return Ok(());
            }
        }
    }

    info!(
        "Receiver task completed: {} messages received, stream ended",
        message_count
    );
    let _ = events.send(LiveEvent::Closed(None));

    Ok(())
}
