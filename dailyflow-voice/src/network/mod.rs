//! Network communication and WebSocket handling
//!
//! This module provides types and utilities for talking to the Gemini Live
//! API over a bidirectional WebSocket.

/// WebSocket connection management
pub mod connection;

/// Network error types
pub mod error;

/// WebSocket message type definitions
pub mod messages;

/// Async tasks for concurrent send/receive operations
pub mod tasks;

/// Connector/link seam used by the session controller
pub mod transport;

// Re-export commonly used types
pub use connection::{LiveConfig, LiveConnection, WsReader, WsWriter};
pub use error::{NetworkError, NetworkResult};
pub use messages::{ClientMessage, ServerMessage};
pub use transport::{GeminiConnector, GeminiLink, LiveConnector, LiveEvent, LiveLink};
