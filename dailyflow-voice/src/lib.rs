//! DailyFlow live voice assistant core
//!
//! Streams microphone audio to the Gemini Live API and plays the spoken
//! replies back without gaps, with barge-in support.
//!
//! The usual entry point is [`session::VoiceAssistant`].

/// Audio capture, codec and output
pub mod audio;

/// Live API transport
pub mod network;

/// Scheduled speech playback
pub mod playback;

/// Voice session lifecycle
pub mod session;

/// Session state machine and configuration
pub mod state;

/// Utility modules
pub mod utils;
