//! Integration tests for the Live API wire messages
//!
//! Uses JSON shaped like real service traffic to check field naming and
//! the extraction helpers the receiver task depends on.

use dailyflow_voice::network::messages::*;
use dailyflow_voice::network::{LiveConfig, NetworkError};
use serde_json::{json, Value};

#[test]
fn test_setup_message_wire_format() {
    println!("\n=== Setup Message Test ===");

    let setup = LiveConfig::new().with_model("gemini-test").with_voice("Puck").setup_message();
    let value: Value = serde_json::to_value(&setup).unwrap();
    println!("{}", value);

    assert_eq!(
        value,
        json!({
            "setup": {
                "model": "models/gemini-test",
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {
                        "voiceConfig": {
                            "prebuiltVoiceConfig": { "voiceName": "Puck" }
                        }
                    }
                }
            }
        })
    );
}

#[test]
fn test_setup_without_voice_omits_speech_config() {
    let mut config = LiveConfig::new();
    config.voice_name = None;

    let value = serde_json::to_value(config.setup_message()).unwrap();
    assert!(value["setup"]["generationConfig"].get("speechConfig").is_none());
}

#[test]
fn test_realtime_input_wire_format() {
    let message = ClientMessage::audio("AAAA");
    let value = serde_json::to_value(&message).unwrap();

    assert_eq!(
        value,
        json!({
            "realtimeInput": {
                "mediaChunks": [
                    { "mimeType": "audio/pcm;rate=16000", "data": "AAAA" }
                ]
            }
        })
    );
}

#[test]
fn test_client_message_round_trip() {
    let message = ClientMessage::audio("dGVzdA==");
    let json = serde_json::to_string(&message).unwrap();
    let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, message);
}

#[test]
fn test_parse_setup_complete() {
    let message = ServerMessage::parse(r#"{"setupComplete": {}}"#).unwrap();

    assert!(message.is_setup_complete());
    assert!(!message.is_interrupted());
    assert_eq!(message.audio_payloads().count(), 0);
}

#[test]
fn test_parse_model_turn_with_several_parts() {
    let json = r#"{
        "serverContent": {
            "modelTurn": {
                "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AQID" } },
                    { "text": "thinking" },
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "BAUG" } },
                    { "inlineData": { "mimeType": "image/png", "data": "iVBO" } }
                ]
            }
        }
    }"#;

    let message = ServerMessage::parse(json).unwrap();
    let payloads: Vec<&str> = message.audio_payloads().collect();

    assert_eq!(payloads, vec!["AQID", "BAUG"]);
    assert!(!message.is_turn_complete());
}

#[test]
fn test_inline_data_without_mime_type_is_audio() {
    let json = r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"data":"AAAA"}}]}}}"#;
    let message = ServerMessage::parse(json).unwrap();

    assert_eq!(message.audio_payloads().collect::<Vec<_>>(), vec!["AAAA"]);
}

#[test]
fn test_parse_interrupted_and_turn_complete() {
    let interrupted = ServerMessage::parse(r#"{"serverContent":{"interrupted":true}}"#).unwrap();
    assert!(interrupted.is_interrupted());
    assert!(!interrupted.is_turn_complete());

    let complete = ServerMessage::parse(r#"{"serverContent":{"turnComplete":true}}"#).unwrap();
    assert!(complete.is_turn_complete());
    assert!(!complete.is_interrupted());
}

#[test]
fn test_parse_go_away() {
    let message = ServerMessage::parse(r#"{"goAway":{"timeLeft":"10s"}}"#).unwrap();
    assert_eq!(
        message.go_away.and_then(|g| g.time_left).as_deref(),
        Some("10s")
    );
}

#[test]
fn test_unknown_fields_are_ignored() {
    let json = r#"{
        "usageMetadata": { "totalTokenCount": 42 },
        "serverContent": { "generationComplete": true, "turnComplete": true }
    }"#;

    let message = ServerMessage::parse(json).unwrap();
    assert!(message.is_turn_complete());
}

#[test]
fn test_invalid_json_is_serialization_error() {
    let err = ServerMessage::parse("{not json").unwrap_err();
    assert!(matches!(err, NetworkError::SerializationError(_)));
}

#[test]
fn test_blob_helpers() {
    let blob = Blob::pcm16("AAAA");
    assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
    assert!(blob.is_audio());

    let image = Blob {
        mime_type: "image/jpeg".to_string(),
        data: String::new(),
    };
    assert!(!image.is_audio());
}
