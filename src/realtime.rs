//! OpenAI Realtime API wire events, reduced to what the relay speaks.
//!
//! Client events are serialized onto the model socket; server events are
//! parsed off it. Both sides are discriminated by the `type` field. Event
//! types outside this set deserialize to `ServerEvent::Other` and are
//! ignored by the session.

use serde::{Deserialize, Serialize};

// ======================== Client events ========================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Declare session format, turn detection, voice, and instructions.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Insert a conversation item (the scripted opening turn).
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Ask the model to generate a response.
    #[serde(rename = "response.create")]
    ResponseCreate,

    /// Append base64 μ-law audio to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
    pub output_modalities: Vec<String>,
    pub audio: SessionAudio,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionAudio {
    pub input: SessionAudioInput,
    pub output: SessionAudioOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionAudioInput {
    pub format: AudioFormat,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionAudioOutput {
    pub format: AudioFormat,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

impl SessionConfig {
    /// Realtime session speaking telephony μ-law on both legs, with server
    /// voice-activity detection.
    pub fn realtime_pcmu(model: &str, voice: &str, instructions: String) -> Self {
        Self {
            kind: "realtime".to_string(),
            model: model.to_string(),
            output_modalities: vec!["audio".to_string()],
            audio: SessionAudio {
                input: SessionAudioInput {
                    format: AudioFormat {
                        kind: "audio/pcmu".to_string(),
                    },
                    turn_detection: TurnDetection {
                        kind: "server_vad".to_string(),
                    },
                },
                output: SessionAudioOutput {
                    format: AudioFormat {
                        kind: "audio/pcmu".to_string(),
                    },
                    voice: voice.to_string(),
                },
            },
            instructions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ConversationItem {
    /// A user text message item.
    pub fn user_text(text: String) -> Self {
        Self {
            kind: "message".to_string(),
            role: "user".to_string(),
            content: vec![ContentPart {
                kind: "input_text".to_string(),
                text,
            }],
        }
    }
}

// ======================== Server events ========================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A chunk of base64 μ-law output audio.
    #[serde(rename = "response.output_audio.delta")]
    AudioDelta { delta: String },

    /// Server VAD heard the caller start speaking.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// A response finished (status tells whether it completed or was cut).
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseInfo,
    },

    /// Acknowledgment of a session.update.
    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: serde_json::Value,
    },

    /// Any event type the relay does not act on.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audio_delta() {
        let raw = r#"{"type": "response.output_audio.delta", "event_id": "ev1", "delta": "base64bytes"}"#;
        match serde_json::from_str::<ServerEvent>(raw).unwrap() {
            ServerEvent::AudioDelta { delta } => assert_eq!(delta, "base64bytes"),
            other => panic!("expected delta, got {:?}", other),
        }
    }

    #[test]
    fn parses_speech_started_with_extra_fields() {
        let raw = r#"{"type": "input_audio_buffer.speech_started", "event_id": "ev2", "audio_start_ms": 120}"#;
        assert!(matches!(
            serde_json::from_str::<ServerEvent>(raw).unwrap(),
            ServerEvent::SpeechStarted
        ));
    }

    #[test]
    fn parses_response_done_status() {
        let raw = r#"{"type": "response.done", "response": {"id": "resp1", "status": "completed"}}"#;
        match serde_json::from_str::<ServerEvent>(raw).unwrap() {
            ServerEvent::ResponseDone { response } => {
                assert_eq!(response.status.as_deref(), Some("completed"))
            }
            other => panic!("expected response.done, got {:?}", other),
        }
    }

    #[test]
    fn unknown_server_event_becomes_other() {
        let raw = r#"{"type": "rate_limits.updated", "rate_limits": []}"#;
        assert!(matches!(
            serde_json::from_str::<ServerEvent>(raw).unwrap(),
            ServerEvent::Other
        ));
    }

    #[test]
    fn session_update_wire_shape() {
        let ev = ClientEvent::SessionUpdate {
            session: SessionConfig::realtime_pcmu("gpt-realtime", "alloy", "talk".to_string()),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["type"], "realtime");
        assert_eq!(json["session"]["model"], "gpt-realtime");
        assert_eq!(json["session"]["output_modalities"][0], "audio");
        assert_eq!(json["session"]["audio"]["input"]["format"]["type"], "audio/pcmu");
        assert_eq!(
            json["session"]["audio"]["input"]["turn_detection"]["type"],
            "server_vad"
        );
        assert_eq!(json["session"]["audio"]["output"]["voice"], "alloy");
        assert_eq!(json["session"]["instructions"], "talk");
    }

    #[test]
    fn append_and_response_create_wire_shapes() {
        let append = ClientEvent::InputAudioBufferAppend {
            audio: "//8=".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&append).unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], "//8=");

        let json: serde_json::Value = serde_json::to_value(&ClientEvent::ResponseCreate).unwrap();
        assert_eq!(json["type"], "response.create");

        let item = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text("hello".to_string()),
        };
        let json: serde_json::Value = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item"]["type"], "message");
        assert_eq!(json["item"]["role"], "user");
        assert_eq!(json["item"]["content"][0]["type"], "input_text");
        assert_eq!(json["item"]["content"][0]["text"], "hello");
    }
}
