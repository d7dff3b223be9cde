//! Twilio Media Streams wire events.
//!
//! One JSON object per WebSocket text frame, discriminated by the `event`
//! field. The same union is used in both directions; audio payloads stay
//! base64-encoded μ-law end to end.

use serde::{Deserialize, Deserializer, Serialize};

/// A media-stream event, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Stream start: carries the identifiers the rest of the call needs.
    Start {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        start: StartInfo,
    },
    /// One 20ms frame of base64 μ-law audio.
    Media {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    /// Playback checkpoint marker.
    Mark {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        mark: MarkInfo,
    },
    /// Flush the receiver's buffered audio.
    Clear {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
    },
    /// Stream is over.
    Stop {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInfo {
    pub stream_sid: String,
    /// Absent when a simulator connects; a real call always carries it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_format: Option<MediaFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded μ-law frame, forwarded verbatim.
    pub payload: String,
    // Twilio sends timestamps as decimal strings, the simulator as numbers.
    #[serde(
        default,
        deserialize_with = "de_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkInfo {
    pub name: String,
}

impl StreamEvent {
    /// Outbound media event for a known stream.
    pub fn media(stream_sid: &str, payload: String) -> Self {
        StreamEvent::Media {
            stream_sid: Some(stream_sid.to_string()),
            media: MediaPayload {
                payload,
                timestamp: None,
            },
        }
    }

    /// Outbound mark event for a known stream.
    pub fn mark(stream_sid: &str, name: &str) -> Self {
        StreamEvent::Mark {
            stream_sid: Some(stream_sid.to_string()),
            mark: MarkInfo {
                name: name.to_string(),
            },
        }
    }
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_event() {
        let raw = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ123",
            "start": {
                "accountSid": "AC000",
                "streamSid": "MZ123",
                "callSid": "CA456",
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            }
        }"#;
        match serde_json::from_str::<StreamEvent>(raw).unwrap() {
            StreamEvent::Start { start, .. } => {
                assert_eq!(start.stream_sid, "MZ123");
                assert_eq!(start.call_sid.as_deref(), Some("CA456"));
                let fmt = start.media_format.unwrap();
                assert_eq!(fmt.sample_rate, 8000);
                assert_eq!(fmt.channels, 1);
            }
            other => panic!("expected start, got {:?}", other),
        }
    }

    #[test]
    fn parses_media_with_string_timestamp() {
        let raw = r#"{
            "event": "media",
            "streamSid": "MZ123",
            "media": {"track": "inbound", "chunk": "2", "timestamp": "140", "payload": "//8="}
        }"#;
        match serde_json::from_str::<StreamEvent>(raw).unwrap() {
            StreamEvent::Media { media, .. } => {
                assert_eq!(media.payload, "//8=");
                assert_eq!(media.timestamp, Some(140));
            }
            other => panic!("expected media, got {:?}", other),
        }
    }

    #[test]
    fn serializes_outbound_media_shape() {
        let ev = StreamEvent::media("MZ123", "AAAA".to_string());
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ123");
        assert_eq!(json["media"]["payload"], "AAAA");
        assert!(json["media"].get("timestamp").is_none());
    }

    #[test]
    fn mark_round_trips() {
        let ev = StreamEvent::mark("MZ123", "hangup_mark");
        let raw = serde_json::to_string(&ev).unwrap();
        match serde_json::from_str::<StreamEvent>(&raw).unwrap() {
            StreamEvent::Mark { stream_sid, mark } => {
                assert_eq!(stream_sid.as_deref(), Some("MZ123"));
                assert_eq!(mark.name, "hangup_mark");
            }
            other => panic!("expected mark, got {:?}", other),
        }
    }

    #[test]
    fn unknown_event_type_fails_to_parse() {
        // Twilio's "connected" preamble is outside the union and gets dropped
        let raw = r#"{"event": "connected", "protocol": "Call", "version": "1.0.0"}"#;
        assert!(serde_json::from_str::<StreamEvent>(raw).is_err());
    }
}
