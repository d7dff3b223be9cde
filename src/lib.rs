//! callbridge_rs - realtime voice relay between Twilio Media Streams and
//! the OpenAI Realtime API.
//!
//! One call = one telephony WebSocket + one model WebSocket + one session
//! task relaying 8kHz μ-law audio between them. The `mic_sim` binary
//! replaces the telephony side with a local microphone and speaker.

pub mod audio;
pub mod config;
pub mod greeting;
pub mod hangup;
pub mod media_link;
pub mod model_link;
pub mod peer;
pub mod protocol;
pub mod realtime;
pub mod session;
pub mod state;
