//! audio - μ-law codec, frame segmentation, and ALSA I/O for the simulator
//!
//! The relay itself never touches raw audio (payloads pass through
//! base64-encoded); this module serves the codec unit of the pipeline and
//! the mic_sim harness.

pub mod alsa_device;
pub mod ulaw;

pub use ulaw::{FrameBuffer, decode_frame, encode_frame};
