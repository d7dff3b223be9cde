//! G.711 μ-law codec and 20ms frame segmentation.
//!
//! - Encode: 16-bit little-endian linear PCM → 8-bit μ-law, one byte per sample
//! - Decode: 8-bit μ-law → 16-bit linear PCM, with optional playback gain
//!
//! μ-law is a fixed, sample-independent transform, so both directions are
//! pure functions with no codec state.

use anyhow::Result;
use bytes::{Bytes, BytesMut};

/// Telephony sample rate in Hz.
pub const SAMPLE_RATE: u32 = 8000;
/// Frame duration in ms, the unit of transmission in media events.
pub const FRAME_MS: u32 = 20;
/// Bytes of 16-bit PCM in one frame (8000 Hz * 2 B * 20 ms).
pub const PCM_FRAME_BYTES: usize = (SAMPLE_RATE as usize * 2 * FRAME_MS as usize) / 1000;
/// Bytes of μ-law in one frame.
pub const ULAW_FRAME_BYTES: usize = PCM_FRAME_BYTES / 2;

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

// ======================== Sample conversion ========================

/// Compand one 16-bit linear sample to μ-law.
///
/// Standard compander: sign, magnitude clamp, bias, exponent from the
/// highest set bit above bit 7, 4-bit mantissa, complemented result.
/// Zero encodes to 0xFF.
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut s = sample as i32;
    let sign = (s >> 8) & 0x80;
    if sign != 0 {
        s = -s;
    }
    if s > CLIP {
        s = CLIP;
    }
    s += BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while s & mask == 0 && exponent > 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (s >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Expand one μ-law byte back to a 16-bit linear sample.
pub fn ulaw_to_linear(byte: u8) -> i16 {
    let u = (!byte) as i32;
    let sign = u & 0x80;
    let exponent = (u >> 4) & 0x07;
    let mantissa = u & 0x0F;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        (-magnitude) as i16
    } else {
        magnitude as i16
    }
}

// ======================== Frame conversion ========================

/// Encode a little-endian PCM16 byte frame to μ-law.
///
/// Output length is exactly half the input length. The input must be a
/// positive even number of bytes (whole samples).
pub fn encode_frame(pcm: &[u8]) -> Result<Vec<u8>> {
    if pcm.is_empty() || pcm.len() % 2 != 0 {
        anyhow::bail!(
            "PCM frame length must be a positive multiple of 2, got {}",
            pcm.len()
        );
    }
    Ok(pcm
        .chunks_exact(2)
        .map(|pair| linear_to_ulaw(i16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}

/// Decode a μ-law frame to little-endian PCM16 bytes, scaling by `gain`
/// with saturation into the i16 range.
///
/// Output length is exactly double the input length.
pub fn decode_frame(ulaw: &[u8], gain: f32) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(ulaw.len() * 2);
    for &b in ulaw {
        let mut s = ulaw_to_linear(b) as i32;
        if gain != 1.0 {
            s = ((s as f32 * gain).round() as i32)
                .clamp(i16::MIN as i32, i16::MAX as i32);
        }
        pcm.extend_from_slice(&(s as i16).to_le_bytes());
    }
    pcm
}

// ======================== Frame segmentation ========================

/// Accumulates raw PCM bytes until whole 20ms frames are available.
///
/// Owned exclusively by the capture side; partial input stays buffered
/// until the next push completes a frame.
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(PCM_FRAME_BYTES * 4),
        }
    }

    /// Append captured PCM bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete 320-byte PCM frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.buf.len() >= PCM_FRAME_BYTES {
            Some(self.buf.split_to(PCM_FRAME_BYTES).freeze())
        } else {
            None
        }
    }

    /// Bytes currently buffered (always less than one frame after draining).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_stays_within_compander_error() {
        for x in i16::MIN..=i16::MAX {
            let rt = ulaw_to_linear(linear_to_ulaw(x)) as i32;
            let err = (x as i32 - rt).abs();
            let bound = (x as i32).abs() / 16 + 8;
            assert!(
                err <= bound,
                "sample {} round-tripped to {} (error {}, bound {})",
                x,
                rt,
                err,
                bound
            );
        }
    }

    #[test]
    fn zero_encodes_to_silence_byte() {
        assert_eq!(linear_to_ulaw(0), 0xFF);
        assert_eq!(ulaw_to_linear(0xFF), 0);
        // negative zero code
        assert_eq!(ulaw_to_linear(0x7F), 0);
    }

    #[test]
    fn silent_frame_is_all_silence_bytes() {
        let pcm = vec![0u8; PCM_FRAME_BYTES];
        let ulaw = encode_frame(&pcm).unwrap();
        assert_eq!(ulaw, vec![0xFF; ULAW_FRAME_BYTES]);

        let back = decode_frame(&ulaw, 1.0);
        assert_eq!(back.len(), PCM_FRAME_BYTES);
        for pair in back.chunks_exact(2) {
            let s = i16::from_le_bytes([pair[0], pair[1]]);
            assert_eq!(s, 0);
        }
    }

    #[test]
    fn frame_lengths_halve_and_double() {
        let pcm: Vec<u8> = (0..PCM_FRAME_BYTES).map(|i| i as u8).collect();
        let ulaw = encode_frame(&pcm).unwrap();
        assert_eq!(ulaw.len(), pcm.len() / 2);
        assert_eq!(decode_frame(&ulaw, 1.0).len(), ulaw.len() * 2);
    }

    #[test]
    fn odd_or_empty_input_is_rejected() {
        assert!(encode_frame(&[]).is_err());
        assert!(encode_frame(&[0u8; 321]).is_err());
        assert!(encode_frame(&[0u8; 2]).is_ok());
    }

    #[test]
    fn encode_is_deterministic() {
        let pcm: Vec<u8> = (0..64).map(|i| (i * 7) as u8).collect();
        assert_eq!(encode_frame(&pcm).unwrap(), encode_frame(&pcm).unwrap());
    }

    #[test]
    fn gain_scales_and_saturates() {
        // a loud sample times 3 must clamp instead of wrapping
        let loud = linear_to_ulaw(20000);
        let pcm = decode_frame(&[loud], 3.0);
        let s = i16::from_le_bytes([pcm[0], pcm[1]]);
        assert_eq!(s, i16::MAX);

        let quiet = linear_to_ulaw(1000);
        let pcm = decode_frame(&[quiet], 2.0);
        let s = i16::from_le_bytes([pcm[0], pcm[1]]) as i32;
        let base = ulaw_to_linear(quiet) as i32;
        assert!((s - base * 2).abs() <= 1);
    }

    #[test]
    fn frame_buffer_reassembles_across_chunk_splits() {
        let mut fb = FrameBuffer::new();
        // 2.5 frames delivered in awkward chunk sizes
        let data: Vec<u8> = (0..PCM_FRAME_BYTES * 5 / 2).map(|i| i as u8).collect();
        for chunk in data.chunks(77) {
            fb.push(chunk);
        }
        let a = fb.next_frame().unwrap();
        let b = fb.next_frame().unwrap();
        assert_eq!(a.len(), PCM_FRAME_BYTES);
        assert_eq!(&a[..], &data[..PCM_FRAME_BYTES]);
        assert_eq!(&b[..], &data[PCM_FRAME_BYTES..PCM_FRAME_BYTES * 2]);
        assert!(fb.next_frame().is_none());
        assert_eq!(fb.pending(), PCM_FRAME_BYTES / 2);
    }
}
