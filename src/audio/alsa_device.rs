//! ALSA PCM device wrappers for the simulator's capture and playback.
//!
//! Everything runs at the telephony format: S16LE mono. The rate is
//! requested at 8kHz; "default"/plughw devices resample as needed, and the
//! caller gets the negotiated values back to sanity-check.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

use super::ulaw::SAMPLE_RATE;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Period size in frames
    pub period_size: usize,
}

/// Open a mono S16LE PCM device for capture at the telephony rate.
pub fn open_capture(device: &str) -> Result<(PCM, AlsaParams)> {
    open_pcm(device, Direction::Capture, None, "Capture")
}

/// Open a mono S16LE PCM device for playback at the telephony rate.
pub fn open_playback(device: &str, period_size: Option<usize>) -> Result<(PCM, AlsaParams)> {
    open_pcm(device, Direction::Playback, period_size, "Playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    period_size: Option<usize>,
    dir_name: &str,
) -> Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{}' for {}", device, dir_name))?;

    // Configure hardware parameters
    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(1)?;
        hwp.set_rate_near(SAMPLE_RATE, ValueOr::Nearest)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)?;
        }
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let (actual_rate, period_size) = {
        let hwp = pcm.hw_params_current()?;
        (hwp.get_rate()?, hwp.get_period_size()? as usize)
    };

    if actual_rate != SAMPLE_RATE {
        log::warn!(
            "ALSA {}: device '{}' negotiated {}Hz instead of {}Hz; audio will drift",
            dir_name,
            device,
            actual_rate,
            SAMPLE_RATE,
        );
    }

    let params = AlsaParams {
        sample_rate: actual_rate,
        period_size,
    };

    log::info!(
        "ALSA {}: device={}, rate={}, period_size={}",
        dir_name,
        device,
        actual_rate,
        params.period_size,
    );

    Ok((pcm, params))
}
