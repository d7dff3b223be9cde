//! Local "fake telephony" client for exercising the relay without a real
//! provider.
//!
//! - Mic: 8kHz mono PCM16LE → μ-law → 20ms frames → "media" events
//! - Playback: inbound "media" events → μ-law decode with gain → speaker
//! - Announces a telephony-like "start" (mediaFormat audio/pcmu 8000/1)
//! - Short beep on connect so the output device is audibly verified
//!
//! Audio I/O runs on dedicated OS threads; the WebSocket loop stays async.

use std::env;
use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use uuid::Uuid;

use callbridge_rs::audio::alsa_device;
use callbridge_rs::audio::ulaw::{
    self, FRAME_MS, FrameBuffer, SAMPLE_RATE, ULAW_FRAME_BYTES,
};
use callbridge_rs::protocol::{MediaFormat, MediaPayload, StartInfo, StreamEvent};

struct SimConfig {
    ws_url: String,
    playback_gain: f32,
    mic_device: String,
    speaker_device: String,
}

impl SimConfig {
    fn from_env() -> Self {
        Self {
            ws_url: env::var("WS_URL")
                .unwrap_or_else(|_| "ws://localhost:5050/media-stream".to_string()),
            playback_gain: env::var("PLAYBACK_GAIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.8),
            mic_device: env::var("MIC_DEVICE").unwrap_or_else(|_| "default".to_string()),
            speaker_device: env::var("SPEAKER_DEVICE")
                .unwrap_or_else(|_| "default".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let config = SimConfig::from_env();

    let stream_sid = format!("LOCAL_MIC_{}", Uuid::new_v4().simple());

    let (ws_stream, _) = connect_async(config.ws_url.as_str()).await?;
    println!("Connected to {}", config.ws_url);
    let (mut write, mut read) = ws_stream.split();

    // Tell the relay a telephony-like stream started
    let start = StreamEvent::Start {
        stream_sid: Some(stream_sid.clone()),
        start: StartInfo {
            stream_sid: stream_sid.clone(),
            call_sid: None,
            media_format: Some(MediaFormat {
                encoding: "audio/pcmu".to_string(),
                sample_rate: SAMPLE_RATE,
                channels: 1,
            }),
        },
    };
    write
        .send(Message::Text(serde_json::to_string(&start)?.into()))
        .await?;

    let running = Arc::new(AtomicBool::new(true));

    // 麦克风帧通道与播放通道
    let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(100);
    let (play_tx, play_rx) = mpsc::channel::<Vec<u8>>(100);

    // Startup beep goes through the same μ-law path as real audio
    let _ = play_tx.send(beep()?).await;

    let capture_handle = {
        let running = running.clone();
        let device = config.mic_device.clone();
        thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                if let Err(e) = capture_thread(&device, frame_tx, &running) {
                    log::error!("Capture thread error: {}", e);
                }
            })?
    };

    let playback_handle = {
        let running = running.clone();
        let device = config.speaker_device.clone();
        let gain = config.playback_gain;
        thread::Builder::new()
            .name("speaker-play".into())
            .spawn(move || {
                if let Err(e) = playback_thread(&device, gain, play_rx, &running) {
                    log::error!("Playback thread error: {}", e);
                }
            })?
    };

    let mut timestamp: u64 = 0;
    let mut recv_frames: usize = 0;

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Some(ulaw_frame) => {
                        let event = StreamEvent::Media {
                            stream_sid: Some(stream_sid.clone()),
                            media: MediaPayload {
                                payload: BASE64.encode(&ulaw_frame),
                                timestamp: Some(timestamp),
                            },
                        };
                        write.send(Message::Text(serde_json::to_string(&event)?.into())).await?;
                        timestamp += FRAME_MS as u64;
                    }
                    None => break,
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event = match serde_json::from_str::<StreamEvent>(&text) {
                            Ok(event) => event,
                            Err(_) => continue,
                        };
                        match event {
                            StreamEvent::Media { media, .. } => {
                                match BASE64.decode(media.payload.as_bytes()) {
                                    Ok(ulaw_bytes) => {
                                        // most chunks are one 160B frame; larger means the
                                        // relay paced several frames together, still fine
                                        recv_frames += ulaw_bytes.len().div_ceil(ULAW_FRAME_BYTES);
                                        if recv_frames % 50 == 0 {
                                            println!(
                                                "← received μ-law frames: {} (last chunk {}B)",
                                                recv_frames,
                                                ulaw_bytes.len(),
                                            );
                                        }
                                        if play_tx.send(ulaw_bytes).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => log::warn!("Dropping undecodable media payload: {}", e),
                                }
                            }
                            StreamEvent::Clear { .. } => {
                                // the relay flushes for barge-in; playback just follows
                                // whatever frames come next
                                println!("server requested clear");
                            }
                            StreamEvent::Mark { .. } => {
                                // marks are fine to ignore in the sim
                            }
                            StreamEvent::Stop { .. } => {
                                println!("server requested stop");
                                break;
                            }
                            StreamEvent::Start { .. } => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        println!("WS closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::error!("WS error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    drop(play_tx);
    let _ = capture_handle.join();
    let _ = playback_handle.join();
    Ok(())
}

/// 200ms of 880Hz sine, already companded.
fn beep() -> Result<Vec<u8>> {
    let samples = (SAMPLE_RATE as usize * 200) / 1000;
    let mut pcm = Vec::with_capacity(samples * 2);
    for n in 0..samples {
        let v = (f32::sin(2.0 * PI * 880.0 * (n as f32 / SAMPLE_RATE as f32)) * 9000.0)
            .round() as i16;
        pcm.extend_from_slice(&v.to_le_bytes());
    }
    ulaw::encode_frame(&pcm)
}

// ======================== Capture thread ========================

fn capture_thread(
    device: &str,
    frame_tx: mpsc::Sender<Vec<u8>>,
    running: &AtomicBool,
) -> Result<()> {
    let (pcm, params) = alsa_device::open_capture(device)?;
    let io = pcm.io_i16()?;

    let mut read_buf = vec![0i16; params.period_size];
    let mut frames = FrameBuffer::new();

    log::info!(
        "Mic started @ {}Hz mono → μ-law {}ms frames",
        params.sample_rate,
        FRAME_MS,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(n) => {
                // Accumulate PCM bytes until whole 20ms frames are available
                let mut chunk = Vec::with_capacity(n * 2);
                for s in &read_buf[..n] {
                    chunk.extend_from_slice(&s.to_le_bytes());
                }
                frames.push(&chunk);

                while let Some(pcm_frame) = frames.next_frame() {
                    match ulaw::encode_frame(&pcm_frame) {
                        Ok(ulaw_frame) => {
                            if frame_tx.blocking_send(ulaw_frame).is_err() {
                                log::warn!("Frame receiver dropped, stopping capture");
                                return Ok(());
                            }
                        }
                        Err(e) => log::error!("Encode error: {}", e),
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover PCM capture: {}", e2);
                    break;
                }
            }
        }
    }

    log::info!("Capture stopped");
    Ok(())
}

// ======================== Playback thread ========================

fn playback_thread(
    device: &str,
    gain: f32,
    mut play_rx: mpsc::Receiver<Vec<u8>>,
    running: &AtomicBool,
) -> Result<()> {
    // one 20ms frame per period keeps latency low
    let (pcm, _params) = alsa_device::open_playback(device, Some(ULAW_FRAME_BYTES))?;
    let io = pcm.io_i16()?;

    while running.load(Ordering::Relaxed) {
        match play_rx.blocking_recv() {
            Some(ulaw_bytes) => {
                let pcm_bytes = ulaw::decode_frame(&ulaw_bytes, gain);
                let samples: Vec<i16> = pcm_bytes
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();

                // Retry loop handles short writes and XRUN recovery without
                // losing frames
                let mut written = 0;
                while written < samples.len() {
                    match io.writei(&samples[written..]) {
                        Ok(n) => written += n,
                        Err(e) => {
                            log::warn!("ALSA playback error: {}, recovering...", e);
                            if let Err(e2) = pcm.prepare() {
                                log::error!("Failed to recover PCM playback: {}", e2);
                                break;
                            }
                        }
                    }
                }
            }
            None => {
                log::info!("Playback channel closed");
                break;
            }
        }
    }

    log::info!("Playback stopped");
    Ok(())
}
