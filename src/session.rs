//! Per-call relay: multiplexes the telephony and model peers and drives
//! the call lifecycle.
//!
//! One session task is the single consumer of both peers' event channels,
//! so all call state lives here unguarded. Audio payloads pass through
//! base64-encoded in both directions; nothing is resampled or re-encoded.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::greeting::{self, UtteranceContext};
use crate::hangup::TwilioClient;
use crate::model_link::ModelEvent;
use crate::peer::PeerHandle;
use crate::protocol::StreamEvent;
use crate::realtime::{ClientEvent, ServerEvent};
use crate::state::CallState;

/// Mark name echoed back by the telephony side once the farewell audio has
/// been played out; its return triggers the actual hangup.
pub const HANGUP_MARK: &str = "hangup_mark";

pub struct CallSession {
    config: Arc<Config>,
    state: CallState,
    stream_sid: Option<String>,
    call_sid: Option<String>,
    context: UtteranceContext,
    telephony: PeerHandle<StreamEvent>,
    model: PeerHandle<ClientEvent>,
    twilio: Arc<TwilioClient>,
    created_at: Instant,
}

impl CallSession {
    pub fn new(
        config: Arc<Config>,
        telephony: PeerHandle<StreamEvent>,
        model: PeerHandle<ClientEvent>,
        twilio: Arc<TwilioClient>,
    ) -> Self {
        let context = UtteranceContext::generate();
        log::info!(
            "New call initiated for {}, order {}",
            context.profile.name(),
            context.order_id,
        );
        Self {
            config,
            state: CallState::Idle,
            stream_sid: None,
            call_sid: None,
            context,
            telephony,
            model,
            twilio,
            created_at: Instant::now(),
        }
    }

    /// Drive the session until either peer goes away or the call completes.
    pub async fn run(
        mut self,
        mut stream_events: mpsc::Receiver<StreamEvent>,
        mut model_events: mpsc::Receiver<ModelEvent>,
    ) {
        loop {
            tokio::select! {
                ev = stream_events.recv() => match ev {
                    Some(ev) => self.handle_stream_event(ev).await,
                    None => {
                        log::info!("Telephony peer disconnected");
                        break;
                    }
                },
                ev = model_events.recv() => match ev {
                    Some(ev) => self.handle_model_event(ev).await,
                    None => break,
                },
            }
            if self.state.is_closed() {
                break;
            }
        }
        self.teardown();
    }

    // 任一端关闭都要拆掉另一端，不留孤儿连接
    fn teardown(&mut self) {
        self.state.close();
        self.telephony.close();
        self.model.close();
        log::info!("Call session closed after {:?}", self.created_at.elapsed());
    }

    pub(crate) async fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Start { start, .. } => {
                log::info!(
                    "Incoming stream has started: stream {}, call {}",
                    start.stream_sid,
                    start.call_sid.as_deref().unwrap_or("<none>"),
                );
                self.stream_sid = Some(start.stream_sid);
                self.call_sid = start.call_sid;
                self.state.on_stream_start();
            }
            StreamEvent::Media { media, .. } => {
                // Forward caller audio only while the model socket is up;
                // a closed peer must not take the call down.
                if self.model.is_open() {
                    let append = ClientEvent::InputAudioBufferAppend {
                        audio: media.payload,
                    };
                    if let Err(e) = self.model.send(append).await {
                        log::debug!("Dropping caller audio: {}", e);
                    }
                }
            }
            StreamEvent::Mark { mark, .. } => {
                log::info!("Received mark from telephony peer: {}", mark.name);
                if self.state == CallState::AwaitingHangupAck && mark.name == HANGUP_MARK {
                    self.finish_call().await;
                }
            }
            StreamEvent::Clear { .. } => {
                log::debug!("Telephony peer requested clear");
            }
            StreamEvent::Stop { .. } => {
                log::info!("Telephony stream stopped");
                self.state.close();
            }
        }
    }

    pub(crate) async fn handle_model_event(&mut self, event: ModelEvent) {
        match event {
            ModelEvent::Connected => {
                self.state.on_model_connected();
                tokio::spawn(greeting::run_opener(
                    self.config.clone(),
                    self.context,
                    self.model.clone(),
                ));
            }
            ModelEvent::Event(event) => self.handle_server_event(event).await,
            ModelEvent::Closed => {
                log::info!("Model peer disconnected");
                self.state.close();
            }
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::AudioDelta { delta } => {
                self.state.on_model_content();
                match &self.stream_sid {
                    Some(sid) => {
                        let media = StreamEvent::media(sid, delta);
                        if let Err(e) = self.telephony.send(media).await {
                            log::debug!("Dropping model audio: {}", e);
                        }
                    }
                    // 流ID未知时先丢弃
                    None => log::debug!("Dropping model audio: stream id not known yet"),
                }
            }
            ServerEvent::SpeechStarted => {
                log::info!("Caller speech detected");
                self.state.on_speech_started();
            }
            ServerEvent::ResponseDone { response } => {
                log::info!(
                    "Model response done, status: {}",
                    response.status.as_deref().unwrap_or("<unknown>"),
                );
                self.state.on_model_content();
                if response.status.as_deref() == Some("completed")
                    && self.state.on_response_completed()
                {
                    self.send_hangup_mark().await;
                }
            }
            ServerEvent::SessionUpdated => {
                log::info!("Model session updated");
                self.state.on_model_content();
            }
            ServerEvent::Error { error } => {
                log::warn!("Model error event: {}", error);
            }
            ServerEvent::Other => {}
        }
    }

    /// The two-signal rule fired: tell the telephony side to mark the end
    /// of the farewell audio.
    async fn send_hangup_mark(&mut self) {
        let Some(sid) = self.stream_sid.clone() else {
            log::warn!("Final response generated but stream id never arrived; cannot send hangup mark");
            return;
        };
        log::info!("Final response generated, sending hangup mark");
        let mark = StreamEvent::mark(&sid, HANGUP_MARK);
        if let Err(e) = self.telephony.send(mark).await {
            log::warn!("Failed to send hangup mark: {}", e);
        }
    }

    /// The farewell finished playing: complete the call externally and
    /// close locally. Runs at most once per session — only reachable from
    /// `AwaitingHangupAck`, which `close` leaves for good.
    async fn finish_call(&mut self) {
        self.state.close();
        match self.call_sid.clone() {
            Some(call_sid) => {
                log::info!("Hangup mark played back, completing call {}", call_sid);
                if let Err(e) = self.twilio.complete_call(&call_sid).await {
                    log::warn!("Failed to complete call {}: {}", call_sid, e);
                }
            }
            None => {
                log::warn!(
                    "Hangup mark played back but no call id is known; leaving the stream to time out"
                );
            }
        }
    }
}
