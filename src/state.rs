//! Per-call lifecycle state.
//!
//! The tagged enum makes the illegal flag combinations of the loose-boolean
//! formulation unrepresentable: a hangup mark can only have been sent from
//! `AwaitingHangupAck`, and speech can only have been heard while `Active`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Telephony connection accepted, model connection not yet up.
    Idle,
    /// Model socket open, first deliverable server event not yet seen.
    AwaitingModelReady,
    /// Steady relay state.
    Active { speech_heard: bool },
    /// Hangup mark emitted, waiting for the telephony side to play it back.
    AwaitingHangupAck,
    Closed,
}

impl CallState {
    /// Model socket established.
    pub fn on_model_connected(&mut self) {
        if *self == CallState::Idle {
            *self = CallState::AwaitingModelReady;
        }
    }

    /// Any deliverable server event counts as the implicit configuration
    /// acknowledgment.
    pub fn on_model_content(&mut self) {
        if *self == CallState::AwaitingModelReady {
            *self = CallState::Active {
                speech_heard: false,
            };
        }
    }

    /// Server VAD heard the caller.
    pub fn on_speech_started(&mut self) {
        match *self {
            CallState::AwaitingModelReady | CallState::Active { .. } => {
                *self = CallState::Active { speech_heard: true };
            }
            _ => {}
        }
    }

    /// A response finished with status "completed". Returns true when the
    /// two-signal rule fires and the hangup mark must go out now.
    pub fn on_response_completed(&mut self) -> bool {
        if *self == (CallState::Active { speech_heard: true }) {
            *self = CallState::AwaitingHangupAck;
            true
        } else {
            false
        }
    }

    /// Telephony "start" arriving mid-call (stream restart) resets the
    /// speech and hangup tracking without destroying the session.
    pub fn on_stream_start(&mut self) {
        match *self {
            CallState::Active { .. } | CallState::AwaitingHangupAck => {
                *self = CallState::Active {
                    speech_heard: false,
                };
            }
            _ => {}
        }
    }

    pub fn close(&mut self) {
        *self = CallState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        *self == CallState::Closed
    }
}
