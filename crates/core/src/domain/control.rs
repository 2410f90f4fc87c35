//! Lock-free parameter hand-off between a control thread and the audio thread
//!
//! The control side never blocks: a full queue hands the message back to the
//! caller. The audio side drains whatever is queued at the top of each block.

use crate::domain::chain::ProcessorKind;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

/// Default queue depth for `parameter_channel`
pub const DEFAULT_CONTROL_CAPACITY: usize = 64;

/// Change requested by the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Replace the parameters of the processor in `slot`
    Update { slot: usize, params: ProcessorKind },
    Bypass { slot: usize, bypass: bool },
    /// Reset every processor for a new sample rate
    Reset { sample_rate: f64 },
}

/// Control-thread end of the channel
#[derive(Debug, Clone)]
pub struct ParameterSender {
    sender: Sender<ControlMessage>,
}

impl ParameterSender {
    /// Queue a message without blocking
    ///
    /// Returns the message if the queue is full or the audio side is gone.
    pub fn send(&self, message: ControlMessage) -> std::result::Result<(), ControlMessage> {
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(message) => {
                debug!("Control queue full, message returned to caller");
                message
            }
            TrySendError::Disconnected(message) => message,
        })
    }

    pub fn update(&self, slot: usize, params: ProcessorKind) -> std::result::Result<(), ControlMessage> {
        self.send(ControlMessage::Update { slot, params })
    }

    pub fn bypass(&self, slot: usize, bypass: bool) -> std::result::Result<(), ControlMessage> {
        self.send(ControlMessage::Bypass { slot, bypass })
    }

    pub fn reset(&self, sample_rate: f64) -> std::result::Result<(), ControlMessage> {
        self.send(ControlMessage::Reset { sample_rate })
    }

    /// Messages waiting to be picked up
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

/// Audio-thread end of the channel
#[derive(Debug)]
pub struct ParameterReceiver {
    receiver: Receiver<ControlMessage>,
}

impl ParameterReceiver {
    pub fn try_recv(&self) -> Option<ControlMessage> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now, oldest first
    pub fn drain(&self) -> impl Iterator<Item = ControlMessage> + '_ {
        self.receiver.try_iter()
    }
}

/// Create a bounded control channel
pub fn parameter_channel(capacity: usize) -> (ParameterSender, ParameterReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    (ParameterSender { sender }, ParameterReceiver { receiver })
}
