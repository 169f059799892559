use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::midi::control::{ControlId, ControlValue};
use crate::midi::model::{DataByte, MidiMessage, Status};
use crate::sync::StateKey;

pub mod hub;
pub mod stubs;

pub type SharedHost = Arc<dyn HostLink + Send + Sync + 'static>;

/// Sent to the host on every control interaction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutboundControlMessage {
    pub control_id: ControlId,
    pub raw_value: ControlValue,
    pub status: Status,
    pub index: DataByte,
    pub data_byte: DataByte,
}

impl From<&OutboundControlMessage> for MidiMessage {
    fn from(msg: &OutboundControlMessage) -> Self {
        MidiMessage {
            status: msg.status,
            fst_data_byte: msg.index,
            snd_data_byte: msg.data_byte,
        }
    }
}

/// Already resolved by the host, applied without re-encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundControlMessage {
    pub control_id: ControlId,
    pub raw_value: ControlValue,
}

impl From<&OutboundControlMessage> for InboundControlMessage {
    fn from(msg: &OutboundControlMessage) -> Self {
        InboundControlMessage {
            control_id: msg.control_id.clone(),
            raw_value: msg.raw_value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDetails {
    pub addresses: Vec<String>,
    pub port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Host connection is closed.")]
    Disconnected,
    #[error("Host does not expose network details.")]
    NetworkUnavailable,
}

/// What the host pushes to a connected view.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    StateChanged { key: StateKey, value: String },
    Message(InboundControlMessage),
}

pub trait HostListener: Send + Sync {
    fn deliver(&self, event: HostEvent);
}

impl<E> HostListener for async_channel::Sender<E>
where
    E: From<HostEvent> + Send,
{
    fn deliver(&self, event: HostEvent) {
        if self.try_send(E::from(event)).is_err() {
            tracing::debug!("Listener mailbox closed, dropping host event");
        }
    }
}

/// The view's side of the host connection. Everything except network
/// details is fire-and-forget.
#[async_trait]
pub trait HostLink {
    fn post_message(&self, msg: OutboundControlMessage);
    fn set_state(&self, key: StateKey, value: String);
    fn set_size(&self, width: u32, height: u32);
    fn set_keyboard_focus(&self, focused: bool);
    async fn network_details(&self) -> Result<NetworkDetails, HostError>;
}
