use async_trait::async_trait;
use std::sync::Mutex;

use crate::host::{HostError, HostLink, NetworkDetails, OutboundControlMessage};
use crate::sync::StateKey;

/// Keeps every call in memory.
#[derive(Default)]
pub struct RecordingHost {
    messages: Mutex<Vec<OutboundControlMessage>>,
    states: Mutex<Vec<(StateKey, String)>>,
    sizes: Mutex<Vec<(u32, u32)>>,
    focus: Mutex<Vec<bool>>,
    network: Option<NetworkDetails>,
}

impl RecordingHost {
    pub fn new() -> RecordingHost {
        RecordingHost::default()
    }

    pub fn with_network(mut self, details: NetworkDetails) -> RecordingHost {
        self.network = Some(details);
        self
    }

    pub fn messages(&self) -> Vec<OutboundControlMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn states(&self) -> Vec<(StateKey, String)> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_state(&self, key: StateKey) -> Option<String> {
        self.states()
            .into_iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn focus(&self) -> Vec<bool> {
        self.focus.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HostLink for RecordingHost {
    fn post_message(&self, msg: OutboundControlMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(msg);
        }
    }

    fn set_state(&self, key: StateKey, value: String) {
        if let Ok(mut states) = self.states.lock() {
            states.push((key, value));
        }
    }

    fn set_size(&self, width: u32, height: u32) {
        if let Ok(mut sizes) = self.sizes.lock() {
            sizes.push((width, height));
        }
    }

    fn set_keyboard_focus(&self, focused: bool) {
        if let Ok(mut focus) = self.focus.lock() {
            focus.push(focused);
        }
    }

    async fn network_details(&self) -> Result<NetworkDetails, HostError> {
        self.network.clone().ok_or(HostError::NetworkUnavailable)
    }
}
