//! Plugin-process side of the host connection: owns persisted state, fans
//! changes out to every connected view and drives the MIDI output.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::host::{
    HostError, HostEvent, HostLink, HostListener, InboundControlMessage, NetworkDetails,
    OutboundControlMessage,
};
use crate::midi::model::{MidiMessage, MidiSender};
use crate::sync::StateKey;

pub type HubMidiSender = Arc<dyn MidiSender + Send + Sync + 'static>;
pub type HubListener = Arc<dyn HostListener + 'static>;

pub type ClientId = u64;

pub struct HostHub {
    states: DashMap<StateKey, String>,
    clients: DashMap<ClientId, HubListener>,
    sizes: DashMap<ClientId, (u32, u32)>,
    next_client: AtomicU64,
    midi_sender: HubMidiSender,
    network: Option<NetworkDetails>,
}

impl HostHub {
    pub fn new(midi_sender: HubMidiSender, network: Option<NetworkDetails>) -> Arc<HostHub> {
        Arc::new(HostHub {
            states: DashMap::new(),
            clients: DashMap::new(),
            sizes: DashMap::new(),
            next_client: AtomicU64::new(1),
            midi_sender,
            network,
        })
    }

    /// Registers a view and immediately delivers both persisted keys to it,
    /// configuration first. Absent keys are delivered as empty strings.
    pub fn connect(self: &Arc<Self>, listener: HubListener) -> HubLink {
        let client = self.next_client.fetch_add(1, Ordering::Relaxed);
        self.clients.insert(client, listener.clone());
        tracing::info!("Client {client} connected");

        for key in [StateKey::Config, StateKey::Ui] {
            listener.deliver(HostEvent::StateChanged {
                key,
                value: self.state(key).unwrap_or_default(),
            });
        }

        HubLink {
            hub: self.clone(),
            client,
        }
    }

    pub fn disconnect(&self, client: ClientId) {
        if self.clients.remove(&client).is_some() {
            self.sizes.remove(&client);
            tracing::info!("Client {client} disconnected");
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn state(&self, key: StateKey) -> Option<String> {
        self.states.get(&key).map(|value| value.clone())
    }

    pub fn size_of(&self, client: ClientId) -> Option<(u32, u32)> {
        self.sizes.get(&client).map(|size| *size)
    }

    /// State changed by the host itself (preset load, session restore).
    /// Every client is told, none is skipped.
    pub fn replace_state(&self, key: StateKey, value: String) {
        self.states.insert(key, value.clone());
        self.broadcast(None, HostEvent::StateChanged { key, value });
    }

    fn set_state_from(&self, client: ClientId, key: StateKey, value: String) {
        tracing::debug!("Client {client} stored `{key}`");
        self.states.insert(key, value.clone());
        self.broadcast(Some(client), HostEvent::StateChanged { key, value });
    }

    fn route(&self, from: ClientId, msg: OutboundControlMessage) {
        self.midi_sender.send_and_forget(MidiMessage::from(&msg));
        self.broadcast(
            Some(from),
            HostEvent::Message(InboundControlMessage::from(&msg)),
        );
    }

    fn broadcast(&self, except: Option<ClientId>, event: HostEvent) {
        // Collected first so no shard lock is held while delivering.
        let listeners: Vec<HubListener> = self
            .clients
            .iter()
            .filter(|entry| Some(*entry.key()) != except)
            .map(|entry| entry.value().clone())
            .collect();
        for listener in listeners {
            listener.deliver(event.clone());
        }
    }
}

/// One view's connection to the hub. Disconnects on drop.
pub struct HubLink {
    hub: Arc<HostHub>,
    client: ClientId,
}

impl HubLink {
    pub fn client(&self) -> ClientId {
        self.client
    }
}

#[async_trait]
impl HostLink for HubLink {
    fn post_message(&self, msg: OutboundControlMessage) {
        self.hub.route(self.client, msg);
    }

    fn set_state(&self, key: StateKey, value: String) {
        self.hub.set_state_from(self.client, key, value);
    }

    fn set_size(&self, width: u32, height: u32) {
        tracing::debug!("Client {} requested {width}x{height}", self.client);
        self.hub.sizes.insert(self.client, (width, height));
    }

    fn set_keyboard_focus(&self, focused: bool) {
        tracing::debug!("Client {} keyboard focus: {focused}", self.client);
    }

    async fn network_details(&self) -> Result<NetworkDetails, HostError> {
        if !self.hub.clients.contains_key(&self.client) {
            return Err(HostError::Disconnected);
        }
        self.hub.network.clone().ok_or(HostError::NetworkUnavailable)
    }
}

impl Drop for HubLink {
    fn drop(&mut self) {
        self.hub.disconnect(self.client);
    }
}
