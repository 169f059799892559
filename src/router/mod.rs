use std::sync::Arc;

use crate::host::{InboundControlMessage, OutboundControlMessage, SharedHost};
use crate::layout::ControlRegistry;
use crate::midi::control::{ControlId, ControlValue, DescriptorTable};
use crate::midi::mapping::{self, UnknownControl};
use crate::render::StatusLine;
use crate::sync::{SyncCoordinator, SyncEffect, SyncError};

pub mod status;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    UnknownControl(#[from] UnknownControl),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Connects rendered controls to the mapping and the host, in both directions.
pub struct ControlEventRouter {
    descriptors: Arc<DescriptorTable>,
    host: SharedHost,
}

impl ControlEventRouter {
    pub fn new(descriptors: Arc<DescriptorTable>, host: SharedHost) -> ControlEventRouter {
        ControlEventRouter { descriptors, host }
    }

    /// The user moved a control. UiState is updated and persisted before the
    /// control message leaves, so anything reacting to that message already
    /// sees the new value.
    pub fn on_control_changed(
        &self,
        sync: &mut SyncCoordinator,
        id: ControlId,
        value: ControlValue,
    ) -> Result<OutboundControlMessage, RouteError> {
        let config = sync.configuration().ok_or(SyncError::NotLoaded)?;
        let encoded = mapping::encode(&self.descriptors, &config.map, &id, value)?;

        if let SyncEffect::Persist { key, blob } = sync.record_control_value(id.clone(), value)? {
            self.host.set_state(key, blob);
        }

        let msg = OutboundControlMessage {
            control_id: id,
            raw_value: value,
            status: encoded.status,
            index: encoded.index,
            data_byte: encoded.data_byte,
        };
        tracing::debug!(
            "{} -> {:02X} {:02X} {:02X}",
            msg.control_id,
            msg.status.as_u8(),
            msg.index.as_u8(),
            msg.data_byte.as_u8()
        );
        self.host.post_message(msg.clone());
        Ok(msg)
    }

    /// A value pushed from the host. No re-encoding and nothing is sent back.
    pub fn on_host_message(
        &self,
        sync: &mut SyncCoordinator,
        registry: &ControlRegistry,
        msg: InboundControlMessage,
    ) -> Result<(), UnknownControl> {
        if self.descriptors.resolve(&msg.control_id).is_none() {
            return Err(UnknownControl(msg.control_id));
        }
        let unmapped = sync
            .configuration()
            .map_or(false, |config| !config.map.contains(&msg.control_id));
        if unmapped {
            return Err(UnknownControl(msg.control_id));
        }
        if !registry.set_value(&msg.control_id, msg.raw_value) {
            tracing::debug!("`{}` is not part of the mounted layout", msg.control_id);
        }
        sync.apply_control_value(msg.control_id, msg.raw_value);
        Ok(())
    }

    /// Human readable status for a control change; `name` is the display
    /// name of the rendered control.
    pub fn status_for(&self, name: &str, id: &ControlId, value: ControlValue) -> Option<StatusLine> {
        let desc = self.descriptors.resolve(id)?;
        let level = desc
            .continuous
            .then(|| value.as_unit().clamp(0.0, 1.0));
        Some(StatusLine::control(
            name,
            &value.display(desc.continuous),
            level,
        ))
    }
}
