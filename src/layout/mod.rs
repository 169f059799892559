use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::configuration::Capabilities;
use crate::host::SharedHost;
use crate::midi::control::{ControlId, ControlValue};
use crate::render::{ControlHandle, InputBinding, SharedRenderer};
use crate::sync::UiState;

pub mod css;
pub mod resource;
pub mod stubs;
pub mod zoom;

use resource::SharedResolver;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(String);

impl LayoutId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayoutId {
    fn from(value: &str) -> Self {
        LayoutId(value.to_string())
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Controls of the mounted layout, by id. Rebuilt on every activation.
#[derive(Default)]
pub struct ControlRegistry(HashMap<ControlId, ControlHandle>);

impl ControlRegistry {
    pub fn from_handles(handles: Vec<ControlHandle>) -> ControlRegistry {
        ControlRegistry(
            handles
                .into_iter()
                .map(|handle| (handle.id.clone(), handle))
                .collect(),
        )
    }

    pub fn get(&self, id: &ControlId) -> Option<&ControlHandle> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether a control with that id is mounted.
    pub fn set_value(&self, id: &ControlId, value: ControlValue) -> bool {
        match self.0.get(id) {
            Some(handle) => {
                handle.control.set_value(value);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Layout `{layout}` could not be loaded: {source}")]
    Load {
        layout: LayoutId,
        #[source]
        source: anyhow::Error,
    },
    #[error("Layout `{0}` does not declare a size for its root element.")]
    MissingSize(LayoutId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveLayout {
    pub id: LayoutId,
    pub show_status: bool,
    pub size: ViewportSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    AlreadyActive,
    Swapped(ViewportSize),
}

pub struct LayoutManager {
    resolver: SharedResolver,
    renderer: SharedRenderer,
    host: SharedHost,
    capabilities: Capabilities,
    active: Option<ActiveLayout>,
    registry: ControlRegistry,
    collapsed: bool,
    swaps: usize,
}

impl LayoutManager {
    pub fn new(
        resolver: SharedResolver,
        renderer: SharedRenderer,
        host: SharedHost,
        capabilities: Capabilities,
    ) -> LayoutManager {
        LayoutManager {
            resolver,
            renderer,
            host,
            capabilities,
            active: None,
            registry: ControlRegistry::default(),
            collapsed: false,
            swaps: 0,
        }
    }

    pub fn active(&self) -> Option<&ActiveLayout> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&LayoutId> {
        self.active.as_ref().map(|active| &active.id)
    }

    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Completed resource swaps since construction.
    pub fn swaps(&self) -> usize {
        self.swaps
    }

    /// Swaps in `id`. Both resources are resolved before anything visible
    /// changes, so a failure leaves the previous layout fully in place.
    /// Taking `&mut self` keeps two activations from ever interleaving.
    pub async fn activate(
        &mut self,
        id: &LayoutId,
        ui: &UiState,
        on_input: InputBinding,
    ) -> Result<Activation, LayoutError> {
        if self.active_id() == Some(id) {
            tracing::debug!("Layout `{id}` already active");
            return Ok(Activation::AlreadyActive);
        }
        tracing::info!("Activating layout `{id}`");

        let load_error = |source| LayoutError::Load {
            layout: id.clone(),
            source,
        };
        let stylesheet = self.resolver.stylesheet(id).await.map_err(load_error)?;
        let markup = self.resolver.markup(id).await.map_err(load_error)?;
        let size = stylesheet
            .root_size()
            .ok_or_else(|| LayoutError::MissingSize(id.clone()))?;

        self.renderer.set_visible(false);
        // New stylesheet first, old one only once the new one is ready.
        if let Err(e) = self.renderer.attach_stylesheet(&stylesheet).await {
            self.renderer.set_visible(true);
            return Err(load_error(e));
        }
        if let Some(previous) = &self.active {
            self.renderer.detach_stylesheet(&previous.id);
        }

        let handles = self.renderer.mount_layout(&markup, on_input);
        self.registry = ControlRegistry::from_handles(handles);
        self.restore(ui);
        self.report_size(size);
        if self.capabilities.mobile {
            self.rezoom();
        }
        self.renderer.set_visible(true);

        self.active = Some(ActiveLayout {
            id: id.clone(),
            show_status: markup.show_status,
            size,
        });
        self.swaps += 1;
        Ok(Activation::Swapped(size))
    }

    /// Puts every known value back onto the mounted controls.
    pub fn restore(&self, ui: &UiState) {
        if self.registry.is_empty() {
            return;
        }
        let restored = ui
            .iter()
            .filter(|(id, value)| self.registry.set_value(id, **value))
            .count();
        tracing::debug!("Restored {restored} control value(s)");
    }

    pub fn collapse(&mut self) {
        self.set_collapsed(true);
    }

    pub fn expand(&mut self) {
        self.set_collapsed(false);
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
        self.renderer.set_collapsed(collapsed);
    }

    pub fn on_viewport_resized(&self) {
        if self.capabilities.mobile {
            self.rezoom();
        }
    }

    fn report_size(&self, size: ViewportSize) {
        if !self.capabilities.plugin {
            return;
        }
        let k = self.capabilities.pixel_ratio;
        let width = (k * f64::from(size.width)).round() as u32;
        let height = (k * f64::from(size.height)).round() as u32;
        tracing::debug!("Requesting host view size {width}x{height}");
        self.host.set_size(width, height);
    }

    fn rezoom(&self) {
        let (width, height) = self.renderer.window_size();
        self.renderer.apply_zoom(zoom::zoom_for(width, height));
    }
}
