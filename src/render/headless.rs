use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::dialog::DialogContent;
use crate::layout::resource::{Markup, Stylesheet};
use crate::layout::zoom::Zoom;
use crate::layout::LayoutId;
use crate::midi::control::{ControlId, ControlValue};
use crate::render::{
    Control, ControlHandle, InputBinding, RenderSurface, StatusLine, Transition,
};

#[derive(Default)]
pub struct HeadlessControl {
    value: Mutex<Option<ControlValue>>,
}

impl Control for HeadlessControl {
    fn value(&self) -> Option<ControlValue> {
        self.value.lock().ok().and_then(|value| *value)
    }

    fn set_value(&self, value: ControlValue) {
        if let Ok(mut current) = self.value.lock() {
            *current = Some(value);
        }
    }
}

struct Scene {
    stylesheets: Vec<LayoutId>,
    controls: HashMap<ControlId, Arc<HeadlessControl>>,
    on_input: Option<InputBinding>,
    visible: bool,
    collapsed: bool,
    window: (f64, f64),
    zoom: Option<Zoom>,
    status: Option<StatusLine>,
    dialog: Option<DialogContent>,
    transitions: Vec<Transition>,
    failing: HashSet<LayoutId>,
}

/// Renders nothing, remembers everything. Used by tests and by the binary
/// when no real view is attached.
pub struct HeadlessRenderer {
    scene: Mutex<Scene>,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        HeadlessRenderer::new()
    }
}

impl HeadlessRenderer {
    pub fn new() -> HeadlessRenderer {
        HeadlessRenderer {
            scene: Mutex::new(Scene {
                stylesheets: Vec::new(),
                controls: HashMap::new(),
                on_input: None,
                visible: true,
                collapsed: false,
                window: (800.0, 540.0),
                zoom: None,
                status: None,
                dialog: None,
                transitions: Vec::new(),
                failing: HashSet::new(),
            }),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Scene) -> T) -> Option<T> {
        self.scene.lock().ok().map(|scene| f(&scene))
    }

    fn write(&self, f: impl FnOnce(&mut Scene)) {
        if let Ok(mut scene) = self.scene.lock() {
            f(&mut scene);
        }
    }

    /// Acts as if the user moved the control. Returns false if no such control is mounted.
    pub fn simulate_input(&self, id: &ControlId, value: ControlValue) -> bool {
        let found = self.read(|scene| {
            scene
                .controls
                .get(id)
                .cloned()
                .zip(scene.on_input.clone())
        });
        let Some(Some((control, on_input))) = found else {
            return false;
        };
        control.set_value(value);
        on_input(id.clone(), value);
        true
    }

    pub fn fail_stylesheet(&self, layout: &str) {
        self.write(|scene| {
            scene.failing.insert(LayoutId::from(layout));
        });
    }

    pub fn set_window_size(&self, width: f64, height: f64) {
        self.write(|scene| scene.window = (width, height));
    }

    pub fn control_value(&self, id: &ControlId) -> Option<ControlValue> {
        self.read(|scene| scene.controls.get(id).and_then(|control| control.value()))
            .flatten()
    }

    pub fn control_count(&self) -> usize {
        self.read(|scene| scene.controls.len()).unwrap_or(0)
    }

    pub fn stylesheets(&self) -> Vec<LayoutId> {
        self.read(|scene| scene.stylesheets.clone())
            .unwrap_or_default()
    }

    pub fn is_visible(&self) -> bool {
        self.read(|scene| scene.visible).unwrap_or(false)
    }

    pub fn is_collapsed(&self) -> bool {
        self.read(|scene| scene.collapsed).unwrap_or(false)
    }

    pub fn zoom(&self) -> Option<Zoom> {
        self.read(|scene| scene.zoom).flatten()
    }

    pub fn status(&self) -> Option<StatusLine> {
        self.read(|scene| scene.status.clone()).flatten()
    }

    pub fn dialog(&self) -> Option<DialogContent> {
        self.read(|scene| scene.dialog.clone()).flatten()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.read(|scene| scene.transitions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RenderSurface for HeadlessRenderer {
    async fn attach_stylesheet(&self, sheet: &Stylesheet) -> anyhow::Result<()> {
        let failing = self
            .read(|scene| scene.failing.contains(&sheet.layout))
            .unwrap_or(false);
        if failing {
            anyhow::bail!("stylesheet for `{}` failed to load", sheet.layout);
        }
        tracing::debug!("Attached stylesheet for `{}`", sheet.layout);
        self.write(|scene| scene.stylesheets.push(sheet.layout.clone()));
        Ok(())
    }

    fn detach_stylesheet(&self, layout: &LayoutId) {
        self.write(|scene| scene.stylesheets.retain(|attached| attached != layout));
    }

    fn mount_layout(&self, markup: &Markup, on_input: InputBinding) -> Vec<ControlHandle> {
        let handles: Vec<(ControlHandle, Arc<HeadlessControl>)> = markup
            .controls
            .iter()
            .map(|spec| {
                let control = Arc::new(HeadlessControl::default());
                let handle = ControlHandle {
                    id: spec.id.clone(),
                    name: spec.name.clone(),
                    control: control.clone(),
                };
                (handle, control)
            })
            .collect();

        self.write(|scene| {
            scene.controls = handles
                .iter()
                .map(|(handle, control)| (handle.id.clone(), control.clone()))
                .collect();
            scene.on_input = Some(on_input);
        });
        tracing::debug!("Mounted {} control(s)", handles.len());
        handles.into_iter().map(|(handle, _)| handle).collect()
    }

    fn set_visible(&self, visible: bool) {
        self.write(|scene| scene.visible = visible);
    }

    fn set_collapsed(&self, collapsed: bool) {
        self.write(|scene| scene.collapsed = collapsed);
    }

    fn window_size(&self) -> (f64, f64) {
        self.read(|scene| scene.window).unwrap_or((0.0, 0.0))
    }

    fn apply_zoom(&self, zoom: Zoom) {
        self.write(|scene| scene.zoom = Some(zoom));
    }

    fn show_status(&self, line: &StatusLine) {
        self.write(|scene| scene.status = Some(line.clone()));
    }

    fn hide_status(&self) {
        self.write(|scene| scene.status = None);
    }

    fn mount_dialog(&self, content: &DialogContent) {
        self.write(|scene| scene.dialog = Some(content.clone()));
    }

    fn begin_transition(&self, transition: Transition, _duration: Duration) {
        self.write(|scene| scene.transitions.push(transition));
    }

    fn unmount_dialog(&self) {
        self.write(|scene| scene.dialog = None);
    }
}
