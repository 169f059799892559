use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::dialog::DialogContent;
use crate::layout::resource::{Markup, Stylesheet};
use crate::layout::zoom::Zoom;
use crate::layout::LayoutId;
use crate::midi::control::{ControlId, ControlValue};

pub mod headless;

/// Called by the rendering layer whenever the user moves a control.
pub type InputBinding = Arc<dyn Fn(ControlId, ControlValue) + Send + Sync + 'static>;

pub type SharedRenderer = Arc<dyn RenderSurface + Send + Sync + 'static>;

/// A rendered control. Opaque apart from its value.
pub trait Control: Send + Sync {
    fn value(&self) -> Option<ControlValue>;
    fn set_value(&self, value: ControlValue);
}

#[derive(Clone)]
pub struct ControlHandle {
    pub id: ControlId,
    /// Display name, used by the status line.
    pub name: String,
    pub control: Arc<dyn Control>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Enter,
    Exit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusLine {
    pub text: String,
    /// Level bar for continuous values, 0..=1.
    pub level: Option<f64>,
    pub error: bool,
}

impl StatusLine {
    /// `name` padded to 10 columns followed by `value` right-aligned in 4.
    pub fn control(name: &str, value: &str, level: Option<f64>) -> StatusLine {
        StatusLine {
            text: format!("{name:<10}{value:>4}"),
            level,
            error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> StatusLine {
        StatusLine {
            text: text.into(),
            level: None,
            error: true,
        }
    }
}

/// The visual layer. Everything here is fire-and-forget except stylesheet
/// attachment, which resolves once the stylesheet is ready to style content.
#[async_trait]
pub trait RenderSurface {
    async fn attach_stylesheet(&self, sheet: &Stylesheet) -> anyhow::Result<()>;
    fn detach_stylesheet(&self, layout: &LayoutId);
    /// Replaces the mounted layout subtree and returns the controls it contains.
    fn mount_layout(&self, markup: &Markup, on_input: InputBinding) -> Vec<ControlHandle>;
    fn set_visible(&self, visible: bool);
    fn set_collapsed(&self, collapsed: bool);

    fn window_size(&self) -> (f64, f64);
    fn apply_zoom(&self, zoom: Zoom);

    fn show_status(&self, line: &StatusLine);
    fn hide_status(&self);

    fn mount_dialog(&self, content: &DialogContent);
    fn begin_transition(&self, transition: Transition, duration: Duration);
    fn unmount_dialog(&self);
}
