use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::layout::LayoutId;
use crate::midi::control::DescriptorTable;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusTimings {
    pub debounce_ms: u64,
    pub hide_after_ms: u64,
}

impl Default for StatusTimings {
    fn default() -> Self {
        StatusTimings {
            debounce_ms: 20,
            hide_after_ms: 1500,
        }
    }
}

impl StatusTimings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hide_after(&self) -> Duration {
        Duration::from_millis(self.hide_after_ms)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DialogTimings {
    pub enter_ms: u64,
    pub exit_ms: u64,
}

impl Default for DialogTimings {
    fn default() -> Self {
        DialogTimings {
            enter_ms: 200,
            exit_ms: 100,
        }
    }
}

impl DialogTimings {
    pub fn enter(&self) -> Duration {
        Duration::from_millis(self.enter_ms)
    }

    pub fn exit(&self) -> Duration {
        Duration::from_millis(self.exit_ms)
    }
}

/// Product-build settings. Immutable once loaded and shared by every surface.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub product_version: String,
    pub homepage: Option<String>,
    pub default_layout: LayoutId,
    /// Layouts offered by the layout picker, in display order.
    pub layouts: Vec<LayoutId>,
    pub controls: DescriptorTable,
    pub status: StatusTimings,
    pub dialog: DialogTimings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            homepage: None,
            default_layout: LayoutId::from("mixer"),
            layouts: vec![LayoutId::from("mixer")],
            controls: DescriptorTable::builtin(),
            status: StatusTimings::default(),
            dialog: DialogTimings::default(),
        }
    }
}

impl Settings {
    /// Layouts for the picker; always contains the default layout.
    pub fn pickable_layouts(&self) -> Vec<LayoutId> {
        let mut layouts = self.layouts.clone();
        if !layouts.contains(&self.default_layout) {
            layouts.insert(0, self.default_layout.clone());
        }
        layouts
    }
}

/// Facts about the environment the surface runs in, read once at startup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capabilities {
    /// Embedded in a plugin host, as opposed to a remote browser-like view.
    pub plugin: bool,
    /// Development/standalone run.
    pub dev: bool,
    /// Rendering surface needs the height-based rescale.
    pub mobile: bool,
    pub pixel_ratio: f64,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            plugin: false,
            dev: false,
            mobile: false,
            pixel_ratio: 1.0,
        }
    }
}

pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Settings> {
    let conf_file = std::fs::File::open(path)?;
    // Merge keys (`<<: *anchor`) are not applied by serde_yaml on its own.
    let mut yaml_value: serde_yaml::Value = serde_yaml::from_reader(conf_file)?;
    yaml_value.apply_merge()?;
    Ok(serde_yaml::from_value(yaml_value)?)
}
