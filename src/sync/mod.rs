//! Reconciles the two persisted blobs, `config` and `ui`, which arrive
//! independently and in any order, and decides when the surface may render.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::layout::LayoutId;
use crate::midi::control::{ControlId, ControlValue, DescriptorTable};
use crate::midi::mapping;
use crate::midi::registry::inmem::MappingTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKey {
    Config,
    Ui,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Config => "config",
            StateKey::Ui => "ui",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(StateKey::Config),
            "ui" => Ok(StateKey::Ui),
            other => Err(SyncError::UnknownKey(other.to_string())),
        }
    }
}

/// Persisted settings shared by every connected view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub layout: LayoutId,
    pub map: MappingTable,
    pub collapsed: bool,
}

/// Lenient shape of a stored configuration; older blobs may lack fields.
#[derive(Deserialize)]
struct StoredConfiguration {
    layout: Option<LayoutId>,
    map: Option<MappingTable>,
    collapsed: Option<bool>,
}

impl Configuration {
    pub fn defaults(descriptors: &DescriptorTable, default_layout: &LayoutId) -> Configuration {
        Configuration {
            layout: default_layout.clone(),
            map: mapping::build_default(descriptors),
            collapsed: false,
        }
    }

    /// Parses a stored blob. The flag tells whether gaps had to be filled or
    /// the mapping repaired, in which case the result should be persisted.
    pub fn from_blob(
        blob: &str,
        descriptors: &DescriptorTable,
        default_layout: &LayoutId,
    ) -> Result<(Configuration, bool), serde_json::Error> {
        let stored: StoredConfiguration = serde_json::from_str(blob)?;
        let mut repaired = stored.layout.is_none() || stored.collapsed.is_none();
        let map = match stored.map {
            Some(map) => {
                let (map, map_repaired) = mapping::reconcile(descriptors, map);
                repaired |= map_repaired;
                map
            }
            None => {
                repaired = true;
                mapping::build_default(descriptors)
            }
        };
        Ok((
            Configuration {
                layout: stored.layout.unwrap_or_else(|| default_layout.clone()),
                map,
                collapsed: stored.collapsed.unwrap_or(false),
            },
            repaired,
        ))
    }

    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Current value of every control the user has touched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiState(BTreeMap<ControlId, ControlValue>);

impl UiState {
    pub fn get(&self, id: &ControlId) -> Option<ControlValue> {
        self.0.get(id).copied()
    }

    pub fn set(&mut self, id: ControlId, value: ControlValue) {
        self.0.insert(id, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControlId, &ControlValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration has not been delivered yet.")]
    NotLoaded,
    #[error("Unknown state key `{0}`.")]
    UnknownKey(String),
    #[error("State could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the surface has to do after a state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEffect {
    Persist { key: StateKey, blob: String },
    /// Both blobs are in: activate the configured layout for the first time.
    FirstRender,
    ActivateLayout(LayoutId),
    MappingChanged,
    CollapsedChanged(bool),
    /// UiState was replaced from outside; push it onto the controls.
    RestoreUi,
}

pub struct SyncCoordinator {
    descriptors: Arc<DescriptorTable>,
    default_layout: LayoutId,
    config: Option<Configuration>,
    ui: UiState,
    ui_delivered: bool,
    rendered: bool,
}

impl SyncCoordinator {
    pub fn new(descriptors: Arc<DescriptorTable>, default_layout: LayoutId) -> SyncCoordinator {
        SyncCoordinator {
            descriptors,
            default_layout,
            config: None,
            ui: UiState::default(),
            ui_delivered: false,
            rendered: false,
        }
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui
    }

    pub fn is_ready(&self) -> bool {
        self.config.is_some() && self.ui_delivered
    }

    pub fn has_rendered(&self) -> bool {
        self.rendered
    }

    pub fn state_changed(&mut self, key: StateKey, value: &str) -> Vec<SyncEffect> {
        let mut effects = match key {
            StateKey::Config => self.config_delivered(value),
            StateKey::Ui => self.ui_delivered(value),
        };

        if self.is_ready() && !self.rendered {
            self.rendered = true;
            tracing::info!("Configuration and UI state loaded");
            effects.push(SyncEffect::FirstRender);
        }
        effects
    }

    /// Applies `mutator` to a copy of the configuration and, if anything
    /// changed, persists the whole result.
    pub fn commit_config<F>(&mut self, mutator: F) -> Result<Vec<SyncEffect>, SyncError>
    where
        F: FnOnce(&mut Configuration),
    {
        let current = self.config.as_ref().ok_or(SyncError::NotLoaded)?;
        let mut next = current.clone();
        mutator(&mut next);
        if &next == current {
            tracing::debug!("Configuration commit changed nothing");
            return Ok(Vec::new());
        }

        let blob = next.to_blob()?;
        let mut effects = vec![SyncEffect::Persist {
            key: StateKey::Config,
            blob,
        }];
        effects.extend(self.replace_config(next));
        Ok(effects)
    }

    /// UiState is updated here first, before anything else sees the change.
    pub fn record_control_value(
        &mut self,
        id: ControlId,
        value: ControlValue,
    ) -> Result<SyncEffect, SyncError> {
        self.ui.set(id, value);
        Ok(SyncEffect::Persist {
            key: StateKey::Ui,
            blob: serde_json::to_string(&self.ui)?,
        })
    }

    /// Value pushed by another view, which has already persisted it.
    pub fn apply_control_value(&mut self, id: ControlId, value: ControlValue) {
        self.ui.set(id, value);
    }

    fn config_delivered(&mut self, value: &str) -> Vec<SyncEffect> {
        let parsed = if value.trim().is_empty() {
            None
        } else {
            Configuration::from_blob(value, &self.descriptors, &self.default_layout)
                .map_err(|e| tracing::warn!("Discarding malformed configuration: {e}"))
                .ok()
        };

        match parsed {
            Some((config, repaired)) => {
                let mut effects = Vec::new();
                if repaired {
                    tracing::warn!("Stored configuration was incomplete, persisting repaired copy");
                    effects.extend(self.persist_config(&config));
                }
                if self.config.as_ref() == Some(&config) {
                    return effects;
                }
                effects.extend(self.replace_config(config));
                effects
            }
            None => {
                // First run or corrupt blob: keep what we have, else start from defaults.
                let config = match self.config.take() {
                    Some(current) => current,
                    None => {
                        tracing::info!("No stored configuration, building defaults");
                        Configuration::defaults(&self.descriptors, &self.default_layout)
                    }
                };
                let effects = self.persist_config(&config);
                self.config = Some(config);
                effects
            }
        }
    }

    fn ui_delivered(&mut self, value: &str) -> Vec<SyncEffect> {
        let first = !self.ui_delivered;
        self.ui_delivered = true;

        let (ui, heal) = if value.trim().is_empty() {
            (UiState::default(), false)
        } else {
            match serde_json::from_str::<UiState>(value) {
                Ok(ui) => (ui, false),
                Err(e) => {
                    tracing::warn!("Discarding malformed UI state: {e}");
                    (UiState::default(), true)
                }
            }
        };

        let mut effects = Vec::new();
        if heal {
            match serde_json::to_string(&ui) {
                Ok(blob) => effects.push(SyncEffect::Persist {
                    key: StateKey::Ui,
                    blob,
                }),
                Err(e) => tracing::warn!("Could not serialize UI state: {e}"),
            }
        }
        if !first && ui == self.ui {
            return effects;
        }
        self.ui = ui;
        if self.rendered {
            effects.push(SyncEffect::RestoreUi);
        }
        effects
    }

    fn persist_config(&self, config: &Configuration) -> Vec<SyncEffect> {
        match config.to_blob() {
            Ok(blob) => vec![SyncEffect::Persist {
                key: StateKey::Config,
                blob,
            }],
            Err(e) => {
                tracing::warn!("Could not serialize configuration: {e}");
                Vec::new()
            }
        }
    }

    /// Stores `next` and reports what differs from the previous value.
    fn replace_config(&mut self, next: Configuration) -> Vec<SyncEffect> {
        let previous = self.config.replace(next);
        let (Some(previous), Some(next), true) = (previous, self.config.as_ref(), self.rendered)
        else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if previous.layout != next.layout {
            effects.push(SyncEffect::ActivateLayout(next.layout.clone()));
        }
        if previous.map != next.map {
            effects.push(SyncEffect::MappingChanged);
        }
        if previous.collapsed != next.collapsed {
            effects.push(SyncEffect::CollapsedChanged(next.collapsed));
        }
        effects
    }
}
