use serde::{Deserialize, Serialize};
use std::fmt;

use crate::midi::model::{Channel, DataByte};

/// Static metadata for one family of controls (all knobs, all buttons, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub name: String,
    pub id_prefix: String,
    pub count: u8,
    pub continuous: bool,
    pub default_base_index: u8,
    /// 1-based, as shown to users.
    pub default_channel: u8,
}

impl ControlDescriptor {
    pub fn new(
        name: &str,
        id_prefix: &str,
        count: u8,
        continuous: bool,
        default_base_index: u8,
        default_channel: u8,
    ) -> ControlDescriptor {
        ControlDescriptor {
            name: name.to_string(),
            id_prefix: id_prefix.to_string(),
            count,
            continuous,
            default_base_index,
            default_channel,
        }
    }

    pub fn channel(&self) -> Channel {
        // Validated by DescriptorTable::new; hand-built descriptors fall back to channel 1.
        Channel::from_one_based(self.default_channel).unwrap_or(Channel::FIRST)
    }

    /// Default index for the control at 0-based position `i`.
    pub fn default_index(&self, i: u8) -> DataByte {
        DataByte::from_u8(self.default_base_index.saturating_add(i)).unwrap_or(DataByte::MAX)
    }

    pub fn control_id(&self, i: u8) -> ControlId {
        ControlId::new(&self.id_prefix, i)
    }

    pub fn control_ids(&self) -> impl Iterator<Item = (u8, ControlId)> + '_ {
        (0..self.count).map(move |i| (i, self.control_id(i)))
    }

    /// Label used by the mapping editor, `"Knob 3"`.
    pub fn label(&self, i: u8) -> String {
        format!("{} {}", self.name, u16::from(i) + 1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

impl ControlId {
    /// `prefix-NN` where NN is the 1-based position padded to two digits.
    pub fn new(prefix: &str, i: u8) -> ControlId {
        ControlId(format!("{}-{:02}", prefix, u16::from(i) + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once('-').map(|(prefix, _)| prefix)
    }

    /// 1-based position encoded in the id.
    pub fn ordinal(&self) -> Option<u16> {
        self.0
            .split_once('-')
            .and_then(|(_, n)| n.parse::<u16>().ok())
    }
}

impl From<&str> for ControlId {
    fn from(value: &str) -> Self {
        ControlId(value.to_string())
    }
}

impl From<String> for ControlId {
    fn from(value: String) -> Self {
        ControlId(value)
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw value of a control: a unit-range number for continuous controls, a
/// boolean-like value for discrete ones.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Number(f64),
}

impl ControlValue {
    pub fn is_on(&self) -> bool {
        match *self {
            ControlValue::Bool(b) => b,
            ControlValue::Number(n) => n != 0.0 && !n.is_nan(),
        }
    }

    pub fn as_unit(&self) -> f64 {
        match *self {
            ControlValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            ControlValue::Number(n) => n,
        }
    }

    /// Human readable value, `"50%"` for continuous controls and `"ON"`/`"OFF"` otherwise.
    pub fn display(&self, continuous: bool) -> String {
        if continuous {
            format!("{}%", (100.0 * self.as_unit()).round())
        } else if self.is_on() {
            "ON".to_string()
        } else {
            "OFF".to_string()
        }
    }
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        ControlValue::Bool(value)
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        ControlValue::Number(value)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Descriptor `{0}` has an empty prefix or one containing '-'.")]
    BadPrefix(String),
    #[error("Prefix `{0}` is used by more than one descriptor.")]
    DuplicatePrefix(String),
    #[error("Descriptor `{0}` declares no controls.")]
    Empty(String),
    #[error("Descriptor `{0}` maps past MIDI index 127.")]
    IndexOverflow(String),
    #[error("Descriptor `{name}` uses channel {channel}, expected 1..=16.")]
    BadChannel { name: String, channel: u8 },
}

/// Validated set of descriptors, defined once per build and shared read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ControlDescriptor>", into = "Vec<ControlDescriptor>")]
pub struct DescriptorTable(Vec<ControlDescriptor>);

impl DescriptorTable {
    pub fn new(descriptors: Vec<ControlDescriptor>) -> Result<DescriptorTable, DescriptorError> {
        for (pos, desc) in descriptors.iter().enumerate() {
            if desc.id_prefix.is_empty() || desc.id_prefix.contains('-') {
                return Err(DescriptorError::BadPrefix(desc.name.clone()));
            }
            if descriptors[..pos]
                .iter()
                .any(|other| other.id_prefix == desc.id_prefix)
            {
                return Err(DescriptorError::DuplicatePrefix(desc.id_prefix.clone()));
            }
            if desc.count == 0 {
                return Err(DescriptorError::Empty(desc.name.clone()));
            }
            if u16::from(desc.default_base_index) + u16::from(desc.count) - 1
                > u16::from(DataByte::MAX.as_u8())
            {
                return Err(DescriptorError::IndexOverflow(desc.name.clone()));
            }
            if Channel::from_one_based(desc.default_channel).is_none() {
                return Err(DescriptorError::BadChannel {
                    name: desc.name.clone(),
                    channel: desc.default_channel,
                });
            }
        }
        Ok(DescriptorTable(descriptors))
    }

    /// Knobs, buttons and faders on channel 1.
    pub fn builtin() -> DescriptorTable {
        DescriptorTable(vec![
            ControlDescriptor::new("Knob", "k", 16, true, 0x00, 1),
            ControlDescriptor::new("Button", "b", 16, false, 0x10, 1),
            ControlDescriptor::new("Fader", "f", 8, true, 0x20, 1),
        ])
    }

    pub fn descriptors(&self) -> &[ControlDescriptor] {
        &self.0
    }

    /// Descriptor owning `id`. Only the canonical spelling resolves, so
    /// `k-1` or `k-001` never alias `k-01`.
    pub fn resolve(&self, id: &ControlId) -> Option<&ControlDescriptor> {
        let prefix = id.prefix()?;
        let position = id.ordinal()?.checked_sub(1)?;
        let position = u8::try_from(position).ok()?;
        self.0
            .iter()
            .find(|desc| desc.id_prefix == prefix)
            .filter(|desc| position < desc.count && desc.control_id(position) == *id)
    }

    pub fn total_controls(&self) -> usize {
        self.0.iter().map(|desc| usize::from(desc.count)).sum()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        DescriptorTable::builtin()
    }
}

impl TryFrom<Vec<ControlDescriptor>> for DescriptorTable {
    type Error = DescriptorError;

    fn try_from(value: Vec<ControlDescriptor>) -> Result<Self, Self::Error> {
        DescriptorTable::new(value)
    }
}

impl From<DescriptorTable> for Vec<ControlDescriptor> {
    fn from(value: DescriptorTable) -> Self {
        value.0
    }
}
