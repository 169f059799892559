use serde::{Deserialize, Serialize};

use crate::midi::control::ControlId;
use crate::midi::model::{DataByte, Status, StatusKind};

/// Persisted form of an entry, `[statusOn, statusOff | null, index]`.
type PersistedEntry = (u8, Option<u8>, u8);

/// MIDI encoding rule bound to one control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PersistedEntry", try_from = "PersistedEntry")]
pub struct MappingEntry {
    pub status_on: Status,
    /// `None` for CC-mapped controls, which have no explicit off event.
    pub status_off: Option<Status>,
    pub index: DataByte,
}

impl MappingEntry {
    pub fn is_note(&self) -> bool {
        self.status_on.kind() == StatusKind::NoteOn
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingEntryError {
    #[error("Expecting a status byte between 0x80 and 0xFF. Got: {0}.")]
    Status(u8),
    #[error("Expecting a MIDI index between 0 and 127. Got: {0}.")]
    Index(u8),
    #[error("Status 0x{0:02X} is neither Note On nor Control Change.")]
    Kind(u8),
}

impl TryFrom<PersistedEntry> for MappingEntry {
    type Error = MappingEntryError;

    fn try_from((on, off, index): PersistedEntry) -> Result<Self, Self::Error> {
        let status_on = Status::from_u8(on).ok_or(MappingEntryError::Status(on))?;
        if !matches!(
            status_on.kind(),
            StatusKind::NoteOn | StatusKind::ControlChange
        ) {
            return Err(MappingEntryError::Kind(on));
        }
        let status_off = match off {
            Some(off) => Some(Status::from_u8(off).ok_or(MappingEntryError::Status(off))?),
            None => None,
        };
        let index = DataByte::from_u8(index).ok_or(MappingEntryError::Index(index))?;
        Ok(MappingEntry {
            status_on,
            status_off,
            index,
        })
    }
}

impl From<MappingEntry> for PersistedEntry {
    fn from(entry: MappingEntry) -> Self {
        (
            entry.status_on.as_u8(),
            entry.status_off.map(|s| s.as_u8()),
            entry.index.as_u8(),
        )
    }
}

pub trait MappingRegistry {
    fn get(&self, id: &ControlId) -> Option<MappingEntry>;
}
