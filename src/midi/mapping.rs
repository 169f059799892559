use serde::{Deserialize, Serialize};

use crate::midi::control::{ControlDescriptor, ControlId, ControlValue, DescriptorTable};
use crate::midi::model::{Channel, DataByte, MidiMessage, Status};
use crate::midi::registry::inmem::MappingTable;
use crate::midi::registry::model::{MappingEntry, MappingRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusType {
    #[serde(rename = "note")]
    Note,
    #[serde(rename = "cc")]
    ControlChange,
}

/// One row of the mapping editor, already range-checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingEdit {
    pub id: ControlId,
    pub status_type: StatusType,
    pub channel: Channel,
    pub index: DataByte,
}

impl MappingEdit {
    /// The edit that reproduces `entry` unchanged.
    pub fn from_entry(id: ControlId, entry: &MappingEntry) -> MappingEdit {
        MappingEdit {
            id,
            status_type: if entry.is_note() {
                StatusType::Note
            } else {
                StatusType::ControlChange
            },
            channel: entry.status_on.channel(),
            index: entry.index,
        }
    }
}

/// Bytes to send for one control change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedEvent {
    pub status: Status,
    pub index: DataByte,
    pub data_byte: DataByte,
}

impl From<EncodedEvent> for MidiMessage {
    fn from(ev: EncodedEvent) -> Self {
        MidiMessage {
            status: ev.status,
            fst_data_byte: ev.index,
            snd_data_byte: ev.data_byte,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("Control `{0}` has no descriptor or mapping entry.")]
pub struct UnknownControl(pub ControlId);

/// Single rule shared by default-building and editing.
pub fn entry_for(status_type: StatusType, channel: Channel, index: DataByte) -> MappingEntry {
    match status_type {
        StatusType::ControlChange => MappingEntry {
            status_on: Status::control_change(channel),
            status_off: None,
            index,
        },
        StatusType::Note => MappingEntry {
            status_on: Status::note_on(channel),
            status_off: Some(Status::note_off(channel)),
            index,
        },
    }
}

fn default_status_type(desc: &ControlDescriptor) -> StatusType {
    if desc.continuous {
        StatusType::ControlChange
    } else {
        StatusType::Note
    }
}

pub fn default_entry(desc: &ControlDescriptor, i: u8) -> MappingEntry {
    entry_for(default_status_type(desc), desc.channel(), desc.default_index(i))
}

pub fn build_default(descriptors: &DescriptorTable) -> MappingTable {
    descriptors
        .descriptors()
        .iter()
        .flat_map(|desc| {
            desc.control_ids()
                .map(move |(i, id)| (id, default_entry(desc, i)))
        })
        .collect()
}

pub fn encode<R: MappingRegistry + ?Sized>(
    descriptors: &DescriptorTable,
    registry: &R,
    id: &ControlId,
    value: ControlValue,
) -> Result<EncodedEvent, UnknownControl> {
    let unknown = || UnknownControl(id.clone());
    let desc = descriptors.resolve(id).ok_or_else(unknown)?;
    let entry = registry.get(id).ok_or_else(unknown)?;

    if desc.continuous {
        // A continuous control is always CC, whatever the stored kind.
        let status = Status::control_change(entry.status_on.channel());
        return Ok(EncodedEvent {
            status,
            index: entry.index,
            data_byte: DataByte::from_unit(value.as_unit()),
        });
    }

    let (status, data_byte) = if value.is_on() {
        (entry.status_on, DataByte::MAX)
    } else {
        (entry.status_off.unwrap_or(entry.status_on), DataByte::MIN)
    };
    Ok(EncodedEvent {
        status,
        index: entry.index,
        data_byte,
    })
}

/// Returns a new table where every edited id is rebuilt from its edit.
/// Continuous controls are forced to CC. Edits for ids the descriptors don't
/// know are dropped.
pub fn apply_edits<I>(descriptors: &DescriptorTable, table: &MappingTable, edits: I) -> MappingTable
where
    I: IntoIterator<Item = MappingEdit>,
{
    let mut next = table.clone();
    for edit in edits {
        let Some(desc) = descriptors.resolve(&edit.id) else {
            tracing::warn!("Ignoring mapping edit for unknown control `{}`", edit.id);
            continue;
        };
        let status_type = if desc.continuous {
            StatusType::ControlChange
        } else {
            edit.status_type
        };
        next.insert(edit.id, entry_for(status_type, edit.channel, edit.index));
    }
    next
}

/// Brings a loaded table in line with the descriptor table. Returns the
/// repaired table and whether anything had to change.
pub fn reconcile(descriptors: &DescriptorTable, table: MappingTable) -> (MappingTable, bool) {
    let mut repaired = false;
    let mut next = MappingTable::new();

    for desc in descriptors.descriptors() {
        for (i, id) in desc.control_ids() {
            let entry = match table.get(&id) {
                Some(entry) if desc.continuous && entry.is_note() => {
                    repaired = true;
                    entry_for(
                        StatusType::ControlChange,
                        entry.status_on.channel(),
                        entry.index,
                    )
                }
                Some(entry) => entry,
                None => {
                    repaired = true;
                    default_entry(desc, i)
                }
            };
            next.insert(id, entry);
        }
    }

    if next.len() != table.len() {
        repaired = true;
    }
    (next, repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::model::StatusKind;

    fn knobs_and_buttons() -> DescriptorTable {
        DescriptorTable::new(vec![
            ControlDescriptor::new("Knob", "k", 16, true, 0, 1),
            ControlDescriptor::new("Button", "b", 16, false, 0, 1),
        ])
        .unwrap()
    }

    #[test]
    fn default_table_covers_every_control() {
        let descriptors = DescriptorTable::builtin();
        let table = build_default(&descriptors);
        assert_eq!(table.len(), descriptors.total_controls());

        for desc in descriptors.descriptors() {
            let indices: Vec<u8> = desc
                .control_ids()
                .map(|(_, id)| table.get(&id).unwrap().index.as_u8())
                .collect();
            let expected: Vec<u8> = (0..desc.count).map(|i| desc.default_base_index + i).collect();
            assert_eq!(indices, expected);
        }
    }

    #[test]
    fn default_entries_follow_continuity() {
        let table = build_default(&knobs_and_buttons());

        let knob = table.get(&"k-01".into()).unwrap();
        assert_eq!(knob.status_on.as_u8(), 0xB0);
        assert_eq!(knob.status_off, None);
        assert_eq!(knob.index.as_u8(), 0);

        let button = table.get(&"b-01".into()).unwrap();
        assert_eq!(button.status_on.as_u8(), 0x90);
        assert_eq!(button.status_off.map(|s| s.as_u8()), Some(0x80));
        assert_eq!(button.index.as_u8(), 0);
    }

    #[test]
    fn continuous_encoding_is_cc_and_floored() {
        let descriptors = knobs_and_buttons();
        let table = build_default(&descriptors);
        let id = ControlId::from("k-01");

        let full = encode(&descriptors, &table, &id, 1.0.into()).unwrap();
        assert_eq!(
            (full.status.as_u8(), full.index.as_u8(), full.data_byte.as_u8()),
            (0xB0, 0, 127)
        );

        let half = encode(&descriptors, &table, &id, 0.5.into()).unwrap();
        assert_eq!(half.data_byte.as_u8(), 63);

        for v in [-3.0, 0.0, 0.33, 0.999, 1.5] {
            let ev = encode(&descriptors, &table, &id, v.into()).unwrap();
            assert_eq!(ev.status.kind(), StatusKind::ControlChange);
            assert!(ev.data_byte.as_u8() <= 127);
        }
    }

    #[test]
    fn discrete_press_and_release_use_note_on_and_off() {
        let descriptors = knobs_and_buttons();
        let table = build_default(&descriptors);
        let id = ControlId::from("b-01");

        let press = encode(&descriptors, &table, &id, true.into()).unwrap();
        let release = encode(&descriptors, &table, &id, false.into()).unwrap();
        assert_eq!(
            (press.status.as_u8(), press.index.as_u8(), press.data_byte.as_u8()),
            (0x90, 0, 127)
        );
        assert_eq!(
            (release.status.as_u8(), release.index.as_u8(), release.data_byte.as_u8()),
            (0x80, 0, 0)
        );
    }

    #[test]
    fn discrete_mapped_as_cc_releases_with_same_status() {
        let descriptors = knobs_and_buttons();
        let table = build_default(&descriptors);
        let edit = MappingEdit {
            id: "b-02".into(),
            status_type: StatusType::ControlChange,
            channel: Channel::from_one_based(2).unwrap(),
            index: DataByte::from_u8(64).unwrap(),
        };
        let table = apply_edits(&descriptors, &table, [edit]);

        let id = ControlId::from("b-02");
        let release = encode(&descriptors, &table, &id, false.into()).unwrap();
        assert_eq!(release.status.as_u8(), 0xB1);
        assert_eq!(release.data_byte.as_u8(), 0);
    }

    #[test]
    fn unknown_controls_fail_to_encode() {
        let descriptors = knobs_and_buttons();
        let table = build_default(&descriptors);
        let err = encode(&descriptors, &table, &"x-01".into(), 1.0.into()).unwrap_err();
        assert_eq!(err, UnknownControl("x-01".into()));

        let mut sparse = table.clone();
        sparse.remove(&"k-02".into());
        assert!(encode(&descriptors, &sparse, &"k-02".into(), 1.0.into()).is_err());
    }

    #[test]
    fn identity_edits_reproduce_defaults() {
        let descriptors = DescriptorTable::builtin();
        let defaults = build_default(&descriptors);
        let edits: Vec<MappingEdit> = defaults
            .iter()
            .map(|(id, entry)| MappingEdit::from_entry(id.clone(), entry))
            .collect();
        assert_eq!(apply_edits(&descriptors, &defaults, edits), defaults);
    }

    #[test]
    fn continuous_edits_are_forced_to_cc() {
        let descriptors = knobs_and_buttons();
        let defaults = build_default(&descriptors);
        let edit = MappingEdit {
            id: "k-03".into(),
            status_type: StatusType::Note,
            channel: Channel::from_one_based(5).unwrap(),
            index: DataByte::from_u8(99).unwrap(),
        };
        let table = apply_edits(&descriptors, &defaults, [edit]);
        let entry = table.get(&"k-03".into()).unwrap();
        assert_eq!(entry.status_on.as_u8(), 0xB4);
        assert_eq!(entry.status_off, None);
        assert_eq!(entry.index.as_u8(), 99);
    }

    #[test]
    fn reconcile_fills_drops_and_forces_cc() {
        let descriptors = knobs_and_buttons();
        let defaults = build_default(&descriptors);
        let (same, repaired) = reconcile(&descriptors, defaults.clone());
        assert!(!repaired);
        assert_eq!(same, defaults);

        let mut broken = defaults.clone();
        broken.remove(&"b-07".into());
        broken.insert("z-01".into(), default_entry(&descriptors.descriptors()[1], 0));
        broken.insert(
            "k-01".into(),
            entry_for(StatusType::Note, Channel::FIRST, DataByte::MIN),
        );
        let (fixed, repaired) = reconcile(&descriptors, broken);
        assert!(repaired);
        assert_eq!(fixed, defaults);
    }
}
