use crate::midi::control::{ControlId, DescriptorTable};
use crate::midi::mapping::{self, MappingEdit, StatusType};
use crate::midi::model::{Channel, DataByte};
use crate::midi::registry::inmem::MappingTable;
use crate::midi::registry::model::MappingRegistry;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("No mapping row for `{0}`.")]
    UnknownRow(ControlId),
    #[error("Channel {0} is out of range, expected 0..=15.")]
    Channel(u8),
    #[error("Index {0} is out of range, expected 0..=127.")]
    Index(u8),
    #[error("`{0}` is continuous and can only be mapped as CC.")]
    Locked(ControlId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingRow {
    pub id: ControlId,
    /// `"Knob 3"`
    pub label: String,
    pub status_type: StatusType,
    pub channel: Channel,
    pub index: DataByte,
    /// Continuous controls: status type cannot be changed.
    pub locked: bool,
}

/// Working copy of the mapping while the editor is open. Rows hold only
/// values that already passed range checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingEditor {
    rows: Vec<MappingRow>,
}

impl MappingEditor {
    pub fn new(descriptors: &DescriptorTable, map: &MappingTable) -> MappingEditor {
        let rows = descriptors
            .descriptors()
            .iter()
            .flat_map(|desc| {
                desc.control_ids().map(move |(i, id)| {
                    let entry = map
                        .get(&id)
                        .unwrap_or_else(|| mapping::default_entry(desc, i));
                    let edit = MappingEdit::from_entry(id, &entry);
                    MappingRow {
                        id: edit.id,
                        label: desc.label(i),
                        status_type: edit.status_type,
                        channel: edit.channel,
                        index: edit.index,
                        locked: desc.continuous,
                    }
                })
            })
            .collect();
        MappingEditor { rows }
    }

    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }

    pub fn row(&self, id: &ControlId) -> Option<&MappingRow> {
        self.rows.iter().find(|row| &row.id == id)
    }

    /// `channel` is 0-based, as the editor shows `Ch 1` for channel 0.
    pub fn edit(
        &mut self,
        id: &ControlId,
        status_type: StatusType,
        channel: u8,
        index: u8,
    ) -> Result<(), EditorError> {
        let channel = Channel::from_u8(channel).ok_or(EditorError::Channel(channel))?;
        let index = DataByte::from_u8(index).ok_or(EditorError::Index(index))?;
        let row = self
            .rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(|| EditorError::UnknownRow(id.clone()))?;
        if row.locked && status_type != row.status_type {
            return Err(EditorError::Locked(id.clone()));
        }

        row.status_type = status_type;
        row.channel = channel;
        row.index = index;
        Ok(())
    }

    /// Full replacement set, one edit per row.
    pub fn edits(&self) -> Vec<MappingEdit> {
        self.rows
            .iter()
            .map(|row| MappingEdit {
                id: row.id.clone(),
                status_type: row.status_type,
                channel: row.channel,
                index: row.index,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> (DescriptorTable, MappingTable, MappingEditor) {
        let descriptors = DescriptorTable::builtin();
        let map = mapping::build_default(&descriptors);
        let editor = MappingEditor::new(&descriptors, &map);
        (descriptors, map, editor)
    }

    #[test]
    fn rows_mirror_descriptors_and_map() {
        let (_, _, editor) = editor();
        assert_eq!(editor.rows().len(), 40);

        let knob = editor.row(&"k-03".into()).unwrap();
        assert_eq!(knob.label, "Knob 3");
        assert_eq!(knob.status_type, StatusType::ControlChange);
        assert!(knob.locked);

        let button = editor.row(&"b-01".into()).unwrap();
        assert_eq!(button.status_type, StatusType::Note);
        assert_eq!(button.index.as_u8(), 0x10);
        assert!(!button.locked);
    }

    #[test]
    fn out_of_range_edits_are_rejected() {
        let (_, _, mut editor) = editor();
        let id = ControlId::from("b-01");
        assert_eq!(
            editor.edit(&id, StatusType::Note, 16, 0),
            Err(EditorError::Channel(16))
        );
        assert_eq!(
            editor.edit(&id, StatusType::Note, 0, 128),
            Err(EditorError::Index(128))
        );
        assert_eq!(
            editor.edit(&"k-01".into(), StatusType::Note, 0, 0),
            Err(EditorError::Locked("k-01".into()))
        );
        assert!(editor.edit(&"k-01".into(), StatusType::ControlChange, 3, 7).is_ok());
    }

    #[test]
    fn untouched_editor_reproduces_the_map() {
        let (descriptors, map, editor) = editor();
        assert_eq!(mapping::apply_edits(&descriptors, &map, editor.edits()), map);
    }

    #[test]
    fn edits_flow_into_the_table() {
        let (descriptors, map, mut editor) = editor();
        editor
            .edit(&"b-02".into(), StatusType::ControlChange, 1, 64)
            .unwrap();
        let next = mapping::apply_edits(&descriptors, &map, editor.edits());
        let entry = next.get(&"b-02".into()).unwrap();
        assert_eq!(entry.status_on.as_u8(), 0xB1);
        assert_eq!(entry.status_off, None);
        assert_eq!(entry.index.as_u8(), 64);
    }
}
