use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::midi::control::ControlId;
use crate::midi::registry::model::{MappingEntry, MappingRegistry};

/// One mapping entry per instantiated control. Ordered so that the persisted
/// form is stable and equal tables serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable(BTreeMap<ControlId, MappingEntry>);

impl MappingTable {
    pub fn new() -> MappingTable {
        MappingTable(BTreeMap::new())
    }

    pub fn insert(&mut self, id: ControlId, entry: MappingEntry) -> Option<MappingEntry> {
        self.0.insert(id, entry)
    }

    pub fn remove(&mut self, id: &ControlId) -> Option<MappingEntry> {
        self.0.remove(id)
    }

    pub fn contains(&self, id: &ControlId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControlId, &MappingEntry)> {
        self.0.iter()
    }
}

impl MappingRegistry for MappingTable {
    fn get(&self, id: &ControlId) -> Option<MappingEntry> {
        self.0.get(id).copied()
    }
}

impl FromIterator<(ControlId, MappingEntry)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (ControlId, MappingEntry)>>(iter: I) -> Self {
        MappingTable(iter.into_iter().collect())
    }
}
