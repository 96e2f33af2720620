use crate::types::ClientRecord;
use std::collections::BTreeSet;

/// The client table for one session. Never mutated after loading.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<ClientRecord>,
}

impl RecordStore {
    pub fn new(records: Vec<ClientRecord>) -> Self {
        RecordStore { records }
    }

    pub fn records(&self) -> &[ClientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct, sorted representatives of the whole table.
    pub fn representatives(&self) -> Vec<String> {
        distinct(self.records.iter().filter_map(|r| r.representative.as_deref()))
    }

    /// Distinct, sorted regions of the whole table.
    pub fn regions(&self) -> Vec<String> {
        distinct(self.records.iter().filter_map(|r| r.region.as_deref()))
    }
}

pub(crate) fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
