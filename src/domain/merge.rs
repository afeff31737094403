// Merging per-server responses into one timestamp-aligned table
use super::source::{DataRow, SampleValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub t: i64,
    pub values: Vec<SampleValue>,
}

/// Rows keyed by timestamp, one slot per requested source.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    source_count: usize,
    rows: BTreeMap<i64, Vec<SampleValue>>,
}

impl MergedTable {
    pub fn new(source_count: usize) -> Self {
        Self {
            source_count,
            rows: BTreeMap::new(),
        }
    }

    /// Installs one server's response. `indices[k]` is the global slot of the k-th source
    /// that server was asked for; values beyond the partition are ignored.
    pub fn install(&mut self, indices: &[usize], rows: &[DataRow]) {
        let width = self.source_count;
        for row in rows {
            let slots = self
                .rows
                .entry(row.t)
                .or_insert_with(|| vec![SampleValue::Absent; width]);
            for (value, &index) in row.v.iter().zip(indices) {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = SampleValue::from(*value);
                }
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, t: i64) -> Option<&[SampleValue]> {
        self.rows.get(&t).map(Vec::as_slice)
    }

    /// Time-ordered rows.
    pub fn into_rows(self) -> Vec<MergedRow> {
        self.rows
            .into_iter()
            .map(|(t, values)| MergedRow { t, values })
            .collect()
    }
}
