//! Positional group assignment over an already-shuffled record sequence.

use crate::error::PipelineError;
use crate::record::{AssignedRecord, NormalizedRecord};
use std::collections::BTreeMap;

/// How `n` records split into groups of `group_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupLayout {
    pub records: u64,
    pub group_size: u64,
    pub whole_groups: u64,
    pub remainder: u64,
}

impl GroupLayout {
    /// `group_size` must be in `1..=records`.
    pub fn new(records: usize, group_size: usize) -> Result<Self, PipelineError> {
        if group_size == 0 {
            return Err(PipelineError::invalid("group_size must be a positive integer"));
        }
        if group_size > records {
            return Err(PipelineError::invalid(format!(
                "group_size {group_size} exceeds the number of records ({records})"
            )));
        }
        let (n, g) = (records as u64, group_size as u64);
        Ok(Self { records: n, group_size: g, whole_groups: n / g, remainder: n % g })
    }

    /// Number of distinct group ids, counting the tail group when there is one.
    pub fn group_count(&self) -> u64 {
        self.whole_groups + u64::from(self.remainder > 0)
    }

    /// Group id of the record at `position`.
    #[inline]
    pub fn group_of(&self, position: u64) -> u64 {
        position / self.group_size + 1
    }

    /// Member count for `group_id`, zero for ids outside the layout.
    pub fn group_size_of(&self, group_id: u64) -> u64 {
        if group_id >= 1 && group_id <= self.whole_groups {
            self.group_size
        } else if group_id == self.whole_groups + 1 {
            self.remainder
        } else {
            0
        }
    }
}

/// Stamp each record with `group_id` and `record_id`.
///
/// Positions `[0, G)` get group 1, `[G, 2G)` group 2 and so on; the trailing
/// `N mod G` records all share group `N div G + 1`. `record_id` is the position.
/// Record content plays no part: the input must already be shuffled.
pub fn assign_groups(records: Vec<NormalizedRecord>, group_size: usize) -> Result<Vec<AssignedRecord>, PipelineError> {
    let layout = GroupLayout::new(records.len(), group_size)?;
    assign_with_layout(records, &layout)
}

/// [`assign_groups`] with a layout the caller already validated for `records.len()`.
pub fn assign_with_layout(records: Vec<NormalizedRecord>, layout: &GroupLayout) -> Result<Vec<AssignedRecord>, PipelineError> {
    if records.len() as u64 != layout.records {
        return Err(PipelineError::invalid(format!(
            "group layout is for {} records, got {}",
            layout.records,
            records.len()
        )));
    }

    let assigned: Vec<AssignedRecord> = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let pos = i as u64;
            AssignedRecord { group_id: layout.group_of(pos), record_id: pos, record }
        })
        .collect();

    tracing::info!(
        records = layout.records,
        group_size = layout.group_size,
        whole_groups = layout.whole_groups,
        remainder = layout.remainder,
        "assigned {} groups",
        layout.group_count()
    );
    Ok(assigned)
}

/// Member count per group id.
pub fn group_sizes(records: &[AssignedRecord]) -> BTreeMap<u64, usize> {
    let mut m = BTreeMap::new();
    for r in records {
        *m.entry(r.group_id).or_insert(0) += 1;
    }
    m
}
