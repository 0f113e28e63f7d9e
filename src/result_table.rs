//! `ResultTable`: a sparse per-document scratch structure used to
//! materialize exclusion terms before combining them, grounded on
//! `original_source/archer_query_table.c`'s `archer_query_table_new`/
//! `_invert`/`_empty`/`_copy` family.

use crate::result::{Result as SearchResult, WordOccurrence};
use crate::DocId;

/// A `num_documents`-sized sparse map from `di` to its `wo` list. Absent
/// slots (`None`) mean "no match recorded for this document yet".
#[derive(Debug, Clone)]
pub struct ResultTable {
    slots: Vec<Option<Vec<WordOccurrence>>>,
}

impl ResultTable {
    pub fn new(num_documents: usize) -> ResultTable {
        ResultTable { slots: vec![None; num_documents] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record one occurrence at document `di`, appending to any existing
    /// entry. Does not re-sort or deduplicate; callers combine a table's
    /// slot contents as they accumulate.
    pub fn record(&mut self, di: DocId, occurrence: WordOccurrence) {
        let slot = &mut self.slots[di as usize];
        slot.get_or_insert_with(Vec::new).push(occurrence);
    }

    /// Flip every slot: previously-empty (`None`) slots become present with
    /// an empty `wo` list, and previously-present slots become empty. Used
    /// to materialize "every document NOT already matched" ahead of
    /// `result::subtract`.
    pub fn invert(&mut self) {
        for slot in &mut self.slots {
            *slot = match slot.take() {
                None => Some(Vec::new()),
                Some(_) => None,
            };
        }
    }

    /// Drop every recorded `wo` list, keeping the table's shape (size).
    pub fn empty(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn copy(&self) -> ResultTable {
        self.clone()
    }

    /// Drain every present slot into a sorted `Result` list, consuming the
    /// table.
    pub fn to_result_list_consuming(self) -> Vec<SearchResult> {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(di, wo)| wo.map(|wo| SearchResult::new(di as DocId, wo)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_flips_presence() {
        let mut table = ResultTable::new(3);
        table.record(1, WordOccurrence::new(5, false, vec![0]));
        table.invert();

        let results = table.to_result_list_consuming();
        let dis: Vec<_> = results.iter().map(|r| r.di).collect();
        assert_eq!(dis, vec![0, 2]);
    }

    #[test]
    fn to_result_list_is_sorted_by_construction() {
        let mut table = ResultTable::new(4);
        table.record(3, WordOccurrence::new(1, false, vec![0]));
        table.record(0, WordOccurrence::new(2, false, vec![1]));

        let results = table.to_result_list_consuming();
        let dis: Vec<_> = results.iter().map(|r| r.di).collect();
        assert_eq!(dis, vec![0, 3]);
    }

    #[test]
    fn empty_clears_without_resizing() {
        let mut table = ResultTable::new(2);
        table.record(0, WordOccurrence::new(1, false, vec![0]));
        table.empty();
        assert_eq!(table.len(), 2);
        assert!(table.to_result_list_consuming().is_empty());
    }
}
