//! `DocumentTable`: the thin record of how many documents an index has seen
//! and what each was called at ingest time. The core posting-store spec
//! treats documents only by their dense `di`; this table is the minimal
//! bookkeeping an `Index` needs to hand out fresh ids and to let a CLI print
//! something more useful than a bare integer back to the user.
//!
//! Persisted as one `bincode`-encoded blob, the way
//! `meilidb-core/src/ranked_map.rs` persists its small side-tables rather
//! than hand-rolling a binary layout for something this small.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::DocId;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentTable {
    external_ids: Vec<String>,
}

impl DocumentTable {
    pub fn new() -> DocumentTable {
        DocumentTable { external_ids: Vec::new() }
    }

    /// Register a new document, returning its freshly assigned `di`.
    /// Documents are never removed or renumbered (`spec.md` §3 Lifecycle).
    pub fn add_document(&mut self, external_id: impl Into<String>) -> DocId {
        self.external_ids.push(external_id.into());
        (self.external_ids.len() - 1) as DocId
    }

    pub fn count(&self) -> usize {
        self.external_ids.len()
    }

    pub fn external_id(&self, di: DocId) -> Option<&str> {
        self.external_ids.get(di as usize).map(|s| s.as_str())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)
            .map_err(|e| crate::error::Error::FormatError(format!("doctable encode: {}", e)))
    }

    pub fn read(path: impl AsRef<Path>) -> Result<DocumentTable> {
        let reader = BufReader::new(File::open(path)?);
        bincode::deserialize_from(reader)
            .map_err(|e| crate::error::Error::FormatError(format!("doctable decode: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ids_are_dense_and_ordered() {
        let mut table = DocumentTable::new();
        assert_eq!(table.add_document("a.txt"), 0);
        assert_eq!(table.add_document("b.txt"), 1);
        assert_eq!(table.count(), 2);
        assert_eq!(table.external_id(1), Some("b.txt"));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doctable");

        let mut table = DocumentTable::new();
        table.add_document("one");
        table.add_document("two");
        table.write(&path).unwrap();

        let read_back = DocumentTable::read(&path).unwrap();
        assert_eq!(read_back.count(), 2);
        assert_eq!(read_back.external_id(0), Some("one"));
    }
}
