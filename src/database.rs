//! `Database`: a directory of independently named [`Index`]es, each living
//! in its own subdirectory with its own `pv`/`wi2pv`/`li2pv`/`vocab`/`labels`
//! files. Grounded on `meilidb-core/src/database.rs`'s `Database`, which
//! keeps a name-keyed map of already-opened indexes and lazily creates one on
//! first `open_index`; this crate has no shared `rkv` environment to hold
//! open across indexes, so each subdirectory is fully self-contained.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;
use crate::index::Index;

/// A root directory under which every named index gets its own
/// subdirectory. Opened indexes are cached so repeated [`Database::open_index`]
/// calls for the same name return the same in-memory state.
pub struct Database {
    root: PathBuf,
    indexes: HashMap<String, Index>,
}

impl Database {
    /// Open an existing database root, or create one if it doesn't exist
    /// yet. Does not eagerly open any index; indexes already present in
    /// `root` are discovered as directories but only loaded on first
    /// [`Database::open_index`].
    pub fn open_or_create(root: impl AsRef<Path>) -> Result<Database> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("database ready at {:?}", root);
        Ok(Database { root, indexes: HashMap::new() })
    }

    /// Look up an already-opened index, or open/create its subdirectory and
    /// cache it for subsequent calls.
    pub fn open_index(&mut self, name: impl Into<String>) -> Result<&mut Index> {
        let name = name.into();
        if !self.indexes.contains_key(&name) {
            let dir = self.root.join(&name);
            let index = if dir.join("vocab").exists() {
                debug!("database: reopening existing index {:?}", name);
                Index::open(&dir)?
            } else {
                debug!("database: creating new index {:?}", name);
                Index::create(&dir)?
            };
            self.indexes.insert(name.clone(), index);
        }
        Ok(self.indexes.get_mut(&name).unwrap())
    }

    /// Flush every currently-open index to disk.
    pub fn persist_all(&mut self) -> Result<()> {
        for index in self.indexes.values_mut() {
            index.persist()?;
        }
        Ok(())
    }

    /// Names of every index this process has opened so far.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Reacquire independent file descriptors on every currently-open
    /// index's shared `pv` file. Call this in a forked child, per `spec.md`
    /// §5, before it touches any index.
    pub fn reopen_after_fork(&mut self) -> Result<()> {
        for index in self.indexes.values_mut() {
            index.reopen_after_fork()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::WhitespaceLexer;
    use tempfile::tempdir;

    #[test]
    fn opens_and_caches_by_name() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_or_create(dir.path()).unwrap();

        let index = db.open_index("articles").unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("a b")).unwrap();
        index.persist().unwrap();

        assert_eq!(db.index_names(), vec!["articles".to_string()]);
    }

    #[test]
    fn reopens_a_persisted_index_across_database_instances() {
        let dir = tempdir().unwrap();
        {
            let mut db = Database::open_or_create(dir.path()).unwrap();
            let index = db.open_index("articles").unwrap();
            index.ingest_document("d0", WhitespaceLexer::new("a b")).unwrap();
            index.persist().unwrap();
        }

        let mut db = Database::open_or_create(dir.path()).unwrap();
        let index = db.open_index("articles").unwrap();
        assert_eq!(index.doctable.count(), 1);
    }

    #[test]
    fn distinct_names_get_independent_subdirectories() {
        let dir = tempdir().unwrap();
        let mut db = Database::open_or_create(dir.path()).unwrap();

        db.open_index("a").unwrap().ingest_document("d0", WhitespaceLexer::new("x")).unwrap();
        db.open_index("b").unwrap().ingest_document("d0", WhitespaceLexer::new("y z")).unwrap();
        db.persist_all().unwrap();

        assert!(dir.path().join("a").join("vocab").exists());
        assert!(dir.path().join("b").join("vocab").exists());
    }
}
