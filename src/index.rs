//! `Index`: one queryable corpus — a pair of [`PvDirectory`] instances (one
//! keyed by word-id, one by label-id) sharing a single `pv` backing file,
//! plus the two [`StringIntern`]s and the [`DocumentTable`] that give those
//! ids meaning. Mirrors `original_source/wi2pv.c`'s convention of a `wi2pv`
//! and a `li2pv` directory over the same `pv` file, and
//! `meilidb-core/src/database.rs`'s one-directory-per-index layout.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::doctable::DocumentTable;
use crate::error::Result;
use crate::intern::StringIntern;
use crate::lexer::{LabelStack, Lexer, Token};
use crate::wi2pv::PvDirectory;
use crate::{DocId, Pos};

const WI2PV_HEADER: &str = "wi2pv";
const LI2PV_HEADER: &str = "li2pv";
const PV_DATA: &str = "pv";
const VOCAB_FILE: &str = "vocab";
const LABELS_FILE: &str = "labels";
const DOCTABLE_FILE: &str = "doctable";

pub struct Index {
    dir: PathBuf,
    pub words: StringIntern,
    pub labels: StringIntern,
    pub wi2pv: PvDirectory,
    pub li2pv: PvDirectory,
    pub doctable: DocumentTable,
}

impl Index {
    /// Truncate and create a fresh, empty index directory.
    pub fn create(dir: impl AsRef<Path>) -> Result<Index> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let pv_path = dir.join(PV_DATA);
        let wi2pv = PvDirectory::create(dir.join(WI2PV_HEADER), &pv_path, 0)?;
        let li2pv = PvDirectory::create(dir.join(LI2PV_HEADER), &pv_path, 0)?;
        info!("created index at {:?}", dir);
        Ok(Index {
            dir,
            words: StringIntern::new(),
            labels: StringIntern::new(),
            wi2pv,
            li2pv,
            doctable: DocumentTable::new(),
        })
    }

    /// Reopen a previously persisted index directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Index> {
        let dir = dir.as_ref().to_path_buf();

        let words = StringIntern::read(&mut BufReader::new(File::open(dir.join(VOCAB_FILE))?))?;
        let labels = StringIntern::read(&mut BufReader::new(File::open(dir.join(LABELS_FILE))?))?;
        let wi2pv = PvDirectory::open(dir.join(WI2PV_HEADER))?;
        let li2pv = PvDirectory::open(dir.join(LI2PV_HEADER))?;
        let doctable = DocumentTable::read(dir.join(DOCTABLE_FILE))?;

        debug!("opened index at {:?}: {} words, {} labels, {} documents", dir, words.count(), labels.count(), doctable.count());
        Ok(Index { dir, words, labels, wi2pv, li2pv, doctable })
    }

    /// Flush every side-table to disk: string interns, both directory
    /// headers (a full `write`, so the on-disk `next_word`/`num_words`
    /// always match the in-memory table after this returns), and the
    /// document table.
    pub fn persist(&mut self) -> Result<()> {
        self.words.write(&mut BufWriter::new(File::create(self.dir.join(VOCAB_FILE))?))?;
        self.labels.write(&mut BufWriter::new(File::create(self.dir.join(LABELS_FILE))?))?;
        self.wi2pv.write()?;
        self.li2pv.write()?;
        self.doctable.write(self.dir.join(DOCTABLE_FILE))?;
        debug!("persisted index at {:?}", self.dir);
        Ok(())
    }

    /// Tokenize one document with `lexer`, interning words and labels and
    /// appending every occurrence to the appropriate posting vector. Label
    /// regions contribute two boundary-marker records (open position, close
    /// position) to their label's posting vector, per `spec.md` §4.I.
    pub fn ingest_document(&mut self, external_id: impl Into<String>, mut lexer: impl Lexer) -> Result<DocId> {
        let di = self.doctable.add_document(external_id);
        let mut stack = LabelStack::new();
        let mut pos: Pos = 0;

        while let Some(token) = lexer.next_token() {
            match token {
                Token::Word(word) => {
                    let wi = self.words.intern(&word);
                    let active: Vec<_> = stack.active_labels().collect();
                    self.wi2pv.append_di_li_pi(wi as usize, di, &active, pos)?;
                    pos += 1;
                }
                Token::LabelOpen(name) => {
                    let li = self.labels.intern(&name);
                    stack.push(li, pos)?;
                }
                Token::LabelClose(name) => {
                    let li = self.labels.intern(&name);
                    let start = stack.pop(li)?;
                    self.li2pv.append_di_pi(li as usize, di, start)?;
                    self.li2pv.append_di_pi(li as usize, di, pos)?;
                }
            }
        }
        debug!("ingested document {:?} (di={}, {} tokens)", self.doctable.external_id(di), di, pos);
        Ok(di)
    }

    /// Reacquire independent file descriptors on the shared `pv` file for
    /// both directories. Call this in a forked child before it reads or
    /// writes the index (`spec.md` §5).
    pub fn reopen_after_fork(&mut self) -> Result<()> {
        self.wi2pv.reopen_after_fork()?;
        self.li2pv.reopen_after_fork()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::WhitespaceLexer;
    use tempfile::tempdir;

    #[test]
    fn ingest_then_reopen_preserves_vocabulary() {
        let dir = tempdir().unwrap();
        let di = {
            let mut index = Index::create(dir.path()).unwrap();
            let di = index.ingest_document("doc0", WhitespaceLexer::new("a b a")).unwrap();
            index.persist().unwrap();
            di
        };
        assert_eq!(di, 0);

        let index = Index::open(dir.path()).unwrap();
        assert_eq!(index.words.count(), 2);
        assert_eq!(index.doctable.count(), 1);
        assert_eq!(index.doctable.external_id(0), Some("doc0"));
    }

    #[test]
    fn label_regions_emit_boundary_markers() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("doc0", WhitespaceLexer::new("[title] a b [/title] c")).unwrap();

        let li = index.labels.intern_lookup("title");
        assert!(li >= 0);
        let mut pv = *index.li2pv.get(li as usize).unwrap();
        let data_file = index.li2pv.data_file_mut();
        pv.rewind(data_file).unwrap();
        let first = pv.next_di_pi(data_file).unwrap();
        let second = pv.next_di_pi(data_file).unwrap();
        assert_eq!(first, (0, 0));
        assert_eq!(second, (0, 2));
    }
}
