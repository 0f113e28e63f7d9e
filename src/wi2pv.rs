//! `PvDirectory`: a growable, disk-backed array of [`PostingVector`]s indexed
//! by a dense integer id (a word-id for `wi2pv`, a label-id for `li2pv`).
//!
//! Grounded on `original_source/wi2pv.c`: `bow_wi2pv_new`/`_open`/
//! `_new_from_filename`, `_add_wi_di_pi`/`_add_wi_di_li_pi`,
//! `_wi_next_di_pi`/`_wi_next_di_li_pi`, `_rewind`, `_write_header`,
//! `_write_entry`, `_write`, and, in particular, `bow_wi2pv_reopen_pv`, whose
//! doc comment explains why the directory keeps its own file descriptor onto
//! the shared `pv` data file rather than sharing one: after `fork()`, `lseek`
//! position is shared between parent and child, corrupting concurrent
//! readers/writers unless each reopens independently. This crate follows the
//! same shape: every `PvDirectory` owns its own `File` handle onto the same
//! `pv` path.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::error::{Error, Result};
use crate::pv::{PostingVector, HEADER_SIZE};
use crate::{LabelId, Pos};

const MAGIC: &[u8; 4] = b"ARWD";
/// Default entry-table capacity for a fresh directory, used when `create`'s
/// caller doesn't ask for a specific size.
const DEFAULT_CAPACITY: usize = 1024;

/// A dense-indexed array of posting vectors, backed by two files: a header
/// file (this struct's own persisted state, `<name>.hdr`) and a data file
/// shared with any sibling `PvDirectory` pointed at the same corpus
/// (`<name>.pv`, conventionally just `pv`).
#[derive(Debug)]
pub struct PvDirectory {
    data_path: PathBuf,
    data_file: File,
    header_file: File,
    /// The backing data file's own name, persisted in the header so
    /// `PvDirectory::open` can locate it without the caller having to pass
    /// `data_path` back in (`bow_wi2pv_new_from_filename`'s contract).
    pv_filename: String,
    entries: Vec<PostingVector>,
    /// Count of entry slots ever materialized out of their stub state —
    /// informational bookkeeping mirroring `bow_wi2pv`'s own `num_words`
    /// field, not an index bound (`entries.len()` is that).
    num_words: usize,
    /// One past the highest `wi` whose header record has actually been
    /// written to `header_file` since the last full `write`. Entries at or
    /// beyond `next_word` exist only in memory until `write_entry`/`write`
    /// catches the header file up to them.
    next_word: usize,
    /// Byte offset in `header_file` where the fixed preamble ends and the
    /// per-entry `PostingVector` header records begin.
    entry_start: u64,
}

impl PvDirectory {
    /// Create a fresh, empty directory. `data_path` is the shared `pv` file;
    /// multiple `PvDirectory`s (e.g. wi2pv and li2pv) may point at the same
    /// path, each with its own independent file descriptor. `initial_capacity`
    /// of `0` falls back to a reasonable default rather than starting at an
    /// empty table (`bow_wi2pv_new`'s `ntables_init` argument).
    pub fn create(
        header_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        initial_capacity: usize,
    ) -> Result<PvDirectory> {
        let header_path = header_path.as_ref().to_path_buf();
        let data_path = data_path.as_ref().to_path_buf();
        let data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&data_path)?;
        let header_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&header_path)?;
        let pv_filename = data_path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::FormatError("pv data path has no file name".into()))?
            .to_string();
        let capacity = if initial_capacity == 0 { DEFAULT_CAPACITY } else { initial_capacity };

        let mut dir = PvDirectory {
            data_path,
            data_file,
            header_file,
            pv_filename,
            entries: vec![PostingVector::stub(); capacity],
            num_words: 0,
            next_word: 0,
            entry_start: 0,
        };
        dir.write_header()?;
        Ok(dir)
    }

    /// Open an existing directory from its header file alone, reconstructing
    /// `data_path` from the persisted `pv_filename` (`bow_wi2pv_new_from_filename`)
    /// and reopening it with a fresh file descriptor (the `reopen_pv` step).
    /// Entries in `[next_word, entry_count)` were never flushed to the header
    /// file and are reconstructed here as stubs rather than read.
    pub fn open(header_path: impl AsRef<Path>) -> Result<PvDirectory> {
        let header_path = header_path.as_ref().to_path_buf();
        let mut reader = BufReader::new(File::open(&header_path)?);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::FormatError("bad pv-directory magic".into()));
        }
        let entry_count = reader.read_u32::<LittleEndian>()? as usize;
        let next_word = reader.read_u32::<LittleEndian>()? as usize;
        let num_words = reader.read_u32::<LittleEndian>()? as usize;
        let name_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut name_buf = vec![0u8; name_len];
        reader.read_exact(&mut name_buf)?;
        let pv_filename = String::from_utf8(name_buf)
            .map_err(|_| Error::FormatError("pv filename is not valid utf-8".into()))?;
        let entry_start = (4 + 4 + 4 + 4 + 4 + name_len) as u64;

        if next_word > entry_count {
            return Err(Error::FormatError("pv-directory next_word exceeds entry_count".into()));
        }
        let mut entries = Vec::with_capacity(entry_count);
        for _ in 0..next_word {
            entries.push(PostingVector::read_header(&mut reader)?);
        }
        entries.resize_with(entry_count, PostingVector::stub);

        let data_path = match header_path.parent() {
            Some(parent) => parent.join(&pv_filename),
            None => PathBuf::from(&pv_filename),
        };
        let data_file = Self::reopen_pv(&data_path)?;
        let header_file = OpenOptions::new().read(true).write(true).open(&header_path)?;

        debug!(
            "pv-directory: opened {} entries ({} materialized on disk) from {:?}",
            entry_count, next_word, header_path
        );
        Ok(PvDirectory {
            data_path,
            data_file,
            header_file,
            pv_filename,
            entries,
            num_words,
            next_word,
            entry_start,
        })
    }

    /// Obtain an independent file descriptor onto the shared data file.
    /// Must be called again after any `fork()`-style process duplication,
    /// since raw file descriptors (and their seek offsets) are shared by the
    /// child otherwise.
    fn reopen_pv(data_path: &Path) -> Result<File> {
        Ok(OpenOptions::new().read(true).write(true).open(data_path)?)
    }

    /// Re-acquire a fresh descriptor on the shared data file in place. Call
    /// this in the child immediately after `fork()`.
    pub fn reopen_after_fork(&mut self) -> Result<()> {
        self.data_file = Self::reopen_pv(&self.data_path)?;
        Ok(())
    }

    /// Rewrite the fixed preamble (magic, counts, backing filename) at the
    /// start of the header file. Does not touch any per-entry record; call
    /// `write_entry`/`write` for that. Recomputes `entry_start`, which is
    /// stable across calls as long as `pv_filename`'s length doesn't change
    /// (it never does, for the lifetime of one directory).
    fn write_header(&mut self) -> Result<()> {
        self.header_file.seek(SeekFrom::Start(0))?;
        self.header_file.write_all(MAGIC)?;
        self.header_file.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        self.header_file.write_u32::<LittleEndian>(self.next_word as u32)?;
        self.header_file.write_u32::<LittleEndian>(self.num_words as u32)?;
        let name_bytes = self.pv_filename.as_bytes();
        self.header_file.write_u32::<LittleEndian>(name_bytes.len() as u32)?;
        self.header_file.write_all(name_bytes)?;
        self.entry_start = self.header_file.seek(SeekFrom::Current(0))?;
        self.header_file.flush()?;
        Ok(())
    }

    /// Flush entry `wi`'s header record to disk without rewriting the whole
    /// table, per `spec.md` §4.E's incremental-flush operation. If `wi` is
    /// beyond every entry flushed so far, every stub in between is written
    /// out too and `next_word` is bumped past `wi` — mirroring
    /// `bow_wi2pv_write_entry`'s `while (wi > next_word++)` gap-fill loop.
    /// As in the original, this does not update the header's own
    /// `next_word`/`num_words` preamble fields on disk; call `write_header`
    /// (or `write`, which does both) for that guarantee.
    fn write_entry(&mut self, wi: usize) -> Result<()> {
        if wi >= self.next_word {
            let mut offset = self.entry_start + (self.next_word as u64) * HEADER_SIZE;
            while wi > self.next_word {
                self.header_file.seek(SeekFrom::Start(offset))?;
                self.entries[self.next_word].write_header(&mut self.header_file)?;
                self.next_word += 1;
                offset += HEADER_SIZE;
            }
            self.header_file.seek(SeekFrom::Start(offset))?;
            self.entries[wi].write_header(&mut self.header_file)?;
            self.next_word = wi + 1;
        } else {
            self.header_file
                .seek(SeekFrom::Start(self.entry_start + (wi as u64) * HEADER_SIZE))?;
            self.entries[wi].write_header(&mut self.header_file)?;
        }
        self.header_file.flush()?;
        self.data_file.flush()?;
        Ok(())
    }

    /// Full flush: rewrite the preamble, every entry record, then the
    /// preamble again so its `next_word`/`num_words` fields reflect the
    /// now-complete entry table (`bow_wi2pv_write`). This is the operation
    /// `Index::persist` calls; `write_entry` alone is for a caller that wants
    /// to flush one freshly-materialized word without paying for the rest.
    pub fn write(&mut self) -> Result<()> {
        self.write_header()?;
        let total = self.entries.len();
        for wi in 0..total {
            self.write_entry(wi)?;
        }
        self.write_header()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Grow the entry table, doubling capacity, filling new slots with
    /// stubs, until index `id` is valid. The table is never empty (both
    /// constructors guarantee at least one entry), so doubling alone always
    /// terminates.
    fn ensure_capacity(&mut self, id: usize) {
        if id < self.entries.len() {
            return;
        }
        let mut new_len = self.entries.len();
        while new_len <= id {
            new_len *= 2;
        }
        debug!("pv-directory: growing from {} to {} entries", self.entries.len(), new_len);
        self.entries.resize_with(new_len, PostingVector::stub);
    }

    /// Append `(di, pi)`, with no labels, to the posting vector at `id`,
    /// materializing it first if it is still a stub.
    pub fn append_di_pi(&mut self, id: usize, di: i64, pi: Pos) -> Result<()> {
        self.append_di_li_pi(id, di, &[], pi)
    }

    /// Append `(di, labels, pi)` to the posting vector at `id`, materializing
    /// it first if it is still a stub.
    pub fn append_di_li_pi(&mut self, id: usize, di: i64, labels: &[LabelId], pi: Pos) -> Result<()> {
        self.ensure_capacity(id);
        if self.entries[id].is_stub() {
            self.entries[id] = PostingVector::init(&mut self.data_file)?;
            self.num_words += 1;
        }
        self.entries[id]
            .append_di_li_pi(&mut self.data_file, di, labels, pi)
            .map_err(|e| match e {
                Error::MonotonicityViolated { di, pi, .. } => {
                    Error::MonotonicityViolated { term: Some(id as i64), di, pi }
                }
                other => other,
            })
    }

    /// Borrow the posting vector at `id`, if it exists and was ever
    /// initialized (not a stub).
    pub fn get(&self, id: usize) -> Option<&PostingVector> {
        self.entries.get(id).filter(|pv| !pv.is_stub())
    }

    /// Mutably borrow the posting vector at `id` (e.g. to rewind or decode
    /// from it), if it exists and was ever initialized.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut PostingVector> {
        self.entries.get_mut(id).filter(|pv| !pv.is_stub())
    }

    /// The shared data file, for callers (e.g. [`crate::query_index::QueryIndex`])
    /// that need to decode directly against a borrowed `PostingVector`.
    pub fn data_file_mut(&mut self) -> &mut File {
        &mut self.data_file
    }

    /// Borrow the entry at `id` (if initialized) and the shared data file at
    /// once — a disjoint-field split that a single `&mut self` method
    /// couldn't otherwise express through `get_mut`/`data_file_mut`
    /// separately.
    pub fn pv_and_file(&mut self, id: usize) -> (Option<&mut PostingVector>, &mut File) {
        let entry = self.entries.get_mut(id).filter(|pv| !pv.is_stub());
        (entry, &mut self.data_file)
    }

    pub fn rewind(&mut self, id: usize) -> Result<()> {
        let data_file = &mut self.data_file;
        if let Some(pv) = self.entries.get_mut(id).filter(|pv| !pv.is_stub()) {
            pv.rewind(data_file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stub_entries_fill_the_gap() {
        let dir = tempdir().unwrap();
        let mut pvd = PvDirectory::create(dir.path().join("wi2pv.hdr"), dir.path().join("pv"), 16).unwrap();
        pvd.append_di_pi(5, 0, 0).unwrap();
        assert_eq!(pvd.len(), 16);
        assert!(pvd.get(0).is_none());
        assert!(pvd.get(5).is_some());
    }

    #[test]
    fn grows_past_initial_capacity() {
        let dir = tempdir().unwrap();
        let mut pvd = PvDirectory::create(dir.path().join("wi2pv.hdr"), dir.path().join("pv"), 16).unwrap();
        pvd.append_di_pi(40, 0, 0).unwrap();
        assert_eq!(pvd.len(), 64);
    }

    #[test]
    fn zero_initial_capacity_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let pvd = PvDirectory::create(dir.path().join("wi2pv.hdr"), dir.path().join("pv"), 0).unwrap();
        assert_eq!(pvd.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn persists_and_reopens() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("pv");
        let header_path = dir.path().join("wi2pv.hdr");

        {
            let mut pvd = PvDirectory::create(&header_path, &data_path, 16).unwrap();
            pvd.append_di_pi(2, 10, 0).unwrap();
            pvd.append_di_pi(2, 10, 1).unwrap();
            pvd.write().unwrap();
        }

        let mut reopened = PvDirectory::open(&header_path).unwrap();
        assert_eq!(reopened.len(), 16);
        assert_eq!(reopened.num_words, 1);
        assert_eq!(reopened.next_word, 16);
        reopened.rewind(2).unwrap();
        let mut pv = *reopened.get(2).unwrap();
        let data_file = reopened.data_file_mut();
        let first = pv.next_di_pi(data_file).unwrap();
        assert_eq!(first, (10, 0));
    }

    #[test]
    fn write_entry_flushes_incrementally_without_touching_num_words_preamble() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("pv");
        let header_path = dir.path().join("wi2pv.hdr");

        let mut pvd = PvDirectory::create(&header_path, &data_path, 4).unwrap();
        pvd.append_di_pi(3, 7, 0).unwrap();
        pvd.write_entry(3).unwrap();

        // `write_entry` alone bumped `next_word` in memory past the gap it
        // filled, but never rewrote the preamble recording it on disk.
        assert_eq!(pvd.next_word, 4);
        let reopened = PvDirectory::open(&header_path).unwrap();
        assert_eq!(reopened.next_word, 0);

        pvd.write().unwrap();
        let reopened_after_write = PvDirectory::open(&header_path).unwrap();
        assert_eq!(reopened_after_write.next_word, 4);
        assert_eq!(reopened_after_write.num_words, 1);
    }

    #[test]
    fn reopen_after_fork_gets_a_fresh_descriptor() {
        let dir = tempdir().unwrap();
        let mut pvd = PvDirectory::create(dir.path().join("wi2pv.hdr"), dir.path().join("pv"), 4).unwrap();
        pvd.append_di_pi(0, 0, 0).unwrap();
        pvd.reopen_after_fork().unwrap();
        pvd.append_di_pi(0, 0, 1).unwrap();
        pvd.rewind(0).unwrap();
        let mut pv = *pvd.get(0).unwrap();
        let data_file = pvd.data_file_mut();
        assert_eq!(pv.next_di_pi(data_file).unwrap(), (0, 0));
        assert_eq!(pv.next_di_pi(data_file).unwrap(), (0, 1));
    }
}
