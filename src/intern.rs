use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;
use log::trace;

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"ARIT";

/// Bijection between surface strings (tokens, or label names) and dense,
/// process-lifetime-stable non-negative integer ids.
///
/// Two independent instances exist per [`crate::index::Index`]: one for
/// tokens, one for label names. Persistence is delegated to a small
/// length-prefixed side-table (`vocab` or `labels`); the in-memory id
/// assignment itself is never reshuffled once made.
#[derive(Debug, Default, Clone)]
pub struct StringIntern {
    strings: Vec<String>,
    ids: HashMap<String, i64>,
}

impl StringIntern {
    pub fn new() -> StringIntern {
        StringIntern { strings: Vec::new(), ids: HashMap::new() }
    }

    /// Look the string up, inserting a fresh id on miss.
    pub fn intern(&mut self, s: &str) -> i64 {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.strings.len() as i64;
        self.strings.push(s.to_owned());
        self.ids.insert(s.to_owned(), id);
        trace!("interned {:?} as {}", s, id);
        id
    }

    /// Look the string up without inserting. `-1` means absent.
    pub fn intern_lookup(&self, s: &str) -> i64 {
        self.ids.get(s).copied().unwrap_or(-1)
    }

    pub fn str_of(&self, id: i64) -> Option<&str> {
        if id < 0 {
            return None;
        }
        self.strings.get(id as usize).map(|s| s.as_str())
    }

    pub fn count(&self) -> usize {
        self.strings.len()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(self.strings.len() as u32)?;
        for s in &self.strings {
            let bytes = s.as_bytes();
            w.write_u32::<LittleEndian>(bytes.len() as u32)?;
            w.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<StringIntern> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::FormatError("bad string-intern magic".into()));
        }
        let count = r.read_u32::<LittleEndian>()? as usize;
        let mut intern = StringIntern::new();
        for _ in 0..count {
            let len = r.read_u32::<LittleEndian>()? as usize;
            let mut buf = vec![0u8; len];
            r.read_exact(&mut buf)?;
            let s = String::from_utf8(buf)
                .map_err(|e| Error::FormatError(format!("non-utf8 interned string: {}", e)))?;
            intern.intern(&s);
        }
        Ok(intern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable_and_dense() {
        let mut intern = StringIntern::new();
        assert_eq!(intern.intern("a"), 0);
        assert_eq!(intern.intern("b"), 1);
        assert_eq!(intern.intern("a"), 0);
        assert_eq!(intern.count(), 2);
        assert_eq!(intern.intern_lookup("c"), -1);
        assert_eq!(intern.str_of(1), Some("b"));
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut intern = StringIntern::new();
        intern.intern("alpha");
        intern.intern("beta");

        let mut buf = Vec::new();
        intern.write(&mut buf).unwrap();

        let read_back = StringIntern::read(&mut &buf[..]).unwrap();
        assert_eq!(read_back.count(), 2);
        assert_eq!(read_back.intern_lookup("alpha"), 0);
        assert_eq!(read_back.intern_lookup("beta"), 1);
    }
}
