//! The posting vector: one compressed, appendable, rewindable logical stream
//! of `(di, labels, pi)` occurrence records, chained across fixed-size
//! segments inside a file shared by many posting vectors.
//!
//! Grounded on `original_source/wi2pv.c`'s `bow_pv_*` calls (the header file
//! defining `bow_pv` itself was not part of the retrieved C source; the wire
//! format below is this crate's own fill-in of `spec.md` §4.D/§6, recorded
//! in DESIGN.md).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::trace;

use crate::error::{Error, Result};
use crate::vbyte::{read_uvarint, write_uvarint};
use crate::{DocId, LabelId, Pos, MAX_WORD_LABELS};

/// Size in bytes of one segment, trailer included.
pub const SEGMENT_SIZE: u64 = 4096;
/// Two little-endian `u64`s: finalized payload length, then next-segment offset.
const TRAILER_SIZE: u64 = 16;
/// Bytes available for records in one segment.
pub const PAYLOAD_SIZE: u64 = SEGMENT_SIZE - TRAILER_SIZE;

fn segment_start(offset: u64) -> u64 {
    (offset / SEGMENT_SIZE) * SEGMENT_SIZE
}

fn alloc_segment(file: &mut File) -> Result<u64> {
    let offset = file.seek(SeekFrom::End(0))?;
    let zeros = vec![0u8; SEGMENT_SIZE as usize];
    file.write_all(&zeros)?;
    Ok(offset)
}

fn write_trailer(file: &mut File, segment_offset: u64, valid_length: u64, next_offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(segment_offset + PAYLOAD_SIZE))?;
    file.write_u64::<LittleEndian>(valid_length)?;
    file.write_u64::<LittleEndian>(next_offset)?;
    Ok(())
}

fn read_trailer(file: &mut File, segment_offset: u64) -> Result<(u64, u64)> {
    file.seek(SeekFrom::Start(segment_offset + PAYLOAD_SIZE))?;
    let valid_length = file.read_u64::<LittleEndian>()?;
    let next_offset = file.read_u64::<LittleEndian>()?;
    Ok((valid_length, next_offset))
}

/// The exact four values that must be captured and restored for `next_di_pi`
/// to offer "peek next" semantics on top of a forward-only decoder. See
/// `spec.md` §9, design note "Cursor snapshot tuple", and
/// `archer_query_index.c`'s `archer_query_remember_pointer`/`_recall_pointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PvCursor {
    pub read_seek_end: u64,
    pub read_segment_bytes_remaining: u64,
    pub read_last_di: i64,
    pub read_last_pi: i64,
}

/// Size in bytes of one serialized `PostingVector` header record
/// (`sizeof(bow_pv)` in the original library), used by `PvDirectory` to
/// compute `entry_start + wi * sizeof(PV)` style offsets.
pub const HEADER_SIZE: u64 = 8 * 9;

/// One term's posting stream: a chain of segments inside a shared backing
/// file, plus the read/write cursor state needed to append and to decode
/// forward from an arbitrary saved position.
#[derive(Debug, Clone, Copy)]
pub struct PostingVector {
    pub head_seek: u64,
    pub tail_seek: u64,
    write_seek_end: u64,
    write_segment_bytes_remaining: u64,
    pub read_seek_end: u64,
    pub read_segment_bytes_remaining: u64,
    write_last_di: i64,
    write_last_pi: i64,
    pub read_last_di: i64,
    pub read_last_pi: i64,
    /// `-1`: stub (never initialized). `0`: initialized, empty. `>0`: record count.
    pub count: i64,
    /// Snapshot taken just before the most recent `next_*` call, consumed by
    /// `unnext`. At most one step of push-back, per `spec.md` §4.D.
    pending_unnext: Option<PvCursor>,
}

impl PostingVector {
    /// An uninitialized directory slot ("stub" in `spec.md` terminology).
    pub fn stub() -> PostingVector {
        PostingVector {
            head_seek: 0,
            tail_seek: 0,
            write_seek_end: 0,
            write_segment_bytes_remaining: 0,
            read_seek_end: 0,
            read_segment_bytes_remaining: 0,
            write_last_di: -1,
            write_last_pi: -1,
            read_last_di: -1,
            read_last_pi: -1,
            count: -1,
            pending_unnext: None,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.count < 0
    }

    /// Allocate the first segment and initialize an empty, readable stream.
    pub fn init(file: &mut File) -> Result<PostingVector> {
        let offset = alloc_segment(file)?;
        Ok(PostingVector {
            head_seek: offset,
            tail_seek: offset,
            write_seek_end: offset,
            write_segment_bytes_remaining: PAYLOAD_SIZE,
            read_seek_end: offset,
            read_segment_bytes_remaining: PAYLOAD_SIZE,
            write_last_di: -1,
            write_last_pi: -1,
            read_last_di: -1,
            read_last_pi: -1,
            count: 0,
            pending_unnext: None,
        })
    }

    fn cursor(&self) -> PvCursor {
        PvCursor {
            read_seek_end: self.read_seek_end,
            read_segment_bytes_remaining: self.read_segment_bytes_remaining,
            read_last_di: self.read_last_di,
            read_last_pi: self.read_last_pi,
        }
    }

    /// Exact cursor save, per testable property #3.
    pub fn save_cursor(&self) -> PvCursor {
        self.cursor()
    }

    /// Exact cursor restore, per testable property #3.
    pub fn restore_cursor(&mut self, cursor: PvCursor) {
        self.read_seek_end = cursor.read_seek_end;
        self.read_segment_bytes_remaining = cursor.read_segment_bytes_remaining;
        self.read_last_di = cursor.read_last_di;
        self.read_last_pi = cursor.read_last_pi;
    }

    /// Reset the read cursor to the head of the first segment.
    pub fn rewind(&mut self, file: &mut File) -> Result<()> {
        self.read_seek_end = self.head_seek;
        self.read_last_di = -1;
        self.read_last_pi = -1;
        self.read_segment_bytes_remaining = self.remaining_in_segment(file, self.head_seek)?;
        self.pending_unnext = None;
        Ok(())
    }

    fn remaining_in_segment(&self, file: &mut File, offset: u64) -> Result<u64> {
        let seg_start = segment_start(offset);
        if seg_start == segment_start(self.write_seek_end) {
            Ok(self.write_seek_end - offset)
        } else {
            let (valid_length, _next) = read_trailer(file, seg_start)?;
            Ok((seg_start + valid_length).saturating_sub(offset))
        }
    }

    fn ensure_write_capacity(&mut self, file: &mut File, needed: u64) -> Result<()> {
        if self.write_segment_bytes_remaining >= needed {
            return Ok(());
        }
        let old_segment = segment_start(self.write_seek_end);
        let consumed = self.write_seek_end - old_segment;
        let new_segment = alloc_segment(file)?;
        write_trailer(file, old_segment, consumed, new_segment)?;
        trace!("pv: rolled segment {} -> {}", old_segment, new_segment);
        self.tail_seek = new_segment;
        self.write_seek_end = new_segment;
        self.write_segment_bytes_remaining = PAYLOAD_SIZE;
        Ok(())
    }

    /// Append `(di, pi)` with no labels. Equivalent to `append_di_li_pi`
    /// with an empty label slice.
    pub fn append_di_pi(&mut self, file: &mut File, di: DocId, pi: Pos) -> Result<()> {
        self.append_di_li_pi(file, di, &[], pi)
    }

    /// Append `(di, labels, pi)`. Fails with `MonotonicityViolated` if `di`
    /// goes backwards, or (for equal `di`) `pi` does not strictly increase.
    pub fn append_di_li_pi(
        &mut self,
        file: &mut File,
        di: DocId,
        labels: &[LabelId],
        pi: Pos,
    ) -> Result<()> {
        if labels.len() > MAX_WORD_LABELS {
            return Err(Error::CapacityExceeded { len: labels.len(), max: MAX_WORD_LABELS });
        }
        let backwards = di < self.write_last_di
            || (di == self.write_last_di && pi <= self.write_last_pi);
        if backwards {
            return Err(Error::MonotonicityViolated { term: None, di, pi });
        }

        let delta_di = (di - self.write_last_di) as u64;
        let pi_field = if delta_di == 0 { (pi - self.write_last_pi) as u64 } else { pi as u64 };

        let mut buf = Vec::with_capacity(8 + labels.len() * 4);
        write_uvarint(&mut buf, delta_di)?;
        write_uvarint(&mut buf, pi_field)?;
        write_uvarint(&mut buf, labels.len() as u64)?;
        for &li in labels {
            write_uvarint(&mut buf, li as u64)?;
        }

        self.ensure_write_capacity(file, buf.len() as u64)?;
        file.seek(SeekFrom::Start(self.write_seek_end))?;
        file.write_all(&buf)?;

        self.write_seek_end += buf.len() as u64;
        self.write_segment_bytes_remaining -= buf.len() as u64;
        self.write_last_di = di;
        self.write_last_pi = pi;
        self.count += 1;
        Ok(())
    }

    fn advance_to_readable_segment(&mut self, file: &mut File) -> Result<bool> {
        loop {
            let seg_start = segment_start(self.read_seek_end);
            if seg_start == segment_start(self.write_seek_end) {
                return Ok(self.read_seek_end < self.write_seek_end);
            }
            let (valid_length, next_offset) = read_trailer(file, seg_start)?;
            if self.read_seek_end < seg_start + valid_length {
                return Ok(true);
            }
            if next_offset == 0 {
                return Err(Error::FormatError("posting vector chain broken before reaching tail".into()));
            }
            self.read_seek_end = next_offset;
            self.read_segment_bytes_remaining = self.remaining_in_segment(file, next_offset)?;
        }
    }

    fn next_raw(&mut self, file: &mut File) -> Result<Option<(DocId, Vec<LabelId>, Pos)>> {
        self.pending_unnext = Some(self.cursor());

        if !self.advance_to_readable_segment(file)? {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(self.read_seek_end))?;
        let mut cursor_buf = CountingReader { inner: file, read: 0 };

        let (delta_di, _) = read_uvarint(&mut cursor_buf)?;
        let new_di = self.read_last_di + delta_di as i64;
        let (pi_field, _) = read_uvarint(&mut cursor_buf)?;
        let new_pi = if delta_di == 0 { self.read_last_pi + pi_field as i64 } else { pi_field as i64 };
        let (ln, _) = read_uvarint(&mut cursor_buf)?;
        let mut labels = Vec::with_capacity(ln as usize);
        for _ in 0..ln {
            let (li, _) = read_uvarint(&mut cursor_buf)?;
            labels.push(li as i64);
        }
        let consumed = cursor_buf.read;

        self.read_seek_end += consumed as u64;
        self.read_segment_bytes_remaining = self.read_segment_bytes_remaining.saturating_sub(consumed as u64);
        self.read_last_di = new_di;
        self.read_last_pi = new_pi;

        Ok(Some((new_di, labels, new_pi)))
    }

    /// Decode the next `(di, pi)`, discarding any labels. `di == -1` on
    /// exhaustion.
    pub fn next_di_pi(&mut self, file: &mut File) -> Result<(DocId, Pos)> {
        match self.next_raw(file)? {
            Some((di, _labels, pi)) => Ok((di, pi)),
            None => Ok((-1, -1)),
        }
    }

    /// Decode the next `(di, labels, pi)`. `di == -1` on exhaustion, in
    /// which case `labels` is empty.
    pub fn next_di_li_pi(&mut self, file: &mut File) -> Result<(DocId, Vec<LabelId>, Pos)> {
        match self.next_raw(file)? {
            Some(triple) => Ok(triple),
            None => Ok((-1, Vec::new(), -1)),
        }
    }

    /// Mark the decoder so the next `next_*` call returns the most recently
    /// returned record again. At most one step of push-back; a second call
    /// with nothing pending is a no-op.
    pub fn unnext(&mut self) {
        if let Some(cursor) = self.pending_unnext.take() {
            self.restore_cursor(cursor);
        }
    }

    pub fn write_header<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u64::<LittleEndian>(self.head_seek)?;
        w.write_u64::<LittleEndian>(self.tail_seek)?;
        w.write_u64::<LittleEndian>(self.write_seek_end)?;
        w.write_u64::<LittleEndian>(self.write_segment_bytes_remaining)?;
        w.write_u64::<LittleEndian>(self.read_seek_end)?;
        w.write_u64::<LittleEndian>(self.read_segment_bytes_remaining)?;
        w.write_i64::<LittleEndian>(self.write_last_di)?;
        w.write_i64::<LittleEndian>(self.write_last_pi)?;
        // read_last_di / read_last_pi / count packed below to keep a fixed
        // 9-field, 72-byte record (HEADER_SIZE).
        w.write_i64::<LittleEndian>(pack_read_last(self.read_last_di, self.read_last_pi))?;
        w.write_i64::<LittleEndian>(self.count)?;
        Ok(())
    }

    pub fn read_header<R: Read>(r: &mut R) -> Result<PostingVector> {
        let head_seek = r.read_u64::<LittleEndian>()?;
        let tail_seek = r.read_u64::<LittleEndian>()?;
        let write_seek_end = r.read_u64::<LittleEndian>()?;
        let write_segment_bytes_remaining = r.read_u64::<LittleEndian>()?;
        let read_seek_end = r.read_u64::<LittleEndian>()?;
        let read_segment_bytes_remaining = r.read_u64::<LittleEndian>()?;
        let write_last_di = r.read_i64::<LittleEndian>()?;
        let write_last_pi = r.read_i64::<LittleEndian>()?;
        let packed = r.read_i64::<LittleEndian>()?;
        let (read_last_di, read_last_pi) = unpack_read_last(packed);
        let count = r.read_i64::<LittleEndian>()?;
        Ok(PostingVector {
            head_seek,
            tail_seek,
            write_seek_end,
            write_segment_bytes_remaining,
            read_seek_end,
            read_segment_bytes_remaining,
            write_last_di,
            write_last_pi,
            read_last_di,
            read_last_pi,
            count,
            pending_unnext: None,
        })
    }
}

/// `read_last_di`/`read_last_pi` are each `-1` (sentinel) or a 32-bit-range
/// document/position id in this crate's intended usage; pack them into one
/// `i64` field so the on-disk header stays at a fixed 9 fields. Real corpora
/// with documents indices beyond `u32` should widen this; documented as a
/// known limit rather than silently truncated.
fn pack_read_last(di: i64, pi: i64) -> i64 {
    ((di as i32 as u32 as i64) << 32) | (pi as i32 as u32 as i64)
}

fn unpack_read_last(packed: i64) -> (i64, i64) {
    let di = (packed >> 32) as i32 as i64;
    let pi = (packed & 0xffff_ffff) as i32 as i64;
    (di, pi)
}

struct CountingReader<'a> {
    inner: &'a mut File,
    read: usize,
}

impl<'a> Read for CountingReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n;
        Ok(n)
    }
}
