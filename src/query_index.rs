//! `QueryIndex`: cursor-style primitives over an [`Index`] driven by a
//! [`QueryTerm`], honoring label filters and giving a forward-only decoder
//! "peek" semantics via the snapshot/restore machinery built into
//! [`PostingVector`]. Grounded on `original_source/archer_query_index.c`'s
//! `archer_query_index_next_di_pi` family and its remember/recall pointer
//! macros.

use crate::index::Index;
use crate::pv::PostingVector;
use crate::query::QueryTerm;
use crate::{DocId, LabelId, Pos};

/// Which directory a term's postings live in.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Word(usize),
    Label(usize),
}

/// The resolved, cacheable identity of a query term against one `Index`:
/// which stream it reads from and which labels (if any) every returned word
/// record must carry.
pub struct TermCursor {
    stream: Option<Stream>,
    filter: Vec<LabelId>,
}

impl TermCursor {
    /// Resolve `term` against `index`'s dictionaries. A term naming a word
    /// or label absent from the corpus resolves to an always-empty stream
    /// rather than an error (`spec.md` §7: unknown terms contribute no
    /// matches, never fail evaluation).
    pub fn resolve(index: &Index, term: &QueryTerm) -> TermCursor {
        TermCursor::resolve_raw(index, term.word.as_deref(), &term.labels)
    }

    /// As [`TermCursor::resolve`], but from a bare word/labels pair rather
    /// than a full `QueryTerm` — lets a proximity sub-term share the same
    /// resolution logic without being wrapped in a throwaway `QueryTerm`.
    pub fn resolve_raw(index: &Index, word: Option<&str>, labels: &[String]) -> TermCursor {
        if let Some(word) = word {
            let wi = index.words.intern_lookup(word);
            let filter: Vec<LabelId> = labels.iter().map(|l| index.labels.intern_lookup(l)).collect();
            let stream = if wi >= 0 { Some(Stream::Word(wi as usize)) } else { None };
            TermCursor { stream, filter }
        } else if let Some(label) = labels.first() {
            let li = index.labels.intern_lookup(label);
            let stream = if li >= 0 { Some(Stream::Label(li as usize)) } else { None };
            TermCursor { stream, filter: Vec::new() }
        } else {
            TermCursor { stream: None, filter: Vec::new() }
        }
    }

    fn is_label_stream(&self) -> bool {
        matches!(self.stream, Some(Stream::Label(_)))
    }
}

fn labels_satisfy(filter: &[LabelId], present: &[LabelId]) -> bool {
    filter.iter().all(|needed| present.contains(needed))
}

fn pv_and_file<'a>(index: &'a mut Index, stream: Stream) -> (Option<&'a mut PostingVector>, &'a mut std::fs::File) {
    match stream {
        Stream::Word(wi) => index.wi2pv.pv_and_file(wi),
        Stream::Label(li) => index.li2pv.pv_and_file(li),
    }
}

/// Peek the next `(di, pi)` satisfying `cursor`'s label filter, leaving the
/// underlying posting vector's read position exactly where it was before
/// this call — records that fail the filter are scanned but not
/// permanently skipped, so repeated peeks are idempotent at the cost of a
/// rescan each time.
pub fn next_di_pi(index: &mut Index, cursor: &TermCursor) -> crate::error::Result<(DocId, Pos)> {
    let stream = match cursor.stream {
        Some(stream) => stream,
        None => return Ok((-1, -1)),
    };
    let (pv, file) = pv_and_file(index, stream);
    let pv = match pv {
        Some(pv) => pv,
        None => return Ok((-1, -1)),
    };

    let saved = pv.save_cursor();
    loop {
        let (di, labels, pi) = pv.next_di_li_pi(file)?;
        if di == -1 {
            pv.restore_cursor(saved);
            return Ok((-1, -1));
        }
        if cursor.filter.is_empty() || labels_satisfy(&cursor.filter, &labels) {
            pv.restore_cursor(saved);
            return Ok((di, pi));
        }
    }
}

/// Consume one filter-satisfying record for real (the posting vector's read
/// position does advance), returning `None` on exhaustion.
fn consume_one_matching(index: &mut Index, cursor: &TermCursor) -> crate::error::Result<Option<(DocId, Pos)>> {
    let stream = match cursor.stream {
        Some(stream) => stream,
        None => return Ok(None),
    };
    let (pv, file) = pv_and_file(index, stream);
    let pv = match pv {
        Some(pv) => pv,
        None => return Ok(None),
    };

    loop {
        let (di, labels, pi) = pv.next_di_li_pi(file)?;
        if di == -1 {
            return Ok(None);
        }
        if cursor.filter.is_empty() || labels_satisfy(&cursor.filter, &labels) {
            return Ok(Some((di, pi)));
        }
    }
}

/// Advance permanently past every remaining occurrence of the current `di`,
/// returning the next distinct `di` (or `-1` on exhaustion).
pub fn next_di(index: &mut Index, cursor: &TermCursor) -> crate::error::Result<DocId> {
    let (current_di, _) = next_di_pi(index, cursor)?;
    if current_di == -1 {
        return Ok(-1);
    }
    loop {
        match consume_one_matching(index, cursor)? {
            None => return Ok(-1),
            Some((di, _)) if di != current_di => return Ok(di),
            Some(_) => continue,
        }
    }
}

/// Initialize the stream on first use and peek the current `(di, pi)`
/// without consuming it.
pub fn current_di(index: &mut Index, cursor: &TermCursor) -> crate::error::Result<(DocId, Pos)> {
    next_di_pi(index, cursor)
}

/// Every valid position for the current `di`. For a word term this is every
/// `pi` at which the word occurs there (subject to the label filter); for a
/// bare label term this is the half-open range `[pi_start, pi_end)` spanned
/// by its next two boundary-marker records. The posting vector's read
/// position is restored on exit either way.
pub fn current_pis(index: &mut Index, cursor: &TermCursor) -> crate::error::Result<Vec<Pos>> {
    let stream = match cursor.stream {
        Some(stream) => stream,
        None => return Ok(Vec::new()),
    };

    if cursor.is_label_stream() {
        let (pv, file) = pv_and_file(index, stream);
        let pv = match pv {
            Some(pv) => pv,
            None => return Ok(Vec::new()),
        };
        let saved = pv.save_cursor();

        let (di, start) = pv.next_di_pi(file)?;
        if di == -1 {
            pv.restore_cursor(saved);
            return Ok(Vec::new());
        }
        let (_, end) = pv.next_di_pi(file)?;
        pv.restore_cursor(saved);

        if end <= start {
            // Open Question #1: an empty or malformed field extent yields
            // no positions rather than asserting.
            return Ok(Vec::new());
        }
        return Ok((start..end).collect());
    }

    let (pv, file) = pv_and_file(index, stream);
    let pv = match pv {
        Some(pv) => pv,
        None => return Ok(Vec::new()),
    };
    let saved = pv.save_cursor();

    // Seed `target_di`/`positions` from the first *filter-satisfying*
    // record, not the raw next one — a document's first occurrence of the
    // word may carry none of the required labels while a later occurrence
    // in the same document does (testable property #4).
    let mut target_di = -1;
    let mut positions = Vec::new();
    loop {
        let (di, labels, pi) = pv.next_di_li_pi(file)?;
        if di == -1 {
            pv.restore_cursor(saved);
            return Ok(Vec::new());
        }
        if cursor.filter.is_empty() || labels_satisfy(&cursor.filter, &labels) {
            target_di = di;
            positions.push(pi);
            break;
        }
    }

    loop {
        let (di, labels, pi) = pv.next_di_li_pi(file)?;
        if di != target_di {
            break;
        }
        if cursor.filter.is_empty() || labels_satisfy(&cursor.filter, &labels) {
            positions.push(pi);
        }
    }
    pv.restore_cursor(saved);
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::WhitespaceLexer;
    use crate::query::QueryTerm;
    use tempfile::tempdir;

    #[test]
    fn word_stream_visits_every_matching_document() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("a b a")).unwrap();
        index.ingest_document("d1", WhitespaceLexer::new("b c")).unwrap();
        index.ingest_document("d2", WhitespaceLexer::new("a c a")).unwrap();

        let term = QueryTerm::word("a");
        let cursor = TermCursor::resolve(&index, &term);

        let mut seen = Vec::new();
        loop {
            let di = next_di(&mut index, &cursor).unwrap();
            if di == -1 {
                break;
            }
            seen.push(di);
        }
        assert_eq!(seen, vec![0, 2]);
    }

    #[test]
    fn current_pis_collects_all_positions_for_current_document() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("a b a")).unwrap();

        let term = QueryTerm::word("a");
        let cursor = TermCursor::resolve(&index, &term);
        let (di, _pi) = current_di(&mut index, &cursor).unwrap();
        assert_eq!(di, 0);
        let pis = current_pis(&mut index, &cursor).unwrap();
        assert_eq!(pis, vec![0, 2]);
    }

    #[test]
    fn bare_label_yields_field_extent() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("[title] a b [/title] c")).unwrap();

        let term = QueryTerm::bare_label("title");
        let cursor = TermCursor::resolve(&index, &term);
        let (di, _) = current_di(&mut index, &cursor).unwrap();
        assert_eq!(di, 0);
        let pis = current_pis(&mut index, &cursor).unwrap();
        assert_eq!(pis, vec![0, 1]);
    }

    #[test]
    fn unknown_word_yields_no_matches() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("a b")).unwrap();

        let term = QueryTerm::word("nonexistent");
        let cursor = TermCursor::resolve(&index, &term);
        let (di, _) = current_di(&mut index, &cursor).unwrap();
        assert_eq!(di, -1);
    }

    #[test]
    fn label_filtered_word_excludes_unlabeled_occurrences() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("[title] a [/title] a")).unwrap();

        let term = QueryTerm::word("a").with_labels(vec!["title"]);
        let cursor = TermCursor::resolve(&index, &term);
        let pis = current_pis(&mut index, &cursor).unwrap();
        assert_eq!(pis, vec![0]);
    }

    /// Regression: the filter-satisfying occurrence is *not* the document's
    /// first occurrence of the word. `current_pis` must skip the unlabeled
    /// first occurrence rather than seeding its result from it.
    #[test]
    fn label_filtered_word_skips_leading_unlabeled_occurrence() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        index.ingest_document("d0", WhitespaceLexer::new("a [title] a [/title]")).unwrap();

        let term = QueryTerm::word("a").with_labels(vec!["title"]);
        let cursor = TermCursor::resolve(&index, &term);
        let (di, _) = current_di(&mut index, &cursor).unwrap();
        assert_eq!(di, 0);
        let pis = current_pis(&mut index, &cursor).unwrap();
        assert_eq!(pis, vec![1]);
    }
}
