//! `Evaluator`: drives [`crate::query_index`] cursors over a [`QueryModel`]
//! and combines per-term results with [`crate::result`]'s set algebra
//! (`union`/`intersection`/`subtract`, grounded on
//! `original_source/archer_query_array.c`) to produce a final ranked result
//! set. There is no single driver function in the retrieved sources playing
//! `bow_query_do`'s role — see `DESIGN.md` for the full grounding.

use hashbrown::HashMap;
use log::{debug, trace};
use ordered_float::OrderedFloat;

use crate::criterion::Criteria;
use crate::error::Result;
use crate::index::Index;
use crate::query::{QueryModel, QueryTerm};
use crate::query_index::{self, TermCursor};
use crate::result::{self, Result as SearchResult, WordOccurrence};
use crate::result_table::ResultTable;
use crate::{DocId, WordId};

/// One document in the final ranked list: its accumulated score and every
/// matching word/label occurrence found there.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub di: DocId,
    pub score: OrderedFloat<f64>,
    pub wo: Vec<WordOccurrence>,
}

pub struct Evaluator;

impl Evaluator {
    /// Run `query` against `index`, returning documents ordered by the
    /// default [`Criteria`] chain (score descending, `di` ascending).
    ///
    /// Final result = `(ranking ∩ inclusion) \ exclusion`, per `spec.md`
    /// §4.K — except that an empty group is treated as "no constraint"
    /// rather than the empty set, so a query with only inclusion terms
    /// (`spec.md` §8 scenario S2) is not vacuously empty.
    pub fn search(index: &mut Index, query: &QueryModel) -> Result<Vec<ScoredDocument>> {
        trace!(
            "evaluating query: {} ranking, {} inclusion, {} exclusion terms",
            query.ranking.len(),
            query.inclusion.len(),
            query.exclusion.len()
        );

        let mut scores: HashMap<DocId, f64> = HashMap::new();
        let ranking = if query.ranking.is_empty() {
            None
        } else {
            Some(union_group(index, &query.ranking, Some(&mut scores))?)
        };
        let inclusion = if query.inclusion.is_empty() {
            None
        } else {
            Some(intersection_group(index, &query.inclusion)?)
        };
        let exclusion = if query.exclusion.is_empty() {
            None
        } else {
            Some(union_group(index, &query.exclusion, None)?)
        };

        let combined = match (ranking, inclusion) {
            (Some(r), Some(i)) => result::intersection(&r, &i),
            (Some(r), None) => r,
            (None, Some(i)) => i,
            (None, None) => Vec::new(),
        };

        // Materialize-then-combine path (`spec.md` §4.K): rather than
        // subtracting the excluded `di`s directly out of `combined`, record
        // them into a `ResultTable` sized to the corpus and `invert()` it to
        // get every document the exclusion group did *not* match, then
        // intersect that complement against `combined`.
        let final_results = match exclusion {
            Some(e) => {
                let num_documents = index.doctable.count();
                let mut table = ResultTable::new(num_documents);
                for r in e {
                    for wo in r.wo {
                        table.record(r.di, wo);
                    }
                }
                table.invert();
                let allowed = table.to_result_list_consuming();
                result::intersection(&combined, &allowed)
            }
            None => combined,
        };

        let mut scored: Vec<ScoredDocument> = final_results
            .into_iter()
            .map(|r| ScoredDocument { di: r.di, score: OrderedFloat(*scores.get(&r.di).unwrap_or(&0.0)), wo: r.wo })
            .collect();

        let criteria = Criteria::default();
        scored.sort_by(|a, b| {
            criteria.evaluate(a, b)
        });

        debug!("query produced {} documents", scored.len());
        Ok(scored)
    }
}

/// Resolve a term's stream identity for building [`WordOccurrence`]s:
/// `(id, is_label)`. `-1` means the term named something absent from the
/// corpus; such a term simply never contributes a match.
fn stream_identity(index: &Index, word: Option<&str>, labels: &[String]) -> (WordId, bool) {
    if let Some(word) = word {
        (index.words.intern_lookup(word), false)
    } else if let Some(label) = labels.first() {
        (index.labels.intern_lookup(label), true)
    } else {
        (-1, false)
    }
}

fn idf_of(count: i64, num_documents: usize) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    ((num_documents.max(1) as f64) / (1.0 + count as f64)).ln().max(0.0)
}

fn term_count(index: &Index, word: Option<&str>, labels: &[String]) -> i64 {
    if let Some(word) = word {
        let wi = index.words.intern_lookup(word);
        if wi < 0 {
            return 0;
        }
        index.wi2pv.get(wi as usize).map(|pv| pv.count).unwrap_or(0)
    } else if let Some(label) = labels.first() {
        let li = index.labels.intern_lookup(label);
        if li < 0 {
            return 0;
        }
        index.li2pv.get(li as usize).map(|pv| pv.count).unwrap_or(0)
    } else {
        0
    }
}

/// Materialize every document matching one term (label-filtered, and
/// proximity-filtered if the term carries a sub-query) into a `Result`
/// list, one `WordOccurrence` per document holding that term's matching
/// positions there.
fn single_term_results(index: &mut Index, term: &QueryTerm) -> Result<Vec<SearchResult>> {
    if term.is_range() {
        // Range terms are part of the `spec.md` §3/§4.G data model but no
        // operation ever defines how one matches (see DESIGN.md's Open
        // Question #5); reject explicitly rather than silently resolving
        // to "no matches".
        return Err(crate::error::Error::FormatError(
            "range terms (range_start/range_end) are not implemented".into(),
        ));
    }

    let (id, is_label) = stream_identity(index, term.word.as_deref(), &term.labels);
    if id < 0 {
        return Ok(Vec::new());
    }

    let cursor = TermCursor::resolve(index, term);
    let sub_cursor = term.proximity.as_ref().map(|p| (TermCursor::resolve_raw(index, p.word.as_deref(), &p.labels), p.window));

    let mut out = Vec::new();
    loop {
        let (di, _pi) = query_index::current_di(index, &cursor)?;
        if di == -1 {
            break;
        }
        let positions = query_index::current_pis(index, &cursor)?;

        let include = match &sub_cursor {
            None => true,
            Some((sub, window)) => {
                let sub_di = advance_to(index, sub, di)?;
                if sub_di != di {
                    false
                } else {
                    let sub_positions = query_index::current_pis(index, sub)?;
                    positions.iter().any(|&p| sub_positions.iter().any(|&q| (p - q).abs() <= *window))
                }
            }
        };

        if include && !positions.is_empty() {
            // `current_di` only ever advances, so each `di` reached here is
            // strictly greater than the last one pushed — `append`'s
            // boundary-merge check never fires, but it is still the
            // accumulation primitive driving proximity matching's result
            // list, per `spec.md`'s note that `append` backs both the
            // evaluator and proximity matching.
            result::append(&mut out, vec![SearchResult::new(di, vec![WordOccurrence::new(id, is_label, positions)])]);
        }

        if query_index::next_di(index, &cursor)? == -1 {
            break;
        }
    }
    Ok(out)
}

/// Advance `cursor` forward (permanently) until its current `di` is `>=
/// target`, or it is exhausted. Used to keep a proximity sub-term's cursor
/// in lockstep with its parent as both scan forward monotonically.
fn advance_to(index: &mut Index, cursor: &TermCursor, target: DocId) -> Result<DocId> {
    loop {
        let (di, _) = query_index::current_di(index, cursor)?;
        if di == -1 || di >= target {
            return Ok(di);
        }
        if query_index::next_di(index, cursor)? == -1 {
            return Ok(-1);
        }
    }
}

fn union_group(
    index: &mut Index,
    terms: &[QueryTerm],
    mut scores: Option<&mut HashMap<DocId, f64>>,
) -> Result<Vec<SearchResult>> {
    let num_documents = index.doctable.count();
    let mut combined: Vec<SearchResult> = Vec::new();
    for term in terms {
        let results = single_term_results(index, term)?;
        if let Some(scores) = scores.as_deref_mut() {
            let count = term_count(index, term.word.as_deref(), &term.labels);
            let idf = idf_of(count, num_documents);
            let contribution = term.weight * if idf > 0.0 { idf } else { 1.0 };
            for r in &results {
                *scores.entry(r.di).or_insert(0.0) += contribution;
            }
        }
        combined = if combined.is_empty() { results } else { result::union(&combined, &results) };
    }
    Ok(combined)
}

fn intersection_group(index: &mut Index, terms: &[QueryTerm]) -> Result<Vec<SearchResult>> {
    let mut iter = terms.iter();
    let first = match iter.next() {
        Some(term) => single_term_results(index, term)?,
        None => return Ok(Vec::new()),
    };
    let mut combined = first;
    for term in iter {
        let results = single_term_results(index, term)?;
        combined = result::intersection(&combined, &results);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::WhitespaceLexer;
    use tempfile::tempdir;

    fn ingest(index: &mut Index, docs: &[(&str, &str)]) {
        for (id, text) in docs {
            index.ingest_document(*id, WhitespaceLexer::new(text)).unwrap();
        }
    }

    #[test]
    fn s1_basic_word_queries() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        ingest(&mut index, &[("d0", "a b a"), ("d1", "b c"), ("d2", "a c a")]);

        let mut query = QueryModel::new();
        query.ranking.push(QueryTerm::word("a"));
        let results = Evaluator::search(&mut index, &query).unwrap();
        let dis: Vec<_> = results.iter().map(|r| r.di).collect();
        assert_eq!(dis, vec![0, 2]);
        assert_eq!(results[0].wo[0].pi, vec![0, 2]);

        let mut query_b = QueryModel::new();
        query_b.ranking.push(QueryTerm::word("b"));
        let results_b = Evaluator::search(&mut index, &query_b).unwrap();
        let dis_b: Vec<_> = results_b.iter().map(|r| r.di).collect();
        assert_eq!(dis_b, vec![0, 1]);
    }

    #[test]
    fn s2_inclusion_and_exclusion() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        ingest(&mut index, &[("d0", "a b a"), ("d1", "b c"), ("d2", "a c a")]);

        let mut query = QueryModel::new();
        query.inclusion.push(QueryTerm::word("a"));
        query.inclusion.push(QueryTerm::word("c"));
        let results = Evaluator::search(&mut index, &query).unwrap();
        assert_eq!(results.iter().map(|r| r.di).collect::<Vec<_>>(), vec![2]);

        let mut query2 = QueryModel::new();
        query2.inclusion.push(QueryTerm::word("a"));
        query2.exclusion.push(QueryTerm::word("c"));
        let results2 = Evaluator::search(&mut index, &query2).unwrap();
        assert_eq!(results2.iter().map(|r| r.di).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn s3_field_labels() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        ingest(&mut index, &[("d0", "[title] a b [/title]"), ("d1", "[title] a [/title]")]);

        let mut query = QueryModel::new();
        query.ranking.push(QueryTerm::bare_label("title"));
        let results = Evaluator::search(&mut index, &query).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].wo[0].pi, vec![0, 1]);
        assert_eq!(results[1].wo[0].pi, vec![0]);

        let mut query2 = QueryModel::new();
        query2.inclusion.push(QueryTerm::word("a").with_labels(vec!["title"]));
        let results2 = Evaluator::search(&mut index, &query2).unwrap();
        assert_eq!(results2.iter().map(|r| r.di).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn s4_proximity_matching() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        ingest(&mut index, &[("d0", "a x b"), ("d1", "a b x")]);

        let mut query = QueryModel::new();
        query.ranking.push(QueryTerm::word("a").with_proximity("b", 1));
        let results = Evaluator::search(&mut index, &query).unwrap();
        assert_eq!(results.iter().map(|r| r.di).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn range_term_is_rejected_explicitly() {
        let dir = tempdir().unwrap();
        let mut index = Index::create(dir.path()).unwrap();
        ingest(&mut index, &[("d0", "a b")]);

        let mut query = QueryModel::new();
        let mut term = QueryTerm::word("");
        term.word = None;
        term.range_start = Some(0);
        term.range_end = Some(1);
        query.inclusion.push(term);

        let err = Evaluator::search(&mut index, &query).unwrap_err();
        assert!(matches!(err, crate::error::Error::FormatError(_)));
    }
}
