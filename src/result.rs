//! The result-set algebra: sorted arrays of per-document matches, merged by
//! two-pointer scans the way `original_source/archer_query_array.c`'s
//! `archer_query_array_union`/`_intersection`/`_subtract`/`_append` family
//! does it, and as `meilidb-core/src/query_builder.rs` combines its own
//! per-word document sets.
//!
//! Every operation here constructs fresh containers; inputs are never
//! mutated (`append` is the one documented exception).

use crate::{Pos, WordId};

/// One matched word (or bare label) at a document, with every position it
/// occurred at there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordOccurrence {
    pub wi: WordId,
    pub is_label: bool,
    pub pi: Vec<Pos>,
}

impl WordOccurrence {
    pub fn new(wi: WordId, is_label: bool, pi: Vec<Pos>) -> WordOccurrence {
        WordOccurrence { wi, is_label, pi }
    }

    /// Ordering key: `(wi, is_label)`, with label entries sorted first at
    /// equal `wi`, per `spec.md` §3.
    fn key(&self) -> (WordId, bool) {
        // `false < true` would put labels *after* plain words; negate the
        // bool so labels (`true`) sort first.
        (self.wi, !self.is_label)
    }
}

fn merge_pis(a: &[Pos], b: &[Pos]) -> Vec<Pos> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Union two `wo` lists (sorted by `(wi, is_label)`), merging position lists
/// at matching keys.
pub fn union_wo(a: &[WordOccurrence], b: &[WordOccurrence]) -> Vec<WordOccurrence> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].key().cmp(&b[j].key()) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(WordOccurrence::new(a[i].wi, a[i].is_label, merge_pis(&a[i].pi, &b[j].pi)));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend(a[i..].iter().cloned());
    out.extend(b[j..].iter().cloned());
    out
}

/// One document's matches: every word/label occurrence found there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Result {
    pub di: crate::DocId,
    pub wo: Vec<WordOccurrence>,
}

impl Result {
    pub fn new(di: crate::DocId, wo: Vec<WordOccurrence>) -> Result {
        Result { di, wo }
    }
}

/// Two-pointer intersection by `di`: only documents present in both sides
/// survive, with their `wo` lists unioned.
pub fn intersection(a: &[Result], b: &[Result]) -> Vec<Result> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].di.cmp(&b[j].di) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(Result::new(a[i].di, union_wo(&a[i].wo, &b[j].wo)));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Two-pointer union by `di`: documents present on either side survive;
/// documents present on both have their `wo` lists unioned.
pub fn union(a: &[Result], b: &[Result]) -> Vec<Result> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].di.cmp(&b[j].di) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(Result::new(a[i].di, union_wo(&a[i].wo, &b[j].wo)));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend(a[i..].iter().cloned());
    out.extend(b[j..].iter().cloned());
    out
}

/// Documents of `a` with no counterpart in `b`. Per design note (Open
/// Question #2), `a == b` simply yields the empty list; the only real
/// requirement is `b`'s `di` set is a subset of `a`'s.
pub fn subtract(a: &[Result], b: &[Result]) -> Vec<Result> {
    let mut out = Vec::with_capacity(a.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() {
        if j < b.len() && a[i].di == b[j].di {
            i += 1;
            j += 1;
        } else if j < b.len() && b[j].di < a[i].di {
            j += 1;
        } else {
            out.push(a[i].clone());
            i += 1;
        }
    }
    out
}

/// Append `from` onto `onto` in place, consuming `from`. If the tail `di` of
/// `onto` equals the head `di` of `from`, the two boundary entries are
/// merged (their `wo` lists unioned) rather than duplicated.
pub fn append(onto: &mut Vec<Result>, mut from: Vec<Result>) {
    if from.is_empty() {
        return;
    }
    if let (Some(last), Some(first)) = (onto.last(), from.first()) {
        if last.di == first.di {
            let merged_wo = union_wo(&onto.last().unwrap().wo, &first.wo);
            onto.last_mut().unwrap().wo = merged_wo;
            from.remove(0);
        }
    }
    onto.append(&mut from);
}

/// Linear scan for membership by `di`.
pub fn contains(a: &[Result], di: crate::DocId) -> bool {
    a.binary_search_by_key(&di, |r| r.di).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(di: i64, entries: &[(i64, bool, &[i64])]) -> Result {
        Result::new(
            di,
            entries
                .iter()
                .map(|&(wi, is_label, pi)| WordOccurrence::new(wi, is_label, pi.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn union_is_commutative() {
        let a = vec![r(0, &[(1, false, &[0])])];
        let b = vec![r(0, &[(2, false, &[1])]), r(1, &[(1, false, &[0])])];
        assert_eq!(union(&a, &b), union(&b, &a));
    }

    #[test]
    fn intersection_is_idempotent() {
        let a = vec![r(0, &[(1, false, &[0, 2])]), r(2, &[(1, false, &[0])])];
        assert_eq!(intersection(&a, &a), a);
    }

    #[test]
    fn subtract_self_is_empty() {
        let a = vec![r(0, &[(1, false, &[0])]), r(3, &[(1, false, &[1])])];
        assert!(subtract(&a, &a).is_empty());
    }

    #[test]
    fn union_then_subtract_is_subset() {
        let a = vec![r(0, &[(1, false, &[0])])];
        let b = vec![r(1, &[(1, false, &[0])])];
        let combined = union(&a, &b);
        let back = subtract(&combined, &b);
        for result in &back {
            assert!(contains(&a, result.di));
        }
    }

    #[test]
    fn append_merges_matching_boundary() {
        let mut onto = vec![r(0, &[(1, false, &[0])]), r(2, &[(1, false, &[0])])];
        let from = vec![r(2, &[(2, false, &[1])]), r(5, &[(1, false, &[0])])];
        let expected_tail_wo = union_wo(&[WordOccurrence::new(1, false, vec![0])], &[WordOccurrence::new(2, false, vec![1])]);

        append(&mut onto, from);

        assert_eq!(onto.len(), 3);
        assert_eq!(onto[1].di, 2);
        assert_eq!(onto[1].wo, expected_tail_wo);
        assert_eq!(onto[2].di, 5);
    }

    #[test]
    fn append_is_plain_concat_when_disjoint() {
        let mut onto = vec![r(0, &[(1, false, &[0])])];
        let from = vec![r(5, &[(1, false, &[0])])];
        append(&mut onto, from);
        assert_eq!(onto.iter().map(|r| r.di).collect::<Vec<_>>(), vec![0, 5]);
    }

    #[test]
    fn label_occurrences_sort_before_plain_words_at_equal_wi() {
        let merged = union_wo(
            &[WordOccurrence::new(3, false, vec![0])],
            &[WordOccurrence::new(3, true, vec![1])],
        );
        assert_eq!(merged.len(), 2);
        assert!(merged[0].is_label);
        assert!(!merged[1].is_label);
    }
}
