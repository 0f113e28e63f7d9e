//! The query surface: a structured value describing ranking, inclusion and
//! exclusion term groups, deserializable from JSON the way
//! `meilidb-core`'s own `Filter`/`Query` values are serde-driven rather than
//! parsed from a hand-rolled grammar (`spec.md` §1 excludes "CLI argument
//! parsing" as a Non-goal feature; this is the structured value behind it).
//!
//! `spec.md` §9 replaces the source's `next`-linked term chain with an
//! ordered sequence per group — each [`QueryModel`] owns three `Vec<QueryTerm>`
//! rather than three linked lists.

use serde::{Deserialize, Serialize};

fn default_weight() -> f64 {
    1.0
}

fn default_idf() -> f64 {
    -1.0
}

/// One query term: a plain word, a bare label, or a range, optionally
/// narrowed to a set of labels and carrying its own proximity sub-term.
///
/// A term owns its `labels` list and its `proximity` sub-term exclusively
/// (`spec.md` §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<i64>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Document frequency, filled in lazily by the evaluator from the
    /// term's stream `count`; `0` until then.
    #[serde(default)]
    pub df: i64,
    /// Inverse document frequency, computed lazily from `df`; `-1.0` means
    /// "not yet computed".
    #[serde(default = "default_idf")]
    pub idf: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proximity: Option<Box<ProximityTerm>>,
}

/// A proximity sub-term: the word/labels to look for near the parent term,
/// and the window (in positions) within which a match counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityTerm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub window: i64,
}

impl QueryTerm {
    pub fn word(word: impl Into<String>) -> QueryTerm {
        QueryTerm {
            word: Some(word.into()),
            labels: Vec::new(),
            range_start: None,
            range_end: None,
            weight: default_weight(),
            df: 0,
            idf: default_idf(),
            proximity: None,
        }
    }

    pub fn bare_label(label: impl Into<String>) -> QueryTerm {
        QueryTerm {
            word: None,
            labels: vec![label.into()],
            range_start: None,
            range_end: None,
            weight: default_weight(),
            df: 0,
            idf: default_idf(),
            proximity: None,
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> QueryTerm {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_proximity(mut self, word: impl Into<String>, window: i64) -> QueryTerm {
        self.proximity = Some(Box::new(ProximityTerm { word: Some(word.into()), labels: Vec::new(), window }));
        self
    }

    /// A word term has no `word` set only when it is a bare label or a
    /// range; this is true for the common case.
    pub fn is_bare_label(&self) -> bool {
        self.word.is_none() && !self.labels.is_empty()
    }

    /// A range term per `spec.md` §3/§4.G: neither a word nor a bare label,
    /// but carrying `range_start`/`range_end`. Range matching itself is not
    /// implemented (see DESIGN.md's Open Question #5) — this is used to
    /// reject such a term explicitly rather than silently resolving it to
    /// "no matches".
    pub fn is_range(&self) -> bool {
        self.word.is_none()
            && self.labels.is_empty()
            && (self.range_start.is_some() || self.range_end.is_some())
    }
}

/// A parsed query: three independently ordered term groups. The model owns
/// its term sequences outright (`spec.md` §9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryModel {
    #[serde(default)]
    pub ranking: Vec<QueryTerm>,
    #[serde(default)]
    pub inclusion: Vec<QueryTerm>,
    #[serde(default)]
    pub exclusion: Vec<QueryTerm>,
}

impl QueryModel {
    pub fn new() -> QueryModel {
        QueryModel::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_minimal_query() {
        let json = r#"{"inclusion":[{"word":"a"},{"labels":["title"]}]}"#;
        let model: QueryModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.inclusion.len(), 2);
        assert_eq!(model.inclusion[0].word.as_deref(), Some("a"));
        assert!(model.inclusion[1].is_bare_label());
        assert_eq!(model.inclusion[0].weight, 1.0);
    }

    #[test]
    fn proximity_sub_term_round_trips() {
        let term = QueryTerm::word("a").with_proximity("b", 1);
        let json = serde_json::to_string(&term).unwrap();
        let back: QueryTerm = serde_json::from_str(&json).unwrap();
        assert_eq!(back.proximity.unwrap().window, 1);
    }
}
