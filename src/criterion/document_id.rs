use std::cmp::Ordering;

use crate::criterion::Criterion;
use crate::evaluator::ScoredDocument;

/// Tie-break by document id, ascending.
#[derive(Debug, Clone, Copy)]
pub struct DocumentId;

impl Criterion for DocumentId {
    fn evaluate(&self, lhs: &ScoredDocument, rhs: &ScoredDocument) -> Ordering {
        lhs.di.cmp(&rhs.di)
    }

    fn name(&self) -> &str {
        "DocumentId"
    }
}
