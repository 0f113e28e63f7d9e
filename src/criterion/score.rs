use std::cmp::Ordering;

use crate::criterion::Criterion;
use crate::evaluator::ScoredDocument;

/// Rank by accumulated weighted score, descending.
#[derive(Debug, Clone, Copy)]
pub struct Score;

impl Criterion for Score {
    fn evaluate(&self, lhs: &ScoredDocument, rhs: &ScoredDocument) -> Ordering {
        rhs.score.cmp(&lhs.score)
    }

    fn name(&self) -> &str {
        "Score"
    }
}
