//! Pluggable ordering for the evaluator's final result list, modeled
//! directly on `meilidb-core/src/criterion/mod.rs`: a `Criterion` trait
//! compared pairwise, boxed into a chain, with a sensible default.

mod document_id;
mod score;

use std::cmp::Ordering;

pub use self::document_id::DocumentId;
pub use self::score::Score;

use crate::evaluator::ScoredDocument;

pub trait Criterion {
    fn evaluate(&self, lhs: &ScoredDocument, rhs: &ScoredDocument) -> Ordering;

    fn name(&self) -> &str;

    #[inline]
    fn eq(&self, lhs: &ScoredDocument, rhs: &ScoredDocument) -> bool {
        self.evaluate(lhs, rhs) == Ordering::Equal
    }
}

impl<T: Criterion + ?Sized> Criterion for Box<T> {
    fn evaluate(&self, lhs: &ScoredDocument, rhs: &ScoredDocument) -> Ordering {
        (**self).evaluate(lhs, rhs)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Default)]
pub struct CriteriaBuilder {
    inner: Vec<Box<dyn Criterion>>,
}

impl CriteriaBuilder {
    pub fn new() -> CriteriaBuilder {
        CriteriaBuilder { inner: Vec::new() }
    }

    pub fn add<C: Criterion + 'static>(mut self, criterion: C) -> CriteriaBuilder {
        self.inner.push(Box::new(criterion));
        self
    }

    pub fn build(self) -> Criteria {
        Criteria { inner: self.inner }
    }
}

/// An ordered chain of criteria: ties under the first are broken by the
/// second, and so on.
pub struct Criteria {
    inner: Vec<Box<dyn Criterion>>,
}

impl Default for Criteria {
    /// Score descending, ties broken by `di` ascending — `spec.md` §4.K's
    /// final ordering.
    fn default() -> Criteria {
        CriteriaBuilder::new().add(Score).add(DocumentId).build()
    }
}

impl Criteria {
    pub fn evaluate(&self, lhs: &ScoredDocument, rhs: &ScoredDocument) -> Ordering {
        for criterion in &self.inner {
            match criterion.evaluate(lhs, rhs) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl AsRef<[Box<dyn Criterion>]> for Criteria {
    fn as_ref(&self) -> &[Box<dyn Criterion>] {
        &self.inner
    }
}
