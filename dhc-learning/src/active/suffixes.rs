use dhc_core::{Symbol, Word};

use crate::Query;

/// Derives candidate distinguishing suffixes from a counterexample.
pub trait SuffixExtractor<I, O> {
    fn extract(&self, counterexample: &Query<I, O>) -> Vec<Word<I>>;
}

/// Every non-empty suffix of the counterexample's input word, longest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllSuffixes;

impl<I: Symbol, O> SuffixExtractor<I, O> for AllSuffixes {
    fn extract(&self, counterexample: &Query<I, O>) -> Vec<Word<I>> {
        counterexample.input().suffixes().collect()
    }
}

/// Only the counterexample's input word itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Whole;

impl<I: Symbol, O> SuffixExtractor<I, O> for Whole {
    fn extract(&self, counterexample: &Query<I, O>) -> Vec<Word<I>> {
        vec![counterexample.input()]
    }
}

impl<I, O, F> SuffixExtractor<I, O> for F
where
    F: Fn(&Query<I, O>) -> Vec<Word<I>>,
{
    fn extract(&self, counterexample: &Query<I, O>) -> Vec<Word<I>> {
        (self)(counterexample)
    }
}
