use dhc_core::{Alphabet, Color, MealyMachine, Symbol, Word};

use crate::{LearnError, Query};

mod parallel;
pub use parallel::{ParallelConfig, ParallelOracle, ParallelOracleBuilder, PoolPolicy};

mod simulator;
pub use simulator::{SimulatorEquivalenceOracle, SimulatorOracle};

/// An oracle that answers batches of membership [`Query`]s.
///
/// Implementations must answer every query of a batch and the answer of each query has to
/// correspond exactly to its own prefix and suffix. There is no guarantee regarding the order
/// in which queries are processed, and an implementation must not modify a query in any way
/// other than [answering](Query::answer) it. Any failure aborts the whole batch, queries that
/// happen to have been answered before the failure should not be relied upon.
pub trait MembershipOracle {
    /// The type of input symbols.
    type Input: Symbol;
    /// The type of output symbols.
    type Output: Color;

    /// Answers all given queries.
    fn process_queries(
        &mut self,
        queries: &mut [Query<Self::Input, Self::Output>],
    ) -> Result<(), LearnError>;

    /// Convenience method for answering a single query.
    fn answer_query(
        &mut self,
        prefix: Word<Self::Input>,
        suffix: Word<Self::Input>,
    ) -> Result<Word<Self::Output>, LearnError> {
        let mut batch = [Query::new(prefix, suffix)];
        self.process_queries(&mut batch)?;
        let [query] = batch;
        query.into_output()
    }
}

impl<M: MembershipOracle + ?Sized> MembershipOracle for &mut M {
    type Input = M::Input;
    type Output = M::Output;

    fn process_queries(
        &mut self,
        queries: &mut [Query<Self::Input, Self::Output>],
    ) -> Result<(), LearnError> {
        (**self).process_queries(queries)
    }
}

impl<M: MembershipOracle + ?Sized> MembershipOracle for Box<M> {
    type Input = M::Input;
    type Output = M::Output;

    fn process_queries(
        &mut self,
        queries: &mut [Query<Self::Input, Self::Output>],
    ) -> Result<(), LearnError> {
        (**self).process_queries(queries)
    }
}

/// Searches for a word on which a hypothesis and the system under learning disagree.
/// Implementations only ever read the hypothesis.
pub trait EquivalenceOracle {
    /// The type of input symbols.
    type Input: Symbol;
    /// The type of output symbols.
    type Output: Color;

    /// Gives an answered query whose output differs from what `hypothesis` produces on the
    /// same input, or `None` if no such query could be found.
    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError>;
}

impl<E: EquivalenceOracle + ?Sized> EquivalenceOracle for &mut E {
    type Input = E::Input;
    type Output = E::Output;

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError> {
        (**self).find_counterexample(hypothesis, alphabet)
    }
}

impl<E: EquivalenceOracle + ?Sized> EquivalenceOracle for Box<E> {
    type Input = E::Input;
    type Output = E::Output;

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError> {
        (**self).find_counterexample(hypothesis, alphabet)
    }
}
