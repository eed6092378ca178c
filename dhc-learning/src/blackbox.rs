use dhc_core::{Alphabet, Color, MealyMachine, Show, Symbol, Word};
use itertools::Itertools;
use tracing::trace;

use crate::{LearnError, MembershipOracle, OmegaMembershipOracle, OmegaQuery, Query};

mod lasso;
pub use lasso::Lasso;

mod checker;
pub use checker::ForbiddenOutputChecker;

mod property;
pub use property::{BlackBoxOracle, BlackBoxProperty, CexFirstOracle, ModelCheckingProperty};

/// Verifies a hypothesis against a property and reports violations as [`Lasso`]s.
pub trait ModelChecker {
    type Input: Symbol;
    type Output: Color;

    /// Gives a lasso on which `hypothesis` violates `property`, or `None` if the hypothesis
    /// satisfies it.
    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
        property: &str,
    ) -> Result<Option<Lasso<Self::Input, Self::Output>>, LearnError>;
}

/// Decides whether the system under learning actually exhibits the behaviour described by a
/// lasso, i.e. whether the property it violates is violated by the real system as well.
pub trait EmptinessOracle {
    type Input: Symbol;
    type Output: Color;

    /// Gives a query witnessing that the system behaves like `lasso`.
    fn find_counterexample(
        &mut self,
        lasso: &Lasso<Self::Input, Self::Output>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError>;
}

/// Decides whether a lasso reveals a difference between hypothesis and system.
pub trait InclusionOracle {
    type Input: Symbol;
    type Output: Color;

    /// Gives a query on which the system disagrees with the outputs stored in `lasso`.
    fn find_counterexample(
        &mut self,
        lasso: &Lasso<Self::Input, Self::Output>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError>;
}

/// Poses the unfolded lasso as an omega query with snapshots at every loop boundary. The
/// system exhibits the lasso if it produces the same outputs and returns to the same state at
/// two of these boundaries.
pub struct LassoEmptinessOracle<M> {
    oracle: M,
}

impl<M: OmegaMembershipOracle> LassoEmptinessOracle<M> {
    pub fn new(oracle: M) -> Self {
        Self { oracle }
    }
}

impl<M: OmegaMembershipOracle> EmptinessOracle for LassoEmptinessOracle<M> {
    type Input = M::Input;
    type Output = M::Output;

    fn find_counterexample(
        &mut self,
        lasso: &Lasso<M::Input, M::Output>,
    ) -> Result<Option<Query<M::Input, M::Output>>, LearnError> {
        let word = lasso.word();
        let indices = lasso.loop_begin_indices();
        let mut batch = [OmegaQuery::new(
            Word::epsilon(),
            word.clone(),
            indices.iter().copied(),
        )];
        self.oracle.process_omega_queries(&mut batch)?;
        let [query] = batch;

        let output = query.query().clone().into_output()?;
        if &output != lasso.output() {
            trace!("system does not follow lasso {lasso:?}");
            return Ok(None);
        }
        let states = query.states();
        if states.len() != indices.len() {
            return Err(LearnError::MalformedAnswer(format!(
                "expected {} snapshots for {}, got {}",
                indices.len(),
                word.show(),
                states.len()
            )));
        }

        for (i, j) in (0..indices.len()).tuple_combinations() {
            let left = word.prefix(indices[i]);
            let right = word.prefix(indices[j]);
            if self
                .oracle
                .is_same_state(&left, &states[i], &right, &states[j])?
            {
                trace!(
                    "system loops between {} and {}",
                    left.show(),
                    right.show()
                );
                return Ok(Some(Query::answered(Word::epsilon(), word, output)));
            }
        }
        Ok(None)
    }
}

/// Compares the outputs stored in a lasso with the outputs of the system on the same word.
pub struct MembershipInclusionOracle<M> {
    oracle: M,
}

impl<M: MembershipOracle> MembershipInclusionOracle<M> {
    pub fn new(oracle: M) -> Self {
        Self { oracle }
    }
}

impl<M: MembershipOracle> InclusionOracle for MembershipInclusionOracle<M> {
    type Input = M::Input;
    type Output = M::Output;

    fn find_counterexample(
        &mut self,
        lasso: &Lasso<M::Input, M::Output>,
    ) -> Result<Option<Query<M::Input, M::Output>>, LearnError> {
        let word = lasso.word();
        let output = self.oracle.answer_query(Word::epsilon(), word.clone())?;
        if &output == lasso.output() {
            return Ok(None);
        }
        Ok(Some(Query::answered(Word::epsilon(), word, output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sul::MealySimulatorSul, testing, DeepSulOmegaOracle, SimulatorOracle};

    fn never_two() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([(0, 'a', 2, 0), (0, 'b', 0, 0)])
            .into_mealy(0)
            .unwrap()
    }

    #[test_log::test]
    fn emptiness_requires_loop_in_system() {
        let mut emptiness = LassoEmptinessOracle::new(
            DeepSulOmegaOracle::new(MealySimulatorSul::new(testing::toggle())).unwrap(),
        );
        let looping = Lasso::new(&testing::toggle(), Word::from("b"), Word::from("aa"), 1).unwrap();
        let witness = emptiness.find_counterexample(&looping).unwrap().unwrap();
        assert_eq!(witness.input(), Word::from("baa"));

        // after "a" the system is in q1, after "aa" back in q0, so a single unfold of "a"
        // never closes a loop
        let open = Lasso::new(&testing::toggle(), Word::epsilon(), Word::from("a"), 1).unwrap();
        assert_eq!(emptiness.find_counterexample(&open).unwrap(), None);

        // the hypothesis predicts outputs the system does not produce
        let spurious = Lasso::new(&never_two(), Word::epsilon(), Word::from("a"), 2).unwrap();
        assert_eq!(emptiness.find_counterexample(&spurious).unwrap(), None);
    }

    #[test_log::test]
    fn inclusion_compares_outputs() {
        let mut inclusion = MembershipInclusionOracle::new(SimulatorOracle::new(testing::toggle()));
        let spurious = Lasso::new(&never_two(), Word::epsilon(), Word::from("a"), 2).unwrap();
        let cex = inclusion.find_counterexample(&spurious).unwrap().unwrap();
        assert_eq!(cex.input(), Word::from("aa"));
        assert_eq!(cex.output(), Some(&Word::from(vec![1, 2])));

        let genuine = Lasso::new(&testing::toggle(), Word::epsilon(), Word::from("a"), 2).unwrap();
        assert_eq!(inclusion.find_counterexample(&genuine).unwrap(), None);
    }
}
