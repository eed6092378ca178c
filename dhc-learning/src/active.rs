use dhc_core::{Color, MealyMachine, Symbol};

use crate::{LearnError, Query};

mod dhc;
pub use dhc::MealyDhc;

mod suffixes;
pub use suffixes::{AllSuffixes, SuffixExtractor, Whole};

/// The outcome of refining a hypothesis with a counterexample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refinement {
    /// Number of states before the refinement.
    pub states_before: usize,
    /// Number of states of the relearned hypothesis.
    pub states_after: usize,
    /// How many new splitters were extracted from the counterexample.
    pub added_suffixes: usize,
}

impl Refinement {
    /// A genuine counterexample always changes the number of states of the relearned
    /// hypothesis.
    pub fn is_progress(&self) -> bool {
        self.states_before != self.states_after
    }

    /// The counterexample was accepted but did not change the hypothesis, which means that it
    /// was not a counterexample to begin with.
    pub fn is_anomalous(&self) -> bool {
        !self.is_progress()
    }
}

/// An active learner for Mealy machines.
pub trait LearningAlgorithm {
    type Input: Symbol;
    type Output: Color;

    /// Builds the first hypothesis.
    fn start_learning(&mut self) -> Result<(), LearnError>;

    /// Incorporates `counterexample` and relearns. Fails if no hypothesis exists yet.
    fn refine_hypothesis(
        &mut self,
        counterexample: &Query<Self::Input, Self::Output>,
    ) -> Result<Refinement, LearnError>;

    /// The current hypothesis, or [`LearnError::NoHypothesis`] if learning has not started.
    fn hypothesis(&self) -> Result<&MealyMachine<Self::Input, Self::Output>, LearnError>;
}

impl<L: LearningAlgorithm + ?Sized> LearningAlgorithm for &mut L {
    type Input = L::Input;
    type Output = L::Output;

    fn start_learning(&mut self) -> Result<(), LearnError> {
        (**self).start_learning()
    }

    fn refine_hypothesis(
        &mut self,
        counterexample: &Query<Self::Input, Self::Output>,
    ) -> Result<Refinement, LearnError> {
        (**self).refine_hypothesis(counterexample)
    }

    fn hypothesis(&self) -> Result<&MealyMachine<Self::Input, Self::Output>, LearnError> {
        (**self).hypothesis()
    }
}
