use dhc_core::{Alphabet, Color, MealyMachine, Show, Symbol, Word};
use tracing::trace;

use crate::{EquivalenceOracle, LearnError, MembershipOracle, Query, SulError};

/// A membership oracle that answers queries by running them through a known
/// [`MealyMachine`].
#[derive(Clone)]
pub struct SimulatorOracle<I: Symbol, O> {
    machine: MealyMachine<I, O>,
}

impl<I: Symbol, O: Color> SimulatorOracle<I, O> {
    /// Creates a new oracle simulating `machine`.
    pub fn new(machine: MealyMachine<I, O>) -> Self {
        Self { machine }
    }

    /// Returns a reference to the simulated machine.
    pub fn machine(&self) -> &MealyMachine<I, O> {
        &self.machine
    }
}

impl<I: Symbol, O: Color> MembershipOracle for SimulatorOracle<I, O> {
    type Input = I;
    type Output = O;

    fn process_queries(&mut self, queries: &mut [Query<I, O>]) -> Result<(), LearnError> {
        for query in queries {
            let Some(state) = self.machine.reached(query.prefix()) else {
                return Err(SulError::Fault(format!("cannot run {}", query.prefix().show())).into());
            };
            let output = self
                .machine
                .transform_from(state, query.suffix())
                .ok_or_else(|| SulError::Fault(format!("cannot run {}", query.input().show())))?;
            query.answer(output);
        }
        Ok(())
    }
}

/// An equivalence oracle that knows the target machine and compares hypotheses against it
/// exactly, see [`MealyMachine::witness_inequivalence`].
#[derive(Clone)]
pub struct SimulatorEquivalenceOracle<I: Symbol, O> {
    target: MealyMachine<I, O>,
}

impl<I: Symbol, O: Color> SimulatorEquivalenceOracle<I, O> {
    /// Creates a new oracle for the given target.
    pub fn new(target: MealyMachine<I, O>) -> Self {
        Self { target }
    }
}

impl<I: Symbol, O: Color> EquivalenceOracle for SimulatorEquivalenceOracle<I, O> {
    type Input = I;
    type Output = O;

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<I, O>,
        _alphabet: &Alphabet<I>,
    ) -> Result<Option<Query<I, O>>, LearnError> {
        let Some(witness) = hypothesis.witness_inequivalence(&self.target) else {
            return Ok(None);
        };
        trace!("hypothesis and target disagree on {}", witness.show());
        let output = self
            .target
            .transform(&witness)
            .ok_or_else(|| SulError::Fault(format!("target cannot run {}", witness.show())))?;
        Ok(Some(Query::answered(Word::epsilon(), witness, output)))
    }
}
