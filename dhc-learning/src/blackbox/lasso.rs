use std::fmt::Debug;

use dhc_core::{Color, MealyMachine, Show, Symbol, Word};

use crate::LearnError;

/// An ultimately periodic counterexample `prefix · cycle^ω` produced by a model checker, cut
/// off after a fixed number of unfoldings of the cycle so that it can be posed as a finite
/// query. The lasso also carries the outputs that the hypothesis produces on that finite word.
#[derive(Clone, PartialEq, Eq)]
pub struct Lasso<I, O> {
    prefix: Word<I>,
    cycle: Word<I>,
    unfolds: usize,
    output: Word<O>,
}

impl<I: Symbol, O: Color> Lasso<I, O> {
    /// Builds a lasso over `hypothesis`. The cycle must be non-empty and unfolded at least once.
    pub fn new(
        hypothesis: &MealyMachine<I, O>,
        prefix: Word<I>,
        cycle: Word<I>,
        unfolds: usize,
    ) -> Result<Self, LearnError> {
        if cycle.is_empty() || unfolds == 0 {
            return Err(LearnError::InvalidConfiguration(format!(
                "a lasso needs a non-empty cycle that is unfolded at least once, got {} unfolded {unfolds} times",
                cycle.show()
            )));
        }
        let word = unfold(&prefix, &cycle, unfolds);
        let output = hypothesis.transform(&word).ok_or_else(|| {
            LearnError::MalformedAnswer(format!("hypothesis cannot run {}", word.show()))
        })?;
        Ok(Self {
            prefix,
            cycle,
            unfolds,
            output,
        })
    }

    pub fn prefix(&self) -> &Word<I> {
        &self.prefix
    }

    pub fn cycle(&self) -> &Word<I> {
        &self.cycle
    }

    pub fn unfolds(&self) -> usize {
        self.unfolds
    }

    /// The outputs of the hypothesis on [`Lasso::word`].
    pub fn output(&self) -> &Word<O> {
        &self.output
    }

    /// The finite word `prefix · cycle^unfolds`.
    pub fn word(&self) -> Word<I> {
        unfold(&self.prefix, &self.cycle, self.unfolds)
    }

    /// Positions in [`Lasso::word`] at which a new iteration of the cycle begins, including the
    /// position right after the last iteration.
    pub fn loop_begin_indices(&self) -> Vec<usize> {
        (0..=self.unfolds)
            .map(|k| self.prefix.len() + k * self.cycle.len())
            .collect()
    }
}

fn unfold<I: Clone>(prefix: &Word<I>, cycle: &Word<I>, unfolds: usize) -> Word<I> {
    prefix
        .symbols()
        .chain(std::iter::repeat(cycle.symbols()).take(unfolds).flatten())
        .cloned()
        .collect()
}

impl<I: Debug, O: Debug> Debug for Lasso<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}({:?})^{} / {:?}",
            self.prefix, self.cycle, self.unfolds, self.output
        )
    }
}
