use std::{collections::VecDeque, marker::PhantomData};

use dhc_core::{math, mealy::StateIndex, Alphabet, Color, MealyMachine, Show, Symbol, Word};
use tracing::debug;

use super::{Lasso, ModelChecker};
use crate::LearnError;

/// A model checker for safety properties of the form "the output `o` never occurs". Each
/// property is registered under a name, which is what [`ModelChecker::find_counterexample`]
/// expects as the property.
///
/// A violation is reported as a lasso whose prefix is a shortest word that ends with the
/// forbidden output, followed by the cycle that is closed by repeatedly reading the first
/// symbol of the alphabet that has a transition.
#[derive(Debug, Clone)]
pub struct ForbiddenOutputChecker<I, O> {
    properties: math::Map<String, O>,
    unfolds: usize,
    _input: PhantomData<I>,
}

impl<I: Symbol, O: Color> ForbiddenOutputChecker<I, O> {
    /// Creates a checker that unfolds the cycles of reported lassos `unfolds` times.
    pub fn new(unfolds: usize) -> Self {
        Self {
            properties: math::Map::default(),
            unfolds,
            _input: PhantomData,
        }
    }

    /// Registers the property `name`, which is violated as soon as `forbidden` is emitted.
    pub fn with_property<N: Into<String>>(mut self, name: N, forbidden: O) -> Self {
        self.properties.insert(name.into(), forbidden);
        self
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> + '_ {
        self.properties.keys().map(String::as_str)
    }
}

/// Breadth-first search for a shortest input word whose last transition emits `forbidden`.
fn reach_output<I: Symbol, O: Color>(
    hypothesis: &MealyMachine<I, O>,
    alphabet: &Alphabet<I>,
    forbidden: &O,
) -> Option<(Word<I>, StateIndex)> {
    let initial = hypothesis.initial()?;
    let mut seen: math::Set<StateIndex> = math::Set::default();
    let mut queue = VecDeque::from([(initial, Word::epsilon())]);
    seen.insert(initial);
    while let Some((state, access)) = queue.pop_front() {
        for sym in alphabet.universe() {
            let Some((target, output)) = hypothesis.transition(state, sym) else {
                continue;
            };
            if output == forbidden {
                return Some((access.append(sym), target));
            }
            if seen.insert(target) {
                queue.push_back((target, access.append(sym)));
            }
        }
    }
    None
}

/// Walks from `state` along the first available symbol until a state repeats. Gives the word
/// leading into the cycle and the cycle itself.
fn close_cycle<I: Symbol, O: Color>(
    hypothesis: &MealyMachine<I, O>,
    alphabet: &Alphabet<I>,
    state: StateIndex,
) -> Option<(Word<I>, Word<I>)> {
    let mut positions: math::Map<StateIndex, usize> = math::Map::default();
    let mut path: Vec<I> = Vec::new();
    let mut current = state;
    loop {
        if let Some(&position) = positions.get(&current) {
            let (stem, cycle) = path.split_at(position);
            return Some((Word::from(stem), Word::from(cycle)));
        }
        positions.insert(current, path.len());
        let (sym, target) = alphabet
            .universe()
            .find_map(|sym| hypothesis.successor(current, sym).map(|q| (sym, q)))?;
        path.push(sym);
        current = target;
    }
}

impl<I: Symbol, O: Color> ModelChecker for ForbiddenOutputChecker<I, O> {
    type Input = I;
    type Output = O;

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<I, O>,
        alphabet: &Alphabet<I>,
        property: &str,
    ) -> Result<Option<Lasso<I, O>>, LearnError> {
        let forbidden = self
            .properties
            .get(property)
            .ok_or_else(|| LearnError::Property(format!("unknown property {property}")))?;
        let Some((prefix, reached)) = reach_output(hypothesis, alphabet, forbidden) else {
            debug!("hypothesis satisfies {property}");
            return Ok(None);
        };
        let (stem, cycle) = close_cycle(hypothesis, alphabet, reached).ok_or_else(|| {
            LearnError::Property(format!(
                "cannot close a cycle after {} in an incomplete hypothesis",
                prefix.show()
            ))
        })?;
        let lasso = Lasso::new(hypothesis, prefix.concat(&stem), cycle, self.unfolds)?;
        debug!("hypothesis violates {property}, lasso {lasso:?}");
        Ok(Some(lasso))
    }
}
