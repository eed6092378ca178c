use std::{collections::VecDeque, fmt::Debug};

use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use crate::{math, Alphabet, Color, Show, Symbol, Word};

/// Identifies a state of a [`MealyMachine`]. Indices are handed out consecutively starting
/// at zero and are only meaningful for the machine that created them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateIndex(u32);

impl StateIndex {
    /// Creates an index from its position in the state arena.
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of the state in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Show for StateIndex {
    fn show(&self) -> String {
        format!("q{}", self.0)
    }
}

impl Debug for StateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Errors that can occur while building or modifying a [`MealyMachine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MealyError {
    /// The referenced state does not exist in the machine.
    #[error("state {0:?} does not exist")]
    UnknownState(StateIndex),
    /// The symbol is not part of the input alphabet.
    #[error("symbol {0} is not part of the input alphabet")]
    UnknownSymbol(String),
    /// Transitions are added exactly once, a second transition on the same input is rejected.
    #[error("state {0:?} already has a transition on {1}")]
    DuplicateTransition(StateIndex, String),
    /// An initial state has already been designated.
    #[error("the machine already has initial state {0:?}")]
    InitialExists(StateIndex),
}

/// A deterministic Mealy machine over the input alphabet `I` with outputs of type `O`.
///
/// States live in an arena that is owned by the machine, transitions are stored per state in a
/// row that has one slot for every symbol of the alphabet. A machine only ever grows, there is
/// no way of removing states or transitions.
///
/// # Example
/// ```
/// use dhc_core::prelude::*;
/// let mm = MealyMachine::builder()
///     .with_transitions([(0, 'a', 1, 1), (0, 'b', 0, 0), (1, 'a', 2, 0), (1, 'b', 0, 1)])
///     .into_mealy(0)
///     .unwrap();
/// assert_eq!(mm.size(), 2);
/// assert_eq!(mm.transform(&Word::from("aab")), Some(Word::from(vec![1, 2, 0])));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct MealyMachine<I: Symbol, O> {
    alphabet: Alphabet<I>,
    transitions: Vec<Vec<Option<(StateIndex, O)>>>,
    initial: Option<StateIndex>,
}

impl<I: Symbol, O: Color> MealyMachine<I, O> {
    /// Creates a machine without any states for the given alphabet.
    pub fn new(alphabet: Alphabet<I>) -> Self {
        Self {
            alphabet,
            transitions: Vec::new(),
            initial: None,
        }
    }

    /// Gives a [`MealyBuilder`] which constructs a machine from a list of transitions.
    pub fn builder() -> MealyBuilder<I, O> {
        MealyBuilder::default()
    }

    /// Returns a reference to the input alphabet.
    pub fn alphabet(&self) -> &Alphabet<I> {
        &self.alphabet
    }

    /// Returns the number of states.
    pub fn size(&self) -> usize {
        self.transitions.len()
    }

    /// Returns the designated initial state, if one has been added.
    pub fn initial(&self) -> Option<StateIndex> {
        self.initial
    }

    /// Adds a state without any outgoing transitions and returns its index.
    pub fn add_state(&mut self) -> StateIndex {
        let index = StateIndex::new(self.transitions.len());
        self.transitions.push(vec![None; self.alphabet.size()]);
        index
    }

    /// Adds a state and designates it as the initial state. Fails if the machine already has
    /// an initial state.
    pub fn add_initial_state(&mut self) -> Result<StateIndex, MealyError> {
        if let Some(initial) = self.initial {
            return Err(MealyError::InitialExists(initial));
        }
        let state = self.add_state();
        self.initial = Some(state);
        Ok(state)
    }

    /// Adds the transition `source --input/output--> target`. Every state has at most one
    /// transition per input, adding a second one fails with [`MealyError::DuplicateTransition`].
    pub fn add_transition(
        &mut self,
        source: StateIndex,
        input: I,
        target: StateIndex,
        output: O,
    ) -> Result<(), MealyError> {
        if target.index() >= self.size() {
            return Err(MealyError::UnknownState(target));
        }
        let position = self
            .alphabet
            .index_of(input)
            .ok_or_else(|| MealyError::UnknownSymbol(input.show()))?;
        let slot = self
            .transitions
            .get_mut(source.index())
            .ok_or(MealyError::UnknownState(source))?
            .get_mut(position)
            .ok_or_else(|| MealyError::UnknownSymbol(input.show()))?;
        if slot.is_some() {
            return Err(MealyError::DuplicateTransition(source, input.show()));
        }
        trace!(
            "adding transition {} --{}/{:?}--> {}",
            source.show(),
            input.show(),
            output,
            target.show()
        );
        *slot = Some((target, output));
        Ok(())
    }

    /// Gives the target state and output of the transition from `state` on `input`.
    pub fn transition(&self, state: StateIndex, input: I) -> Option<(StateIndex, &O)> {
        let position = self.alphabet.index_of(input)?;
        self.transitions
            .get(state.index())?
            .get(position)?
            .as_ref()
            .map(|(target, output)| (*target, output))
    }

    /// Gives the state that is reached from `state` on `input`.
    pub fn successor(&self, state: StateIndex, input: I) -> Option<StateIndex> {
        self.transition(state, input).map(|(target, _)| target)
    }

    /// Gives the output that is emitted when reading `input` in `state`.
    pub fn transition_output(&self, state: StateIndex, input: I) -> Option<&O> {
        self.transition(state, input).map(|(_, output)| output)
    }

    /// Iterates over all states.
    pub fn states(&self) -> impl Iterator<Item = StateIndex> {
        (0..self.size()).map(StateIndex::new)
    }

    /// Iterates over the outgoing transitions of `state` in alphabet order as triples of
    /// input, target and output.
    pub fn transitions_from(
        &self,
        state: StateIndex,
    ) -> impl Iterator<Item = (I, StateIndex, &O)> + '_ {
        self.transitions
            .get(state.index())
            .into_iter()
            .flat_map(|row| row.iter().enumerate())
            .filter_map(|(position, slot)| {
                slot.as_ref()
                    .map(|(target, output)| (self.alphabet[position], *target, output))
            })
    }

    /// Iterates over all transitions as tuples `(source, input, output, target)`, the same
    /// format that [`MealyBuilder::with_transitions`] accepts.
    pub fn edges(&self) -> impl Iterator<Item = (StateIndex, I, &O, StateIndex)> + '_ {
        self.states().flat_map(move |source| {
            self.transitions_from(source)
                .map(move |(input, target, output)| (source, input, output, target))
        })
    }

    /// Returns `true` if every state has a transition for every symbol of the alphabet.
    pub fn is_complete(&self) -> bool {
        self.transitions.iter().flatten().all(Option::is_some)
    }

    /// Gives the state reached from `state` by reading `input`.
    pub fn reached_from(&self, state: StateIndex, input: &Word<I>) -> Option<StateIndex> {
        input
            .symbols()
            .try_fold(state, |q, sym| self.successor(q, *sym))
    }

    /// Gives the state reached from the initial state by reading `input`.
    pub fn reached(&self, input: &Word<I>) -> Option<StateIndex> {
        self.reached_from(self.initial?, input)
    }

    /// Runs `input` from `state` and collects the emitted outputs. Gives back `None` if some
    /// transition along the way is missing.
    pub fn transform_from(&self, state: StateIndex, input: &Word<I>) -> Option<Word<O>> {
        let mut current = state;
        let mut outputs = Vec::with_capacity(input.len());
        for sym in input {
            let (target, output) = self.transition(current, *sym)?;
            outputs.push(output.clone());
            current = target;
        }
        Some(outputs.into())
    }

    /// Runs `input` from the initial state and collects the emitted outputs.
    pub fn transform(&self, input: &Word<I>) -> Option<Word<O>> {
        self.transform_from(self.initial?, input)
    }

    /// Attempts to construct a word on which the two machines produce different outputs, or
    /// on which a transition exists in one machine but not in the other. The product of both
    /// machines is explored breadth-first from the pair of initial states, so the returned
    /// witness has minimal length. If no such word exists, `None` is returned.
    pub fn witness_inequivalence(&self, other: &MealyMachine<I, O>) -> Option<Word<I>> {
        let (Some(left), Some(right)) = (self.initial, other.initial) else {
            return match (self.initial, other.initial) {
                (None, None) => None,
                _ => Some(Word::epsilon()),
            };
        };

        let symbols = self
            .alphabet
            .universe()
            .chain(other.alphabet.universe().filter(|s| !self.alphabet.contains(*s)))
            .collect_vec();

        let mut seen: math::Set<(StateIndex, StateIndex)> = math::Set::default();
        let mut queue = VecDeque::from([(left, right, Word::epsilon())]);
        seen.insert((left, right));

        while let Some((l, r, access)) = queue.pop_front() {
            for &sym in &symbols {
                match (self.transition(l, sym), other.transition(r, sym)) {
                    (None, None) => continue,
                    (Some((lt, lo)), Some((rt, ro))) if lo == ro => {
                        if seen.insert((lt, rt)) {
                            queue.push_back((lt, rt, access.append(sym)));
                        }
                    }
                    _ => return Some(access.append(sym)),
                }
            }
        }
        None
    }
}

impl<I: Symbol, O: Color> Debug for MealyMachine<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(
            std::iter::once("state".to_string()).chain(self.alphabet.universe().map(|a| a.show())),
        );
        for (state, row) in self.transitions.iter().enumerate() {
            let state = StateIndex::new(state);
            let marker = if Some(state) == self.initial { "→" } else { "" };
            builder.push_record(std::iter::once(format!("{marker}{}", state.show())).chain(
                row.iter().map(|slot| match slot {
                    Some((target, output)) => format!("{} / {:?}", target.show(), output),
                    None => "-".to_string(),
                }),
            ));
        }
        write!(f, "{}", builder.build())
    }
}

/// Helper for constructing a [`MealyMachine`] from tuples `(source, input, output, target)`,
/// where states are given as consecutive integers starting from zero.
#[derive(Clone, Debug)]
pub struct MealyBuilder<I, O> {
    alphabet: Option<Vec<I>>,
    transitions: Vec<(usize, I, O, usize)>,
}

impl<I, O> Default for MealyBuilder<I, O> {
    fn default() -> Self {
        Self {
            alphabet: None,
            transitions: Vec::new(),
        }
    }
}

impl<I: Symbol, O: Color> MealyBuilder<I, O> {
    /// Fixes the input alphabet. Without this, the alphabet consists of the symbols that
    /// appear in the transitions, in order of their first appearance.
    pub fn with_alphabet(mut self, alphabet: &Alphabet<I>) -> Self {
        self.alphabet = Some(alphabet.universe().collect());
        self
    }

    /// Adds the given transitions.
    pub fn with_transitions<J>(mut self, transitions: J) -> Self
    where
        J: IntoIterator<Item = (usize, I, O, usize)>,
    {
        self.transitions.extend(transitions);
        self
    }

    /// Builds the machine with `initial` as its initial state.
    pub fn into_mealy(self, initial: usize) -> Result<MealyMachine<I, O>, MealyError> {
        let alphabet = match self.alphabet {
            Some(symbols) => Alphabet::new(symbols),
            None => Alphabet::new(self.transitions.iter().map(|(_, a, _, _)| *a)),
        };
        let size = self
            .transitions
            .iter()
            .flat_map(|(p, _, _, q)| [*p, *q])
            .chain(std::iter::once(initial))
            .max()
            .map(|max| max + 1)
            .unwrap_or_default();

        let mut mm = MealyMachine::new(alphabet);
        for _ in 0..size {
            mm.add_state();
        }
        mm.initial = Some(StateIndex::new(initial));
        for (p, a, o, q) in self.transitions {
            mm.add_transition(StateIndex::new(p), a, StateIndex::new(q), o)?;
        }
        Ok(mm)
    }
}
