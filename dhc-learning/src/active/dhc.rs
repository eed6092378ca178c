use std::collections::VecDeque;

use dhc_core::{
    math,
    mealy::StateIndex,
    show_duration, Alphabet, MealyMachine, Show, Word,
};
use itertools::Itertools;
use tracing::{debug, info, trace, warn};

use super::{AllSuffixes, LearningAlgorithm, Refinement, SuffixExtractor};
use crate::{LearnError, MembershipOracle, Query};

type Input<M> = <M as MembershipOracle>::Input;
type Output<M> = <M as MembershipOracle>::Output;

/// A candidate state that still has to be classified. Nodes never own their parent, they only
/// remember its position in the arena so that the access word can be rebuilt.
struct Node<I, O> {
    // the classified state whose transition leads here
    parent_state: Option<StateIndex>,
    // position of the node that was explored to create this one
    parent: Option<usize>,
    // input and output of the transition from the parent state
    transition: Option<(I, O)>,
}

impl<I, O> Node<I, O> {
    fn root() -> Self {
        Self {
            parent_state: None,
            parent: None,
            transition: None,
        }
    }
}

/// Walks the parent links from `node` to the root and collects the transition inputs.
fn access_word<I: Copy, O>(nodes: &[Node<I, O>], node: usize) -> Word<I> {
    let mut symbols = Vec::new();
    let mut current = Some(node);
    while let Some(position) = current {
        let node = &nodes[position];
        if let Some((input, _)) = &node.transition {
            symbols.push(*input);
        }
        current = node.parent;
    }
    symbols.reverse();
    symbols.into()
}

/// Learns Mealy machines by exploring access words breadth-first and identifying states by
/// their output signature.
///
/// The signature of an access word `u` consists of the outputs that the system produces on
/// every probe `v` after reading `u`. Probes are all single-symbol words together with the
/// splitters that have been extracted from counterexamples. Two access words are considered
/// to lead to the same state exactly if their signatures coincide. Every learning pass starts
/// from scratch, only the set of splitters survives from one pass to the next.
///
/// # Example
/// ```
/// use dhc_core::prelude::*;
/// use dhc_learning::prelude::*;
///
/// let target: MealyMachine<char, u8> = MealyMachine::builder()
///     .with_transitions([(0, 'a', 1, 1), (0, 'b', 0, 0), (1, 'a', 2, 0), (1, 'b', 0, 1)])
///     .into_mealy(0)
///     .unwrap();
/// let alphabet = target.alphabet().clone();
/// let mut learner = MealyDhc::new(alphabet, SimulatorOracle::new(target));
/// learner.start_learning().unwrap();
/// assert_eq!(learner.hypothesis().unwrap().size(), 2);
/// ```
pub struct MealyDhc<M: MembershipOracle, X = AllSuffixes> {
    alphabet: Alphabet<Input<M>>,
    oracle: M,
    splitters: math::Set<Word<Input<M>>>,
    extractor: X,
    hypothesis: Option<MealyMachine<Input<M>, Output<M>>>,
}

impl<M: MembershipOracle> MealyDhc<M> {
    /// Creates a learner that refines with [`AllSuffixes`] of a counterexample.
    pub fn new(alphabet: Alphabet<Input<M>>, oracle: M) -> Self {
        Self::with_extractor(alphabet, oracle, AllSuffixes)
    }
}

impl<M: MembershipOracle, X: SuffixExtractor<Input<M>, Output<M>>> MealyDhc<M, X> {
    pub fn with_extractor(alphabet: Alphabet<Input<M>>, oracle: M, extractor: X) -> Self {
        let splitters = alphabet.universe().map(Word::from_symbol).collect();
        Self {
            alphabet,
            oracle,
            splitters,
            extractor,
            hypothesis: None,
        }
    }

    pub fn alphabet(&self) -> &Alphabet<Input<M>> {
        &self.alphabet
    }

    /// The words every access word is probed with. The single-symbol words come first, in
    /// the order of the alphabet, followed by the splitters in the order they were added.
    pub fn splitters(&self) -> &math::Set<Word<Input<M>>> {
        &self.splitters
    }

    pub fn oracle_mut(&mut self) -> &mut M {
        &mut self.oracle
    }

    /// Gives back the oracle.
    pub fn into_oracle(self) -> M {
        self.oracle
    }

    /// Adds `suffix` to the splitters unless it has length at most one or is already present.
    /// Returns whether it was added.
    pub fn add_splitter(&mut self, suffix: Word<Input<M>>) -> bool {
        if suffix.len() <= 1 || self.splitters.contains(&suffix) {
            return false;
        }
        trace!("adding splitter {}", suffix.show());
        self.splitters.insert(suffix)
    }

    /// Runs one complete exploration with the current splitters.
    fn explore(&mut self) -> Result<MealyMachine<Input<M>, Output<M>>, LearnError> {
        let probes = self.splitters.iter().cloned().collect_vec();
        let mut hypothesis = MealyMachine::new(self.alphabet.clone());
        let mut signatures: math::Map<Vec<Word<Output<M>>>, StateIndex> = math::Map::default();
        let mut nodes = vec![Node::root()];
        let mut queue = VecDeque::from([0usize]);

        while let Some(position) = queue.pop_front() {
            let access = access_word(&nodes, position);
            let mut queries = probes
                .iter()
                .map(|probe| Query::new(access.clone(), probe.clone()))
                .collect_vec();
            self.oracle.process_queries(&mut queries)?;
            let signature: Vec<Word<Output<M>>> = queries
                .into_iter()
                .map(Query::into_output)
                .collect::<Result<_, _>>()?;

            let node = &nodes[position];
            if let Some(&sibling) = signatures.get(&signature) {
                if let (Some(parent), Some((input, output))) =
                    (node.parent_state, node.transition.clone())
                {
                    trace!(
                        "{} reaches known state {}",
                        access.show(),
                        sibling.show()
                    );
                    hypothesis.add_transition(parent, input, sibling, output)?;
                }
                continue;
            }

            let state = match (node.parent_state, node.transition.clone()) {
                (Some(parent), Some((input, output))) => {
                    let state = hypothesis.add_state();
                    hypothesis.add_transition(parent, input, state, output)?;
                    state
                }
                _ => hypothesis.add_initial_state()?,
            };
            trace!("{} is the access word of new state {}", access.show(), state.show());

            for (i, input) in self.alphabet.universe().enumerate() {
                let output = signature[i].first().cloned().ok_or_else(|| {
                    LearnError::MalformedAnswer(format!(
                        "no output for {} after {}",
                        input.show(),
                        access.show()
                    ))
                })?;
                nodes.push(Node {
                    parent_state: Some(state),
                    parent: Some(position),
                    transition: Some((input, output)),
                });
                queue.push_back(nodes.len() - 1);
            }
            signatures.insert(signature, state);
        }

        debug_assert!(hypothesis.is_complete());
        Ok(hypothesis)
    }
}

impl<M: MembershipOracle, X: SuffixExtractor<Input<M>, Output<M>>> LearningAlgorithm
    for MealyDhc<M, X>
{
    type Input = Input<M>;
    type Output = Output<M>;

    fn start_learning(&mut self) -> Result<(), LearnError> {
        let start = std::time::Instant::now();
        let hypothesis = self.explore()?;
        info!(
            "learned hypothesis with {} states using {} probes in {}",
            hypothesis.size(),
            self.splitters.len(),
            show_duration(start.elapsed())
        );
        self.hypothesis = Some(hypothesis);
        Ok(())
    }

    fn refine_hypothesis(
        &mut self,
        counterexample: &Query<Input<M>, Output<M>>,
    ) -> Result<Refinement, LearnError> {
        let states_before = self
            .hypothesis
            .as_ref()
            .ok_or(LearnError::NoHypothesis)?
            .size();
        debug!("refining with counterexample {}", counterexample.input().show());

        let mut added_suffixes = 0;
        for suffix in self.extractor.extract(counterexample) {
            if self.add_splitter(suffix) {
                added_suffixes += 1;
            }
        }
        self.start_learning()?;

        let refinement = Refinement {
            states_before,
            states_after: self.hypothesis()?.size(),
            added_suffixes,
        };
        if refinement.is_anomalous() {
            warn!(
                "counterexample {} did not change the hypothesis, {} splitters were added",
                counterexample.input().show(),
                added_suffixes
            );
        }
        Ok(refinement)
    }

    fn hypothesis(&self) -> Result<&MealyMachine<Input<M>, Output<M>>, LearnError> {
        self.hypothesis.as_ref().ok_or(LearnError::NoHypothesis)
    }
}
