use std::fmt::Debug;

use dhc_core::{math::fingerprint, Color, Symbol, Word};
use tracing::trace;

use super::{execute, Sul, SulOracle, SulSession};
use crate::{LearnError, MembershipOracle, OmegaQuery, Query};

/// An oracle for [`OmegaQuery`]s, i.e. queries that additionally report snapshots of the
/// system state at requested positions, together with a way of deciding whether two such
/// snapshots represent the same state.
pub trait OmegaMembershipOracle {
    type Input: Symbol;
    type Output: Color;
    type State: Clone + Eq + Debug;

    /// Answers all given queries, including their snapshots.
    fn process_omega_queries(
        &mut self,
        queries: &mut [OmegaQuery<Self::Input, Self::Output, Self::State>],
    ) -> Result<(), LearnError>;

    /// Decides whether `left_state`, which was observed after reading `left`, and
    /// `right_state`, observed after reading `right`, are the same state of the system.
    fn is_same_state(
        &mut self,
        left: &Word<Self::Input>,
        left_state: &Self::State,
        right: &Word<Self::Input>,
        right_state: &Self::State,
    ) -> Result<bool, LearnError>;

    /// Convenience method for answering a single omega query.
    fn answer_omega_query(
        &mut self,
        prefix: Word<Self::Input>,
        suffix: Word<Self::Input>,
        indices: &[usize],
    ) -> Result<(Word<Self::Output>, Vec<Self::State>), LearnError> {
        let mut batch = [OmegaQuery::new(prefix, suffix, indices.iter().copied())];
        self.process_omega_queries(&mut batch)?;
        let [query] = batch;
        let states = query.states().to_vec();
        let output = query.query().clone().into_output()?;
        Ok((output, states))
    }
}

fn execute_omega<S: Sul, T, F: Fn(S::State) -> T>(
    sul: &mut S,
    query: &OmegaQuery<S::Input, S::Output, T>,
    snapshot: F,
) -> Result<(Word<S::Output>, Vec<T>), LearnError> {
    let suffix = query.query().suffix();
    if let Some(last) = query.indices().last().filter(|i| **i > suffix.len()) {
        return Err(LearnError::InvalidConfiguration(format!(
            "snapshot position {last} exceeds suffix of length {}",
            suffix.len()
        )));
    }

    let mut session = SulSession::open(sul)?;
    session.skip(query.query().prefix())?;
    let mut states = Vec::with_capacity(query.indices().len());
    if query.indices().contains(&0) {
        states.push(snapshot(session.state()?));
    }
    let mut output = Vec::with_capacity(suffix.len());
    for (i, sym) in suffix.symbols().enumerate() {
        output.push(session.step(*sym)?);
        if query.indices().contains(&(i + 1)) {
            states.push(snapshot(session.state()?));
        }
    }
    Ok((output.into(), states))
}

/// Answers omega queries with hashes of the snapshots. Equal hashes do not imply equal states,
/// so [`OmegaMembershipOracle::is_same_state`] replays both access words, one on the primary
/// handle and one on a dedicated fork, and compares the full snapshots while both sessions
/// are still open. This requires a SUL
/// that can fork and retrieve its state.
pub struct ShallowSulOmegaOracle<S: Sul> {
    sul: S,
    forked: S,
}

impl<S: Sul> ShallowSulOmegaOracle<S> {
    pub fn new(sul: S) -> Result<Self, LearnError> {
        let capabilities = sul.capabilities();
        if !capabilities.can_fork() || !capabilities.can_retrieve_state() {
            return Err(LearnError::InvalidConfiguration(format!(
                "hash based state equivalence needs a SUL that can fork and retrieve its state, got {capabilities:?}"
            )));
        }
        let forked = sul.fork()?;
        Ok(Self { sul, forked })
    }

    /// Gives an independent oracle that can be used by another worker.
    pub fn worker(&self) -> Result<Self, LearnError> {
        Ok(Self {
            sul: self.sul.fork()?,
            forked: self.sul.fork()?,
        })
    }
}

impl<S: Sul> OmegaMembershipOracle for ShallowSulOmegaOracle<S> {
    type Input = S::Input;
    type Output = S::Output;
    type State = u64;

    fn process_omega_queries(
        &mut self,
        queries: &mut [OmegaQuery<S::Input, S::Output, u64>],
    ) -> Result<(), LearnError> {
        for query in queries {
            let (output, states) = execute_omega(&mut self.sul, query, |s| fingerprint(&s))?;
            query.answer(output, states);
        }
        Ok(())
    }

    fn is_same_state(
        &mut self,
        left: &Word<S::Input>,
        left_state: &u64,
        right: &Word<S::Input>,
        right_state: &u64,
    ) -> Result<bool, LearnError> {
        if left_state != right_state {
            return Ok(false);
        }
        // Both sessions stay open until the snapshots are compared.
        let mut primary = SulSession::open(&mut self.sul)?;
        primary.skip(left)?;
        let mut secondary = SulSession::open(&mut self.forked)?;
        secondary.skip(right)?;
        let replayed_left = primary.state()?;
        let replayed_right = secondary.state()?;
        debug_assert_eq!(fingerprint(&replayed_left), *left_state);
        debug_assert_eq!(fingerprint(&replayed_right), *right_state);
        trace!("hashes match, replayed snapshots are {replayed_left:?} and {replayed_right:?}");
        Ok(replayed_left == replayed_right)
    }
}

impl<S: Sul> MembershipOracle for ShallowSulOmegaOracle<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn process_queries(
        &mut self,
        queries: &mut [Query<S::Input, S::Output>],
    ) -> Result<(), LearnError> {
        for query in queries {
            let output = execute(&mut self.sul, query.prefix(), query.suffix())?;
            query.answer(output);
        }
        Ok(())
    }
}

/// Answers omega queries with the snapshots themselves. The SUL guarantees that snapshots are
/// deep copies, so deciding whether two states are equal is a plain comparison.
pub struct DeepSulOmegaOracle<S: Sul> {
    oracle: SulOracle<S>,
}

impl<S: Sul> DeepSulOmegaOracle<S> {
    pub fn new(sul: S) -> Result<Self, LearnError> {
        let capabilities = sul.capabilities();
        if !capabilities.deep_copies() {
            return Err(LearnError::InvalidConfiguration(format!(
                "snapshot based state equivalence needs deep copies of states, got {capabilities:?}"
            )));
        }
        Ok(Self {
            oracle: SulOracle::new(sul),
        })
    }

    /// Gives an oracle that can be used concurrently with `self`, see [`SulOracle::worker`].
    pub fn worker(&self) -> Result<Self, LearnError> {
        Ok(Self {
            oracle: self.oracle.worker()?,
        })
    }
}

impl<S: Sul> OmegaMembershipOracle for DeepSulOmegaOracle<S> {
    type Input = S::Input;
    type Output = S::Output;
    type State = S::State;

    fn process_omega_queries(
        &mut self,
        queries: &mut [OmegaQuery<S::Input, S::Output, S::State>],
    ) -> Result<(), LearnError> {
        for query in queries {
            let (output, states) = self
                .oracle
                .with_sul(|sul| execute_omega(sul, query, |s| s))?;
            query.answer(output, states);
        }
        Ok(())
    }

    fn is_same_state(
        &mut self,
        _left: &Word<S::Input>,
        left_state: &S::State,
        _right: &Word<S::Input>,
        right_state: &S::State,
    ) -> Result<bool, LearnError> {
        Ok(left_state == right_state)
    }
}

impl<S: Sul> MembershipOracle for DeepSulOmegaOracle<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn process_queries(
        &mut self,
        queries: &mut [Query<S::Input, S::Output>],
    ) -> Result<(), LearnError> {
        self.oracle.process_queries(queries)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        hash::{Hash, Hasher},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    };

    use dhc_core::mealy::StateIndex;

    use super::*;
    use crate::{
        sul::{tests::Counting, Capabilities, MealySimulatorSul, StateRetrieval},
        testing, ErrorKind, SulError,
    };

    /// A snapshot whose hash ignores its content, so every two snapshots collide.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Snapshot(u8);

    impl Hash for Snapshot {
        fn hash<H: Hasher>(&self, state: &mut H) {
            0u8.hash(state)
        }
    }

    struct Colliding(u8);

    impl Sul for Colliding {
        type Input = char;
        type Output = u8;
        type State = Snapshot;

        fn capabilities(&self) -> Capabilities {
            Capabilities::forkable().with_state(StateRetrieval::Shallow)
        }

        fn pre(&mut self) -> Result<(), SulError> {
            self.0 = 0;
            Ok(())
        }

        fn post(&mut self) {}

        fn step(&mut self, input: char) -> Result<u8, SulError> {
            if input == 'a' {
                self.0 += 1;
            }
            Ok(0)
        }

        fn fork_handle(&self) -> Result<Self, SulError> {
            Ok(Colliding(0))
        }

        fn snapshot(&self) -> Result<Snapshot, SulError> {
            Ok(Snapshot(self.0))
        }
    }

    #[test_log::test]
    fn colliding_hashes_are_disambiguated() {
        let mut oracle = ShallowSulOmegaOracle::new(Colliding(0)).unwrap();
        let (_, one) = oracle
            .answer_omega_query(Word::from("a"), Word::epsilon(), &[0])
            .unwrap();
        let (_, two) = oracle
            .answer_omega_query(Word::from("aa"), Word::epsilon(), &[0])
            .unwrap();
        let (output, also_one) = oracle
            .answer_omega_query(Word::from("b"), Word::from("ab"), &[2])
            .unwrap();
        assert_eq!(output, Word::from(vec![0, 0]));
        assert_eq!(one, two);
        assert_eq!(one, also_one);

        assert!(!oracle
            .is_same_state(&Word::from("a"), &one[0], &Word::from("aa"), &two[0])
            .unwrap());
        assert!(oracle
            .is_same_state(&Word::from("a"), &one[0], &Word::from("bab"), &also_one[0])
            .unwrap());
        assert!(!oracle
            .is_same_state(&Word::from("a"), &one[0], &Word::from("a"), &one[0].wrapping_add(1))
            .unwrap());
    }

    /// A snapshot that is only meaningful while the session it was taken in is open.
    #[derive(Debug, Clone)]
    struct Bound {
        value: u8,
        open: Arc<AtomicBool>,
    }

    impl PartialEq for Bound {
        fn eq(&self, other: &Self) -> bool {
            self.value == other.value
                && self.open.load(Ordering::SeqCst)
                && other.open.load(Ordering::SeqCst)
        }
    }

    impl Eq for Bound {}

    impl Hash for Bound {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.value.hash(state)
        }
    }

    struct SessionBound {
        value: u8,
        open: Arc<AtomicBool>,
    }

    impl SessionBound {
        fn new() -> Self {
            Self {
                value: 0,
                open: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Sul for SessionBound {
        type Input = char;
        type Output = u8;
        type State = Bound;

        fn capabilities(&self) -> Capabilities {
            Capabilities::forkable().with_state(StateRetrieval::Shallow)
        }

        fn pre(&mut self) -> Result<(), SulError> {
            self.value = 0;
            self.open = Arc::new(AtomicBool::new(true));
            Ok(())
        }

        fn post(&mut self) {
            self.open.store(false, Ordering::SeqCst);
        }

        fn step(&mut self, input: char) -> Result<u8, SulError> {
            if input == 'a' {
                self.value = (self.value + 1) % 2;
            }
            Ok(self.value)
        }

        fn fork_handle(&self) -> Result<Self, SulError> {
            Ok(Self::new())
        }

        fn snapshot(&self) -> Result<Bound, SulError> {
            Ok(Bound {
                value: self.value,
                open: Arc::clone(&self.open),
            })
        }
    }

    #[test_log::test]
    fn snapshots_are_compared_while_sessions_are_open() {
        let mut oracle = ShallowSulOmegaOracle::new(SessionBound::new()).unwrap();
        let (_, one) = oracle
            .answer_omega_query(Word::from("a"), Word::epsilon(), &[0])
            .unwrap();
        let (_, three) = oracle
            .answer_omega_query(Word::from("aaa"), Word::epsilon(), &[0])
            .unwrap();
        let (_, two) = oracle
            .answer_omega_query(Word::from("aa"), Word::epsilon(), &[0])
            .unwrap();
        assert_eq!(one, three);

        assert!(oracle
            .is_same_state(&Word::from("a"), &one[0], &Word::from("aaa"), &three[0])
            .unwrap());
        assert!(oracle
            .is_same_state(&Word::from("ab"), &one[0], &Word::from("ba"), &one[0])
            .unwrap());
        assert!(!oracle
            .is_same_state(&Word::from("a"), &one[0], &Word::from("aa"), &two[0])
            .unwrap());
    }

    #[test_log::test]
    fn capabilities_are_validated() {
        let plain = Counting::new(Capabilities::PLAIN.with_state(StateRetrieval::Shallow));
        let err = ShallowSulOmegaOracle::new(plain).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let shallow = Counting::new(Capabilities::forkable().with_state(StateRetrieval::Shallow));
        let err = DeepSulOmegaOracle::new(shallow).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let shallow = Counting::new(Capabilities::forkable().with_state(StateRetrieval::Shallow));
        assert!(ShallowSulOmegaOracle::new(shallow).is_ok());
    }

    #[test_log::test]
    fn deep_snapshots_along_suffix() {
        let mut oracle = DeepSulOmegaOracle::new(MealySimulatorSul::new(testing::toggle())).unwrap();
        let (output, states) = oracle
            .answer_omega_query(Word::from("a"), Word::from("ab"), &[0, 1, 2])
            .unwrap();
        assert_eq!(output, Word::from(vec![2, 0]));
        assert_eq!(
            states,
            vec![StateIndex::new(1), StateIndex::new(0), StateIndex::new(0)]
        );
        assert!(oracle
            .is_same_state(&Word::from("a"), &states[0], &Word::from("ab"), &states[2])
            .map(|same| !same)
            .unwrap());

        let mut worker = oracle.worker().unwrap();
        let err = worker
            .answer_omega_query(Word::epsilon(), Word::from("a"), &[2])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(
            worker.answer_query(Word::from("aa"), Word::from("a")).unwrap(),
            Word::from(vec![1])
        );
    }
}
