use std::{
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
};

use dhc_core::{Color, Symbol, Word};
use tracing::trace;

use crate::{LearnError, MembershipOracle, Query, SulError, SulOperation};

mod omega;
pub use omega::{DeepSulOmegaOracle, OmegaMembershipOracle, ShallowSulOmegaOracle};

mod simulator;
pub use simulator::MealySimulatorSul;

/// Whether and how a SUL exposes snapshots of its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateRetrieval {
    /// No snapshots at all.
    #[default]
    None,
    /// Snapshots are only meaningful until the next step or reset of the handle they were
    /// taken from, they may share data with the live system.
    Shallow,
    /// Snapshots are independent copies that stay valid no matter what happens to the handle
    /// afterwards.
    Deep,
}

/// Describes what a [`Sul`] can do besides stepping. Oracles inspect this when they are
/// constructed, so an adapter declares its abilities once instead of answering runtime
/// capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    pub fork: bool,
    pub state: StateRetrieval,
}

impl Capabilities {
    /// Neither forking nor state retrieval.
    pub const PLAIN: Capabilities = Capabilities {
        fork: false,
        state: StateRetrieval::None,
    };

    /// Forking is possible, state retrieval is not.
    pub fn forkable() -> Self {
        Self {
            fork: true,
            ..Self::PLAIN
        }
    }

    /// Sets how states can be retrieved.
    pub fn with_state(self, state: StateRetrieval) -> Self {
        Self { state, ..self }
    }

    pub fn can_fork(&self) -> bool {
        self.fork
    }

    pub fn can_retrieve_state(&self) -> bool {
        self.state != StateRetrieval::None
    }

    pub fn deep_copies(&self) -> bool {
        self.state == StateRetrieval::Deep
    }
}

/// A system under learning: a resettable, stateful machine that consumes one input symbol at a
/// time and answers with an output symbol.
///
/// Executions are bracketed by [`Sul::pre`] and [`Sul::post`]. Callers should not invoke them
/// directly but go through [`SulSession`], which guarantees that every successful or failed
/// `pre` is followed by exactly one `post`.
pub trait Sul: Send {
    type Input: Symbol;
    type Output: Color + Send;
    /// Snapshot of the system state, see [`StateRetrieval`].
    type State: Clone + Eq + Hash + Debug + Send;

    /// The optional operations this adapter offers.
    fn capabilities(&self) -> Capabilities;

    /// Resets the system into its initial configuration.
    fn pre(&mut self) -> Result<(), SulError>;

    /// Releases whatever [`Sul::pre`] acquired.
    fn post(&mut self);

    /// Reads one input symbol and returns the produced output.
    fn step(&mut self, input: Self::Input) -> Result<Self::Output, SulError>;

    /// Adapter hook behind [`Sul::fork`]: creates an independent handle to an equally capable,
    /// freshly reset system. Only invoked if the capabilities allow forking.
    #[doc(hidden)]
    fn fork_handle(&self) -> Result<Self, SulError>
    where
        Self: Sized,
    {
        Err(SulError::Unsupported(SulOperation::Fork))
    }

    /// Adapter hook behind [`Sul::state`]: takes a snapshot of the current state. Only invoked
    /// if the capabilities allow state retrieval.
    #[doc(hidden)]
    fn snapshot(&self) -> Result<Self::State, SulError> {
        Err(SulError::Unsupported(SulOperation::RetrieveState))
    }

    /// Creates an independent handle to an equally capable, freshly reset system. Fails with
    /// [`SulOperation::Fork`] if the adapter does not declare that it can fork.
    fn fork(&self) -> Result<Self, SulError>
    where
        Self: Sized,
    {
        if !self.capabilities().can_fork() {
            return Err(SulError::Unsupported(SulOperation::Fork));
        }
        self.fork_handle()
    }

    /// Takes a snapshot of the current state. Fails with [`SulOperation::RetrieveState`] if the
    /// adapter does not declare that it can retrieve states.
    fn state(&self) -> Result<Self::State, SulError> {
        if !self.capabilities().can_retrieve_state() {
            return Err(SulError::Unsupported(SulOperation::RetrieveState));
        }
        self.snapshot()
    }
}

/// A running execution of a [`Sul`]. Opening a session calls [`Sul::pre`], dropping it calls
/// [`Sul::post`], no matter how the session ends.
pub struct SulSession<'a, S: Sul> {
    sul: &'a mut S,
}

impl<'a, S: Sul> SulSession<'a, S> {
    /// Resets `sul` and starts a session. If the reset fails, `post` is still invoked before
    /// the error is returned.
    pub fn open(sul: &'a mut S) -> Result<Self, SulError> {
        if let Err(e) = sul.pre() {
            sul.post();
            return Err(e);
        }
        Ok(Self { sul })
    }

    pub fn step(&mut self, input: S::Input) -> Result<S::Output, SulError> {
        self.sul.step(input)
    }

    /// Feeds all symbols of `word` and discards the outputs.
    pub fn skip(&mut self, word: &Word<S::Input>) -> Result<(), SulError> {
        for sym in word {
            self.sul.step(*sym)?;
        }
        Ok(())
    }

    /// Feeds all symbols of `word` and collects the outputs.
    pub fn run(&mut self, word: &Word<S::Input>) -> Result<Word<S::Output>, SulError> {
        word.symbols().map(|sym| self.sul.step(*sym)).collect()
    }

    pub fn state(&self) -> Result<S::State, SulError> {
        self.sul.state()
    }
}

impl<S: Sul> Drop for SulSession<'_, S> {
    fn drop(&mut self) {
        self.sul.post();
    }
}

/// Executes a single query from a fresh session.
pub(crate) fn execute<S: Sul>(
    sul: &mut S,
    prefix: &Word<S::Input>,
    suffix: &Word<S::Input>,
) -> Result<Word<S::Output>, SulError> {
    let mut session = SulSession::open(sul)?;
    session.skip(prefix)?;
    session.run(suffix)
}

enum Handle<S> {
    Owned(S),
    Shared(Arc<Mutex<S>>),
}

/// Recovers the guard of a poisoned mutex, a panic in another worker does not leave the SUL in
/// a state that the next `pre` cannot fix.
pub(crate) fn lock<S>(sul: &Mutex<S>) -> MutexGuard<'_, S> {
    sul.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A membership oracle backed by a [`Sul`].
///
/// A forkable SUL is owned exclusively by the oracle and [`SulOracle::worker`] hands every
/// further worker its own fork. A SUL that cannot fork is put behind a mutex that all workers
/// share, and the mutex is held for the entire execution of one query.
pub struct SulOracle<S: Sul> {
    handle: Handle<S>,
}

impl<S: Sul> SulOracle<S> {
    pub fn new(sul: S) -> Self {
        let handle = if sul.capabilities().can_fork() {
            Handle::Owned(sul)
        } else {
            trace!("SUL cannot fork, sharing it between workers");
            Handle::Shared(Arc::new(Mutex::new(sul)))
        };
        Self { handle }
    }

    /// Gives an oracle that can be used concurrently with `self`.
    pub fn worker(&self) -> Result<Self, LearnError> {
        Ok(Self {
            handle: match &self.handle {
                Handle::Owned(sul) => Handle::Owned(sul.fork()?),
                Handle::Shared(sul) => Handle::Shared(Arc::clone(sul)),
            },
        })
    }

    /// Returns `true` if this oracle has a handle of its own.
    pub fn is_exclusive(&self) -> bool {
        matches!(self.handle, Handle::Owned(_))
    }

    pub fn capabilities(&self) -> Capabilities {
        match &self.handle {
            Handle::Owned(sul) => sul.capabilities(),
            Handle::Shared(sul) => lock(sul).capabilities(),
        }
    }

    /// Runs `f` with exclusive access to the SUL.
    pub(crate) fn with_sul<R, F: FnOnce(&mut S) -> R>(&mut self, f: F) -> R {
        match &mut self.handle {
            Handle::Owned(sul) => f(sul),
            Handle::Shared(sul) => f(&mut lock(sul)),
        }
    }
}

impl<S: Sul> MembershipOracle for SulOracle<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn process_queries(
        &mut self,
        queries: &mut [Query<Self::Input, Self::Output>],
    ) -> Result<(), LearnError> {
        for query in queries {
            let output = self.with_sul(|sul| execute(sul, query.prefix(), query.suffix()))?;
            query.answer(output);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{ErrorKind, ParallelOracleBuilder};

    /// Counts up on `a`, fails on `!` and keeps track of how often it was reset and released.
    pub(crate) struct Counting {
        pub(crate) value: u8,
        pub(crate) capabilities: Capabilities,
        pub(crate) fail_pre: bool,
        pub(crate) pres: Arc<AtomicUsize>,
        pub(crate) posts: Arc<AtomicUsize>,
    }

    impl Counting {
        pub(crate) fn new(capabilities: Capabilities) -> Self {
            Self {
                value: 0,
                capabilities,
                fail_pre: false,
                pres: Arc::new(AtomicUsize::new(0)),
                posts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Sul for Counting {
        type Input = char;
        type Output = u8;
        type State = u8;

        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        fn pre(&mut self) -> Result<(), SulError> {
            self.pres.fetch_add(1, Ordering::SeqCst);
            if self.fail_pre {
                return Err(SulError::Fault("reset failed".into()));
            }
            self.value = 0;
            Ok(())
        }

        fn post(&mut self) {
            self.posts.fetch_add(1, Ordering::SeqCst);
        }

        fn step(&mut self, input: char) -> Result<u8, SulError> {
            match input {
                'a' => self.value = self.value.wrapping_add(1),
                'b' => {}
                other => return Err(SulError::Fault(format!("cannot read {other}"))),
            }
            Ok(self.value)
        }

        fn fork_handle(&self) -> Result<Self, SulError> {
            Ok(Self {
                value: 0,
                capabilities: self.capabilities,
                fail_pre: self.fail_pre,
                pres: Arc::clone(&self.pres),
                posts: Arc::clone(&self.posts),
            })
        }

        fn snapshot(&self) -> Result<u8, SulError> {
            Ok(self.value)
        }
    }

    #[test_log::test]
    fn pre_and_post_are_paired() {
        let sul = Counting::new(Capabilities::PLAIN);
        let (pres, posts) = (Arc::clone(&sul.pres), Arc::clone(&sul.posts));
        let mut oracle = SulOracle::new(sul);
        assert!(!oracle.is_exclusive());
        assert_eq!(
            oracle.answer_query(Word::from("aa"), Word::from("ab")).unwrap(),
            Word::from(vec![3, 3])
        );
        let err = oracle
            .answer_query(Word::from("a!"), Word::from("a"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFault);
        assert_eq!(pres.load(Ordering::SeqCst), 2);
        assert_eq!(posts.load(Ordering::SeqCst), 2);

        let mut broken = Counting::new(Capabilities::PLAIN);
        broken.fail_pre = true;
        let (pres, posts) = (Arc::clone(&broken.pres), Arc::clone(&broken.posts));
        assert!(execute(&mut broken, &Word::epsilon(), &Word::from("a")).is_err());
        assert_eq!(pres.load(Ordering::SeqCst), 1);
        assert_eq!(posts.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn fork_requires_capability() {
        // the adapter implements both hooks but declares neither capability
        let plain = Counting::new(Capabilities::PLAIN);
        let err = LearnError::from(plain.fork().map(|_| ()).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(
            plain.state().unwrap_err(),
            SulError::Unsupported(SulOperation::RetrieveState)
        );
        assert!(SulOracle::new(plain).worker().is_ok());

        let forkable = Counting::new(Capabilities::forkable());
        assert!(forkable.fork().is_ok());
        assert_eq!(
            forkable.state().unwrap_err(),
            SulError::Unsupported(SulOperation::RetrieveState)
        );
        let oracle = SulOracle::new(forkable);
        assert!(oracle.is_exclusive());
        assert!(oracle.worker().unwrap().is_exclusive());

        let snapshots = Counting::new(Capabilities::PLAIN.with_state(StateRetrieval::Shallow));
        assert_eq!(snapshots.state(), Ok(0));
    }

    #[test_log::test]
    fn workers_share_or_fork() {
        let shared = SulOracle::new(Counting::new(Capabilities::PLAIN));
        let forked = SulOracle::new(Counting::new(Capabilities::forkable()));

        for oracle in [shared, forked] {
            let mut workers = vec![];
            for _ in 0..3 {
                workers.push(oracle.worker().unwrap());
            }
            let mut parallel = ParallelOracleBuilder::from_instances(workers)
                .with_min_batch_size(2)
                .build()
                .unwrap();
            let mut queries: Vec<_> = (0..30)
                .map(|i| Query::new(Word::from("a".repeat(i % 5).as_str()), Word::from("ab")))
                .collect();
            parallel.process_queries(&mut queries).unwrap();
            for (i, query) in queries.into_iter().enumerate() {
                let after = (i % 5) as u8 + 1;
                assert_eq!(query.into_output().unwrap(), Word::from(vec![after, after]));
            }
        }
    }
}
