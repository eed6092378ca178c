//! Active learning of Mealy machines.
//!
//! The learner in this crate, [`MealyDhc`], identifies the states of a black-box system by
//! exploring access words breadth-first and comparing output signatures. Queries are answered
//! by [`MembershipOracle`]s, which may be backed by a simulator, by a [`Sul`] adapter or by a
//! [`ParallelOracle`] that spreads batches over a pool of workers. Experiments drive the
//! learner until an [`EquivalenceOracle`] or a [`BlackBoxOracle`] runs out of counterexamples.
#![allow(missing_docs)]

/// Errors and their classification.
pub mod error;
pub use error::{ErrorKind, LearnError, SulError, SulOperation};

/// Finite and omega queries.
pub mod query;
pub use query::{OmegaQuery, Query};

/// Membership and equivalence oracles.
pub mod oracle;
pub use oracle::{
    EquivalenceOracle, MembershipOracle, ParallelConfig, ParallelOracle, ParallelOracleBuilder,
    PoolPolicy, SimulatorEquivalenceOracle, SimulatorOracle,
};

/// The contract for systems under learning and the oracles built on top of it.
pub mod sul;
pub use sul::{
    Capabilities, DeepSulOmegaOracle, OmegaMembershipOracle, ShallowSulOmegaOracle,
    StateRetrieval, Sul, SulOracle,
};

/// Learning algorithms.
pub mod active;
pub use active::{AllSuffixes, LearningAlgorithm, MealyDhc, Refinement, SuffixExtractor, Whole};

/// Black-box checking of hypotheses against properties.
pub mod blackbox;
pub use blackbox::{
    BlackBoxOracle, BlackBoxProperty, CexFirstOracle, EmptinessOracle, ForbiddenOutputChecker,
    InclusionOracle, Lasso, LassoEmptinessOracle, MembershipInclusionOracle, ModelChecker,
    ModelCheckingProperty,
};

/// Learning and black-box checking experiments.
pub mod experiment;
pub use experiment::{BbcExperiment, Counter, Experiment, Phase};

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use super::{
        AllSuffixes, BbcExperiment, BlackBoxOracle, CexFirstOracle, EquivalenceOracle,
        Experiment, LearnError, LearningAlgorithm, MealyDhc, MembershipOracle, OmegaQuery,
        ParallelOracleBuilder, PoolPolicy, Query, SimulatorEquivalenceOracle, SimulatorOracle,
        Sul, SulOracle,
    };
}
