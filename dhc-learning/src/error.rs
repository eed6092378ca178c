use dhc_core::mealy::MealyError;
use thiserror::Error;

/// The capabilities a SUL may or may not offer besides stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SulOperation {
    /// Creating an independent copy of the SUL.
    Fork,
    /// Retrieving a snapshot of the current state.
    RetrieveState,
}

impl std::fmt::Display for SulOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SulOperation::Fork => write!(f, "forking"),
            SulOperation::RetrieveState => write!(f, "state retrieval"),
        }
    }
}

/// Errors raised by a system under learning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SulError {
    /// The adapter does not offer the requested operation.
    #[error("{0} is not supported by this SUL")]
    Unsupported(SulOperation),
    /// Something went wrong while resetting or stepping the system.
    #[error("execution fault: {0}")]
    Fault(String),
}

/// Coarse classification of everything that can go wrong while learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A component was constructed or used in a configuration it cannot work with.
    InvalidConfiguration,
    /// An optional SUL capability was requested from an adapter that does not offer it.
    UnsupportedOperation,
    /// Executing queries failed.
    ExecutionFault,
}

/// The error type of this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearnError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no hypothesis has been learned yet")]
    NoHypothesis,
    #[error(transparent)]
    Sul(#[from] SulError),
    #[error("malformed hypothesis: {0}")]
    Mealy(#[from] MealyError),
    #[error("query {0} was not answered")]
    Unanswered(String),
    #[error("malformed answer: {0}")]
    MalformedAnswer(String),
    #[error("a worker of the parallel oracle panicked")]
    WorkerPanicked,
    #[error("checking property failed: {0}")]
    Property(String),
    #[error("refinement made no progress: {0}")]
    NoProgress(String),
}

impl LearnError {
    /// Maps the error onto its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            LearnError::InvalidConfiguration(_) | LearnError::NoHypothesis => {
                ErrorKind::InvalidConfiguration
            }
            LearnError::Sul(SulError::Unsupported(_)) => ErrorKind::UnsupportedOperation,
            LearnError::Sul(SulError::Fault(_))
            | LearnError::Mealy(_)
            | LearnError::Unanswered(_)
            | LearnError::MalformedAnswer(_)
            | LearnError::WorkerPanicked
            | LearnError::Property(_)
            | LearnError::NoProgress(_) => ErrorKind::ExecutionFault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            LearnError::from(SulError::Unsupported(SulOperation::Fork)).kind(),
            ErrorKind::UnsupportedOperation
        );
        assert_eq!(
            LearnError::from(SulError::Fault("boom".into())).kind(),
            ErrorKind::ExecutionFault
        );
        assert_eq!(LearnError::NoHypothesis.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(
            SulError::Unsupported(SulOperation::RetrieveState).to_string(),
            "state retrieval is not supported by this SUL"
        );
    }
}
