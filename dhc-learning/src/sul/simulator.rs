use std::sync::Arc;

use dhc_core::{mealy::StateIndex, Color, MealyMachine, Show, Symbol};

use super::{Capabilities, StateRetrieval, Sul};
use crate::SulError;

/// A [`Sul`] that simulates a known [`MealyMachine`]. Forks share the machine and only keep
/// their own current state, snapshots are plain state indices and thus deep copies.
#[derive(Clone)]
pub struct MealySimulatorSul<I: Symbol, O> {
    machine: Arc<MealyMachine<I, O>>,
    current: Option<StateIndex>,
}

impl<I: Symbol, O: Color> MealySimulatorSul<I, O> {
    pub fn new(machine: MealyMachine<I, O>) -> Self {
        Self {
            machine: Arc::new(machine),
            current: None,
        }
    }

    pub fn machine(&self) -> &MealyMachine<I, O> {
        &self.machine
    }
}

impl<I: Symbol, O: Color + Send + Sync> Sul for MealySimulatorSul<I, O> {
    type Input = I;
    type Output = O;
    type State = StateIndex;

    fn capabilities(&self) -> Capabilities {
        Capabilities::forkable().with_state(StateRetrieval::Deep)
    }

    fn pre(&mut self) -> Result<(), SulError> {
        self.current = Some(
            self.machine
                .initial()
                .ok_or_else(|| SulError::Fault("simulated machine has no initial state".into()))?,
        );
        Ok(())
    }

    fn post(&mut self) {
        self.current = None;
    }

    fn step(&mut self, input: I) -> Result<O, SulError> {
        let state = self
            .current
            .ok_or_else(|| SulError::Fault("step outside of a session".into()))?;
        let (target, output) = self.machine.transition(state, input).ok_or_else(|| {
            SulError::Fault(format!("no transition from {} on {}", state.show(), input.show()))
        })?;
        self.current = Some(target);
        Ok(output.clone())
    }

    fn fork_handle(&self) -> Result<Self, SulError> {
        Ok(Self {
            machine: Arc::clone(&self.machine),
            current: None,
        })
    }

    fn snapshot(&self) -> Result<StateIndex, SulError> {
        self.current
            .ok_or_else(|| SulError::Fault("no state outside of a session".into()))
    }
}
