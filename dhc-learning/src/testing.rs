//! Machines shared by the unit tests of this crate.

use dhc_core::{MealyMachine, Symbol};

/// The two state machine that emits `1` when reading `a` in `q0` and `2` when reading `a` in
/// `q1`, `b` loops with output `0` everywhere.
pub(crate) fn toggle() -> MealyMachine<char, u8> {
    MealyMachine::builder()
        .with_transitions([
            (0, 'a', 1, 1),
            (0, 'b', 0, 0),
            (1, 'a', 2, 0),
            (1, 'b', 0, 1),
        ])
        .into_mealy(0)
        .unwrap()
}

/// Outputs `1` only on the third consecutive `a`, `b` resets. A single symbol does not
/// distinguish any of its states.
pub(crate) fn delayed() -> MealyMachine<char, u8> {
    MealyMachine::builder()
        .with_transitions([
            (0, 'a', 0, 1),
            (0, 'b', 0, 0),
            (1, 'a', 0, 2),
            (1, 'b', 0, 0),
            (2, 'a', 1, 2),
            (2, 'b', 0, 0),
        ])
        .into_mealy(0)
        .unwrap()
}

/// A complete machine with `size` states and random transitions.
pub(crate) fn random_mealy<I: Symbol>(
    rng: &mut fastrand::Rng,
    size: usize,
    alphabet: &[I],
    outputs: u8,
) -> MealyMachine<I, u8> {
    let transitions = (0..size)
        .flat_map(|source| alphabet.iter().map(move |&sym| (source, sym)))
        .map(|(source, sym)| (source, sym, rng.u8(..outputs), rng.usize(..size)))
        .collect::<Vec<_>>();
    MealyMachine::builder()
        .with_alphabet(&alphabet.iter().copied().collect())
        .with_transitions(transitions)
        .into_mealy(0)
        .unwrap()
}
