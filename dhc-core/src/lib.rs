//! Building blocks for active automata learning: symbols and alphabets, immutable words
//! and Mealy machines that serve as hypotheses.
//!
//! A [`MealyMachine`] is a deterministic transition system in which every transition emits an
//! output symbol. States live in an arena owned by the machine and are referred to by
//! [`mealy::StateIndex`], so learners can grow a hypothesis state by state without building
//! pointer graphs. Words over an [`Alphabet`] are represented by [`Word`], which never changes
//! after construction; all operations that would modify a word produce a new one instead.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::{fmt::Debug, hash::Hash};

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use dhc_core::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        alphabet,
        alphabet::{Alphabet, Symbol},
        math,
        mealy::{MealyBuilder, MealyError, MealyMachine, StateIndex},
        show_duration, word,
        word::Word,
        Color, Show,
    };
}

/// Type aliases for the collections used throughout the workspace.
pub mod math;

mod show;
pub use show::{show_duration, Show};

/// Module that contains definitions for dealing with alphabets.
pub mod alphabet;
pub use alphabet::{Alphabet, Symbol};

/// Finite, immutable words over a symbol type.
pub mod word;
pub use word::Word;

/// Arena-backed deterministic Mealy machines.
pub mod mealy;
pub use mealy::MealyMachine;

/// A color is simply a type that can be used to label transitions, for a Mealy machine this
/// is the type of outputs.
pub trait Color: Clone + Eq + Hash + Debug {}

impl<T: Eq + Clone + Hash + Debug> Color for T {}
