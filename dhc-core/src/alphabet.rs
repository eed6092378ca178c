use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::{math, Show};

/// A symbol of an alphabet, which is also the type of the symbols in a word. Symbols are small
/// values that are cheap to copy, for example `char`s, small integers or field-less enums.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show + Send + Sync {}
impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show + Send + Sync> Symbol for S {}

/// A closed, finite and ordered collection of input [`Symbol`]s. Every symbol has a fixed
/// position, which is the order in which it was first given to the alphabet.
///
/// # Example
/// ```
/// use dhc_core::prelude::*;
/// let alphabet = alphabet!('a', 'b', 'c');
/// assert_eq!(alphabet.size(), 3);
/// assert_eq!(alphabet.symbol(1), Some('b'));
/// assert_eq!(alphabet.index_of('c'), Some(2));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Alphabet<S: Symbol>(math::Set<S>);

impl<S: Symbol> Alphabet<S> {
    /// Creates a new [`Alphabet`] from an iterator over the symbols. Duplicates are dropped, the
    /// position of a symbol is determined by its first occurrence.
    pub fn new<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        Self(symbols.into_iter().collect())
    }

    /// Returns the number of symbols in the alphabet.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the alphabet has no symbols.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gives the symbol at `index`, if it exists.
    pub fn symbol(&self, index: usize) -> Option<S> {
        self.0.get_index(index).copied()
    }

    /// Gives the position of `symbol` in the alphabet, if it is present.
    pub fn index_of(&self, symbol: S) -> Option<usize> {
        self.0.get_index_of(&symbol)
    }

    /// Returns true if the given symbol is present in the alphabet.
    pub fn contains(&self, symbol: S) -> bool {
        self.0.contains(&symbol)
    }

    /// Iterates over all symbols in alphabet order.
    pub fn universe(&self) -> impl Iterator<Item = S> + '_ {
        self.0.iter().copied()
    }
}

impl Alphabet<char> {
    /// Creates a new alphabet of the given size. The symbols are just the first `size` letters
    /// of the latin alphabet, i.e. 'a' to 'z'.
    pub fn of_size(size: usize) -> Self {
        assert!(size <= 26, "Alphabet is too large");
        Self::new((0..size).map(|i| (b'a' + i as u8) as char))
    }
}

impl<S: Symbol> std::ops::Index<usize> for Alphabet<S> {
    type Output = S;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<S: Symbol> FromIterator<S> for Alphabet<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<S: Symbol> From<Vec<S>> for Alphabet<S> {
    fn from(value: Vec<S>) -> Self {
        Self::new(value)
    }
}

impl<S: Symbol> Debug for Alphabet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().map(Show::show).join(", "))
    }
}

/// Helper macro for creating an [`Alphabet`]. Is called simply with a list of symbols
/// that are separated by commata.
///
/// # Examples
/// ```
/// use dhc_core::prelude::*;
/// let alphabet = alphabet!('a', 'b', 'c');
/// assert_eq!(alphabet.size(), 3);
/// ```
#[macro_export]
macro_rules! alphabet {
    ($($c:expr),* $(,)?) => {
        $crate::alphabet::Alphabet::new([$($c),*])
    };
}

#[cfg(test)]
mod tests {
    use super::Alphabet;

    #[test]
    fn positions_follow_first_occurrence() {
        let alphabet = Alphabet::new(['c', 'a', 'c', 'b']);
        assert_eq!(alphabet.size(), 3);
        assert_eq!(alphabet.universe().collect::<Vec<_>>(), vec!['c', 'a', 'b']);
        assert_eq!(alphabet[2], 'b');
        assert_eq!(alphabet.index_of('a'), Some(1));
        assert_eq!(alphabet.index_of('z'), None);
    }

    #[test]
    fn of_size() {
        let alphabet = Alphabet::of_size(3);
        assert_eq!(format!("{alphabet:?}"), "{a, b, c}");
        assert!(Alphabet::<char>::new([]).is_empty());
    }
}
