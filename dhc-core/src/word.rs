use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::Show;

/// A finite sequence of symbols which never changes once it has been constructed. Operations
/// such as [`Word::concat`] or [`Word::append`] build a new word and leave `self` untouched.
///
/// Words are used both for input words (over an alphabet of [`crate::Symbol`]s) and for output
/// words, which is why the symbol type is only required to be `Clone` for most operations.
///
/// # Example
/// ```
/// use dhc_core::prelude::*;
/// let word = Word::from("ab");
/// let longer = word.append('c');
/// assert_eq!(word.len(), 2);
/// assert_eq!(longer.show(), "\"abc\"");
/// assert_eq!(longer.suffix(2), Word::from("bc"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Word<S>(Vec<S>);

impl<S> Word<S> {
    /// The empty word.
    pub fn epsilon() -> Self {
        Self(Vec::new())
    }

    /// Builds a word of length one.
    pub fn from_symbol(symbol: S) -> Self {
        Self(vec![symbol])
    }

    /// Returns the length of the word.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if this is the empty word.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the symbol at the given `position`, if it exists.
    pub fn nth(&self, position: usize) -> Option<&S> {
        self.0.get(position)
    }

    /// Returns the first symbol, if it exists.
    pub fn first(&self) -> Option<&S> {
        self.0.first()
    }

    /// Returns the last symbol, if it exists.
    pub fn last(&self) -> Option<&S> {
        self.0.last()
    }

    /// Iterates over the symbols of the word.
    pub fn symbols(&self) -> std::slice::Iter<'_, S> {
        self.0.iter()
    }

    /// Gives the underlying symbols as a slice.
    pub fn as_slice(&self) -> &[S] {
        &self.0
    }
}

impl<S: Clone> Word<S> {
    /// Produces the concatenation of `self` and `other`.
    pub fn concat(&self, other: &Word<S>) -> Word<S> {
        Word(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// Produces the word obtained by appending `symbol` to `self`.
    pub fn append(&self, symbol: S) -> Word<S> {
        let mut symbols = Vec::with_capacity(self.len() + 1);
        symbols.extend(self.0.iter().cloned());
        symbols.push(symbol);
        Word(symbols)
    }

    /// The prefix of `self` with the given `length`. Saturates at the length of `self`.
    pub fn prefix(&self, length: usize) -> Word<S> {
        Word(self.0[..length.min(self.len())].to_vec())
    }

    /// The suffix of `self` with the given `length`. Saturates at the length of `self`.
    pub fn suffix(&self, length: usize) -> Word<S> {
        let length = length.min(self.len());
        Word(self.0[self.len() - length..].to_vec())
    }

    /// Gives the infix of `self` that starts at `offset` and has the given `length`.
    /// Returns `None` if the infix would exceed the word.
    pub fn infix(&self, offset: usize, length: usize) -> Option<Word<S>> {
        self.0.get(offset..offset + length).map(|s| Word(s.to_vec()))
    }

    /// Iterates over all non-empty suffixes of `self`, beginning with `self` and ending with
    /// the suffix that consists only of the last symbol.
    pub fn suffixes(&self) -> impl Iterator<Item = Word<S>> + '_ {
        (0..self.len()).map(move |offset| Word(self.0[offset..].to_vec()))
    }

    /// Iterates over all prefixes of `self`, from the empty word up to `self`.
    pub fn prefixes(&self) -> impl Iterator<Item = Word<S>> + '_ {
        (0..=self.len()).map(move |length| self.prefix(length))
    }
}

impl<S> Default for Word<S> {
    fn default() -> Self {
        Self::epsilon()
    }
}

impl<S> From<Vec<S>> for Word<S> {
    fn from(value: Vec<S>) -> Self {
        Self(value)
    }
}

impl<S: Clone> From<&[S]> for Word<S> {
    fn from(value: &[S]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for Word<char> {
    fn from(value: &str) -> Self {
        Self(value.chars().collect())
    }
}

impl<S> FromIterator<S> for Word<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, S> IntoIterator for &'a Word<S> {
    type Item = &'a S;
    type IntoIter = std::slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<S> IntoIterator for Word<S> {
    type Item = S;
    type IntoIter = std::vec::IntoIter<S>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<S> AsRef<[S]> for Word<S> {
    fn as_ref(&self) -> &[S] {
        &self.0
    }
}

impl<S: Show> Show for Word<S> {
    fn show(&self) -> String {
        S::show_collection(self.0.iter())
    }
}

impl<S: Debug> Debug for Word<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "ε");
        }
        write!(f, "{}", self.0.iter().map(|s| format!("{s:?}")).join("·"))
    }
}

#[cfg(test)]
mod tests {
    use super::Word;
    use crate::Show;

    #[test]
    fn concatenation_creates_new_words() {
        let ab = Word::from("ab");
        let c = Word::from_symbol('c');
        let abc = ab.concat(&c);
        assert_eq!(ab, Word::from("ab"));
        assert_eq!(abc, Word::from("abc"));
        assert_eq!(abc.concat(&Word::epsilon()), abc);
        assert_eq!(Word::epsilon().concat(&abc), abc);
    }

    #[test]
    fn suffixes_longest_first() {
        let word = Word::from("abc");
        let suffixes: Vec<_> = word.suffixes().map(|w| w.show()).collect();
        assert_eq!(suffixes, vec!["\"abc\"", "\"bc\"", "\"c\""]);
        assert_eq!(Word::<char>::epsilon().suffixes().count(), 0);
    }

    #[test]
    fn prefixes_and_infixes() {
        let word = Word::from("abc");
        assert_eq!(word.prefixes().count(), 4);
        assert_eq!(word.prefix(10), word);
        assert_eq!(word.suffix(1), Word::from("c"));
        assert_eq!(word.infix(1, 2), Some(Word::from("bc")));
        assert_eq!(word.infix(2, 2), None);
        assert_eq!(format!("{:?}", Word::<char>::epsilon()), "ε");
        assert_eq!(format!("{:?}", Word::from(vec![1, 2])), "1·2");
    }
}
