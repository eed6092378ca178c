use std::fmt::Debug;

use dhc_core::{math::OrderedSet, Show, Word};

use crate::LearnError;

/// A question posed to a membership oracle: starting from the initial configuration, read
/// `prefix` while discarding its outputs, then read `suffix` and report the outputs produced
/// along the suffix.
///
/// Prefix and suffix form one continuous execution, the split only exists so that the access
/// sequence part can be shared between queries. The only way to modify a query after it has
/// been created is to [answer](Query::answer) it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Query<I, O> {
    prefix: Word<I>,
    suffix: Word<I>,
    output: Option<Word<O>>,
}

impl<I: Clone, O> Query<I, O> {
    /// Creates an unanswered query.
    pub fn new(prefix: Word<I>, suffix: Word<I>) -> Self {
        Self {
            prefix,
            suffix,
            output: None,
        }
    }

    /// Creates a query that already carries its answer. Equivalence oracles use this to hand
    /// out counterexamples.
    pub fn answered(prefix: Word<I>, suffix: Word<I>, output: Word<O>) -> Self {
        Self {
            prefix,
            suffix,
            output: Some(output),
        }
    }

    /// The part of the input whose outputs are discarded.
    pub fn prefix(&self) -> &Word<I> {
        &self.prefix
    }

    /// The part of the input whose outputs form the answer.
    pub fn suffix(&self) -> &Word<I> {
        &self.suffix
    }

    /// The complete input word, i.e. the concatenation of prefix and suffix.
    pub fn input(&self) -> Word<I> {
        self.prefix.concat(&self.suffix)
    }

    /// Stores the answer to this query.
    pub fn answer(&mut self, output: Word<O>) {
        self.output = Some(output);
    }

    /// Gives the answer, if the query has been answered.
    pub fn output(&self) -> Option<&Word<O>> {
        self.output.as_ref()
    }

    /// Returns `true` if an answer is present.
    pub fn is_answered(&self) -> bool {
        self.output.is_some()
    }
}

impl<I: Clone + Debug, O> Query<I, O> {
    /// Consumes the query and gives back its answer, failing with [`LearnError::Unanswered`]
    /// if the oracle did not provide one.
    pub fn into_output(self) -> Result<Word<O>, LearnError> {
        match self.output {
            Some(output) => Ok(output),
            None => Err(LearnError::Unanswered(format!(
                "{:?} | {:?}",
                self.prefix, self.suffix
            ))),
        }
    }
}

impl<I: Debug, O: Debug> Debug for Query<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query[{:?} | {:?} / ", self.prefix, self.suffix)?;
        match &self.output {
            Some(output) => write!(f, "{output:?}]"),
            None => write!(f, "?]"),
        }
    }
}

impl<I: Show, O: Show> Show for Query<I, O> {
    fn show(&self) -> String {
        format!(
            "{} | {} / {}",
            self.prefix.show(),
            self.suffix.show(),
            self.output.as_ref().map(Show::show).unwrap_or("?".into())
        )
    }
}

/// A [`Query`] that additionally asks for snapshots of the system state at certain positions.
/// Position `0` refers to the point right after the prefix has been read, position `n` for
/// `n > 0` to the point after the `n`-th symbol of the suffix.
#[derive(Clone, PartialEq, Eq)]
pub struct OmegaQuery<I, O, S> {
    query: Query<I, O>,
    indices: OrderedSet<usize>,
    states: Vec<S>,
}

impl<I: Clone, O, S> OmegaQuery<I, O, S> {
    /// Creates an unanswered omega query.
    pub fn new<J: IntoIterator<Item = usize>>(
        prefix: Word<I>,
        suffix: Word<I>,
        indices: J,
    ) -> Self {
        Self {
            query: Query::new(prefix, suffix),
            indices: indices.into_iter().collect(),
            states: Vec::new(),
        }
    }

    /// The underlying plain query.
    pub fn query(&self) -> &Query<I, O> {
        &self.query
    }

    /// Positions at which a state snapshot is requested.
    pub fn indices(&self) -> &OrderedSet<usize> {
        &self.indices
    }

    /// The retrieved snapshots, one per requested position in ascending order of positions.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// Stores the output word and the snapshots.
    pub fn answer(&mut self, output: Word<O>, states: Vec<S>) {
        self.query.answer(output);
        self.states = states;
    }

    /// Gives the output, if the query has been answered.
    pub fn output(&self) -> Option<&Word<O>> {
        self.query.output()
    }
}

impl<I: Debug, O: Debug, S: Debug> Debug for OmegaQuery<I, O, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} at {:?} with {:?}", self.query, self.indices, self.states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answering() {
        let mut query: Query<char, u8> = Query::new(Word::from("ab"), Word::from("c"));
        assert!(!query.is_answered());
        assert_eq!(query.input(), Word::from("abc"));
        assert_eq!(format!("{query:?}"), "Query['a'·'b' | 'c' / ?]");
        assert!(matches!(
            query.clone().into_output(),
            Err(LearnError::Unanswered(_))
        ));
        query.answer(Word::from(vec![3]));
        assert_eq!(query.output(), Some(&Word::from(vec![3])));
        assert_eq!(query.show(), "\"ab\" | \"c\" / [3]");
        assert_eq!(query.into_output().unwrap(), Word::from(vec![3]));
    }

    #[test]
    fn omega_indices_are_sorted() {
        let mut query: OmegaQuery<char, u8, u32> =
            OmegaQuery::new(Word::epsilon(), Word::from("aa"), [2, 0, 2]);
        assert_eq!(query.indices().iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        query.answer(Word::from(vec![1, 1]), vec![7, 9]);
        assert_eq!(query.states(), &[7, 9]);
        assert_eq!(query.output(), Some(&Word::from(vec![1, 1])));
    }
}
