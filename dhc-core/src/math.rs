use std::collections::BTreeSet;
use std::hash::Hash;

/// Type alias for sets that remember insertion order, we use this to hide which hasher we are
/// actually using.
pub type Set<S> = indexmap::IndexSet<S, fxhash::FxBuildHasher>;

/// Type alias for maps that remember insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V, fxhash::FxBuildHasher>;

/// Type alias for sets whose iteration order is given by [`Ord`].
pub type OrderedSet<S> = BTreeSet<S>;

/// Reduces `value` to a scalar hash. The hash is stable for the lifetime of the process, which
/// is all that is needed to compare snapshots taken on different handles.
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    fxhash::hash64(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_keep_insertion_order() {
        let mut set: Set<&str> = Set::default();
        set.insert("b");
        set.insert("a");
        assert!(!set.insert("b"));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test_log::test]
    fn ordered_sets_iterate_sorted() {
        let set: OrderedSet<usize> = [3, 0, 2, 3].into_iter().collect();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn fingerprints_agree_on_equal_values() {
        assert_eq!(fingerprint(&vec![1u8, 2, 3]), fingerprint(&vec![1u8, 2, 3]));
    }
}
