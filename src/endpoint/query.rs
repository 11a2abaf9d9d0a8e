//! Flat request parameter maps with duplicate poisoning.

use std::collections::HashMap;
use std::iter::FromIterator;

/// A flat parameter map in which each key must appear at most once.
///
/// Since each key must appear at most once to be usable, a repeated key is
/// not removed from the map but marked as poisoned: it stays visible for
/// conflict detection while [`unique_value`] refuses to answer for it. This
/// prevents order-dependent processing and confusion between components
/// parsing the same query from different ends.
///
/// [`unique_value`]: #method.unique_value
#[derive(Clone, Debug, Default)]
pub struct NormalizedParameter {
    /// The value is `None` if the key appeared at least twice.
    inner: HashMap<String, Option<String>>,
}

impl NormalizedParameter {
    /// Create an empty map.
    pub fn new() -> Self {
        NormalizedParameter::default()
    }

    /// Insert a key-value-pair or mark the key as dead if already present.
    pub fn insert_or_poison(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = Some(value.into());
        self.inner
            .entry(key.into())
            .and_modify(|entry| *entry = None)
            .or_insert(value);
    }

    /// Get the value for a key that appeared exactly once.
    pub fn unique_value(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(|value| value.as_deref())
    }

    /// Whether the key appeared more than once.
    pub fn is_poisoned(&self, key: &str) -> bool {
        matches!(self.inner.get(key), Some(None))
    }

    /// Whether the key appeared at all.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Iterate over all entries; poisoned keys yield `None` values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.inner
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub(crate) fn insert_raw(&mut self, key: String, value: Option<String>) {
        self.inner.insert(key, value);
    }
}

impl<K, V> FromIterator<(K, V)> for NormalizedParameter
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
    {
        let mut target = NormalizedParameter::default();
        iter.into_iter()
            .for_each(|(key, value)| target.insert_or_poison(key, value));
        target
    }
}
