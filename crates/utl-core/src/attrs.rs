//! Immutable, hashable attribute maps.
//!
//! [`AttrMap`] is the attribute storage of every tree node. It never changes
//! once built: [`AttrMap::combine`], [`AttrMap::with`] and [`AttrMap::without`]
//! return new maps and leave the receiver untouched, so one map can be shared
//! by any number of nodes. Keys keep their insertion order (this is the order
//! used by the JSON writer) while equality and hashing ignore order.

use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    sync::{Arc, OnceLock},
};

use indexmap::IndexMap;

use crate::value::Value;

#[derive(Debug, Default)]
struct Inner {
    entries: IndexMap<String, Value>,
    hash: OnceLock<u64>,
}

/// An immutable mapping from attribute names to [`Value`]s.
///
/// # Examples
///
/// ```
/// use utl_core::{AttrMap, Value};
///
/// let base = AttrMap::from_iter([("file", Value::from("a.utl")), ("line", Value::from(1))]);
/// let moved = base.with("line", 2);
///
/// assert_eq!(base.get("line"), Some(&Value::from(1)));
/// assert_eq!(moved.get("line"), Some(&Value::from(2)));
/// assert!(!moved.without(&["file"]).contains_key("file"));
/// ```
#[derive(Clone, Default)]
pub struct AttrMap(Arc<Inner>);

impl AttrMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn from_entries(entries: IndexMap<String, Value>) -> Self {
        Self(Arc::new(Inner {
            entries,
            hash: OnceLock::new(),
        }))
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.entries.get(key)
    }

    /// Look up a string-valued key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Look up a non-negative integer key such as `start` or `line`.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(Value::as_usize)
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.entries.keys().map(String::as_str)
    }

    /// Return a new map holding every entry of `self` overridden by the
    /// entries of `other`.
    ///
    /// Overridden keys keep their original position; new keys are appended.
    pub fn combine(&self, other: &AttrMap) -> AttrMap {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut entries = self.0.entries.clone();
        for (key, value) in other.iter() {
            entries.insert(key.to_owned(), value.clone());
        }
        Self::from_entries(entries)
    }

    /// Return a new map with a single key set.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> AttrMap {
        let mut entries = self.0.entries.clone();
        entries.insert(key.into(), value.into());
        Self::from_entries(entries)
    }

    /// Return a new map with the given keys removed.
    pub fn without(&self, keys: &[&str]) -> AttrMap {
        if !keys.iter().any(|key| self.contains_key(key)) {
            return self.clone();
        }
        let entries = self
            .0
            .entries
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self::from_entries(entries)
    }

    /// Copy the entries into a plain, editable ordered map.
    pub fn thaw(&self) -> IndexMap<String, Value> {
        self.0.entries.clone()
    }

    /// Structural hash, computed once per map and cached.
    fn structural_hash(&self) -> u64 {
        *self.0.hash.get_or_init(|| {
            // Order-independent so that it agrees with equality.
            let mut combined = 0u64;
            for (key, value) in &self.0.entries {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                value.hash(&mut hasher);
                combined = combined.wrapping_add(hasher.finish());
            }
            let mut hasher = DefaultHasher::new();
            self.len().hash(&mut hasher);
            combined.hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl PartialEq for AttrMap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.structural_hash() == other.structural_hash()
                && self.0.entries == other.0.entries)
    }
}

impl Eq for AttrMap {}

impl Hash for AttrMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.structural_hash());
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AttrMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<IndexMap<String, Value>> for AttrMap {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Self::from_entries(entries)
    }
}

impl fmt::Display for AttrMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (key, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for AttrMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
