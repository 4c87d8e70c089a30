// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoization storage keyed by call signatures.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use parking_lot::Mutex;

use crate::Arguments;

/// A structural key for memoized values.
///
/// The key is made of a scope (usually a method name) and, optionally, the canonical form
/// of a call's [`Arguments`]. The block takes part through its source location only, so
/// two calls passing the same closure literal hit the same entry.
///
/// # Examples
///
/// ```
/// use method_middleware::Arguments;
/// use method_middleware::cache::CacheKey;
///
/// let first = CacheKey::with_arguments("result", &Arguments::null().kwarg("id", 1));
/// let second = CacheKey::with_arguments("result", &Arguments::null().kwarg("id", 1));
///
/// assert_eq!(first, second);
/// assert_ne!(first, CacheKey::new("result"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: Cow<'static, str>,
    arguments: Option<ArgumentsKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ArgumentsKey {
    args: String,
    kwargs: String,
    block: Option<(&'static str, u32, u32)>,
}

impl CacheKey {
    /// A key made of a scope only.
    #[must_use]
    pub fn new(scope: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scope: scope.into(),
            arguments: None,
        }
    }

    /// A key made of a scope and a call signature.
    #[must_use]
    pub fn with_arguments(scope: impl Into<Cow<'static, str>>, arguments: &Arguments) -> Self {
        let block = arguments.block_ref().map(|block| {
            let location = block.source_location();
            (location.file(), location.line(), location.column())
        });

        Self {
            scope: scope.into(),
            arguments: Some(ArgumentsKey {
                args: serde_json::Value::from(arguments.args().to_vec()).to_string(),
                kwargs: serde_json::Value::Object(arguments.kwargs().clone().into_iter().collect()).to_string(),
                block,
            }),
        }
    }

    /// The scope part of the key.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Single-threaded storage behind a [`Cache`].
pub trait Storage<K, V>: Default + Send {
    /// Returns the value stored under `key`.
    fn read(&self, key: &K) -> Option<&V>;

    /// Stores `value` under `key`, returning the previous value.
    fn write(&mut self, key: K, value: V) -> Option<V>;

    /// Removes the value stored under `key`.
    fn delete(&mut self, key: &K) -> Option<V>;

    /// Removes everything.
    fn clear(&mut self);

    /// The number of stored values.
    fn len(&self) -> usize;

    /// Returns `true` when a value is stored under `key`.
    fn exist(&self, key: &K) -> bool {
        self.read(key).is_some()
    }

    /// Returns `true` when nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage backed by a vector with linear lookup.
///
/// Needs only `PartialEq` keys and keeps insertion order; a good fit for the handful of
/// entries a single object memoizes.
#[derive(Debug)]
pub struct ArrayStorage<K, V>(Vec<(K, V)>);

impl<K, V> Default for ArrayStorage<K, V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<K: PartialEq + Send, V: Send> Storage<K, V> for ArrayStorage<K, V> {
    fn read(&self, key: &K) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn write(&mut self, key: K, value: V) -> Option<V> {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        let position = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(position).1)
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Storage backed by a hash map.
#[derive(Debug)]
pub struct HashStorage<K, V>(HashMap<K, V>);

impl<K, V> Default for HashStorage<K, V> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<K: Eq + Hash + Send, V: Send> Storage<K, V> for HashStorage<K, V> {
    fn read(&self, key: &K) -> Option<&V> {
        self.0.get(key)
    }

    fn write(&mut self, key: K, value: V) -> Option<V> {
        self.0.insert(key, value)
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        self.0.remove(key)
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// A thread-safe cache over a [`Storage`].
///
/// Every primitive operation takes the cache's mutex, so each one is atomic on its own.
/// [`Cache::fetch`] is atomic between the existence check and the write: when two threads
/// race to compute the same entry, both may compute but the first write wins and both
/// return the stored value. Nothing is atomic across two caches.
///
/// # Examples
///
/// ```
/// use method_middleware::cache::{ArrayStorage, Cache};
///
/// let cache: Cache<&str, u32, ArrayStorage<_, _>> = Cache::new();
///
/// assert_eq!(cache.fetch("answer", || 42), 42);
/// assert_eq!(cache.fetch("answer", || 0), 42);
/// ```
pub struct Cache<K, V, S = HashStorage<K, V>> {
    storage: Mutex<S>,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V, S: Storage<K, V>> Default for Cache<K, V, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S: Storage<K, V>> Cache<K, V, S> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Mutex::new(S::default()),
            _marker: PhantomData,
        }
    }

    /// Returns a copy of the value stored under `key`.
    pub fn read(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.storage.lock().read(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn write(&self, key: K, value: V) -> Option<V> {
        self.storage.lock().write(key, value)
    }

    /// Returns `true` when a value is stored under `key`.
    pub fn exist(&self, key: &K) -> bool {
        self.storage.lock().exist(key)
    }

    /// Removes the value stored under `key`.
    pub fn delete(&self, key: &K) -> Option<V> {
        self.storage.lock().delete(key)
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.storage.lock().clear();
    }

    /// The number of stored values.
    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.storage.lock().is_empty()
    }

    /// Returns the value under `key`, computing and storing it first when missing.
    ///
    /// `compute` runs without the lock held, so it may use this cache itself.
    pub fn fetch(&self, key: K, compute: impl FnOnce() -> V) -> V
    where
        V: Clone,
    {
        if let Some(value) = self.read(&key) {
            return value;
        }

        let value = compute();
        self.write_if_absent(key, value)
    }

    /// Like [`Cache::fetch`], for computations that can fail. Errors are not stored.
    ///
    /// # Errors
    ///
    /// Returns the error `compute` returned.
    pub fn try_fetch<E>(&self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E>
    where
        V: Clone,
    {
        if let Some(value) = self.read(&key) {
            return Ok(value);
        }

        let value = compute()?;
        Ok(self.write_if_absent(key, value))
    }

    fn write_if_absent(&self, key: K, value: V) -> V
    where
        V: Clone,
    {
        let mut storage = self.storage.lock();
        if let Some(existing) = storage.read(&key) {
            return existing.clone();
        }

        storage.write(key, value.clone());
        value
    }
}

impl<K, V, S> Debug for Cache<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}
