//! Single-entry change-detection cache.
//!
//! The solver and the GPU stage both follow the same pattern: keep the last
//! input alongside its derived value and skip recomputation (or a downstream
//! write) when the new input compares equal. Fuzzy comparisons are expressed
//! through the key's `PartialEq` impl, e.g. [`ApproxTransform`] or
//! `LodDistance` in the LOD resolver.

use crate::transform::Transform3;

/// Caches one key/value pair, recomputing only when the key changes.
#[derive(Debug, Clone)]
pub struct Cache<K, V> {
    entry: Option<(K, V)>,
}

// Manual impl: the derive would demand K: Default and V: Default
impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq, V> Cache<K, V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self { entry: None }
    }

    /// Returns the cached value for `key`, computing and storing it on miss.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> &V {
        let hit = matches!(&self.entry, Some((cached, _)) if *cached == key);
        if !hit {
            let value = compute(&key);
            self.entry = Some((key, value));
        }
        // entry is always Some here
        &self.entry.as_ref().unwrap().1
    }

    /// Records `key` and reports whether it differed from the cached one.
    ///
    /// Useful when the caller only needs change detection, not a derived
    /// value (GPU parameter-block dedup).
    pub fn update(&mut self, key: K) -> bool
    where
        V: Default,
    {
        let hit = matches!(&self.entry, Some((cached, _)) if *cached == key);
        if !hit {
            self.entry = Some((key, V::default()));
        }
        !hit
    }

    /// Drops the cached entry so the next lookup recomputes.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Returns the cached value without recomputing, if any.
    #[must_use]
    pub fn peek(&self) -> Option<&V> {
        self.entry.as_ref().map(|(_, v)| v)
    }
}

/// Transform cache key compared with [`Transform3::is_equal_approx`].
#[derive(Debug, Clone, Copy)]
pub struct ApproxTransform(pub Transform3);

impl PartialEq for ApproxTransform {
    fn eq(&self, other: &Self) -> bool {
        self.0.is_equal_approx(&other.0)
    }
}
