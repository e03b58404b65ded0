//! Per-scope compiled-script cache
//!
//! Maps exact source text to a realm-independent compiled form. There is no
//! eviction; entries live as long as the owning scope. Memory is bounded by
//! refusing keys longer than [`MAX_CACHEABLE_SOURCE_LEN`].

use rustc_hash::FxHashMap;

/// Longest source (in bytes of UTF-8) that is ever cached
pub const MAX_CACHEABLE_SOURCE_LEN: usize = 64 * 1024;

/// Source text → compiled form
#[derive(Debug)]
pub struct ScriptCache<U> {
    entries: FxHashMap<String, U>,
}

impl<U: Clone> ScriptCache<U> {
    /// Empty cache
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// `true` if `source` is short enough to be cached
    #[inline]
    pub fn is_cacheable(source: &str) -> bool {
        source.len() <= MAX_CACHEABLE_SOURCE_LEN
    }

    /// Compiled form for exactly `source`, if cached
    pub fn get(&self, source: &str) -> Option<U> {
        self.entries.get(source).cloned()
    }

    /// Insert or replace the entry for `source`.
    ///
    /// Returns `false` (and stores nothing) if the source is too long.
    pub fn insert(&mut self, source: &str, compiled: U) -> bool {
        if !Self::is_cacheable(source) {
            tracing::warn!(len = source.len(), "source exceeds cache limit; not cached");
            return false;
        }
        self.entries.insert(source.to_string(), compiled);
        tracing::debug!(len = source.len(), entries = self.entries.len(), "script cached");
        true
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<U: Clone> Default for ScriptCache<U> {
    fn default() -> Self {
        Self::new()
    }
}
