//! Bounded alias → real location cache shared by every handle of a factory.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::location::RealLocation;

/// Default number of aliases remembered.
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => unreachable!(),
};

/// Least-recently-used cache of successful resolutions.
///
/// Safe to share across concurrently settling resolutions: every access goes
/// through one mutex, so the capacity bound and recency order hold under
/// contention. Failed resolutions never reach the cache.
pub struct AliasCache {
    entries: Mutex<LruCache<String, RealLocation>>,
}

impl AliasCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up `alias`, marking it most recently used on a hit.
    pub fn get(&self, alias: &str) -> Option<RealLocation> {
        self.entries
            .lock()
            .expect("alias cache lock poisoned")
            .get(alias)
            .cloned()
    }

    /// Remember `location` for `alias`, evicting the least recently used
    /// entry when full.
    pub fn insert(&self, alias: &str, location: RealLocation) {
        let evicted = self
            .entries
            .lock()
            .expect("alias cache lock poisoned")
            .push(alias.to_owned(), location);
        if let Some((old, _)) = evicted.filter(|(k, _)| k != alias) {
            tracing::trace!(evicted = %old, "alias cache eviction");
        }
    }

    /// Check for `alias` without touching recency.
    pub fn contains(&self, alias: &str) -> bool {
        self.entries
            .lock()
            .expect("alias cache lock poisoned")
            .contains(alias)
    }

    /// Forget `alias`. Returns the location it mapped to.
    pub fn remove(&self, alias: &str) -> Option<RealLocation> {
        self.entries
            .lock()
            .expect("alias cache lock poisoned")
            .pop(alias)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("alias cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.lock().expect("alias cache lock poisoned").cap()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("alias cache lock poisoned").clear();
    }

    /// Aliases from most to least recently used.
    pub fn aliases(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("alias cache lock poisoned")
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl Default for AliasCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for AliasCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn loc(s: &str) -> RealLocation {
        RealLocation::validate("test", Some(s.to_owned())).unwrap()
    }

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn default_capacity_is_128() {
        assert_eq!(AliasCache::default().capacity().get(), 128);
    }

    #[test]
    fn insert_and_get() {
        let cache = AliasCache::default();
        assert!(cache.get("a").is_none());
        cache.insert("a", loc("/a"));
        assert_eq!(cache.get("a"), Some(loc("/a")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_updates_existing() {
        let cache = AliasCache::default();
        cache.insert("a", loc("/old"));
        cache.insert("a", loc("/new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(loc("/new")));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = AliasCache::new(cap(2));
        cache.insert("a", loc("/a"));
        cache.insert("b", loc("/b"));
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.insert("c", loc("/c"));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.aliases(), vec!["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn contains_does_not_promote() {
        let cache = AliasCache::new(cap(2));
        cache.insert("a", loc("/a"));
        cache.insert("b", loc("/b"));
        assert!(cache.contains("a"));
        cache.insert("c", loc("/c"));
        assert!(!cache.contains("a"));
    }

    #[test]
    fn remove_and_clear() {
        let cache = AliasCache::default();
        cache.insert("a", loc("/a"));
        cache.insert("b", loc("/b"));
        assert_eq!(cache.remove("a"), Some(loc("/a")));
        assert!(cache.remove("a").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_inserts_respect_capacity() {
        let cache = Arc::new(AliasCache::new(cap(16)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let alias = format!("t{t}-{i}");
                        cache.insert(&alias, loc(&format!("/{alias}")));
                        cache.get(&alias);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(cache.len(), 16);
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", AliasCache::default());
        assert!(debug.contains("AliasCache"));
        assert!(debug.contains("capacity"));
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity_and_keeps_most_recent(
            names in proptest::collection::vec(0u16..400, 1..600)
        ) {
            let cache = AliasCache::default();
            for n in &names {
                let alias = format!("alias-{n}");
                cache.insert(&alias, loc(&format!("/real/{n}")));
                prop_assert!(cache.len() <= 128);
            }

            // The most recently inserted distinct names, newest first.
            let mut expected: Vec<String> = Vec::new();
            for n in names.iter().rev() {
                let alias = format!("alias-{n}");
                if !expected.contains(&alias) {
                    expected.push(alias);
                }
                if expected.len() == 128 {
                    break;
                }
            }
            prop_assert_eq!(cache.aliases(), expected);
        }
    }
}
