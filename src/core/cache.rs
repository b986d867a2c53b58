//! Most-recently-used-first cache of compiled patterns
//!
//! Lookups scan linearly from the front. A hit rotates the entry to the
//! front; a miss compiles, drops the tail entry when full and inserts at the
//! front. Capacities are small, so the O(N) shifts are cheaper than a single
//! compilation.

use tracing::{debug, trace};

use super::engine::CompiledPattern;
use super::error::CompileError;

/// Default number of compiled patterns kept per session
pub const DEFAULT_CAPACITY: usize = 16;

/// One cached pattern: an owned copy of the source bytes and its compiled form
#[derive(Debug)]
pub struct CacheEntry {
    pattern: Box<[u8]>,
    compiled: CompiledPattern,
}

impl CacheEntry {
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn compiled(&self) -> &CompiledPattern {
        &self.compiled
    }
}

/// Counters describing cache behaviour since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Every miss is exactly one compilation attempt
    pub misses: u64,
    pub evictions: u64,
}

/// Fixed-capacity store of compiled patterns, most recently used first
#[derive(Debug)]
pub struct PatternCache {
    entries: Vec<CacheEntry>,
    capacity: usize,
    stats: CacheStats,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PatternCache {
    /// Create an empty cache; a capacity of 0 is raised to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            stats: CacheStats::default(),
        }
    }

    /// Return the compiled form of `pattern`, compiling it on a miss
    ///
    /// On a compile failure the cache is left untouched.
    pub fn resolve(&mut self, pattern: &[u8]) -> Result<&CompiledPattern, CompileError> {
        if let Some(position) = self.position(pattern) {
            self.stats.hits += 1;
            trace!(position, "pattern cache hit");
            self.entries[..=position].rotate_right(1);
        } else {
            self.stats.misses += 1;
            let compiled = CompiledPattern::compile(pattern)?;
            if self.entries.len() == self.capacity {
                if let Some(evicted) = self.entries.pop() {
                    self.stats.evictions += 1;
                    debug!(
                        pattern = %String::from_utf8_lossy(evicted.pattern()),
                        "evicting compiled pattern"
                    );
                }
            }
            debug!(
                pattern = %String::from_utf8_lossy(pattern),
                engine = %compiled.engine_type(),
                "compiled pattern"
            );
            self.entries.insert(
                0,
                CacheEntry {
                    pattern: pattern.into(),
                    compiled,
                },
            );
        }
        Ok(&self.entries[0].compiled)
    }

    /// Position of `pattern` without touching the order
    pub fn position(&self, pattern: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| *e.pattern == *pattern)
    }

    pub fn contains(&self, pattern: &[u8]) -> bool {
        self.position(pattern).is_some()
    }

    /// Cached pattern bytes, most recently used first
    pub fn patterns(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.entries.iter().map(CacheEntry::pattern)
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every entry, keeping the counters
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(cache: &PatternCache) -> Vec<String> {
        cache
            .patterns()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }

    #[test]
    fn test_miss_then_hit_compiles_once() {
        let mut cache = PatternCache::new(4);
        assert!(cache.resolve(b"a+").unwrap().is_match(b"caat").unwrap());
        assert!(cache.resolve(b"a+").unwrap().is_match(b"caat").unwrap());
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                evictions: 0
            }
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overflow_evicts_least_recent() {
        let mut cache = PatternCache::new(3);
        for p in ["a", "b", "c", "d"] {
            cache.resolve(p.as_bytes()).unwrap();
        }
        assert!(!cache.contains(b"a"));
        assert_eq!(keys(&cache), ["d", "c", "b"]);
        assert_eq!(cache.stats().evictions, 1);

        let misses = cache.stats().misses;
        for p in ["b", "c", "d"] {
            cache.resolve(p.as_bytes()).unwrap();
        }
        assert_eq!(cache.stats().misses, misses);
    }

    #[test]
    fn test_hit_promotes_with_rotation() {
        let mut cache = PatternCache::new(4);
        for p in ["a", "b", "c", "d"] {
            cache.resolve(p.as_bytes()).unwrap();
        }
        assert_eq!(keys(&cache), ["d", "c", "b", "a"]);

        cache.resolve(b"b").unwrap();
        assert_eq!(keys(&cache), ["b", "d", "c", "a"]);

        cache.resolve(b"a").unwrap();
        assert_eq!(keys(&cache), ["a", "b", "d", "c"]);
    }

    #[test]
    fn test_compile_failure_leaves_cache_untouched() {
        let mut cache = PatternCache::new(2);
        cache.resolve(b"x").unwrap();
        cache.resolve(b"y").unwrap();

        let err = cache.resolve(b"(unclosed").unwrap_err();
        assert!(err.offset < "(unclosed".len());
        assert_eq!(keys(&cache), ["y", "x"]);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_keys_are_byte_exact() {
        let mut cache = PatternCache::new(4);
        cache.resolve(b"abc").unwrap();
        cache.resolve(b"abc ").unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut cache = PatternCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.resolve(b"a").unwrap();
        cache.resolve(b"b").unwrap();
        assert_eq!(keys(&cache), ["b"]);
    }

    #[test]
    fn test_clear() {
        let mut cache = PatternCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        cache.resolve(b"a").unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
