//! Memoized voicing searches, shared across callers

use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use steel_core::search::target_set;
use steel_core::{
    AccessTier, Copedent, PitchClass, SearchOptions, Voicing, VoicingNote, find_voicings,
    find_voicings_on_strings,
};
use tracing::{debug, info, trace};

/// Which search produced an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchMode {
    Standard,
    CollapseUnisons,
    Strings(Vec<u8>),
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::CollapseUnisons => f.write_str("collapse"),
            Self::Strings(ids) => {
                let ids: Vec<String> = ids.iter().map(u8::to_string).collect();
                write!(f, "strings[{}]", ids.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub copedent_id: String,
    /// Octave is never part of the key
    pub root: PitchClass,
    pub mode: SearchMode,
    /// Sorted interval classes
    pub intervals: Vec<u8>,
    pub max_per_fret: usize,
    pub tier: AccessTier,
}

impl CacheKey {
    pub fn new(
        copedent_id: &str,
        root: PitchClass,
        mode: SearchMode,
        intervals: &[u8],
        max_per_fret: usize,
        tier: AccessTier,
    ) -> Self {
        Self {
            copedent_id: copedent_id.to_string(),
            root,
            mode,
            intervals: target_set(intervals).into_iter().collect(),
            max_per_fret,
            tier,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{:?}|{}|{:?}",
            self.copedent_id, self.root, self.mode, self.intervals, self.max_per_fret, self.tier
        )
    }
}

struct CacheEntry {
    voicings: Vec<Voicing>,
    hits: u64,
    last_access: Instant,
}

struct CacheInner {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    /// Bumped by `clear`
    epoch: u64,
    /// Bumped per copedent by `invalidate_copedent`
    generations: HashMap<String, u64>,
}

impl CacheInner {
    fn generation(&self, copedent_id: &str) -> (u64, u64) {
        (self.epoch, self.generations.get(copedent_id).copied().unwrap_or(0))
    }
}

/// Usage numbers for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub approx_bytes: usize,
    /// Up to five keys with the most hits
    pub most_used: Vec<(String, u64)>,
}

fn approx_size(voicings: &[Voicing]) -> usize {
    voicings
        .iter()
        .map(|v| {
            let controls: usize = v.controls.ids().map(|id| id.len() + size_of::<String>()).sum();
            let notes: usize = v
                .notes
                .iter()
                .map(|n| {
                    size_of::<VoicingNote>()
                        + n.active_controls.iter().map(|c| c.len() + size_of::<String>()).sum::<usize>()
                })
                .sum();
            size_of::<Voicing>() + controls + notes
        })
        .sum()
}

/// Thread-safe voicing cache.
///
/// Every read and write hands out an independent copy, so callers may
/// mutate results freely. Entries are never checked against their
/// copedent: call [`VoicingCache::invalidate_copedent`] after any edit.
pub struct VoicingCache {
    inner: Mutex<CacheInner>,
}

impl Default for VoicingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VoicingCache {
    /// Cache without an entry limit
    pub fn new() -> Self {
        Self::from_lru(LruCache::unbounded())
    }

    /// Cache that drops the least recently used entry beyond `max_entries`
    pub fn with_capacity(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self::from_lru(LruCache::new(capacity))
    }

    fn from_lru(entries: LruCache<CacheKey, CacheEntry>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries,
                hits: 0,
                misses: 0,
                epoch: 0,
                generations: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Entries are only replaced whole, so a poisoned lock is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return a copy of the cached result, or compute, store and return it.
    /// The search runs without holding the lock; a result computed across
    /// an invalidation of its copedent is returned but not stored.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Vec<Voicing>
    where
        F: FnOnce() -> Vec<Voicing>,
    {
        let generation = {
            let mut inner = self.lock();
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.hits += 1;
                entry.last_access = Instant::now();
                let voicings = entry.voicings.clone();
                inner.hits += 1;
                trace!(key = %key, "Voicing cache hit");
                return voicings;
            }
            inner.misses += 1;
            inner.generation(&key.copedent_id)
        };

        let voicings = compute();
        let mut inner = self.lock();
        if inner.generation(&key.copedent_id) != generation {
            debug!(key = %key, "Discarding voicings computed across an invalidation");
            return voicings;
        }
        inner.entries.put(
            key,
            CacheEntry {
                voicings: voicings.clone(),
                hits: 0,
                last_access: Instant::now(),
            },
        );
        voicings
    }

    /// Cached [`find_voicings`]
    pub fn find_voicings(
        &self,
        copedent: &Copedent,
        root: PitchClass,
        intervals: &[u8],
        options: &SearchOptions,
    ) -> Vec<Voicing> {
        let mode = if options.collapse_unisons {
            SearchMode::CollapseUnisons
        } else {
            SearchMode::Standard
        };
        let key = CacheKey::new(&copedent.id, root, mode, intervals, options.max_per_fret, options.tier);
        self.get_or_compute(key, || find_voicings(copedent, root, intervals, options))
    }

    /// Cached [`find_voicings_on_strings`]
    pub fn find_voicings_on_strings(
        &self,
        copedent: &Copedent,
        root: PitchClass,
        intervals: &[u8],
        string_ids: &[u8],
        tier: AccessTier,
    ) -> Vec<Voicing> {
        let mut ids = string_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let key = CacheKey::new(&copedent.id, root, SearchMode::Strings(ids), intervals, 1, tier);
        self.get_or_compute(key, || {
            find_voicings_on_strings(copedent, root, intervals, string_ids, tier)
        })
    }

    /// Drop every entry computed from the given copedent
    pub fn invalidate_copedent(&self, copedent_id: &str) -> usize {
        let mut inner = self.lock();
        let stale: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(k, _)| k.copedent_id == copedent_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            inner.entries.pop(key);
        }
        *inner.generations.entry(copedent_id.to_string()).or_default() += 1;
        info!(copedent = copedent_id, removed = stale.len(), "Invalidated cached voicings");
        stale.len()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.epoch += 1;
        inner.hits = 0;
        inner.misses = 0;
        info!("Voicing cache cleared");
    }

    /// Evict entries unused for longer than `max_age`, then the least
    /// recently used ones beyond `max_entries`. Returns the number evicted.
    pub fn cleanup(&self, max_age: Option<Duration>, max_entries: Option<usize>) -> usize {
        let mut inner = self.lock();
        let mut evicted = 0;

        if let Some(max_age) = max_age {
            let expired: Vec<CacheKey> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.last_access.elapsed() >= max_age)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                inner.entries.pop(key);
            }
            evicted += expired.len();
        }

        if let Some(max_entries) = max_entries {
            while inner.entries.len() > max_entries {
                if inner.entries.pop_lru().is_none() {
                    break;
                }
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, remaining = inner.entries.len(), "Voicing cache cleanup");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let lookups = inner.hits + inner.misses;

        let mut most_used: Vec<(String, u64)> = inner
            .entries
            .iter()
            .map(|(k, e)| (k.to_string(), e.hits))
            .collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_used.truncate(5);

        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 { 0.0 } else { inner.hits as f64 / lookups as f64 },
            approx_bytes: inner.entries.iter().map(|(_, e)| approx_size(&e.voicings)).sum(),
            most_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAJOR: &[u8] = &[0, 4, 7];

    #[test]
    fn test_hit_returns_independent_copy() {
        let cache = VoicingCache::new();
        let copedent = Copedent::standard_e9();
        let options = SearchOptions::default();

        let mut first = cache.find_voicings(&copedent, PitchClass::C, MAJOR, &options);
        let pristine = first.clone();
        let string_id = first[0].notes[0].string_id;
        first[0].set_played(string_id, false);
        first[0].fret = 99;
        first.clear();

        let second = cache.find_voicings(&copedent, PitchClass::C, MAJOR, &options);
        assert_eq!(second, pristine);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert_eq!(stats.hit_rate, 0.5);
        assert!(stats.approx_bytes > 0);
    }

    #[test]
    fn test_key_ignores_interval_order_and_octaves() {
        let a = CacheKey::new("e9", PitchClass::C, SearchMode::Standard, &[7, 0, 16], 3, AccessTier::Full);
        let b = CacheKey::new("e9", PitchClass::C, SearchMode::Standard, &[0, 4, 7], 3, AccessTier::Full);
        assert_eq!(a, b);
        let c = CacheKey::new("e9", PitchClass::C, SearchMode::Standard, &[0, 4, 7], 4, AccessTier::Full);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalidate_by_copedent() {
        let cache = VoicingCache::new();
        let e9 = Copedent::standard_e9();
        let mut other = Copedent::standard_e9();
        other.id = "other".to_string();
        let options = SearchOptions::default();

        cache.find_voicings(&e9, PitchClass::C, MAJOR, &options);
        cache.find_voicings(&e9, PitchClass::G, MAJOR, &options);
        cache.find_voicings(&other, PitchClass::C, MAJOR, &options);

        assert_eq!(cache.invalidate_copedent("e9-standard"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_and_cleanup_evict_lru() {
        let cache = VoicingCache::new();
        let key = |root| CacheKey::new("x", root, SearchMode::Standard, MAJOR, 1, AccessTier::Full);
        for root in [PitchClass::C, PitchClass::D, PitchClass::E] {
            cache.get_or_compute(key(root), Vec::new);
        }
        // touch C so D is least recently used
        cache.get_or_compute(key(PitchClass::C), Vec::new);

        assert_eq!(cache.cleanup(None, Some(2)), 1);
        let stats = cache.stats();
        assert!(!stats.most_used.iter().any(|(k, _)| k.starts_with("x|D|")));
        assert_eq!(stats.most_used[0].1, 1);

        assert_eq!(cache.cleanup(Some(Duration::ZERO), None), 2);
        assert!(cache.is_empty());

        let bounded = VoicingCache::with_capacity(1);
        bounded.get_or_compute(key(PitchClass::C), Vec::new);
        bounded.get_or_compute(key(PitchClass::D), Vec::new);
        assert_eq!(bounded.len(), 1);
    }

    #[test]
    fn test_invalidation_during_compute_is_not_stored() {
        let cache = VoicingCache::new();
        let key = |root| CacheKey::new("x", root, SearchMode::Standard, MAJOR, 1, AccessTier::Full);

        cache.get_or_compute(key(PitchClass::C), || {
            cache.invalidate_copedent("x");
            Vec::new()
        });
        assert!(cache.is_empty());

        cache.get_or_compute(key(PitchClass::D), || {
            cache.clear();
            Vec::new()
        });
        assert!(cache.is_empty());

        // Another copedent's invalidation does not block storing
        cache.get_or_compute(key(PitchClass::E), || {
            cache.invalidate_copedent("y");
            Vec::new()
        });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_lookups_and_invalidation() {
        let cache = VoicingCache::new();
        let copedent = Copedent::standard_e9();
        let options = SearchOptions::new(1, AccessTier::Full);
        let roots = [PitchClass::C, PitchClass::F, PitchClass::G];
        let expected: Vec<Vec<Voicing>> = roots
            .iter()
            .map(|&root| find_voicings(&copedent, root, MAJOR, &options))
            .collect();

        std::thread::scope(|s| {
            for worker in 0..4 {
                let (cache, copedent, expected, options) = (&cache, &copedent, &expected, &options);
                s.spawn(move || {
                    for round in 0..6 {
                        let i = (worker + round) % roots.len();
                        let mut got = cache.find_voicings(copedent, roots[i], MAJOR, options);
                        assert_eq!(got, expected[i]);
                        got.clear();
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..6 {
                    cache.invalidate_copedent(&copedent.id);
                }
            });
        });

        for (i, &root) in roots.iter().enumerate() {
            assert_eq!(cache.find_voicings(&copedent, root, MAJOR, &options), expected[i]);
        }
        cache.invalidate_copedent(&copedent.id);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_resets_counts() {
        let cache = VoicingCache::new();
        let key = CacheKey::new("x", PitchClass::C, SearchMode::Strings(vec![3, 4]), MAJOR, 1, AccessTier::Full);
        cache.get_or_compute(key.clone(), Vec::new);
        cache.get_or_compute(key, Vec::new);
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
