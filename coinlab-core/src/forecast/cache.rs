//! Bounded LRU cache of computed forecasts keyed by `(asset, horizon)`.
//!
//! Every [`clear`](ForecastCache::clear) starts a new generation. A forecast is only
//! stored if it was computed within the current generation, so a fit that started
//! before an ingestion cannot repopulate the cache with pre-ingestion values.

use crate::domain::Forecast;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

type Key = (String, usize);

struct Entries {
    lru: LruCache<Key, Arc<Forecast>>,
    generation: u64,
}

/// Thread-safe forecast cache. Entries live until evicted or [`clear`](Self::clear)ed.
pub struct ForecastCache {
    inner: Mutex<Entries>,
}

impl ForecastCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Entries {
                lru: LruCache::new(capacity),
                generation: 0,
            }),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, asset_id: &str, horizon: usize) -> Option<Arc<Forecast>> {
        self.entries()
            .lru
            .get(&(asset_id.to_string(), horizon))
            .cloned()
    }

    /// Current generation. Capture it before computing a forecast and hand it to
    /// [`put`](Self::put).
    pub fn generation(&self) -> u64 {
        self.entries().generation
    }

    /// Store `forecast` if no [`clear`](Self::clear) happened since `generation` was
    /// read. Returns whether the entry was stored.
    pub fn put(
        &self,
        asset_id: &str,
        horizon: usize,
        forecast: Arc<Forecast>,
        generation: u64,
    ) -> bool {
        let mut entries = self.entries();
        if entries.generation != generation {
            return false;
        }
        entries.lru.put((asset_id.to_string(), horizon), forecast);
        true
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        entries.lru.clear();
        entries.generation = entries.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.entries().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries().lru.cap().get()
    }
}
