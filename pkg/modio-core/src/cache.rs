//! Response cache (spec §4.6): a URL cache keyed by FNV-32 hash of the
//! fully-formatted resource path, with a 15s TTL, plus an un-timed
//! mod-info cache invalidated explicitly on mutation. Grounded on the
//! teacher's cache/timer-callback split; the cache-owner <-> timer
//! relationship is cyclic by nature (design note "Cycles", spec §9), so
//! the expiry task only ever holds a `Weak` back to the owner.
//!
//! `DynamicBuffer` itself (a `VecDeque` of owned chunks) is not a cheap
//! handle to clone, so cached bodies are held as `Arc<Vec<u8>>` — the
//! portable equivalent of the teacher's handle-copy clone semantics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use modio_executor::{Executor, Timer};

/// Default TTL for a cached response (spec §4.6).
pub const DEFAULT_TTL: Duration = Duration::from_secs(15);

fn fnv32(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub fn url_cache_key(fully_formatted_path: &str) -> u32 {
    fnv32(fully_formatted_path.as_bytes())
}

struct UrlCacheEntry {
    body: Arc<Vec<u8>>,
    #[allow(dead_code)]
    timer: Timer,
}

#[derive(Default)]
struct ResponseCacheInner {
    url_cache: Mutex<HashMap<u32, UrlCacheEntry>>,
    mod_info_cache: Mutex<HashMap<u64, serde_json::Value>>,
}

/// The owner both the URL cache and the mod-info cache live under.
/// `clear()` drops this `Arc` and installs a fresh one; any expiry task
/// still holding a `Weak` to the old owner silently no-ops on fire.
#[derive(Clone, Default)]
pub struct ResponseCache {
    inner: Arc<ResponseCacheInner>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `body` under `key`, resetting its TTL. Reinsertion while
    /// a live, unexpired entry already exists for `key` is suppressed
    /// (spec §4.6: "avoid churning the timer").
    pub fn insert(&self, executor: &Executor, key: u32, body: Vec<u8>, ttl: Duration) {
        {
            let cache = self.inner.url_cache.lock().unwrap();
            if cache.contains_key(&key) {
                return;
            }
        }

        let timer = Timer::new(ttl);
        let weak_owner: Weak<ResponseCacheInner> = Arc::downgrade(&self.inner);
        let timer_for_task = timer.clone();
        executor.spawn(async move {
            let _ = timer_for_task.wait().await;
            if let Some(owner) = weak_owner.upgrade() {
                owner.url_cache.lock().unwrap().remove(&key);
            }
        });

        self.inner.url_cache.lock().unwrap().insert(key, UrlCacheEntry { body: Arc::new(body), timer });
    }

    /// Returns a cheap clone of the cached body for `key`, if present
    /// and not yet expired.
    pub fn fetch(&self, key: u32) -> Option<Arc<Vec<u8>>> {
        self.inner.url_cache.lock().unwrap().get(&key).map(|entry| entry.body.clone())
    }

    pub fn mod_info(&self, mod_id: u64) -> Option<serde_json::Value> {
        self.inner.mod_info_cache.lock().unwrap().get(&mod_id).cloned()
    }

    pub fn set_mod_info(&self, mod_id: u64, value: serde_json::Value) {
        self.inner.mod_info_cache.lock().unwrap().insert(mod_id, value);
    }

    /// Invalidates a single mod-info entry (spec §4.6, invariant 6: a
    /// mutating call must invalidate the entry before the next
    /// `get_mod_info` observes it).
    pub fn invalidate_mod_info(&self, mod_id: u64) {
        self.inner.mod_info_cache.lock().unwrap().remove(&mod_id);
    }

    /// Drops every entry and replaces the owner with a fresh one
    /// (§4.9: cleared wholesale on user change).
    pub fn clear(&mut self) {
        self.inner = Arc::new(ResponseCacheInner::default());
    }
}
