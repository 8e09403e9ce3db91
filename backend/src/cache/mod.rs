//! In-memory response caching and in-flight request coalescing.
//!
//! Both structures are explicit values owned by the client that uses them,
//! so tests and concurrent pipelines each get their own.
//!
//! - [`TtlCache`] - Entries expire a fixed window after insertion
//! - [`Coalescer`] - Concurrent callers for the same key share one future

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A cached value with its insertion time.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Map whose entries are served for `ttl` after insertion, then dropped.
///
/// Staleness within the window is accepted; readers must not assume strong
/// consistency with the upstream.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, evicting it if expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        // A poisoned map only means a panic mid-insert; the data is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

type SharedResult<V> = Shared<BoxFuture<'static, V>>;

/// Deduplicates concurrent work by key.
///
/// The first caller for a key starts the future; callers arriving while it
/// runs await the same [`Shared`] handle. The slot is cleared once the future
/// resolves, so later callers should consult a cache first.
pub struct Coalescer<K, V>
where
    V: Clone,
{
    pending: Mutex<HashMap<K, (u64, SharedResult<V>)>>,
    next_id: AtomicU64,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `make()` for `key` unless an identical request is already in flight.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (id, shared) = {
            let mut pending = self.lock();
            match pending.get(&key) {
                Some((id, shared)) => (*id, shared.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let shared = make().boxed().shared();
                    pending.insert(key.clone(), (id, shared.clone()));
                    (id, shared)
                }
            }
        };

        let value = shared.await;

        let mut pending = self.lock();
        if pending.get(&key).is_some_and(|(current, _)| *current == id) {
            pending.remove(&key);
        }
        value
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, (u64, SharedResult<V>)>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
