#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Process-wide result cache for the dashboard pipeline.
//!
//! [`QueryCache`] maps a [`Fingerprint`] to a previously computed payload.
//! Entries expire `ttl` after they were created and the cache holds at
//! most `capacity` entries, evicting the oldest-created entry first.
//!
//! Computations are single-flight: concurrent callers asking for the same
//! fingerprint wait for the one in-flight computation and share its
//! outcome, while different fingerprints proceed in parallel. A failed
//! computation stores nothing, so the next new caller retries it.

mod fingerprint;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

pub use fingerprint::{Fingerprint, FingerprintBuilder};

/// A cached payload and the moment it was stored.
struct CacheEntry<V> {
    payload: Arc<V>,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups answered from a fresh entry.
    pub hits: u64,
    /// Lookups that ran the compute function.
    pub misses: u64,
    /// Entries removed to respect the capacity bound.
    pub evictions: u64,
    /// Entries currently stored (fresh or expired).
    pub entries: usize,
}

/// Outcome of an in-flight computation, `None` until it finishes.
type Outcome<V, E> = Option<Result<Arc<V>, E>>;

type InflightMap<V, E> = Mutex<HashMap<Fingerprint, watch::Receiver<Outcome<V, E>>>>;

/// Keyed, TTL-bounded, single-flight cache.
///
/// `E` is the error type of the computations; it is cloned to every caller
/// that waited on a failed computation.
pub struct QueryCache<V, E> {
    name: &'static str,
    capacity: usize,
    entries: RwLock<HashMap<Fingerprint, CacheEntry<V>>>,
    inflight: InflightMap<V, E>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V, E> std::fmt::Debug for QueryCache<V, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Owns the in-flight slot of the caller running a computation.
///
/// Dropping it removes the slot on success, failure and cancellation
/// alike. A computation dropped before publishing its outcome closes the
/// channel, which sends its waiters back to compete for the slot.
struct InflightGuard<'a, V, E> {
    fingerprint: &'a Fingerprint,
    inflight: &'a InflightMap<V, E>,
    sender: watch::Sender<Outcome<V, E>>,
}

impl<V, E> InflightGuard<'_, V, E> {
    fn publish(&self, outcome: Result<Arc<V>, E>) {
        self.sender.send_replace(Some(outcome));
    }
}

impl<V, E> Drop for InflightGuard<'_, V, E> {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.fingerprint);
    }
}

enum Role<'a, V, E> {
    Cached(Arc<V>),
    Lead(InflightGuard<'a, V, E>),
    Wait(watch::Receiver<Outcome<V, E>>),
}

impl<V, E> QueryCache<V, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    ///
    /// `name` only appears in log lines.
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the payload for `fingerprint` if a fresh entry exists.
    ///
    /// Expired entries are treated as absent.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<V>> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| Arc::clone(&entry.payload))
    }

    /// Returns the cached payload for `fingerprint`, computing and storing
    /// it with `compute` on a miss.
    ///
    /// At most one `compute` runs per fingerprint at any time. Concurrent
    /// callers for the same fingerprint wait for it and receive its
    /// outcome, error included. If the computing caller is dropped before
    /// finishing, one of the waiters takes over.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the computation this call ran or
    /// waited on. Nothing is cached in that case, so the next call starts
    /// a new computation.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        loop {
            match self.role(fingerprint) {
                Role::Cached(payload) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[{}] cache hit for {fingerprint}", self.name);
                    return Ok(payload);
                }
                Role::Wait(mut receiver) => {
                    let outcome = receiver
                        .wait_for(Option::is_some)
                        .await
                        .map(|outcome| outcome.clone());
                    match outcome {
                        Ok(Some(Ok(payload))) => {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            log::debug!("[{}] coalesced hit for {fingerprint}", self.name);
                            return Ok(payload);
                        }
                        Ok(Some(Err(e))) => {
                            log::debug!("[{}] coalesced failure for {fingerprint}", self.name);
                            return Err(e);
                        }
                        Ok(None) | Err(_) => {
                            log::debug!(
                                "[{}] computation for {fingerprint} was abandoned",
                                self.name
                            );
                        }
                    }
                }
                Role::Lead(guard) => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[{}] cache miss for {fingerprint}", self.name);

                    let outcome = compute().await.map(Arc::new);
                    if let Ok(payload) = &outcome {
                        self.insert(fingerprint.clone(), Arc::clone(payload), ttl);
                    }
                    guard.publish(outcome.clone());
                    return outcome;
                }
            }
        }
    }

    /// Stores `payload` under `fingerprint`, replacing any previous entry.
    pub fn insert(&self, fingerprint: Fingerprint, payload: Arc<V>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        entries.retain(|_, entry| entry.is_fresh(now));

        while entries.len() >= self.capacity && !entries.contains_key(&fingerprint) {
            let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::debug!("[{}] evicted {victim}", self.name);
        }

        entries.insert(
            fingerprint,
            CacheEntry {
                payload,
                created_at: now,
                ttl,
            },
        );
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }

    /// Decides whether the caller reads the cache, runs the computation or
    /// waits for the one in flight.
    fn role<'a>(&'a self, fingerprint: &'a Fingerprint) -> Role<'a, V, E> {
        if let Some(payload) = self.get(fingerprint) {
            return Role::Cached(payload);
        }

        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // The computing caller stores its payload before releasing the slot.
        if let Some(payload) = self.get(fingerprint) {
            return Role::Cached(payload);
        }
        if let Some(receiver) = inflight.get(fingerprint) {
            return Role::Wait(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        inflight.insert(fingerprint.clone(), receiver);
        Role::Lead(InflightGuard {
            fingerprint,
            inflight: &self.inflight,
            sender,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn key(name: &str) -> Fingerprint {
        Fingerprint::builder("test").field("k", name).finish()
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn computes_once_within_ttl_and_again_after() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(7)
        };

        assert_eq!(*cache.get_or_compute(&key("a"), TTL, compute).await.unwrap(), 7);
        assert_eq!(*cache.get_or_compute(&key("a"), TTL, compute).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(TTL).await;

        assert_eq!(*cache.get_or_compute(&key("a"), TTL, compute).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_absent() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        cache.insert(key("a"), Arc::new(1), Duration::from_secs(5));
        assert!(cache.get(&key("a")).is_some());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get(&key("a")).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key("a")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_requests_compute_once() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let calls = AtomicUsize::new(0);
        let fingerprint = key("shared");

        let cache_ref = &cache;
        let fingerprint_ref = &fingerprint;
        let counter = &calls;
        let requests = (0..16).map(move |_| {
            cache_ref.get_or_compute(fingerprint_ref, TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(42)
            })
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok(&42)));
        assert!(cache.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_fingerprints_run_in_parallel() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let cache_ref = &cache;
        let running_ref = &running;
        let peak_ref = &peak;
        let requests = (0..4u32).map(move |i| async move {
            cache_ref
                .get_or_compute(&key(&i.to_string()), TTL, move || async move {
                    let now = running_ref.fetch_add(1, Ordering::SeqCst) + 1;
                    peak_ref.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running_ref.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(i)
                })
                .await
        });
        futures::future::join_all(requests).await;

        assert_eq!(peak.load(Ordering::SeqCst), 4);
        assert_eq!(cache.stats().entries, 4);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let failed = cache
            .get_or_compute(&key("a"), TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>("storage hiccup".to_string())
            })
            .await;
        assert_eq!(failed.unwrap_err(), "storage hiccup");
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.stats().entries, 0);

        let retried = cache
            .get_or_compute(&key("a"), TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(3)
            })
            .await;
        assert_eq!(*retried.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest_first() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 2);
        cache.insert(key("a"), Arc::new(1), TTL);
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert(key("b"), Arc::new(2), TTL);
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert(key("c"), Arc::new(3), TTL);

        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("b")).is_some());
        assert!(cache.get(&key("c")).is_some());
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn replacing_an_entry_does_not_evict() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 1);
        cache.insert(key("a"), Arc::new(1), TTL);
        cache.insert(key("a"), Arc::new(2), TTL);
        assert_eq!(cache.get(&key("a")).as_deref(), Some(&2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test]
    async fn cancelled_computation_releases_slot() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let fingerprint = key("a");
        let pending = cache.get_or_compute(&fingerprint, TTL, || async {
            std::future::pending::<()>().await;
            Ok::<u32, String>(1)
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(cache.inflight.lock().unwrap().is_empty());

        let value = cache
            .get_or_compute(&fingerprint, TTL, || async { Ok::<_, String>(5) })
            .await
            .unwrap();
        assert_eq!(*value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_a_failure() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let calls = AtomicUsize::new(0);
        let fingerprint = key("outage");
        let started = Instant::now();

        let cache_ref = &cache;
        let fingerprint_ref = &fingerprint;
        let counter = &calls;
        let requests = (0..8).map(move |_| {
            cache_ref.get_or_compute(fingerprint_ref, TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err::<u32, _>("storage unreachable".to_string())
            })
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 8);
        assert!(
            results
                .iter()
                .all(|r| r.as_ref().err().map(String::as_str) == Some("storage unreachable"))
        );
        assert!(started.elapsed() < Duration::from_secs(31));
        assert_eq!(cache.stats().entries, 0);
        assert!(cache.inflight.lock().unwrap().is_empty());

        let retried = cache
            .get_or_compute(&fingerprint, TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(9)
            })
            .await;
        assert_eq!(*retried.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_takes_over_an_abandoned_computation() {
        let cache: QueryCache<u32, String> = QueryCache::new("test", 8);
        let fingerprint = key("a");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_compute(&fingerprint, TTL, || async {
                std::future::pending::<()>().await;
                Ok::<u32, String>(1)
            }),
        );
        let waiter = async {
            // Let the first caller claim the slot.
            tokio::task::yield_now().await;
            cache
                .get_or_compute(&fingerprint, TTL, || async { Ok::<u32, String>(5) })
                .await
        };
        let (abandoned, waited) = tokio::join!(abandoned, waiter);

        assert!(abandoned.is_err());
        assert_eq!(*waited.unwrap(), 5);
        assert_eq!(cache.get(&fingerprint).as_deref(), Some(&5));
    }
}
