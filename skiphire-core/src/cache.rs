//! In-memory query cache with deduplicated fetches, retries, and
//! stale-while-revalidate reads.
//!
//! Every fetch runs on its own Tokio task so it completes even when the caller
//! that started it goes away. Callers that ask for the same key while a fetch
//! is running attach to it instead of issuing a second request. Each fetch is
//! stamped with a generation; a result is only stored when its generation is
//! still the entry's current one, so a slow superseded response can never
//! overwrite newer data.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::ports::GatewayError;

/// Source of the current time used to age cache entries.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
/// Clock backed by [`Instant::now`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
/// Clock that only moves when [`ManualClock::advance`] is called.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Exponential backoff applied to transient fetch failures.
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): `min(base * 2^retry, max)`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        2_u32
            .checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Tuning knobs for a [`QueryCache`].
pub struct CacheConfig {
    /// Retry behaviour for failed fetches.
    pub retry: RetryPolicy,
    /// Entries untouched for longer than this are evicted.
    pub retention: Duration,
    /// Minimum time between two automatic eviction sweeps.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            retention: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a value handed out by the cache relates to its staleness window.
pub enum CacheState {
    /// Value is younger than the staleness threshold or was just fetched.
    Fresh,
    /// Value is stale; a background refetch is running.
    StaleRevalidating,
}

#[derive(Debug, Clone, PartialEq)]
/// Value returned from a cache read.
pub struct Cached<V> {
    /// The cached or freshly fetched value.
    pub value: V,
    /// Freshness of [`Self::value`].
    pub state: CacheState,
}

#[derive(Debug, Clone, PartialEq)]
/// Snapshot of an entry's bookkeeping.
pub struct EntryStatus {
    /// When the current value was stored, if there is one.
    pub fetched_at: Option<Instant>,
    /// A fetch for this key is in flight.
    pub is_fetching: bool,
    /// Error of the last fetch if it failed after all retries.
    pub error: Option<GatewayError>,
    /// Consecutive fetches that failed after all retries.
    pub failure_count: u32,
}

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, GatewayError>>>;

struct Entry<V> {
    value: Option<V>,
    fetched_at: Option<Instant>,
    touched_at: Instant,
    generation: u64,
    in_flight: Option<SharedFetch<V>>,
    error: Option<GatewayError>,
    failure_count: u32,
}

impl<V> Entry<V> {
    fn new(now: Instant) -> Self {
        Self {
            value: None,
            fetched_at: None,
            touched_at: now,
            generation: 0,
            in_flight: None,
            error: None,
            failure_count: 0,
        }
    }

    fn is_fresh(&self, now: Instant, stale: Duration) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| now.saturating_duration_since(fetched_at) < stale)
    }

    fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        self.in_flight.is_none() && now.saturating_duration_since(self.touched_at) > retention
    }
}

struct Store<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_generation: u64,
    last_sweep: Instant,
}

impl<K: Eq + Hash, V> Store<K, V> {
    fn issue_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn sweep(&mut self, now: Instant, retention: Duration) {
        let before = self.entries.len();
        self.entries
            .retain(|_key, entry| !entry.is_expired(now, retention));
        self.last_sweep = now;
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted idle cache entries");
        }
    }
}

/// Callback run with every value a fetch stores.
type StoreHook<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

struct Inner<K, V> {
    store: Mutex<Store<K, V>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    on_store: Option<StoreHook<K, V>>,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    /// Lock the store; no holder leaves it half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Store<K, V>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a finished fetch unless it was superseded in the meantime.
    fn complete(&self, key: &K, generation: u64, result: &Result<V, GatewayError>) {
        let now = self.clock.now();
        let mut store = self.lock();
        let Some(entry) = store.entries.get_mut(key) else {
            debug!(?key, generation, "entry was removed, dropping response");
            return;
        };
        if entry.generation != generation {
            debug!(
                ?key,
                generation,
                current = entry.generation,
                "dropping superseded response"
            );
            return;
        }

        entry.in_flight = None;
        entry.touched_at = now;
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.fetched_at = Some(now);
                entry.error = None;
                entry.failure_count = 0;
            }
            Err(err) => {
                warn!(?key, error = %err, "fetch failed after retries");
                entry.error = Some(err.clone());
                entry.failure_count += 1;
            }
        }
        drop(store);

        // Runs outside the lock so the hook may use other caches freely.
        if let (Ok(value), Some(hook)) = (result, &self.on_store) {
            hook(key, value);
        }
    }
}

enum Lookup<V> {
    Fresh(V),
    Stale(V),
    Attach(SharedFetch<V>),
    Start,
}

/// Cache of fetched values keyed by `K`.
///
/// Cloning is cheap and yields a handle to the same cache. Fetching methods
/// spawn Tokio tasks and must be called from within a Tokio runtime.
pub struct QueryCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache driven by the system clock.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache driven by the given clock.
    #[must_use]
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None)
    }

    /// Create a cache that calls `on_store` once for every value a fetch stores.
    ///
    /// Cache hits and [`Self::set_entry`] do not run the hook, neither do
    /// responses dropped as superseded.
    #[must_use]
    pub fn with_store_hook<H>(config: CacheConfig, clock: Arc<dyn Clock>, on_store: H) -> Self
    where
        H: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::build(config, clock, Some(Box::new(on_store)))
    }

    fn build(config: CacheConfig, clock: Arc<dyn Clock>, on_store: Option<StoreHook<K, V>>) -> Self {
        let now = clock.now();
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(Store {
                    entries: HashMap::new(),
                    next_generation: 0,
                    last_sweep: now,
                }),
                clock,
                config,
                on_store,
            }),
        }
    }

    /// Return the cached value for `key`, fetching it when missing.
    ///
    /// A value younger than `stale` is returned as [`CacheState::Fresh`]. An
    /// older one is returned as [`CacheState::StaleRevalidating`] while a
    /// background refetch runs. Without a value the call waits for the fetch,
    /// sharing it with any concurrent caller for the same key.
    ///
    /// # Errors
    ///
    /// Returns the last [`GatewayError`] once all retries are exhausted.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: K,
        fetch: F,
        stale: Duration,
    ) -> Result<Cached<V>, GatewayError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let pending = {
            let now = self.inner.clock.now();
            let mut store = self.inner.lock();
            self.prune(&mut store, &key, now);

            let entry = store
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.touched_at = now;

            let lookup = match (&entry.value, &entry.in_flight) {
                (Some(value), _) if entry.is_fresh(now, stale) => Lookup::Fresh(value.clone()),
                (Some(value), _) => Lookup::Stale(value.clone()),
                (None, Some(in_flight)) => Lookup::Attach(in_flight.clone()),
                (None, None) => Lookup::Start,
            };

            match lookup {
                Lookup::Fresh(value) => {
                    debug!(?key, "serving fresh entry");
                    return Ok(Cached {
                        value,
                        state: CacheState::Fresh,
                    });
                }
                Lookup::Stale(value) => {
                    if entry.in_flight.is_none() {
                        debug!(?key, "serving stale entry, revalidating");
                        drop(self.start_fetch(&mut store, key, fetch, now));
                    }
                    return Ok(Cached {
                        value,
                        state: CacheState::StaleRevalidating,
                    });
                }
                Lookup::Attach(in_flight) => {
                    debug!(?key, "attaching to in-flight fetch");
                    in_flight
                }
                Lookup::Start => {
                    debug!(?key, "cache miss, fetching");
                    self.start_fetch(&mut store, key, fetch, now)
                }
            }
        };

        pending.await.map(|value| Cached {
            value,
            state: CacheState::Fresh,
        })
    }

    /// Populate `key` in the background unless it is fresh or already being fetched.
    ///
    /// Failures are logged and recorded on the entry, never returned.
    pub fn prefetch<F, Fut>(&self, key: K, fetch: F, stale: Duration)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let now = self.inner.clock.now();
        let mut store = self.inner.lock();
        self.prune(&mut store, &key, now);

        let entry = store
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now));
        entry.touched_at = now;
        if entry.in_flight.is_some() || entry.is_fresh(now, stale) {
            return;
        }

        debug!(?key, "prefetching");
        // The fetch task stores its own result.
        drop(self.start_fetch(&mut store, key, fetch, now));
    }

    /// Fetch `key` again regardless of freshness, superseding any running fetch.
    ///
    /// # Errors
    ///
    /// Returns the last [`GatewayError`] once all retries are exhausted.
    pub async fn refetch<F, Fut>(&self, key: K, fetch: F) -> Result<Cached<V>, GatewayError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let pending = {
            let now = self.inner.clock.now();
            let mut store = self.inner.lock();
            debug!(?key, "manual refetch");
            self.start_fetch(&mut store, key, fetch, now)
        };
        pending.await.map(|value| Cached {
            value,
            state: CacheState::Fresh,
        })
    }

    /// Store `value` as a fresh entry, superseding any running fetch for `key`.
    pub fn set_entry(&self, key: K, value: V) {
        let now = self.inner.clock.now();
        let mut store = self.inner.lock();
        let generation = store.issue_generation();
        let entry = store.entries.entry(key).or_insert_with(|| Entry::new(now));
        entry.value = Some(value);
        entry.fetched_at = Some(now);
        entry.touched_at = now;
        entry.generation = generation;
        entry.in_flight = None;
        entry.error = None;
        entry.failure_count = 0;
    }

    /// Remove `key`; a response still in flight for it is discarded.
    pub fn invalidate(&self, key: &K) {
        if self.inner.lock().entries.remove(key).is_some() {
            debug!(?key, "invalidated entry");
        }
    }

    /// Keep the value for `key` but ignore the response of any running fetch.
    ///
    /// Used when nothing observes the key anymore.
    pub fn detach(&self, key: &K) {
        let mut store = self.inner.lock();
        let generation = store.issue_generation();
        if let Some(entry) = store.entries.get_mut(key)
            && entry.in_flight.take().is_some()
        {
            entry.generation = generation;
            debug!(?key, "detached from in-flight fetch");
        }
    }

    /// Current value for `key`, fresh or stale, without fetching.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.inner.clock.now();
        let mut store = self.inner.lock();
        self.prune(&mut store, key, now);
        let entry = store.entries.get_mut(key)?;
        entry.touched_at = now;
        entry.value.clone()
    }

    /// Bookkeeping for `key`, if the cache knows it.
    #[must_use]
    pub fn status(&self, key: &K) -> Option<EntryStatus> {
        let store = self.inner.lock();
        store.entries.get(key).map(|entry| EntryStatus {
            fetched_at: entry.fetched_at,
            is_fetching: entry.in_flight.is_some(),
            error: entry.error.clone(),
            failure_count: entry.failure_count,
        })
    }

    /// Evict every entry that has been idle longer than the retention horizon.
    pub fn sweep(&self) {
        let now = self.inner.clock.now();
        self.inner
            .lock()
            .sweep(now, self.inner.config.retention);
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy eviction: drop `key` if it expired and run a full sweep when one is due.
    fn prune(&self, store: &mut Store<K, V>, key: &K, now: Instant) {
        let retention = self.inner.config.retention;
        if store
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now, retention))
        {
            debug!(?key, "entry expired");
            store.entries.remove(key);
        }
        if now.saturating_duration_since(store.last_sweep) >= self.inner.config.sweep_interval {
            store.sweep(now, retention);
        }
    }

    fn start_fetch<F, Fut>(
        &self,
        store: &mut Store<K, V>,
        key: K,
        fetch: F,
        now: Instant,
    ) -> SharedFetch<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let generation = store.issue_generation();
        let retry = self.inner.config.retry;
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let result = fetch_with_retry(&fetch, retry, &task_key).await;
            inner.complete(&task_key, generation, &result);
            result
        });

        let shared = async move {
            handle.await.unwrap_or_else(|err| {
                Err(GatewayError::Internal(format!("fetch task failed: {err}")))
            })
        }
        .boxed()
        .shared();

        let entry = store.entries.entry(key).or_insert_with(|| Entry::new(now));
        entry.generation = generation;
        entry.in_flight = Some(shared.clone());
        shared
    }
}

async fn fetch_with_retry<K, V, F, Fut>(
    fetch: &F,
    retry: RetryPolicy,
    key: &K,
) -> Result<V, GatewayError>
where
    K: Debug,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, GatewayError>>,
{
    let mut retries = 0;
    loop {
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(err) if retries < retry.max_retries && err.is_transient() => {
                let delay = retry.delay_for(retries);
                debug!(?key, retries, ?delay, error = %err, "fetch failed, backing off");
                retries += 1;
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
