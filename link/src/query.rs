//! Query/cache layer.
//!
//! [`QueryClient`] sits between callers and the API client. It caches fetched
//! data per [`QueryKey`], collapses concurrent fetches of the same key into one
//! call, and retries transient failures with exponential backoff. Mutations
//! run once and invalidate the keys they affect.
//!
//! Each fetch runs as a spawned task, so its status settles even when every
//! caller waiting on it has been dropped.

mod key;
mod retry;

pub use key::QueryKey;
pub use retry::RetryPolicy;

use crate::error::{ErrorKind, Result, TryoutLinkError};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue>>>;

/// Cache and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_retry_delay: Duration,
    /// How long fetched data is served without refetching. Zero means every
    /// fetch goes to the network (concurrent fetches are still shared).
    pub stale_time: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            stale_time: Duration::ZERO,
        }
    }
}

impl QueryOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay, self.max_retry_delay)
    }
}

/// State of a query as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// Never fetched, or removed.
    #[default]
    Idle,
    Loading,
    Success,
    Error(ErrorKind),
}

impl QueryStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

struct CachedValue {
    value: AnyValue,
    updated_at: Instant,
}

struct InFlight {
    generation: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct QueryEntry {
    data: Option<CachedValue>,
    status: QueryStatus,
    invalidated: bool,
    in_flight: Option<InFlight>,
}

impl QueryEntry {
    fn fresh_value(&self, stale_time: Duration) -> Option<AnyValue> {
        if self.invalidated {
            return None;
        }
        self.data
            .as_ref()
            .filter(|data| data.updated_at.elapsed() < stale_time)
            .map(|data| data.value.clone())
    }
}

struct QueryInner {
    options: QueryOptions,
    entries: Mutex<HashMap<QueryKey, QueryEntry>>,
    next_generation: AtomicU64,
}

impl QueryInner {
    /// Record the outcome of fetch `generation`. Outcomes of fetches that were
    /// invalidated or superseded while running are dropped.
    fn settle(&self, key: &QueryKey, generation: u64, result: &Result<AnyValue>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if !entry.in_flight.as_ref().is_some_and(|f| f.generation == generation) {
            debug!("[QUERY] Discarding superseded result for {}", key);
            return;
        }

        entry.in_flight = None;
        match result {
            Ok(value) => {
                entry.data = Some(CachedValue {
                    value: value.clone(),
                    updated_at: Instant::now(),
                });
                entry.status = QueryStatus::Success;
                entry.invalidated = false;
            },
            Err(err) => {
                entry.status = QueryStatus::Error(err.kind());
            },
        }
    }
}

async fn run_fetch<T, F, Fut>(
    inner: Weak<QueryInner>,
    key: QueryKey,
    generation: u64,
    policy: RetryPolicy,
    fetcher: F,
) -> Result<AnyValue>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let start = Instant::now();
    let mut attempt = 0;

    let result = loop {
        match fetcher().await {
            Ok(value) => {
                debug!(
                    "[QUERY] {} fetched (attempts={}) duration_ms={}",
                    key,
                    attempt + 1,
                    start.elapsed().as_millis()
                );
                break Ok(Arc::new(value) as AnyValue);
            },
            Err(err) if policy.should_retry(attempt, &err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "[QUERY] {} failed (attempt {}/{}): {}; retrying in {}ms",
                    key,
                    attempt + 1,
                    policy.max_retries + 1,
                    err,
                    delay.as_millis()
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            },
            Err(err) => {
                warn!(
                    "[QUERY] {} failed: {} kind={:?} total_ms={}",
                    key,
                    err,
                    err.kind(),
                    start.elapsed().as_millis()
                );
                break Err(err);
            },
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.settle(&key, generation, &result);
    }
    result
}

/// Keyed query cache with request de-duplication and retry.
///
/// Clones share the cache.
///
/// ```rust,no_run
/// use tryout_link::{QueryClient, QueryKey, TryoutLinkClient};
///
/// # async fn example(api: TryoutLinkClient) -> tryout_link::Result<()> {
/// let queries = QueryClient::default();
/// let exams = queries
///     .fetch(QueryKey::from("exams"), {
///         let api = api.clone();
///         move || {
///             let api = api.clone();
///             async move { api.get::<Vec<serde_json::Value>>("/exams").await }
///         }
///     })
///     .await?;
/// println!("{} exams", exams.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryInner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryOptions::default())
    }
}

impl QueryClient {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            inner: Arc::new(QueryInner {
                options,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.inner.options
    }

    /// Fetch data for `key`.
    ///
    /// Fresh cached data is returned without calling `fetcher`. A fetch that
    /// is already running for `key` is joined. Otherwise `fetcher` is called,
    /// and called again after a backoff delay for transient failures.
    pub async fn fetch<T, F, Fut>(&self, key: impl Into<QueryKey>, fetcher: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = key.into();
        let future = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key.clone()).or_default();

            if let Some(value) = entry.fresh_value(self.inner.options.stale_time) {
                match value.downcast::<T>() {
                    Ok(value) => {
                        debug!("[QUERY] {} served from cache", key);
                        return Ok(value);
                    },
                    Err(_) => warn!("[QUERY] {} cached with a different type, refetching", key),
                }
            }

            match &entry.in_flight {
                Some(in_flight) => {
                    debug!("[QUERY] Joining in-flight fetch for {}", key);
                    in_flight.future.clone()
                },
                None => {
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let task = tokio::spawn(run_fetch(
                        Arc::downgrade(&self.inner),
                        key.clone(),
                        generation,
                        self.inner.options.retry_policy(),
                        fetcher,
                    ));
                    let inner = Arc::downgrade(&self.inner);
                    let task_key = key.clone();
                    let future = async move {
                        task.await.unwrap_or_else(|e| {
                            error!("[QUERY] Fetch task for {} did not complete: {}", task_key, e);
                            let result = Err(TryoutLinkError::Cancelled);
                            if let Some(inner) = inner.upgrade() {
                                inner.settle(&task_key, generation, &result);
                            }
                            result
                        })
                    }
                    .boxed()
                    .shared();
                    entry.in_flight = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    entry.status = QueryStatus::Loading;
                    future
                },
            }
        };

        let value = future.await?;
        value.downcast::<T>().map_err(|_| {
            TryoutLinkError::SerializationError(format!(
                "Query {} resolved to a different type",
                key
            ))
        })
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// Cached data for `key`, fresh or not.
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.inner.entries.lock();
        let value = entries.get(key)?.data.as_ref()?.value.clone();
        value.downcast::<T>().ok()
    }

    /// Seed or overwrite cached data, e.g. after a mutation returned the
    /// updated object. A fetch running for `key` no longer writes its result.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: impl Into<QueryKey>, value: T) {
        let key = key.into();
        let mut entries = self.inner.entries.lock();
        let entry = entries.entry(key).or_default();
        entry.data = Some(CachedValue {
            value: Arc::new(value),
            updated_at: Instant::now(),
        });
        entry.status = QueryStatus::Success;
        entry.invalidated = false;
        entry.in_flight = None;
    }

    /// Mark every query under `prefix` stale. Their next fetch goes to the
    /// network. Returns how many queries matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.inner.entries.lock();
        let mut matched = 0;
        for (_, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            entry.invalidated = true;
            entry.in_flight = None;
            matched += 1;
        }
        debug!("[QUERY] Invalidated {} queries under {}", matched, prefix);
        matched
    }

    /// Drop the cache entry for `key`. Its status goes back to `Idle`.
    pub fn remove(&self, key: &QueryKey) {
        self.inner.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    /// Run a mutation once, without retry. On success every prefix in
    /// `invalidates` is invalidated.
    pub async fn mutate<T, Fut>(&self, mutation: Fut, invalidates: &[QueryKey]) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let result = mutation.await;
        match &result {
            Ok(_) => {
                for prefix in invalidates {
                    self.invalidate(prefix);
                }
            },
            Err(err) => debug!("[QUERY] Mutation failed: {} kind={:?}", err, err.kind()),
        }
        result
    }
}
