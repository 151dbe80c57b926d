//! Poll-based query handles over the shared cache.
//!
//! Inspired by TanStack Query, a `Query<T>` encapsulates async data
//! fetching, loading states, and error handling for one cache key. A live
//! query counts as a subscription to its key: when mutation settlement marks
//! the entry stale, the next `poll()` starts a background refetch, which is
//! how reconciled server truth reaches the views.
//!
//! # Example
//!
//! ```ignore
//! let mut query = client.list_query(params);
//!
//! // Start fetching (a fresh cache entry resolves without the network)
//! query.fetch();
//!
//! // In the driving loop
//! if query.poll() {
//!     // State changed, re-render
//! }
//!
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::cache::{CacheKey, Cacheable, FetchTicket, MemoryCache};
use crate::error::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is fetching and has no data to show yet
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a `Result<T, ApiError>`
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Cache-backed async query with view-facing state.
///
/// Completions are routed through the cache's fetch tickets: a fetch that
/// was cancelled (for example by an optimistic write) surfaces the cache's
/// winning value instead of its own stale response.
pub struct Query<T> {
  key: CacheKey,
  cache: MemoryCache,
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
  ticket: Option<FetchTicket>,
}

impl<T: Cacheable> Query<T> {
  /// Create a new query for `key`, fetching through `fetcher` on miss.
  pub fn new<F, Fut>(key: CacheKey, cache: MemoryCache, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      key,
      cache,
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      ticket: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// True while a fetch is pending, including background revalidation.
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start fetching unless a fetch is already pending.
  ///
  /// A fresh cache entry resolves synchronously without touching the
  /// network.
  pub fn fetch(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    if !self.cache.is_stale(&self.key) {
      if let Some(data) = self.cache.get(&self.key).and_then(T::from_value) {
        self.state = QueryState::Success(data);
        return;
      }
    }
    self.start_fetch();
  }

  /// Force a refetch. Any pending fetch is superseded: its completion is
  /// already epoch-dead in the cache, and its receiver is dropped here.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.ticket = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch and pick up staleness.
  ///
  /// Returns `true` if the view-facing state changed. Call this in the
  /// driving loop.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    if let Some(receiver) = &mut self.receiver {
      match receiver.try_recv() {
        Ok(Ok(data)) => {
          self.receiver = None;
          changed = true;
          let winning = match self.ticket.take() {
            Some(ticket) => self
              .cache
              .complete_fetch(&ticket, data.clone().into_value())
              .and_then(T::from_value),
            None => Some(data),
          };
          match winning {
            Some(value) => self.state = QueryState::Success(value),
            None => {
              // Superseded and the key holds nothing to serve instead; this
              // response predates the cancellation, so fetch the current
              // value rather than surface it.
              self.state = QueryState::Loading;
              self.start_fetch();
            }
          }
        }
        Ok(Err(error)) => {
          if let Some(ticket) = self.ticket.take() {
            self.cache.fail_fetch(&ticket);
          }
          self.state = QueryState::Error(error.to_string());
          self.receiver = None;
          changed = true;
        }
        Err(mpsc::error::TryRecvError::Empty) => {}
        Err(mpsc::error::TryRecvError::Disconnected) => {
          // Sender dropped without sending - treat as error
          if let Some(ticket) = self.ticket.take() {
            self.cache.fail_fetch(&ticket);
          }
          self.state = QueryState::Error("Query was cancelled".to_string());
          self.receiver = None;
          changed = true;
        }
      }
    }

    // Settlement invalidation reaches subscribed views here: a stale entry
    // with no pending fetch starts a background refetch. A failed query
    // stays put until an explicit refetch, so errors cannot loop.
    if self.receiver.is_none() && !self.state.is_error() && self.cache.is_stale(&self.key) {
      self.start_fetch();
    }

    changed
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.ticket = Some(self.cache.begin_fetch(&self.key));
    self.receiver = Some(rx);
    // Keep showing the last value during revalidation.
    if !self.state.is_success() {
      self.state = QueryState::Loading;
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .field("fetching", &self.receiver.is_some())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{MoveType, StockMove};
  use chrono::NaiveDate;
  use std::time::Duration;

  fn mv(id: &str, reference: &str) -> StockMove {
    StockMove {
      id: id.to_string(),
      date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
      product: "Bolts M6".to_string(),
      warehouse: "Central".to_string(),
      kind: MoveType::In,
      quantity: 40,
      reference: reference.to_string(),
    }
  }

  fn detail_query(
    cache: &MemoryCache,
    id: &str,
    result: Result<StockMove, ApiError>,
  ) -> Query<StockMove> {
    Query::new(CacheKey::detail(id), cache.clone(), move || {
      let result = result.clone();
      async move { result }
    })
  }

  async fn settle(query: &mut Query<StockMove>) {
    for _ in 0..50 {
      query.poll();
      if !query.is_fetching() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("query never settled");
  }

  #[tokio::test]
  async fn success_lands_in_state_and_cache() {
    let cache = MemoryCache::new();
    let mut query = detail_query(&cache, "1", Ok(mv("1", "server ref")));

    assert!(matches!(query.state(), QueryState::Idle));
    query.fetch();
    assert!(query.is_loading());

    settle(&mut query).await;
    assert_eq!(query.data().unwrap().reference, "server ref");
    assert_eq!(
      cache
        .get(&CacheKey::detail("1"))
        .unwrap()
        .as_move()
        .unwrap()
        .reference,
      "server ref"
    );
  }

  #[tokio::test]
  async fn error_is_surfaced_and_entry_left_stale() {
    let cache = MemoryCache::new();
    cache.set(CacheKey::detail("1"), mv("1", "cached"));
    cache.invalidate(&CacheKey::detail("1"));

    let mut query = detail_query(
      &cache,
      "1",
      Err(ApiError::network("connection refused")),
    );
    query.fetch();
    settle(&mut query).await;

    assert_eq!(query.error(), Some("connection refused"));
    assert!(cache.is_stale(&CacheKey::detail("1")));
  }

  #[tokio::test]
  async fn fresh_cache_entry_resolves_without_fetching() {
    let cache = MemoryCache::new();
    cache.set(CacheKey::detail("1"), mv("1", "cached"));

    // The fetcher would fail loudly if it ran.
    let mut query = detail_query(&cache, "1", Err(ApiError::network("must not run")));
    query.fetch();

    assert!(!query.is_fetching());
    assert_eq!(query.data().unwrap().reference, "cached");
  }

  #[tokio::test]
  async fn poll_picks_up_staleness_and_revalidates() {
    let cache = MemoryCache::new();
    cache.set(CacheKey::detail("1"), mv("1", "cached"));

    let mut query = detail_query(&cache, "1", Ok(mv("1", "reconciled")));
    query.fetch();
    assert_eq!(query.data().unwrap().reference, "cached");

    // Settlement elsewhere marks the entry stale.
    cache.invalidate(&CacheKey::detail("1"));
    query.poll();
    assert!(query.is_fetching());
    // The previous value keeps rendering during revalidation.
    assert_eq!(query.data().unwrap().reference, "cached");

    settle(&mut query).await;
    assert_eq!(query.data().unwrap().reference, "reconciled");
  }

  #[tokio::test]
  async fn cancelled_fetch_surfaces_the_winning_cache_value() {
    let cache = MemoryCache::new();
    let mut query = detail_query(&cache, "1", Ok(mv("1", "stale server copy")));
    query.fetch();

    // An optimistic write cancels the read and claims the key.
    cache.cancel_in_flight(&CacheKey::detail("1"));
    cache.set(CacheKey::detail("1"), mv("1", "ABC"));

    settle(&mut query).await;
    assert_eq!(query.data().unwrap().reference, "ABC");
    assert_eq!(
      cache
        .get(&CacheKey::detail("1"))
        .unwrap()
        .as_move()
        .unwrap()
        .reference,
      "ABC"
    );
  }

  #[tokio::test]
  async fn cancelled_fetch_with_nothing_cached_refetches() {
    let cache = MemoryCache::new();
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query: Query<StockMove> =
      Query::new(CacheKey::detail("1"), cache.clone(), move || {
        let n = counter_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async move { Ok(mv("1", &format!("attempt {}", n))) }
      });
    query.fetch();

    // Cancellation without a replacement value: the first response must not
    // be served, it predates the cancellation.
    cache.cancel_in_flight(&CacheKey::detail("1"));

    settle(&mut query).await;
    assert_eq!(query.data().unwrap().reference, "attempt 1");
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn refetch_supersedes_the_pending_fetch() {
    let cache = MemoryCache::new();
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query: Query<StockMove> =
      Query::new(CacheKey::detail("1"), cache.clone(), move || {
        let n = counter_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async move {
          tokio::time::sleep(Duration::from_millis(20)).await;
          Ok(mv("1", &format!("attempt {}", n)))
        }
      });

    query.fetch();
    query.refetch();
    settle(&mut query).await;

    // Only the second attempt's result is accepted.
    assert_eq!(query.data().unwrap().reference, "attempt 1");
    assert_eq!(
      cache
        .get(&CacheKey::detail("1"))
        .unwrap()
        .as_move()
        .unwrap()
        .reference,
      "attempt 1"
    );
  }
}
