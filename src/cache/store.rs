//! Shared in-memory cache of query results.
//!
//! The store is the only shared mutable resource in the program. Every
//! operation is synchronous and atomic; the inner lock is never held across
//! an await point, so interleaved async continuations always observe a
//! consistent snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::api::types::{ListResult, StockMove};

use super::key::{CacheKey, KeyPrefix};

/// Value stored under a cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
  Move(StockMove),
  Page(ListResult),
}

impl CacheValue {
  pub fn as_move(&self) -> Option<&StockMove> {
    match self {
      CacheValue::Move(m) => Some(m),
      _ => None,
    }
  }

  pub fn as_page(&self) -> Option<&ListResult> {
    match self {
      CacheValue::Page(p) => Some(p),
      _ => None,
    }
  }
}

impl From<StockMove> for CacheValue {
  fn from(m: StockMove) -> Self {
    CacheValue::Move(m)
  }
}

impl From<ListResult> for CacheValue {
  fn from(p: ListResult) -> Self {
    CacheValue::Page(p)
  }
}

/// Types that can live in the cache.
pub trait Cacheable: Clone + Send + 'static {
  fn into_value(self) -> CacheValue;
  fn from_value(value: CacheValue) -> Option<Self>;
}

impl Cacheable for StockMove {
  fn into_value(self) -> CacheValue {
    CacheValue::Move(self)
  }

  fn from_value(value: CacheValue) -> Option<Self> {
    match value {
      CacheValue::Move(m) => Some(m),
      _ => None,
    }
  }
}

impl Cacheable for ListResult {
  fn into_value(self) -> CacheValue {
    CacheValue::Page(self)
  }

  fn from_value(value: CacheValue) -> Option<Self> {
    match value {
      CacheValue::Page(p) => Some(p),
      _ => None,
    }
  }
}

/// Status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
  /// Served as-is.
  Fresh,
  /// Marked for refetch on the next read; the value is still served
  /// meanwhile.
  Stale,
  /// A revalidating fetch is pending for this key.
  InFlight,
}

#[derive(Debug, Clone)]
struct Entry {
  value: CacheValue,
  status: EntryStatus,
}

/// Identifies one fetch attempt for a key.
///
/// Completion is honored only while the ticket's epoch is still current for
/// its key. `cancel_in_flight` and newer fetches bump the epoch, which turns
/// a late completion into a no-op: it must not overwrite anything written
/// after the cancellation.
#[derive(Debug, Clone)]
pub struct FetchTicket {
  key: CacheKey,
  epoch: u64,
}

#[derive(Default)]
struct Inner {
  entries: HashMap<CacheKey, Entry>,
  /// Current fetch epoch per key. Missing means zero.
  epochs: HashMap<CacheKey, u64>,
}

/// Handle to the shared cache. Cloning is cheap and all clones see the same
/// entries.
#[derive(Clone, Default)]
pub struct MemoryCache {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // A poisoned lock only means some thread panicked mid-read; the map
    // itself is still coherent because every write is a single insert.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
    self.lock().entries.get(key).map(|e| e.value.clone())
  }

  /// Unconditional overwrite; the entry is marked fresh.
  pub fn set(&self, key: CacheKey, value: impl Into<CacheValue>) {
    self.lock().entries.insert(
      key,
      Entry {
        value: value.into(),
        status: EntryStatus::Fresh,
      },
    );
  }

  pub fn status(&self, key: &CacheKey) -> Option<EntryStatus> {
    self.lock().entries.get(key).map(|e| e.status)
  }

  pub fn is_stale(&self, key: &CacheKey) -> bool {
    self.status(key) == Some(EntryStatus::Stale)
  }

  /// All entries whose key matches the prefix, cloned out.
  pub fn find_by_prefix(&self, prefix: KeyPrefix) -> Vec<(CacheKey, CacheValue)> {
    self
      .lock()
      .entries
      .iter()
      .filter(|(key, _)| key.matches(prefix))
      .map(|(key, entry)| (key.clone(), entry.value.clone()))
      .collect()
  }

  pub fn keys_by_prefix(&self, prefix: KeyPrefix) -> Vec<CacheKey> {
    self
      .lock()
      .entries
      .keys()
      .filter(|key| key.matches(prefix))
      .cloned()
      .collect()
  }

  /// Mark an entry stale. No-op for absent keys. A query subscribed to the
  /// key picks this up on its next poll and starts a background refetch.
  pub fn invalidate(&self, key: &CacheKey) {
    let mut inner = self.lock();
    if let Some(entry) = inner.entries.get_mut(key) {
      entry.status = EntryStatus::Stale;
      trace!(key = %key.describe(), "cache entry invalidated");
    }
  }

  /// Abort any pending fetch for this key: its eventual completion becomes a
  /// no-op. Other keys are unaffected.
  pub fn cancel_in_flight(&self, key: &CacheKey) {
    let mut inner = self.lock();
    *inner.epochs.entry(key.clone()).or_insert(0) += 1;
    if let Some(entry) = inner.entries.get_mut(key) {
      if entry.status == EntryStatus::InFlight {
        entry.status = EntryStatus::Stale;
      }
    }
    trace!(key = %key.describe(), "in-flight fetch cancelled");
  }

  /// Register a fetch for this key and get the ticket its completion must
  /// present. Any earlier pending fetch for the key is superseded.
  pub fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
    let mut inner = self.lock();
    let epoch = inner.epochs.entry(key.clone()).or_insert(0);
    *epoch += 1;
    let epoch = *epoch;
    if let Some(entry) = inner.entries.get_mut(key) {
      entry.status = EntryStatus::InFlight;
    }
    FetchTicket {
      key: key.clone(),
      epoch,
    }
  }

  /// Store a fetched value, unless the ticket was superseded in the
  /// meantime. Returns the winning value for the key: the stored one, or
  /// whatever the cache holds after a cancellation (e.g. an optimistic
  /// write).
  pub fn complete_fetch(
    &self,
    ticket: &FetchTicket,
    value: impl Into<CacheValue>,
  ) -> Option<CacheValue> {
    let mut inner = self.lock();
    let current = inner.epochs.get(&ticket.key).copied().unwrap_or(0);
    if current == ticket.epoch {
      let value = value.into();
      inner.entries.insert(
        ticket.key.clone(),
        Entry {
          value: value.clone(),
          status: EntryStatus::Fresh,
        },
      );
      Some(value)
    } else {
      trace!(key = %ticket.key.describe(), "stale fetch completion dropped");
      inner.entries.get(&ticket.key).map(|e| e.value.clone())
    }
  }

  /// Record a failed fetch: the entry (if any) goes back to stale so a later
  /// poll retries, unless the ticket was superseded.
  pub fn fail_fetch(&self, ticket: &FetchTicket) {
    let mut inner = self.lock();
    let current = inner.epochs.get(&ticket.key).copied().unwrap_or(0);
    if current != ticket.epoch {
      return;
    }
    if let Some(entry) = inner.entries.get_mut(&ticket.key) {
      if entry.status == EntryStatus::InFlight {
        entry.status = EntryStatus::Stale;
      }
    }
  }
}
