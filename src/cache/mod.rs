//! Client-side cache of query results.
//!
//! This module provides the in-memory store that backs both the views and
//! the mutation coordinator:
//! - Entries keyed by structured query identity (detail id, or list paging
//!   plus filters), with prefix scans over either key space
//! - fresh / stale / in-flight status per entry
//! - Epoch-stamped fetch tickets, so a cancelled or superseded fetch
//!   completion never overwrites a later cache write

mod key;
mod store;

pub use key::{CacheKey, KeyPrefix};
pub use store::{CacheValue, Cacheable, EntryStatus, FetchTicket, MemoryCache};
