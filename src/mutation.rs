//! Optimistic mutation coordinator for reference edits.
//!
//! A reference patch is visible in the cache before the network call
//! resolves, then reconciled on settlement:
//!
//! 1. Cancel in-flight fetches for the detail key and every cached list key,
//!    so a late GET cannot clobber the optimistic write
//! 2. Snapshot the current detail and list entries (local rollback state)
//! 3. Write the optimistic value into the detail entry and into every list
//!    page containing the target id
//! 4. Issue the patch request
//! 5. On failure, restore the snapshots verbatim
//! 6. On success, surface an acknowledgment without trusting the optimistic
//!    value as final
//! 7. Either way, invalidate the detail and list keys so subscribed queries
//!    refetch server truth

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::api::client::Gateway;
use crate::api::types::{ListResult, StockMove};
use crate::cache::{CacheKey, CacheValue, KeyPrefix, MemoryCache};
use crate::error::ApiError;

/// Allowed reference length after trimming surrounding whitespace.
pub const REFERENCE_MIN: usize = 3;
pub const REFERENCE_MAX: usize = 60;

/// Validate a reference edit before any mutation work starts.
///
/// Returns the trimmed value. Rejection happens locally: no network call,
/// no cache touch.
pub fn validate_reference(input: &str) -> Result<String, ApiError> {
  let trimmed = input.trim();
  let len = trimmed.chars().count();
  if len < REFERENCE_MIN || len > REFERENCE_MAX {
    return Err(ApiError::Validation(format!(
      "Reference must be between {} and {} characters",
      REFERENCE_MIN, REFERENCE_MAX
    )));
  }
  Ok(trimmed.to_string())
}

/// Per-id mutation epochs.
///
/// Two overlapping mutations on one id are not serialized; the later one
/// supersedes the earlier. A superseded mutation skips its rollback (its
/// snapshot predates the newer optimistic write), while both settlements
/// still invalidate, so the caches converge on the server value either way.
#[derive(Clone, Default)]
pub struct Mutations {
  epochs: Arc<Mutex<HashMap<String, u64>>>,
}

impl Mutations {
  pub fn new() -> Self {
    Self::default()
  }

  fn begin(&self, id: &str) -> u64 {
    let mut epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
    let epoch = epochs.entry(id.to_string()).or_insert(0);
    *epoch += 1;
    *epoch
  }

  fn is_current(&self, id: &str, epoch: u64) -> bool {
    self
      .epochs
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .copied()
      == Some(epoch)
  }
}

/// Outcome of a successful reference patch.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
  /// The server's authoritative record.
  pub saved: StockMove,
  /// User-visible acknowledgment.
  pub notice: String,
}

/// Patch `reference` on one stock move, keeping the cache optimistically
/// up to date and reconciling on settlement.
pub async fn patch_reference<G: Gateway>(
  gateway: &G,
  cache: &MemoryCache,
  muts: &Mutations,
  id: &str,
  input: &str,
) -> Result<PatchOutcome, ApiError> {
  let reference = validate_reference(input)?;
  let epoch = muts.begin(id);
  let detail_key = CacheKey::detail(id);

  // Pre-flight: a late-arriving GET must not overwrite the optimistic
  // value, for the detail key or for any cached list page.
  cache.cancel_in_flight(&detail_key);
  for key in cache.keys_by_prefix(KeyPrefix::List) {
    cache.cancel_in_flight(&key);
  }

  // Rollback snapshot, held only for the duration of this call.
  let detail_snapshot = cache.get(&detail_key);
  let list_snapshots: Vec<(CacheKey, ListResult)> = cache
    .find_by_prefix(KeyPrefix::List)
    .into_iter()
    .filter_map(|(key, value)| match value {
      CacheValue::Page(page) => Some((key, page)),
      _ => None,
    })
    .collect();

  // Optimistic apply. Pages without the target id get no write, so they
  // carry no spurious staleness signal.
  if let Some(CacheValue::Move(current)) = &detail_snapshot {
    let mut updated = current.clone();
    updated.reference = reference.clone();
    cache.set(detail_key.clone(), updated);
  }
  for (key, page) in &list_snapshots {
    if page.items.iter().any(|m| m.id == id) {
      let mut patched = page.clone();
      for item in &mut patched.items {
        if item.id == id {
          item.reference = reference.clone();
        }
      }
      cache.set(key.clone(), patched);
    }
  }

  let result = gateway.patch_reference(id, &reference).await;

  let outcome = match result {
    Ok(saved) => {
      debug!(id, "reference patch confirmed");
      Ok(PatchOutcome {
        notice: format!("Reference for move {} saved", id),
        saved,
      })
    }
    Err(err) => {
      warn!(id, error = %err, "reference patch failed");
      if muts.is_current(id, epoch) {
        // Restore the exact pre-mutation state.
        if let Some(value) = detail_snapshot {
          cache.set(detail_key.clone(), value);
        }
        for (key, page) in list_snapshots {
          cache.set(key, page);
        }
      }
      Err(err)
    }
  };

  // Settlement: whatever happened, the next read of any affected query goes
  // back to the source of truth.
  cache.invalidate(&detail_key);
  for key in cache.keys_by_prefix(KeyPrefix::List) {
    cache.invalidate(&key);
  }

  outcome
}
