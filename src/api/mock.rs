//! In-memory gateway double for tests.
//!
//! Implements the server-side semantics the real API documents: substring
//! product matching, exact warehouse/type matching, pagination with a
//! filter-wide total, and `{message}` failures for unknown ids. Patches can
//! be parked behind a semaphore so tests can observe the cache mid-flight.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;

use crate::api::client::Gateway;
use crate::api::types::{ListQuery, ListResult, StockMove};
use crate::error::ApiError;

#[derive(Clone, Default)]
pub struct MockGateway {
  moves: Arc<Mutex<Vec<StockMove>>>,
  patch_error: Arc<Mutex<Option<ApiError>>>,
  patch_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
  calls: Arc<Mutex<Vec<String>>>,
}

impl MockGateway {
  pub fn new(moves: Vec<StockMove>) -> Self {
    Self {
      moves: Arc::new(Mutex::new(moves)),
      ..Default::default()
    }
  }

  fn record(&self, call: impl Into<String>) {
    self
      .calls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(call.into());
  }

  /// Every gateway call made so far, in order.
  pub fn calls(&self) -> Vec<String> {
    self
      .calls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Make subsequent patches fail with the given error, without touching
  /// server state.
  pub fn reject_patches(&self, err: ApiError) {
    *self
      .patch_error
      .lock()
      .unwrap_or_else(PoisonError::into_inner) = Some(err);
  }

  /// Park subsequent patches until the returned semaphore gets a permit.
  pub fn park_patches(&self) -> Arc<Semaphore> {
    let gate = Arc::new(Semaphore::new(0));
    *self
      .patch_gate
      .lock()
      .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
    gate
  }

  /// Server-side view of one move.
  pub fn server_move(&self, id: &str) -> Option<StockMove> {
    self
      .moves
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .find(|m| m.id == id)
      .cloned()
  }
}

impl Gateway for MockGateway {
  async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
    self.record(format!("login {}", username));
    if password == "wrong" {
      return Err(ApiError::Auth {
        message: "Invalid credentials".to_string(),
      });
    }
    Ok("mock-token".to_string())
  }

  async fn list(&self, query: &ListQuery) -> Result<ListResult, ApiError> {
    self.record(format!("list page {}", query.page));
    let moves = self
      .moves
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();

    let filtered: Vec<StockMove> = moves
      .into_iter()
      .filter(|m| match &query.filters.product {
        Some(p) => m.product.to_lowercase().contains(&p.to_lowercase()),
        None => true,
      })
      .filter(|m| match &query.filters.warehouse {
        Some(w) => &m.warehouse == w,
        None => true,
      })
      .filter(|m| match query.filters.kind {
        Some(k) => m.kind == k,
        None => true,
      })
      .collect();

    let total = filtered.len() as u64;
    let start = (query.page.saturating_sub(1) * query.page_size) as usize;
    let items: Vec<StockMove> = filtered
      .into_iter()
      .skip(start)
      .take(query.page_size as usize)
      .collect();

    Ok(ListResult {
      items,
      total,
      page: query.page,
      page_size: query.page_size,
    })
  }

  async fn get(&self, id: &str) -> Result<StockMove, ApiError> {
    self.record(format!("get {}", id));
    self.server_move(id).ok_or_else(|| ApiError::NotFound {
      message: format!("Stock move {} not found", id),
    })
  }

  async fn patch_reference(&self, id: &str, reference: &str) -> Result<StockMove, ApiError> {
    self.record(format!("patch {}", id));

    // Clone the gate out before awaiting; the std mutex must not be held
    // across the suspension point.
    let gate = self
      .patch_gate
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    if let Some(gate) = gate {
      let permit = gate
        .acquire()
        .await
        .map_err(|_| ApiError::network("Patch gate closed"))?;
      permit.forget();
    }

    let forced = self
      .patch_error
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    if let Some(err) = forced {
      return Err(err);
    }

    let mut moves = self.moves.lock().unwrap_or_else(PoisonError::into_inner);
    match moves.iter_mut().find(|m| m.id == id) {
      Some(m) => {
        m.reference = reference.to_string();
        Ok(m.clone())
      }
      None => Err(ApiError::NotFound {
        message: format!("Stock move {} not found", id),
      }),
    }
  }
}
