//! Cache-aware client over the stock-moves gateway.
//!
//! Wraps a [`Gateway`] with the shared in-memory cache: views get
//! cache-backed [`Query`] handles, and edits go through the optimistic
//! mutation coordinator.

use std::sync::Arc;

use crate::api::client::Gateway;
use crate::api::types::{ListQuery, ListResult, StockMove};
use crate::cache::{CacheKey, MemoryCache};
use crate::error::ApiError;
use crate::mutation::{self, Mutations, PatchOutcome};
use crate::query::Query;

pub struct CachedClient<G> {
  gateway: Arc<G>,
  cache: MemoryCache,
  muts: Mutations,
}

impl<G> Clone for CachedClient<G> {
  fn clone(&self) -> Self {
    Self {
      gateway: Arc::clone(&self.gateway),
      cache: self.cache.clone(),
      muts: self.muts.clone(),
    }
  }
}

impl<G: Gateway + 'static> CachedClient<G> {
  pub fn new(gateway: G) -> Self {
    Self {
      gateway: Arc::new(gateway),
      cache: MemoryCache::new(),
      muts: Mutations::new(),
    }
  }

  pub fn cache(&self) -> &MemoryCache {
    &self.cache
  }

  /// Query handle for one list page. Repeated identical queries share the
  /// same cache entry.
  pub fn list_query(&self, params: ListQuery) -> Query<ListResult> {
    let key = CacheKey::list(&params);
    let gateway = Arc::clone(&self.gateway);
    Query::new(key, self.cache.clone(), move || {
      let gateway = Arc::clone(&gateway);
      let params = params.clone();
      async move { gateway.list(&params).await }
    })
  }

  /// Query handle for one move's detail view.
  pub fn detail_query(&self, id: &str) -> Query<StockMove> {
    let key = CacheKey::detail(id);
    let gateway = Arc::clone(&self.gateway);
    let id = id.to_string();
    Query::new(key, self.cache.clone(), move || {
      let gateway = Arc::clone(&gateway);
      let id = id.clone();
      async move { gateway.get(&id).await }
    })
  }

  /// Edit one move's reference with optimistic cache updates and
  /// settlement reconciliation.
  pub async fn set_reference(&self, id: &str, input: &str) -> Result<PatchOutcome, ApiError> {
    mutation::patch_reference(self.gateway.as_ref(), &self.cache, &self.muts, id, input).await
  }
}
