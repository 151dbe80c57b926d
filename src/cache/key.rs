//! Structured cache keys.
//!
//! Keys are a plain enum rather than hashed strings: a prefix scan ("every
//! cached list page, whatever its filters or page number") is then a simple
//! discriminant check, with no string parsing and no reliance on map
//! iteration order.

use crate::api::types::{ListQuery, MoveType};

/// Logical identity of a cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// Detail query for a single stock move.
  Detail { id: String },
  /// List query identified by paging and filters.
  List {
    page: u32,
    page_size: u32,
    product: Option<String>,
    warehouse: Option<String>,
    kind: Option<MoveType>,
  },
}

/// Key-space selector for prefix scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
  Detail,
  List,
}

impl CacheKey {
  pub fn detail(id: impl Into<String>) -> Self {
    CacheKey::Detail { id: id.into() }
  }

  pub fn list(query: &ListQuery) -> Self {
    CacheKey::List {
      page: query.page,
      page_size: query.page_size,
      product: query.filters.product.clone(),
      warehouse: query.filters.warehouse.clone(),
      kind: query.filters.kind,
    }
  }

  pub fn prefix(&self) -> KeyPrefix {
    match self {
      CacheKey::Detail { .. } => KeyPrefix::Detail,
      CacheKey::List { .. } => KeyPrefix::List,
    }
  }

  pub fn matches(&self, prefix: KeyPrefix) -> bool {
    self.prefix() == prefix
  }

  /// Human-readable form for log lines.
  pub fn describe(&self) -> String {
    match self {
      CacheKey::Detail { id } => format!("move {}", id),
      CacheKey::List {
        page,
        page_size,
        product,
        warehouse,
        kind,
      } => {
        let mut parts = vec![format!("page {} (size {})", page, page_size)];
        if let Some(p) = product {
          parts.push(format!("product~{}", p));
        }
        if let Some(w) = warehouse {
          parts.push(format!("warehouse={}", w));
        }
        if let Some(k) = kind {
          parts.push(format!("type={}", k));
        }
        format!("list {}", parts.join(", "))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::ListFilters;

  #[test]
  fn prefix_matching_separates_key_spaces() {
    let detail = CacheKey::detail("42");
    let list = CacheKey::list(&ListQuery::new(1, 10, ListFilters::default()));

    assert!(detail.matches(KeyPrefix::Detail));
    assert!(!detail.matches(KeyPrefix::List));
    assert!(list.matches(KeyPrefix::List));
  }

  #[test]
  fn list_keys_differ_by_filters_and_paging() {
    let base = ListQuery::new(1, 10, ListFilters::default());
    let filtered = ListQuery::new(
      1,
      10,
      ListFilters {
        product: Some("bolt".into()),
        ..Default::default()
      },
    );
    let paged = ListQuery::new(2, 10, ListFilters::default());

    assert_ne!(CacheKey::list(&base), CacheKey::list(&filtered));
    assert_ne!(CacheKey::list(&base), CacheKey::list(&paged));
    assert_eq!(CacheKey::list(&base), CacheKey::list(&base.clone()));
  }
}
