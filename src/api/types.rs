//! Domain and wire types for the stock-moves API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of an inventory movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoveType {
  In,
  Out,
  /// Manual correction; quantity may be negative.
  Adjust,
}

impl MoveType {
  pub fn as_str(&self) -> &'static str {
    match self {
      MoveType::In => "IN",
      MoveType::Out => "OUT",
      MoveType::Adjust => "ADJUST",
    }
  }
}

impl std::fmt::Display for MoveType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.pad(self.as_str())
  }
}

impl std::str::FromStr for MoveType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "IN" => Ok(MoveType::In),
      "OUT" => Ok(MoveType::Out),
      "ADJUST" => Ok(MoveType::Adjust),
      other => Err(format!("Unknown move type: {}", other)),
    }
  }
}

/// A single inventory movement.
///
/// Immutable server-side except for `reference`, which users may edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
  pub id: String,
  pub date: NaiveDate,
  pub product: String,
  pub warehouse: String,
  #[serde(rename = "type")]
  pub kind: MoveType,
  pub quantity: i64,
  pub reference: String,
}

/// Filter portion of a list query.
///
/// Unset filters are omitted from the request entirely. `product` is a
/// case-insensitive substring match server-side; the rest match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListFilters {
  pub product: Option<String>,
  pub warehouse: Option<String>,
  pub kind: Option<MoveType>,
}

/// Identity of a list request: paging plus filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
  pub page: u32,
  pub page_size: u32,
  pub filters: ListFilters,
}

impl ListQuery {
  pub fn new(page: u32, page_size: u32, filters: ListFilters) -> Self {
    Self {
      page,
      page_size,
      filters,
    }
  }
}

/// One page of stock moves plus paging metadata.
///
/// `total` is the filtered count server-side, independent of pagination;
/// `items.len()` never exceeds `page_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
  pub items: Vec<StockMove>,
  pub total: u64,
  pub page: u32,
  pub page_size: u32,
}

// ============================================================================
// Wire bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
  pub username: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
  pub token: String,
}

#[derive(Debug, Serialize)]
pub struct PatchRequest<'a> {
  pub reference: &'a str,
}

/// Error body the server sends with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn move_type_round_trips_through_wire_tags() {
    let json = serde_json::to_string(&MoveType::Adjust).unwrap();
    assert_eq!(json, "\"ADJUST\"");
    let back: MoveType = serde_json::from_str(&json).unwrap();
    assert_eq!(back, MoveType::Adjust);
  }

  #[test]
  fn stock_move_uses_the_type_wire_field() {
    let json = r#"{
      "id": "1",
      "date": "2024-01-05",
      "product": "Bolts M6",
      "warehouse": "Central",
      "type": "IN",
      "quantity": 40,
      "reference": "Ingreso inicial"
    }"#;
    let m: StockMove = serde_json::from_str(json).unwrap();
    assert_eq!(m.kind, MoveType::In);
    assert_eq!(m.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    assert_eq!(m.reference, "Ingreso inicial");
  }

  #[test]
  fn list_result_uses_camel_case_paging_fields() {
    let json = r#"{"items": [], "total": 0, "page": 1, "pageSize": 10}"#;
    let page: ListResult = serde_json::from_str(json).unwrap();
    assert_eq!(page.page_size, 10);
  }
}
