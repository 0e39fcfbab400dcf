//! Inventory ledger rows and the deltas applied to them.
//!
//! A row holds the three counters for one (size, location) pair. Rows are
//! never exposed for direct mutation; every change is a [`StockDelta`] that
//! the ledger applies conditionally, or one of the clamped release/commit
//! operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Location used when an order line does not name one.
pub const DEFAULT_LOCATION: &str = "WH-DEFAULT";

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Stock counters for a single size at a single location.
///
/// After every committed operation: all counters are non-negative and
/// `reserved <= on_hand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRow {
  pub location: String,
  pub on_hand:  i64,
  pub on_order: i64,
  pub reserved: i64,
}

impl InventoryRow {
  /// The zero baseline an absent row is treated as.
  pub fn empty(location: impl Into<String>) -> Self {
    Self { location: location.into(), on_hand: 0, on_order: 0, reserved: 0 }
  }

  /// What may legally be reserved next at this location.
  pub fn sellable(&self) -> i64 { (self.on_hand - self.reserved).max(0) }

  pub fn satisfies_invariant(&self) -> bool {
    self.on_hand >= 0
      && self.on_order >= 0
      && self.reserved >= 0
      && self.reserved <= self.on_hand
  }
}

// ─── Deltas ──────────────────────────────────────────────────────────────────

/// Signed changes to the three counters of a row, applied all-or-nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockDelta {
  pub on_hand:  i64,
  pub on_order: i64,
  pub reserved: i64,
}

impl StockDelta {
  pub fn reserve(qty: u32) -> Self {
    Self { reserved: i64::from(qty), ..Self::default() }
  }

  /// Stock arriving from a purchase order: moves `qty` from on-order to
  /// on-hand.
  pub fn receive(qty: u32) -> Self {
    Self { on_hand: i64::from(qty), on_order: -i64::from(qty), reserved: 0 }
  }

  pub fn is_zero(&self) -> bool { *self == Self::default() }
}

// ─── Order lines ─────────────────────────────────────────────────────────────

/// Identifies one order line in the ledger: the hold taken while its order is
/// being created, and the single settlement (commit or release) it receives
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKey {
  pub order_number: String,
  pub line_index:   u32,
}

impl LineKey {
  pub fn new(order_number: impl Into<String>, line_index: u32) -> Self {
    Self { order_number: order_number.into(), line_index }
  }
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// One row whose `reserved` counter disagreed with the outstanding holds and
/// order lines and was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCorrection {
  pub size_id:       Uuid,
  pub location:      String,
  pub previous:      i64,
  pub corrected:     i64,
  pub reconciled_at: DateTime<Utc>,
}
