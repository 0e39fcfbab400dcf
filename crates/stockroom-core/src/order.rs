//! Orders, their lines and the status state machine.
//!
//! An order is created once at checkout and afterwards only its status
//! changes. Lines reference sizes by id but do not own them.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// `In Hand` → `Processing` → `Delivered`. `Delivered` is terminal.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum OrderStatus {
  #[default]
  #[serde(rename = "In Hand")]
  #[strum(serialize = "In Hand")]
  InHand,
  #[serde(rename = "Processing")]
  #[strum(serialize = "Processing")]
  Processing,
  #[serde(rename = "Delivered")]
  #[strum(serialize = "Delivered")]
  Delivered,
}

impl OrderStatus {
  pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered) }

  /// Whether `self → to` is a legal move. Staying in the same status is
  /// always legal; nothing leaves `Delivered`.
  pub fn can_transition_to(&self, to: OrderStatus) -> bool {
    *self == to || !self.is_terminal()
  }
}

// ─── Stored order ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub name:       String,
  /// Unit price in minor currency units.
  pub price:      i64,
  pub quantity:   u32,
  /// The caller's reference; usually a size id despite the name.
  pub product_id: String,
  /// The size whose stock this line reserved, if one could be resolved.
  pub size_id:    Option<Uuid>,
  pub location:   String,
}

impl OrderLine {
  pub fn subtotal(&self) -> Option<i64> { self.price.checked_mul(i64::from(self.quantity)) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub order_number:     String,
  pub customer:         Option<String>,
  pub shipping_address: Option<serde_json::Value>,
  pub products:         Vec<OrderLine>,
  /// Σ price × quantity, in minor units.
  pub total_amount:     i64,
  pub status:           OrderStatus,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Order {
  /// Lines that hold a reservation, paired with their index in the order.
  pub fn reserved_lines(&self) -> impl Iterator<Item = (u32, &OrderLine, Uuid)> {
    self
      .products
      .iter()
      .zip(0u32..)
      .filter_map(|(line, index)| line.size_id.map(|size_id| (index, line, size_id)))
  }
}

// ─── NewOrder ────────────────────────────────────────────────────────────────

/// The canonical order-creation command. Request bodies of any accepted shape
/// are normalised into this before reaching the lifecycle.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
  pub customer:         Option<String>,
  pub shipping_address: Option<serde_json::Value>,
  pub lines:            Vec<OrderLine>,
  /// Client-computed total; checked against the lines when present.
  pub total_amount:     Option<i64>,
}

impl NewOrder {
  /// Σ price × quantity over all lines.
  pub fn computed_total(&self) -> Result<i64> {
    self.lines.iter().try_fold(0i64, |acc, line| {
      line
        .subtotal()
        .and_then(|sub| acc.checked_add(sub))
        .ok_or_else(|| Error::Validation("order total overflows".to_owned()))
    })
  }

  /// Reject malformed commands before any stock is touched.
  pub fn validate(&self) -> Result<()> {
    if self.lines.is_empty() {
      return Err(Error::Validation("an order needs at least one line".to_owned()));
    }
    for (index, line) in self.lines.iter().enumerate() {
      if line.name.trim().is_empty() {
        return Err(Error::Validation(format!("line {index}: name must not be empty")));
      }
      if line.price < 0 {
        return Err(Error::Validation(format!("line {index}: price must not be negative")));
      }
      if line.quantity == 0 {
        return Err(Error::Validation(format!("line {index}: quantity must be at least 1")));
      }
      if line.location.trim().is_empty() {
        return Err(Error::Validation(format!("line {index}: location must not be empty")));
      }
    }
    let computed = self.computed_total()?;
    if let Some(claimed) = self.total_amount
      && claimed != computed
    {
      return Err(Error::Validation(format!(
        "totalAmount {claimed} does not match line total {computed}"
      )));
    }
    Ok(())
  }

  /// Build the persisted order. Call only after [`NewOrder::validate`].
  pub fn into_order(self, order_number: String, now: DateTime<Utc>) -> Result<Order> {
    let total_amount = self.computed_total()?;
    Ok(Order {
      order_number,
      customer: self.customer,
      shipping_address: self.shipping_address,
      products: self.lines,
      total_amount,
      status: OrderStatus::InHand,
      created_at: now,
      updated_at: now,
    })
  }
}

/// Generate an order number of the form `ORD-YYYYMMDD-xxxxxxxxxxxxxxxx`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
  let mut suffix = [0u8; 8];
  OsRng.fill_bytes(&mut suffix);
  format!("ORD-{}-{}", now.format("%Y%m%d"), hex::encode(suffix))
}
