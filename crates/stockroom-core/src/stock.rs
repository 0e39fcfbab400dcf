//! [`StockService`]: the only legal ways to change reservation state.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error,
  inventory::{InventoryRow, LineKey, StockDelta},
  store::InventoryLedger,
};

/// Reserve, release and commit operations over an [`InventoryLedger`].
///
/// Derived quantities are computed at read time, so none of these operations
/// has side effects beyond the ledger row it targets.
pub struct StockService<L> {
  ledger: Arc<L>,
}

impl<L> Clone for StockService<L> {
  fn clone(&self) -> Self { Self { ledger: Arc::clone(&self.ledger) } }
}

fn require_positive(qty: u32) -> Result<(), Error> {
  if qty == 0 {
    return Err(Error::Validation("quantity must be at least 1".to_owned()));
  }
  Ok(())
}

impl<L: InventoryLedger> StockService<L> {
  pub fn new(ledger: Arc<L>) -> Self { Self { ledger } }

  /// Reserve `qty` units if at least that many are sellable at `location`.
  ///
  /// The check and the increment are one indivisible ledger update: two
  /// concurrent callers racing for the last unit cannot both succeed.
  /// Returns `false` (and writes nothing) when stock is short.
  pub async fn reserve(
    &self,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<bool, L::Error> {
    require_positive(qty)?;
    let reserved = self.ledger.try_reserve(size_id, location, qty).await?;
    if reserved {
      tracing::debug!(%size_id, location, qty, "reserved stock");
    } else {
      tracing::info!(%size_id, location, qty, "reservation rejected: insufficient stock");
    }
    Ok(reserved)
  }

  /// Undo a prior reservation. Over-release is clamped at zero rather than
  /// rejected.
  pub async fn release_reservation(
    &self,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<(), L::Error> {
    require_positive(qty)?;
    self.ledger.release(size_id, location, qty).await?;
    tracing::debug!(%size_id, location, qty, "released reservation");
    Ok(())
  }

  /// [`StockService::reserve`] for one line of an order under creation,
  /// leaving a hold that reconciliation treats as outstanding.
  pub async fn hold_line(
    &self,
    key: &LineKey,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<bool, L::Error> {
    require_positive(qty)?;
    let held = self.ledger.try_hold(key, size_id, location, qty).await?;
    if held {
      tracing::debug!(
        order_number = %key.order_number,
        line = key.line_index,
        %size_id,
        location,
        qty,
        "held stock for order line"
      );
    } else {
      tracing::info!(%size_id, location, qty, "hold rejected: insufficient stock");
    }
    Ok(held)
  }

  /// Give back the reservation behind a hold. Returns `false` if the hold was
  /// already gone.
  pub async fn release_hold(&self, key: &LineKey) -> Result<bool, L::Error> {
    let released = self.ledger.release_hold(key).await?;
    if !released {
      tracing::warn!(
        order_number = %key.order_number,
        line = key.line_index,
        "no hold to release; skipping"
      );
    }
    Ok(released)
  }

  /// Record a physical departure of `qty` units, retiring the matching
  /// reservation. Both counters clamp at zero.
  ///
  /// Not idempotent: calling this twice for the same shipment decrements
  /// twice. Order fulfilment goes through
  /// [`StockService::commit_order_line`] instead.
  pub async fn commit_shipment(
    &self,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<(), L::Error> {
    require_positive(qty)?;
    self.ledger.commit(size_id, location, qty).await?;
    tracing::debug!(%size_id, location, qty, "committed shipment");
    Ok(())
  }

  /// Commit the shipment of one order line at most once. Returns `false` if
  /// the line had already been settled.
  pub async fn commit_order_line(
    &self,
    key: &LineKey,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<bool, L::Error> {
    require_positive(qty)?;
    let committed = self.ledger.commit_line(key, size_id, location, qty).await?;
    if committed {
      tracing::debug!(
        order_number = %key.order_number,
        line = key.line_index,
        %size_id,
        location,
        qty,
        "committed order line"
      );
    } else {
      tracing::warn!(
        order_number = %key.order_number,
        line = key.line_index,
        "order line already settled; skipping"
      );
    }
    Ok(committed)
  }

  /// Release the reservation of one order line unless the line was already
  /// settled. Returns `false` if it was, in particular when it has shipped.
  pub async fn release_order_line(
    &self,
    key: &LineKey,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<bool, L::Error> {
    require_positive(qty)?;
    let released = self.ledger.release_line(key, size_id, location, qty).await?;
    if released {
      tracing::debug!(
        order_number = %key.order_number,
        line = key.line_index,
        %size_id,
        location,
        qty,
        "released order line"
      );
    } else {
      tracing::info!(
        order_number = %key.order_number,
        line = key.line_index,
        "order line already settled; not released"
      );
    }
    Ok(released)
  }

  /// Administrative stock movement (counts, purchase orders, corrections)
  /// applied through the checked conditional delta.
  pub async fn adjust(
    &self,
    size_id: Uuid,
    location: &str,
    delta: StockDelta,
  ) -> Result<InventoryRow, L::Error> {
    if delta.is_zero() {
      return Err(Error::Validation("stock adjustment must change something".to_owned()).into());
    }
    let row = self.ledger.apply_delta(size_id, location, delta).await?;
    tracing::info!(%size_id, location, ?delta, "adjusted stock");
    Ok(row)
  }

  /// Move `qty` units from on-order to on-hand.
  pub async fn receive(
    &self,
    size_id: Uuid,
    location: &str,
    qty: u32,
  ) -> Result<InventoryRow, L::Error> {
    require_positive(qty)?;
    let row = self.ledger.apply_delta(size_id, location, StockDelta::receive(qty)).await?;
    tracing::info!(%size_id, location, qty, "received stock");
    Ok(row)
  }

  /// The current row, or a zero row when none was ever written.
  pub async fn row(&self, size_id: Uuid, location: &str) -> Result<InventoryRow, L::Error> {
    Ok(
      self
        .ledger
        .get_row(size_id, location)
        .await?
        .unwrap_or_else(|| InventoryRow::empty(location)),
    )
  }
}
