//! [`OrderLifecycle`] drives ledger transitions from order events.
//!
//! Creation reserves stock line by line. The ledger has no multi-row
//! transaction, so creation is a saga: each line takes a hold under the new
//! order's number, each hold is appended to a [`ReservationLog`], and any
//! later failure replays the log in reverse with compensating releases before
//! the error surfaces. Persisting the order converts its holds into order
//! lines in one transaction.
//!
//! After creation every reserved line is settled exactly once: committed when
//! the order is delivered, or released when it is deleted first.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error,
  inventory::LineKey,
  order::{NewOrder, Order, OrderStatus, generate_order_number},
  stock::StockService,
  store::{InventoryLedger, OrderStore},
};

// ─── Saga log ────────────────────────────────────────────────────────────────

/// A hold that was acquired during order creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredReservation {
  pub key:      LineKey,
  pub size_id:  Uuid,
  pub location: String,
  pub qty:      u32,
}

/// Ordered log of the holds acquired so far by one order creation.
#[derive(Debug, Default)]
pub struct ReservationLog {
  acquired: Vec<AcquiredReservation>,
}

impl ReservationLog {
  pub fn push(&mut self, key: LineKey, size_id: Uuid, location: impl Into<String>, qty: u32) {
    self.acquired.push(AcquiredReservation { key, size_id, location: location.into(), qty });
  }

  pub fn len(&self) -> usize { self.acquired.len() }

  pub fn is_empty(&self) -> bool { self.acquired.is_empty() }

  /// Entries in the order their compensations must run: newest first.
  pub fn into_compensations(self) -> impl Iterator<Item = AcquiredReservation> {
    self.acquired.into_iter().rev()
  }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

pub struct OrderLifecycle<S> {
  store: Arc<S>,
  stock: StockService<S>,
}

impl<S> Clone for OrderLifecycle<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), stock: self.stock.clone() }
  }
}

impl<S: InventoryLedger + OrderStore> OrderLifecycle<S> {
  pub fn new(store: Arc<S>) -> Self {
    let stock = StockService::new(Arc::clone(&store));
    Self { store, stock }
  }

  /// Hold stock for every line with a resolved size, then persist the order
  /// in `In Hand`.
  ///
  /// If any hold fails, every earlier one is released (newest first) and
  /// nothing is persisted. A short line fails with
  /// [`Error::InsufficientStock`] naming its size and location.
  pub async fn create(&self, input: NewOrder) -> Result<Order, S::Error> {
    input.validate()?;

    let now = Utc::now();
    let order_number = generate_order_number(now);

    let mut log = ReservationLog::default();
    for (index, line) in (0u32..).zip(&input.lines) {
      let Some(size_id) = line.size_id else { continue };
      let key = LineKey::new(order_number.clone(), index);
      match self.stock.hold_line(&key, size_id, &line.location, line.quantity).await {
        Ok(true) => log.push(key, size_id, line.location.clone(), line.quantity),
        Ok(false) => {
          self.compensate(log).await;
          return Err(
            Error::InsufficientStock { size_id, location: line.location.clone() }.into(),
          );
        }
        Err(e) => {
          self.compensate(log).await;
          return Err(e);
        }
      }
    }

    let order = match input.into_order(order_number, now) {
      Ok(order) => order,
      Err(e) => {
        self.compensate(log).await;
        return Err(e.into());
      }
    };

    if let Err(e) = self.store.insert_order(&order).await {
      tracing::error!(order_number = %order.order_number, error = %e, "failed to persist order");
      self.compensate(log).await;
      return Err(e);
    }

    tracing::info!(
      order_number = %order.order_number,
      lines = order.products.len(),
      total = order.total_amount,
      "order created"
    );
    Ok(order)
  }

  /// Release every hold in `log`, newest first. Failures are logged and do
  /// not stop the remaining releases; a hold left behind expires and is
  /// reclaimed by reservation reconciliation.
  async fn compensate(&self, log: ReservationLog) {
    if log.is_empty() {
      return;
    }
    tracing::info!(count = log.len(), "rolling back reservations");
    for entry in log.into_compensations() {
      if let Err(e) = self.stock.release_hold(&entry.key).await {
        tracing::error!(
          size_id = %entry.size_id,
          location = %entry.location,
          qty = entry.qty,
          error = %e,
          "compensating release failed"
        );
      }
    }
  }

  /// Move an order to `to`.
  ///
  /// The status is swapped first; a concurrent change makes the call fail
  /// with [`Error::Conflict`] before any stock moves. Entering `Delivered`
  /// then commits every reserved line exactly once. Requesting `Delivered`
  /// again re-runs those commits, which only completes lines an earlier
  /// attempt left unsettled. Leaving `Delivered` is rejected with
  /// [`Error::InvalidTransition`]. Every other move is a metadata write.
  pub async fn update_status(
    &self,
    order_number: &str,
    to: OrderStatus,
  ) -> Result<Order, S::Error> {
    let order = self.get(order_number).await?;
    let from = order.status;

    if !from.can_transition_to(to) {
      return Err(Error::InvalidTransition { from, to }.into());
    }

    let updated = if from == to {
      order
    } else {
      let updated = self
        .store
        .update_order_status(order_number, from, to)
        .await?
        .ok_or_else(|| {
          Error::Conflict(format!("order {order_number} changed status concurrently"))
        })?;
      tracing::info!(%order_number, %from, %to, "order status changed");
      updated
    };

    if to == OrderStatus::Delivered {
      self.commit_lines(&updated).await?;
    }
    Ok(updated)
  }

  async fn commit_lines(&self, order: &Order) -> Result<(), S::Error> {
    for (index, line, size_id) in order.reserved_lines() {
      let key = LineKey::new(order.order_number.clone(), index);
      self
        .stock
        .commit_order_line(&key, size_id, &line.location, line.quantity)
        .await?;
    }
    Ok(())
  }

  /// Remove an order outright, then release every reserved line that has not
  /// been settled. Lines that already shipped keep their stock decremented.
  pub async fn delete(&self, order_number: &str) -> Result<(), S::Error> {
    let order = self.get(order_number).await?;

    if !self.store.delete_order(order_number).await? {
      return Err(Error::OrderNotFound(order_number.to_owned()).into());
    }

    for (index, line, size_id) in order.reserved_lines() {
      let key = LineKey::new(order_number, index);
      if let Err(e) = self
        .stock
        .release_order_line(&key, size_id, &line.location, line.quantity)
        .await
      {
        tracing::error!(
          %order_number,
          line = index,
          error = %e,
          "release of deleted order line failed"
        );
      }
    }

    tracing::info!(%order_number, "order deleted");
    Ok(())
  }

  pub async fn get(&self, order_number: &str) -> Result<Order, S::Error> {
    self
      .store
      .get_order(order_number)
      .await?
      .ok_or_else(|| Error::OrderNotFound(order_number.to_owned()).into())
  }

  pub async fn list(&self) -> Result<Vec<Order>, S::Error> { self.store.list_orders().await }
}
