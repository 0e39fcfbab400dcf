//! Error types for `stockroom-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::order::OrderStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// A reservation or checked delta would break `reserved <= on_hand` or
  /// drive a counter negative. Retryable by the user with a different
  /// quantity or location, never transient.
  #[error("Insufficient stock for size {size_id} at {location}")]
  InsufficientStock { size_id: Uuid, location: String },

  #[error("size not found: {0}")]
  SizeNotFound(Uuid),

  #[error("variant not found: {0}")]
  VariantNotFound(Uuid),

  #[error("variant not found for sku {0:?}")]
  VariantSkuNotFound(String),

  #[error("product not found: {0}")]
  ProductNotFound(Uuid),

  #[error("order not found: {0}")]
  OrderNotFound(String),

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("cannot move order from {from} to {to}")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  #[error("conflict: {0}")]
  Conflict(String),

  /// A counter would have gone negative. Unreachable while every mutation
  /// goes through the conditional ledger operations.
  #[error("invariant violation: {0}")]
  InvariantViolation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::SizeNotFound(_)
        | Self::VariantNotFound(_)
        | Self::VariantSkuNotFound(_)
        | Self::ProductNotFound(_)
        | Self::OrderNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
