//! Handlers for direct ledger access.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sizes/{id}/inventory/{location}` | Raw row; zeros if never written |
//! | `POST` | `/sizes/{id}/inventory/{location}/adjust` | Body: [`StockDelta`]; 400 if it would break the row |
//! | `POST` | `/sizes/{id}/inventory/{location}/receive` | Body: `{"quantity":5}`; on-order → on-hand |
//! | `POST` | `/inventory/reconcile` | Rewrites drifted reservation counters |

use axum::{Json, extract::State};
use serde::Deserialize;
use stockroom_core::{
  Error as CoreError,
  inventory::{InventoryRow, ReservationCorrection, StockDelta},
  store::StockroomStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{JsonBody, PathParams},
};

/// `GET /sizes/{id}/inventory/{location}`
pub async fn get_row<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams((size_id, location)): PathParams<(Uuid, String)>,
) -> Result<Json<InventoryRow>, ApiError> {
  let live = state
    .store
    .get_size(size_id)
    .await
    .map_err(ApiError::from_store)?
    .is_some_and(|s| !s.is_deleted);
  if !live {
    return Err(ApiError::NotFound(CoreError::SizeNotFound(size_id).to_string()));
  }

  let row = state.stock.row(size_id, &location).await.map_err(ApiError::from_store)?;
  Ok(Json(row))
}

/// `POST /sizes/{id}/inventory/{location}/adjust`
pub async fn adjust<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams((size_id, location)): PathParams<(Uuid, String)>,
  JsonBody(delta): JsonBody<StockDelta>,
) -> Result<Json<InventoryRow>, ApiError> {
  let row = state
    .stock
    .adjust(size_id, &location, delta)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct ReceiveBody {
  pub quantity: u32,
}

/// `POST /sizes/{id}/inventory/{location}/receive`
pub async fn receive<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams((size_id, location)): PathParams<(Uuid, String)>,
  JsonBody(body): JsonBody<ReceiveBody>,
) -> Result<Json<InventoryRow>, ApiError> {
  let row = state
    .stock
    .receive(size_id, &location, body.quantity)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(row))
}

/// `POST /inventory/reconcile`
pub async fn reconcile<S: StockroomStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<ReservationCorrection>>, ApiError> {
  let corrections = state
    .store
    .reconcile_reservations()
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(corrected = corrections.len(), "reservation reconciliation finished");
  Ok(Json(corrections))
}
