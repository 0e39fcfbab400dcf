//! Handlers for `/orders` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/orders` | Body: [`CreateOrderBody`]; 201 + order, 400 on short stock |
//! | `GET`    | `/orders` | Newest first |
//! | `GET`    | `/orders/{order_number}` | 404 if not found |
//! | `PUT`    | `/orders/status` | Body: `{"orderNumber":"...","status":"Delivered"}` |
//! | `DELETE` | `/orders/{order_number}` | Releases unshipped reservations; 204 |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use stockroom_core::{
  order::{NewOrder, Order, OrderLine, OrderStatus},
  store::StockroomStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{JsonBody, PathParams},
};

// ─── Request shapes ──────────────────────────────────────────────────────────

/// Fields of one order line as clients send them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineFields {
  pub name:       String,
  pub price:      i64,
  pub quantity:   Option<u32>,
  #[serde(alias = "id", alias = "_id")]
  pub product_id: String,
  pub size_id:    Option<String>,
  pub location:   Option<String>,
}

/// A line is accepted either flat, or with its fields under `product` and an
/// optional quantity alongside.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LineBody {
  Nested { product: LineFields, quantity: Option<u32> },
  Flat(LineFields),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
  pub customer:         Option<String>,
  pub shipping_address: Option<serde_json::Value>,
  #[serde(alias = "lines")]
  pub products:         Vec<LineBody>,
  pub total_amount:     Option<i64>,
}

impl LineBody {
  fn into_line(self, index: usize, default_location: &str) -> Result<OrderLine, ApiError> {
    let (fields, outer_quantity) = match self {
      LineBody::Nested { product, quantity } => (product, quantity),
      LineBody::Flat(fields) => (fields, None),
    };

    let quantity = outer_quantity
      .or(fields.quantity)
      .ok_or_else(|| ApiError::BadRequest(format!("line {index}: quantity is required")))?;

    let size_id = match fields.size_id.as_deref() {
      Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
        ApiError::BadRequest(format!("line {index}: sizeId {raw:?} is not a valid id"))
      })?),
      None => Uuid::parse_str(&fields.product_id).ok(),
    };

    let location = fields
      .location
      .filter(|l| !l.trim().is_empty())
      .unwrap_or_else(|| default_location.to_owned());

    Ok(OrderLine {
      name: fields.name,
      price: fields.price,
      quantity,
      product_id: fields.product_id,
      size_id,
      location,
    })
  }
}

impl CreateOrderBody {
  /// Normalise into the canonical creation command.
  pub fn into_new_order(self, default_location: &str) -> Result<NewOrder, ApiError> {
    let lines = self
      .products
      .into_iter()
      .enumerate()
      .map(|(index, line)| line.into_line(index, default_location))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(NewOrder {
      customer: self.customer,
      shipping_address: self.shipping_address,
      lines,
      total_amount: self.total_amount,
    })
  }
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /orders`
pub async fn create<S: StockroomStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<CreateOrderBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = body.into_new_order(&state.config.default_location)?;
  let order = state.orders.create(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(order)))
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /orders`
pub async fn list<S: StockroomStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Order>>, ApiError> {
  let orders = state.orders.list().await.map_err(ApiError::from_store)?;
  Ok(Json(orders))
}

/// `GET /orders/{order_number}`
pub async fn get_one<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(order_number): PathParams<String>,
) -> Result<Json<Order>, ApiError> {
  let order = state.orders.get(&order_number).await.map_err(ApiError::from_store)?;
  Ok(Json(order))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
  pub order_number: String,
  pub status:       OrderStatus,
}

/// `PUT /orders/status`
pub async fn update_status<S: StockroomStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Order>, ApiError> {
  let order = state
    .orders
    .update_status(&body.order_number, body.status)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(order))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /orders/{order_number}`
pub async fn delete_one<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(order_number): PathParams<String>,
) -> Result<StatusCode, ApiError> {
  state.orders.delete(&order_number).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
