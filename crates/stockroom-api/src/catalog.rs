//! Handlers for the product → variant → size catalog.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/products` | Body: [`NewProduct`]; 201 |
//! | `GET`    | `/products/{id}` | Product with live variants, sizes and totals |
//! | `PUT`    | `/products/{id}/status` | Body: `{"status":"active"}`; `archived` cascades |
//! | `DELETE` | `/products/{id}` | Cascade archive; returns the archive entries |
//! | `POST`   | `/products/{id}/variants` | Body: [`NewVariant`]; 201 |
//! | `GET`    | `/variants/by-sku/{sku}` | Variant with live sizes and totals |
//! | `DELETE` | `/variants/{id}` | Cascade archive |
//! | `POST`   | `/variants/{id}/sizes` | Body: [`NewSize`]; 201 |
//! | `GET`    | `/sizes/{id}` | Size with per-location rows and totals |
//! | `DELETE` | `/sizes/{id}` | Archive |
//!
//! Archiving endpoints record the caller from the
//! [`ACTOR_HEADER`](crate::ACTOR_HEADER) header.

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::Deserialize;
use stockroom_core::{
  archive::ArchiveEntry,
  catalog::{
    NewProduct, NewSize, NewVariant, Product, ProductStatus, ProductView, SizeView, VariantView,
  },
  store::StockroomStore,
};
use uuid::Uuid;

use crate::{
  AppState, actor,
  error::ApiError,
  extract::{JsonBody, PathParams},
};

// ─── Products ────────────────────────────────────────────────────────────────

/// `POST /products`
pub async fn create_product<S: StockroomStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
  let product = state.store.create_product(body).await.map_err(ApiError::from_store)?;
  tracing::info!(product_id = %product.product_id, style = %product.style_number, "product created");
  Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /products/{id}`
pub async fn get_product<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<Uuid>,
) -> Result<Json<ProductView>, ApiError> {
  let view = state.aggregator.product_view(id).await.map_err(ApiError::from_store)?;
  Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: ProductStatus,
}

/// `PUT /products/{id}/status`
pub async fn set_product_status<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<Uuid>,
  headers: HeaderMap,
  JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Product>, ApiError> {
  let changed_by = actor(&headers);
  let product = state
    .store
    .set_product_status(id, body.status, &changed_by)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(product))
}

/// `DELETE /products/{id}`
pub async fn archive_product<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<Uuid>,
  headers: HeaderMap,
) -> Result<Json<Vec<ArchiveEntry>>, ApiError> {
  let deleted_by = actor(&headers);
  let entries = state
    .store
    .archive_product(id, &deleted_by)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

// ─── Variants ────────────────────────────────────────────────────────────────

/// `POST /products/{id}/variants`
pub async fn create_variant<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(product_id): PathParams<Uuid>,
  JsonBody(mut body): JsonBody<NewVariant>,
) -> Result<impl IntoResponse, ApiError> {
  body.product_id = product_id;
  let variant = state.store.create_variant(body).await.map_err(ApiError::from_store)?;
  tracing::info!(variant_id = %variant.variant_id, sku = %variant.sku, "variant created");
  Ok((StatusCode::CREATED, Json(variant)))
}

/// `GET /variants/by-sku/{sku}`
pub async fn get_variant_by_sku<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(sku): PathParams<String>,
) -> Result<Json<VariantView>, ApiError> {
  let view = state
    .aggregator
    .variant_view_by_sku(&sku)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(view))
}

/// `DELETE /variants/{id}`
pub async fn archive_variant<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<Uuid>,
  headers: HeaderMap,
) -> Result<Json<Vec<ArchiveEntry>>, ApiError> {
  let deleted_by = actor(&headers);
  let entries = state
    .store
    .archive_variant(id, &deleted_by)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

// ─── Sizes ───────────────────────────────────────────────────────────────────

/// `POST /variants/{id}/sizes`
pub async fn create_size<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(variant_id): PathParams<Uuid>,
  JsonBody(mut body): JsonBody<NewSize>,
) -> Result<impl IntoResponse, ApiError> {
  body.variant_id = variant_id;
  let size = state.store.create_size(body).await.map_err(ApiError::from_store)?;
  tracing::info!(size_id = %size.size_id, label = %size.label, "size created");
  Ok((StatusCode::CREATED, Json(size)))
}

/// `GET /sizes/{id}`
pub async fn get_size<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<Uuid>,
) -> Result<Json<SizeView>, ApiError> {
  let view = state.aggregator.size_view(id).await.map_err(ApiError::from_store)?;
  Ok(Json(view))
}

/// `DELETE /sizes/{id}`
pub async fn archive_size<S: StockroomStore>(
  State(state): State<AppState<S>>,
  PathParams(id): PathParams<Uuid>,
  headers: HeaderMap,
) -> Result<Json<Vec<ArchiveEntry>>, ApiError> {
  let deleted_by = actor(&headers);
  let entries = state
    .store
    .archive_size(id, &deleted_by)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries))
}
