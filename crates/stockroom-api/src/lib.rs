//! JSON REST API for Stockroom.
//!
//! Exposes an axum [`Router`] backed by any [`StockroomStore`]. Auth, TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", stockroom_api::api_router(store.clone(), ApiConfig::default()))
//! ```

pub mod catalog;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod orders;

use std::sync::Arc;

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post, put},
};
use stockroom_core::{
  aggregate::Aggregator, inventory::DEFAULT_LOCATION, lifecycle::OrderLifecycle,
  stock::StockService, store::StockroomStore,
};

pub use error::ApiError;

/// Header naming who performed a catalog write. Recorded on archive entries.
pub const ACTOR_HEADER: &str = "x-stockroom-actor";

/// Per-deployment API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  /// Location used for order lines that do not name one.
  pub default_location: String,
}

impl Default for ApiConfig {
  fn default() -> Self { Self { default_location: DEFAULT_LOCATION.to_owned() } }
}

/// Shared handler state: the store plus the services built over it.
pub struct AppState<S> {
  pub store:      Arc<S>,
  pub stock:      StockService<S>,
  pub orders:     OrderLifecycle<S>,
  pub aggregator: Aggregator<S>,
  pub config:     Arc<ApiConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      stock:      self.stock.clone(),
      orders:     self.orders.clone(),
      aggregator: self.aggregator.clone(),
      config:     Arc::clone(&self.config),
    }
  }
}

impl<S: StockroomStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ApiConfig) -> Self {
    Self {
      stock: StockService::new(Arc::clone(&store)),
      orders: OrderLifecycle::new(Arc::clone(&store)),
      aggregator: Aggregator::new(Arc::clone(&store)),
      config: Arc::new(config),
      store,
    }
  }
}

/// The caller named by [`ACTOR_HEADER`], or `"anonymous"`.
pub(crate) fn actor(headers: &HeaderMap) -> String {
  headers
    .get(ACTOR_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .unwrap_or("anonymous")
    .to_owned()
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, config: ApiConfig) -> Router<()>
where
  S: StockroomStore + 'static,
{
  Router::new()
    // Orders
    .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
    .route("/orders/status", put(orders::update_status::<S>))
    .route(
      "/orders/{order_number}",
      get(orders::get_one::<S>).delete(orders::delete_one::<S>),
    )
    // Catalog
    .route("/products", post(catalog::create_product::<S>))
    .route(
      "/products/{id}",
      get(catalog::get_product::<S>).delete(catalog::archive_product::<S>),
    )
    .route("/products/{id}/status", put(catalog::set_product_status::<S>))
    .route("/products/{id}/variants", post(catalog::create_variant::<S>))
    .route("/variants/by-sku/{sku}", get(catalog::get_variant_by_sku::<S>))
    .route("/variants/{id}", axum::routing::delete(catalog::archive_variant::<S>))
    .route("/variants/{id}/sizes", post(catalog::create_size::<S>))
    .route(
      "/sizes/{id}",
      get(catalog::get_size::<S>).delete(catalog::archive_size::<S>),
    )
    // Inventory
    .route("/sizes/{id}/inventory/{location}", get(inventory::get_row::<S>))
    .route("/sizes/{id}/inventory/{location}/adjust", post(inventory::adjust::<S>))
    .route("/sizes/{id}/inventory/{location}/receive", post(inventory::receive::<S>))
    .route("/inventory/reconcile", post(inventory::reconcile::<S>))
    .with_state(AppState::new(store, config))
}
