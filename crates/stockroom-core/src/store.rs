//! Storage traits consumed by the services.
//!
//! Implemented by storage backends (e.g. `stockroom-store-sqlite`). Higher
//! layers (`stockroom-api`) depend on these abstractions, not on any concrete
//! backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  archive::ArchiveEntry,
  catalog::{NewProduct, NewSize, NewVariant, Product, ProductStatus, Size, Variant},
  error::Error,
  inventory::{InventoryRow, ReservationCorrection, LineKey, StockDelta},
  order::{Order, OrderStatus},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A backend error that can carry a domain [`Error`].
///
/// Services raise domain errors through `From<Error>`; callers recover them
/// with [`StoreError::as_core`] to decide how to report a failure.
pub trait StoreError: std::error::Error + From<Error> + Send + Sync + 'static {
  fn as_core(&self) -> Option<&Error>;
}

/// Shared error type for every store trait a backend implements.
pub trait Store: Send + Sync {
  type Error: StoreError;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Durable per-(size, location) stock counters; the single source of truth
/// for stock.
///
/// No method here ever leaves a row with a negative counter or with
/// `reserved > on_hand`.
pub trait InventoryLedger: Store {
  /// The row for `(size_id, location)`, or `None` when it was never written.
  /// Absence means zero stock, not an error.
  fn get_row<'a>(
    &'a self,
    size_id: Uuid,
    location: &'a str,
  ) -> impl Future<Output = Result<Option<InventoryRow>, Self::Error>> + Send + 'a;

  /// All rows of a size, sorted by location.
  fn rows_for_size(
    &self,
    size_id: Uuid,
  ) -> impl Future<Output = Result<Vec<InventoryRow>, Self::Error>> + Send + '_;

  /// Apply `delta` only if the resulting row satisfies the invariant;
  /// otherwise fail with [`Error::InsufficientStock`] and write nothing.
  /// An absent row is created from a zero baseline. The size must be live.
  fn apply_delta<'a>(
    &'a self,
    size_id: Uuid,
    location: &'a str,
    delta: StockDelta,
  ) -> impl Future<Output = Result<InventoryRow, Self::Error>> + Send + 'a;

  /// `reserved += qty` if and only if `on_hand - reserved >= qty`, as one
  /// indivisible update. Returns `false` without writing when stock is short
  /// or the row is absent; fails with [`Error::SizeNotFound`] when the size is
  /// missing or soft-deleted.
  fn try_reserve<'a>(
    &'a self,
    size_id: Uuid,
    location: &'a str,
    qty: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// `reserved = max(reserved - qty, 0)`. An absent row is left absent.
  fn release<'a>(
    &'a self,
    size_id: Uuid,
    location: &'a str,
    qty: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// `on_hand -= qty` and `reserved -= qty` together, each clamped at zero.
  /// An absent row is left absent and reported as success.
  fn commit<'a>(
    &'a self,
    size_id: Uuid,
    location: &'a str,
    qty: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// [`InventoryLedger::try_reserve`] on behalf of one line of an order that
  /// is still being created. On success a hold for `key` is recorded in the
  /// same transaction, so reconciliation counts the reservation as
  /// outstanding until [`OrderStore::insert_order`] turns the hold into an
  /// order line or [`InventoryLedger::release_hold`] gives it back.
  fn try_hold<'a>(
    &'a self,
    key: &'a LineKey,
    size_id: Uuid,
    location: &'a str,
    qty: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Drop the hold for `key` and release the quantity it reserved, in one
  /// transaction. Returns `false` and writes nothing if no hold exists, for
  /// instance because reconciliation already reclaimed an expired one.
  fn release_hold<'a>(
    &'a self,
    key: &'a LineKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// [`InventoryLedger::commit`] plus a `committed` settlement for `key`, in
  /// one transaction. Returns `false` and writes nothing if `key` was already
  /// settled, either way.
  fn commit_line<'a>(
    &'a self,
    key: &'a LineKey,
    size_id: Uuid,
    location: &'a str,
    qty: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// [`InventoryLedger::release`] plus a `released` settlement for `key`, in
  /// one transaction. Returns `false` and writes nothing if `key` was already
  /// settled, so a line that has shipped is never released.
  fn release_line<'a>(
    &'a self,
    key: &'a LineKey,
    size_id: Uuid,
    location: &'a str,
    qty: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Rewrite every row's `reserved` counter to the quantity held by
  /// unexpired holds plus unsettled lines of existing orders, clamped to
  /// `on_hand`. Expired holds are dropped first. Returns the rows that
  /// changed.
  fn reconcile_reservations(
    &self,
  ) -> impl Future<Output = Result<Vec<ReservationCorrection>, Self::Error>> + Send + '_;
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Product → variant → size documents and their cascade archive.
///
/// Reads return documents whether or not they are soft-deleted; filtering is
/// the caller's concern. Creation under a deleted parent fails with the
/// parent's not-found error.
pub trait CatalogStore: Store {
  fn create_product(
    &self,
    input: NewProduct,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + '_;

  fn get_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + '_;

  /// Change a live product's status. Setting [`ProductStatus::Archived`]
  /// performs the full cascade archive on behalf of `changed_by`.
  fn set_product_status<'a>(
    &'a self,
    id: Uuid,
    status: ProductStatus,
    changed_by: &'a str,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + 'a;

  fn create_variant(
    &self,
    input: NewVariant,
  ) -> impl Future<Output = Result<Variant, Self::Error>> + Send + '_;

  fn get_variant(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Variant>, Self::Error>> + Send + '_;

  fn get_variant_by_sku<'a>(
    &'a self,
    sku: &'a str,
  ) -> impl Future<Output = Result<Option<Variant>, Self::Error>> + Send + 'a;

  fn variants_for_product(
    &self,
    product_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Variant>, Self::Error>> + Send + '_;

  fn create_size(
    &self,
    input: NewSize,
  ) -> impl Future<Output = Result<Size, Self::Error>> + Send + '_;

  fn get_size(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Size>, Self::Error>> + Send + '_;

  fn sizes_for_variant(
    &self,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Size>, Self::Error>> + Send + '_;

  /// Soft-delete a live product and all its live variants and sizes, writing
  /// one archive entry per document, all-or-nothing. Inventory rows are left
  /// untouched.
  fn archive_product<'a>(
    &'a self,
    id: Uuid,
    deleted_by: &'a str,
  ) -> impl Future<Output = Result<Vec<ArchiveEntry>, Self::Error>> + Send + 'a;

  /// As [`CatalogStore::archive_product`], rooted at a variant.
  fn archive_variant<'a>(
    &'a self,
    id: Uuid,
    deleted_by: &'a str,
  ) -> impl Future<Output = Result<Vec<ArchiveEntry>, Self::Error>> + Send + 'a;

  fn archive_size<'a>(
    &'a self,
    id: Uuid,
    deleted_by: &'a str,
  ) -> impl Future<Output = Result<Vec<ArchiveEntry>, Self::Error>> + Send + 'a;

  /// Archive entries recorded for `original_id`, oldest first.
  fn archive_entries(
    &self,
    original_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ArchiveEntry>, Self::Error>> + Send + '_;
}

// ─── Orders ──────────────────────────────────────────────────────────────────

pub trait OrderStore: Store {
  /// Persist a new order with its lines and drop the ledger holds taken under
  /// its number, in one transaction. Fails with [`Error::Conflict`] if the
  /// order number is taken, or was used by an order whose lines were already
  /// settled.
  fn insert_order<'a>(
    &'a self,
    order: &'a Order,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get_order<'a>(
    &'a self,
    order_number: &'a str,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + 'a;

  /// All orders, newest first.
  fn list_orders(
    &self,
  ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send + '_;

  /// Set the status to `to` only if it is currently `from`. Returns the
  /// updated order, or `None` if the order is absent or its status moved.
  fn update_order_status<'a>(
    &'a self,
    order_number: &'a str,
    from: OrderStatus,
    to: OrderStatus,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + 'a;

  /// Hard-delete an order. Returns `false` if it did not exist. Settlements
  /// of its lines are kept.
  fn delete_order<'a>(
    &'a self,
    order_number: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

/// Everything the HTTP layer needs from one backend.
pub trait StockroomStore: InventoryLedger + CatalogStore + OrderStore {}

impl<T> StockroomStore for T where T: InventoryLedger + CatalogStore + OrderStore {}
