//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{Duration, Utc};
use stockroom_core::{
  Error as CoreError,
  aggregate::Aggregator,
  archive::DocumentKind,
  catalog::{NewProduct, NewSize, NewVariant, ProductStatus, Size, Variant},
  inventory::{InventoryRow, LineKey, StockDelta},
  lifecycle::OrderLifecycle,
  order::{NewOrder, OrderLine, OrderStatus},
  stock::StockService,
  store::{CatalogStore, InventoryLedger, OrderStore, StoreError as _},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

const LOC: &str = "WH-DEFAULT";

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn core(e: &Error) -> &CoreError { e.as_core().expect("domain error") }

async fn product(s: &SqliteStore) -> Uuid {
  s.create_product(NewProduct {
    style_number: format!("ST-{}", Uuid::new_v4().simple()),
    name:         "Crew Tee".into(),
    status:       ProductStatus::Active,
  })
  .await
  .unwrap()
  .product_id
}

async fn variant(s: &SqliteStore, product_id: Uuid, sku: &str) -> Variant {
  s.create_variant(NewVariant { product_id, sku: sku.into(), color: Some("black".into()) })
    .await
    .unwrap()
}

async fn size(s: &SqliteStore, variant_id: Uuid, label: &str) -> Size {
  s.create_size(NewSize { variant_id, label: label.into() })
    .await
    .unwrap()
}

/// A fresh size with `on_hand` units at [`LOC`].
async fn stocked_size(s: &SqliteStore, on_hand: i64) -> Uuid {
  let p = product(s).await;
  let v = variant(s, p, &format!("SKU-{}", Uuid::new_v4().simple())).await;
  let sz = size(s, v.variant_id, "M").await;
  if on_hand > 0 {
    s.apply_delta(sz.size_id, LOC, StockDelta { on_hand, ..StockDelta::default() })
      .await
      .unwrap();
  }
  sz.size_id
}

async fn row(s: &SqliteStore, size_id: Uuid) -> InventoryRow {
  s.get_row(size_id, LOC).await.unwrap().expect("row exists")
}

fn line(size_id: Uuid, quantity: u32) -> OrderLine {
  OrderLine {
    name: "Crew Tee".into(),
    price: 1500,
    quantity,
    product_id: size_id.to_string(),
    size_id: Some(size_id),
    location: LOC.into(),
  }
}

fn order_of(lines: Vec<OrderLine>) -> NewOrder { NewOrder { lines, ..Default::default() } }

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn absent_row_reads_as_none() {
  let s = store().await;
  let size_id = stocked_size(&s, 0).await;
  assert!(s.get_row(size_id, LOC).await.unwrap().is_none());
  assert!(s.rows_for_size(size_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn apply_delta_creates_row_from_zero() {
  let s = store().await;
  let size_id = stocked_size(&s, 0).await;

  let r = s
    .apply_delta(size_id, "WH-EAST", StockDelta { on_hand: 7, on_order: 3, reserved: 0 })
    .await
    .unwrap();
  assert_eq!(r, InventoryRow { location: "WH-EAST".into(), on_hand: 7, on_order: 3, reserved: 0 });
}

#[tokio::test]
async fn rejected_delta_writes_nothing() {
  let s = store().await;
  let size_id = stocked_size(&s, 2).await;

  let err = s
    .apply_delta(size_id, LOC, StockDelta { on_hand: -1, reserved: 2, on_order: 0 })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::InsufficientStock { .. }));
  assert_eq!(row(&s, size_id).await.on_hand, 2);

  // A rejected delta against an absent row must not leave a zero row behind.
  let err = s
    .apply_delta(size_id, "WH-EAST", StockDelta { on_hand: -1, ..StockDelta::default() })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::InsufficientStock { .. }));
  assert!(s.get_row(size_id, "WH-EAST").await.unwrap().is_none());
}

#[tokio::test]
async fn reserve_respects_sellable_quantity() {
  let s = store().await;
  let size_id = stocked_size(&s, 3).await;

  assert!(s.try_reserve(size_id, LOC, 2).await.unwrap());
  assert!(!s.try_reserve(size_id, LOC, 2).await.unwrap());
  assert!(s.try_reserve(size_id, LOC, 1).await.unwrap());

  let r = row(&s, size_id).await;
  assert_eq!((r.on_hand, r.reserved), (3, 3));
  assert_eq!(r.sellable(), 0);
}

#[tokio::test]
async fn reserve_against_absent_row_fails_without_writing() {
  let s = store().await;
  let size_id = stocked_size(&s, 0).await;
  assert!(!s.try_reserve(size_id, LOC, 1).await.unwrap());
  assert!(s.get_row(size_id, LOC).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_for_last_unit() {
  let s = store().await;
  let size_id = stocked_size(&s, 1).await;

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move { s.try_reserve(size_id, LOC, 1).await })
    })
    .collect();

  let mut successes = 0;
  for h in handles {
    if h.await.unwrap().unwrap() {
      successes += 1;
    }
  }
  assert_eq!(successes, 1);
  assert_eq!(row(&s, size_id).await.reserved, 1);
}

#[tokio::test]
async fn release_clamps_at_zero() {
  let s = store().await;
  let size_id = stocked_size(&s, 10).await;
  assert!(s.try_reserve(size_id, LOC, 3).await.unwrap());

  s.release(size_id, LOC, 5).await.unwrap();
  assert_eq!(row(&s, size_id).await.reserved, 0);

  // Releasing against an absent row is a no-op.
  s.release(size_id, "WH-NOWHERE", 1).await.unwrap();
  assert!(s.get_row(size_id, "WH-NOWHERE").await.unwrap().is_none());
}

#[tokio::test]
async fn commit_retires_reservation_and_stock() {
  let s = store().await;
  let size_id = stocked_size(&s, 10).await;
  assert!(s.try_reserve(size_id, LOC, 4).await.unwrap());

  s.commit(size_id, LOC, 4).await.unwrap();
  let r = row(&s, size_id).await;
  assert_eq!((r.on_hand, r.reserved), (6, 0));
}

#[tokio::test]
async fn raw_commit_is_not_idempotent() {
  let s = store().await;
  let size_id = stocked_size(&s, 10).await;
  assert!(s.try_reserve(size_id, LOC, 4).await.unwrap());

  s.commit(size_id, LOC, 4).await.unwrap();
  s.commit(size_id, LOC, 4).await.unwrap();
  let r = row(&s, size_id).await;
  assert_eq!((r.on_hand, r.reserved), (2, 0));
}

#[tokio::test]
async fn commit_line_applies_once_per_key() {
  let s = store().await;
  let size_id = stocked_size(&s, 10).await;
  assert!(s.try_reserve(size_id, LOC, 4).await.unwrap());

  let key = LineKey::new("ORD-20240101-00000000", 0);
  assert!(s.commit_line(&key, size_id, LOC, 4).await.unwrap());
  assert!(!s.commit_line(&key, size_id, LOC, 4).await.unwrap());

  let r = row(&s, size_id).await;
  assert_eq!((r.on_hand, r.reserved), (6, 0));
}

#[tokio::test]
async fn released_line_is_never_committed() {
  let s = store().await;
  let size_id = stocked_size(&s, 10).await;
  assert!(s.try_reserve(size_id, LOC, 4).await.unwrap());

  let key = LineKey::new("ORD-20240101-00000000", 0);
  assert!(s.release_line(&key, size_id, LOC, 4).await.unwrap());
  assert!(!s.commit_line(&key, size_id, LOC, 4).await.unwrap());
  assert!(!s.release_line(&key, size_id, LOC, 4).await.unwrap());

  let r = row(&s, size_id).await;
  assert_eq!((r.on_hand, r.reserved), (10, 0));
}

#[tokio::test]
async fn commit_against_absent_row_reports_success() {
  let s = Arc::new(store().await);
  let size_id = stocked_size(&s, 0).await;
  let stock = StockService::new(Arc::clone(&s));

  s.commit(size_id, LOC, 2).await.unwrap();
  stock.commit_shipment(size_id, LOC, 2).await.unwrap();
  let key = LineKey::new("ORD-20240101-00000000", 0);
  assert!(stock.commit_order_line(&key, size_id, LOC, 2).await.unwrap());

  // Nothing to decrement, and nothing created.
  assert!(s.get_row(size_id, LOC).await.unwrap().is_none());
}

#[tokio::test]
async fn commit_shipment_twice_decrements_twice() {
  let s = Arc::new(store().await);
  let size_id = stocked_size(&s, 10).await;
  let stock = StockService::new(Arc::clone(&s));
  assert!(stock.reserve(size_id, LOC, 3).await.unwrap());

  stock.commit_shipment(size_id, LOC, 3).await.unwrap();
  stock.commit_shipment(size_id, LOC, 3).await.unwrap();
  let r = row(&s, size_id).await;
  assert_eq!((r.on_hand, r.reserved), (4, 0));
}

#[tokio::test]
async fn stock_service_release_tolerates_over_release() {
  let s = Arc::new(store().await);
  let size_id = stocked_size(&s, 5).await;
  let stock = StockService::new(Arc::clone(&s));
  assert!(stock.reserve(size_id, LOC, 2).await.unwrap());

  stock.release_reservation(size_id, LOC, 3).await.unwrap();
  assert_eq!(row(&s, size_id).await.reserved, 0);

  let err = stock.release_reservation(size_id, LOC, 0).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::Validation(_)));
}

#[tokio::test]
async fn hold_reserves_and_releases_once() {
  let s = store().await;
  let size_id = stocked_size(&s, 3).await;
  let key = LineKey::new("ORD-20240101-00000000", 0);

  assert!(s.try_hold(&key, size_id, LOC, 2).await.unwrap());
  assert_eq!(row(&s, size_id).await.reserved, 2);
  let other = LineKey::new("ORD-20240101-00000000", 1);
  assert!(!s.try_hold(&other, size_id, LOC, 2).await.unwrap());

  // A second hold for the same line is refused and rolls its reservation back.
  let err = s.try_hold(&key, size_id, LOC, 1).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::Conflict(_)));
  assert_eq!(row(&s, size_id).await.reserved, 2);

  assert!(s.release_hold(&key).await.unwrap());
  assert!(!s.release_hold(&key).await.unwrap());
  assert_eq!(row(&s, size_id).await.reserved, 0);
}

#[tokio::test]
async fn deleted_size_rejects_reservations_and_deltas() {
  let s = store().await;
  let size_id = stocked_size(&s, 5).await;
  s.archive_size(size_id, "tester").await.unwrap();

  let err = s.try_reserve(size_id, LOC, 1).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::SizeNotFound(id) if *id == size_id));

  let err = s
    .apply_delta(size_id, LOC, StockDelta { on_hand: 1, ..StockDelta::default() })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::SizeNotFound(_)));

  // Rows of a deleted size are frozen, not removed.
  assert_eq!(row(&s, size_id).await.on_hand, 5);
}

#[tokio::test]
async fn stock_service_receive_and_adjust() {
  let s = Arc::new(store().await);
  let size_id = stocked_size(&s, 0).await;
  let stock = StockService::new(Arc::clone(&s));

  stock
    .adjust(size_id, LOC, StockDelta { on_order: 12, ..StockDelta::default() })
    .await
    .unwrap();
  let r = stock.receive(size_id, LOC, 5).await.unwrap();
  assert_eq!((r.on_hand, r.on_order), (5, 7));

  let err = stock.receive(size_id, LOC, 8).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::InsufficientStock { .. }));

  let err = stock.adjust(size_id, LOC, StockDelta::default()).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::Validation(_)));

  let empty = stock.row(size_id, "WH-EAST").await.unwrap();
  assert_eq!(empty, InventoryRow::empty("WH-EAST"));
}

#[tokio::test]
async fn reconcile_repairs_orphaned_reservation() {
  let s = Arc::new(store().await);
  let held = stocked_size(&s, 10).await;
  let orphaned = stocked_size(&s, 10).await;

  let orders = OrderLifecycle::new(Arc::clone(&s));
  orders.create(order_of(vec![line(held, 3)])).await.unwrap();
  // A reservation with no order behind it, as left by a crash mid-checkout.
  assert!(s.try_reserve(orphaned, LOC, 4).await.unwrap());

  let corrections = s.reconcile_reservations().await.unwrap();
  assert_eq!(corrections.len(), 1);
  assert_eq!(corrections[0].size_id, orphaned);
  assert_eq!((corrections[0].previous, corrections[0].corrected), (4, 0));

  assert_eq!(row(&s, held).await.reserved, 3);
  assert_eq!(row(&s, orphaned).await.reserved, 0);
  assert!(s.reconcile_reservations().await.unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_keeps_reservation_of_order_being_created() {
  let s = Arc::new(store().await);
  let last = stocked_size(&s, 1).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));

  // First checkout has reserved its line but not yet saved the order.
  let number = "ORD-20240101-00000000000000aa";
  assert!(s.try_hold(&LineKey::new(number, 0), last, LOC, 1).await.unwrap());

  assert!(s.reconcile_reservations().await.unwrap().is_empty());
  assert_eq!(row(&s, last).await.reserved, 1);

  let err = orders.create(order_of(vec![line(last, 1)])).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::InsufficientStock { .. }));

  let order = order_of(vec![line(last, 1)]).into_order(number.into(), Utc::now()).unwrap();
  s.insert_order(&order).await.unwrap();
  assert!(s.reconcile_reservations().await.unwrap().is_empty());
  assert_eq!(s.list_orders().await.unwrap().len(), 1);
  let r = row(&s, last).await;
  assert_eq!((r.on_hand, r.reserved), (1, 1));
}

#[tokio::test]
async fn expired_hold_is_reclaimed_once() {
  let s = Arc::new(store().await.with_hold_ttl(Duration::zero()));
  let a = stocked_size(&s, 3).await;
  let number = "ORD-20240101-00000000000000bb";
  let key = LineKey::new(number, 0);
  assert!(s.try_hold(&key, a, LOC, 2).await.unwrap());
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;

  let corrections = s.reconcile_reservations().await.unwrap();
  assert_eq!(corrections.len(), 1);
  assert_eq!((corrections[0].previous, corrections[0].corrected), (2, 0));

  // The abandoned saga can neither release nor save what it no longer holds.
  assert!(!s.release_hold(&key).await.unwrap());
  let order = order_of(vec![line(a, 2)]).into_order(number.into(), Utc::now()).unwrap();
  let err = s.insert_order(&order).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::Conflict(_)));
  assert!(s.get_order(number).await.unwrap().is_none());
  assert_eq!(row(&s, a).await.reserved, 0);
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
  let s = store().await;
  let p = product(&s).await;
  variant(&s, p, "TEE-BLK").await;

  let err = s
    .create_variant(NewVariant { product_id: p, sku: "TEE-BLK".into(), color: None })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn creating_under_missing_parent_fails() {
  let s = store().await;
  let missing = Uuid::new_v4();

  let err = s
    .create_variant(NewVariant { product_id: missing, sku: "X".into(), color: None })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::ProductNotFound(id) if *id == missing));

  let err = s
    .create_size(NewSize { variant_id: missing, label: "S".into() })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::VariantNotFound(_)));
}

#[tokio::test]
async fn variant_lookup_by_sku() {
  let s = store().await;
  let p = product(&s).await;
  let v = variant(&s, p, "TEE-WHT").await;

  let found = s.get_variant_by_sku("TEE-WHT").await.unwrap().unwrap();
  assert_eq!(found.variant_id, v.variant_id);
  assert!(s.get_variant_by_sku("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn archiving_a_product_cascades() {
  let s = store().await;
  let p = product(&s).await;
  let v1 = variant(&s, p, "A-1").await;
  let v2 = variant(&s, p, "A-2").await;
  let s1 = size(&s, v1.variant_id, "S").await;
  let s2 = size(&s, v1.variant_id, "M").await;
  let s3 = size(&s, v2.variant_id, "L").await;
  s.apply_delta(s1.size_id, LOC, StockDelta { on_hand: 4, ..StockDelta::default() })
    .await
    .unwrap();

  let entries = s.archive_product(p, "admin@example.com").await.unwrap();
  assert_eq!(entries.len(), 6);
  assert_eq!(entries.iter().filter(|e| e.kind == DocumentKind::Product).count(), 1);
  assert_eq!(entries.iter().filter(|e| e.kind == DocumentKind::Variant).count(), 2);
  assert_eq!(entries.iter().filter(|e| e.kind == DocumentKind::Size).count(), 3);
  assert!(entries.iter().all(|e| e.deleted_by == "admin@example.com"));

  let product = s.get_product(p).await.unwrap().unwrap();
  assert!(product.is_deleted);
  assert_eq!(product.status, ProductStatus::Archived);
  for id in [s1.size_id, s2.size_id, s3.size_id] {
    assert!(s.get_size(id).await.unwrap().unwrap().is_deleted);
  }
  assert!(s.get_variant(v2.variant_id).await.unwrap().unwrap().is_deleted);

  // Inventory is frozen, and the size snapshot carries it.
  assert_eq!(row(&s, s1.size_id).await.on_hand, 4);
  let snap = s.archive_entries(s1.size_id).await.unwrap();
  assert_eq!(snap.len(), 1);
  assert_eq!(snap[0].snapshot["inventory"][0]["onHand"], 4);

  // A second archive finds nothing live.
  let err = s.archive_product(p, "admin@example.com").await.unwrap_err();
  assert!(matches!(core(&err), CoreError::ProductNotFound(_)));
}

#[tokio::test]
async fn archiving_a_size_leaves_siblings() {
  let s = store().await;
  let p = product(&s).await;
  let v = variant(&s, p, "B-1").await;
  let small = size(&s, v.variant_id, "S").await;
  let medium = size(&s, v.variant_id, "M").await;

  let entries = s.archive_size(small.size_id, "admin").await.unwrap();
  assert_eq!(entries.len(), 1);
  assert!(!s.get_size(medium.size_id).await.unwrap().unwrap().is_deleted);
  assert!(!s.get_variant(v.variant_id).await.unwrap().unwrap().is_deleted);
}

#[tokio::test]
async fn status_archived_runs_the_cascade() {
  let s = store().await;
  let p = product(&s).await;
  let v = variant(&s, p, "C-1").await;

  let updated = s.set_product_status(p, ProductStatus::Inactive, "admin").await.unwrap();
  assert_eq!(updated.status, ProductStatus::Inactive);
  assert!(!updated.is_deleted);

  let archived = s.set_product_status(p, ProductStatus::Archived, "admin").await.unwrap();
  assert!(archived.is_deleted);
  assert!(s.get_variant(v.variant_id).await.unwrap().unwrap().is_deleted);
  assert_eq!(s.archive_entries(p).await.unwrap().len(), 1);
}

#[tokio::test]
async fn aggregate_views_roll_up_live_nodes() {
  let s = Arc::new(store().await);
  let p = product(&s).await;
  let vb = variant(&s, p, "SKU-B").await;
  let va = variant(&s, p, "SKU-A").await;
  let large = size(&s, va.variant_id, "L").await;
  let medium = size(&s, va.variant_id, "M").await;
  let gone = size(&s, vb.variant_id, "S").await;

  s.apply_delta(large.size_id, "WH-B", StockDelta { on_hand: 5, on_order: 2, reserved: 1 })
    .await
    .unwrap();
  s.apply_delta(large.size_id, "WH-A", StockDelta { on_hand: 3, on_order: 0, reserved: 2 })
    .await
    .unwrap();
  s.apply_delta(medium.size_id, LOC, StockDelta { on_hand: 1, ..StockDelta::default() })
    .await
    .unwrap();
  s.apply_delta(gone.size_id, LOC, StockDelta { on_hand: 100, ..StockDelta::default() })
    .await
    .unwrap();
  s.archive_size(gone.size_id, "admin").await.unwrap();

  let agg = Aggregator::new(Arc::clone(&s));

  let sv = agg.size_view(large.size_id).await.unwrap();
  let locations: Vec<_> = sv.inventory.iter().map(|r| r.location.as_str()).collect();
  assert_eq!(locations, ["WH-A", "WH-B"]);
  assert_eq!(sv.totals.total_quantity, 8);
  assert_eq!(sv.totals.reserved_total, 3);
  assert_eq!(sv.totals.sellable_quantity, 5);
  assert_eq!(sv.totals.on_order_total, 2);

  let vv = agg.variant_view_by_sku("SKU-A").await.unwrap();
  let labels: Vec<_> = vv.sizes.iter().map(|s| s.size.label.as_str()).collect();
  assert_eq!(labels, ["L", "M"]);
  assert_eq!(vv.totals.total_quantity, 9);

  let pv = agg.product_view(p).await.unwrap();
  let skus: Vec<_> = pv.variants.iter().map(|v| v.variant.sku.as_str()).collect();
  assert_eq!(skus, ["SKU-A", "SKU-B"]);
  assert_eq!(pv.totals.total_quantity, 9);
  assert!(pv.variants[1].sizes.is_empty());

  let err = agg.size_view(gone.size_id).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::SizeNotFound(_)));
  let err = agg.variant_view_by_sku("SKU-Z").await.unwrap_err();
  assert!(matches!(core(&err), CoreError::VariantSkuNotFound(_)));
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_order_reserves_every_line() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let b = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));

  let mut unresolved = line(a, 1);
  unresolved.size_id = None;
  unresolved.product_id = "legacy-ref".into();

  let order = orders
    .create(NewOrder {
      customer: Some("c-1".into()),
      shipping_address: Some(serde_json::json!({ "city": "Lisbon" })),
      lines: vec![line(a, 2), line(b, 1), unresolved],
      total_amount: Some(6000),
    })
    .await
    .unwrap();

  assert_eq!(order.status, OrderStatus::InHand);
  assert_eq!(order.total_amount, 6000);
  assert!(order.order_number.starts_with("ORD-"));
  assert_eq!(row(&s, a).await.reserved, 2);
  assert_eq!(row(&s, b).await.reserved, 1);

  let stored = s.get_order(&order.order_number).await.unwrap().unwrap();
  assert_eq!(stored, order);
}

#[tokio::test]
async fn failed_line_rolls_back_earlier_reservations() {
  let s = Arc::new(store().await);
  let plenty = stocked_size(&s, 5).await;
  let scarce = stocked_size(&s, 1).await;
  let untouched = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));

  let err = orders
    .create(order_of(vec![line(plenty, 2), line(scarce, 3), line(untouched, 1)]))
    .await
    .unwrap_err();

  match core(&err) {
    CoreError::InsufficientStock { size_id, location } => {
      assert_eq!(*size_id, scarce);
      assert_eq!(location, LOC);
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(row(&s, plenty).await.reserved, 0);
  assert_eq!(row(&s, scarce).await.reserved, 0);
  assert_eq!(row(&s, untouched).await.reserved, 0);
  assert!(s.list_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn mismatched_total_touches_no_stock() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));

  let err = orders
    .create(NewOrder { lines: vec![line(a, 1)], total_amount: Some(1), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::Validation(_)));
  assert_eq!(row(&s, a).await.reserved, 0);
}

#[tokio::test]
async fn delivery_commits_exactly_once() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 10).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let order = orders.create(order_of(vec![line(a, 4)])).await.unwrap();

  let processing = orders
    .update_status(&order.order_number, OrderStatus::Processing)
    .await
    .unwrap();
  assert_eq!(processing.status, OrderStatus::Processing);
  assert_eq!(row(&s, a).await.reserved, 4);

  let delivered = orders
    .update_status(&order.order_number, OrderStatus::Delivered)
    .await
    .unwrap();
  assert_eq!(delivered.status, OrderStatus::Delivered);
  let r = row(&s, a).await;
  assert_eq!((r.on_hand, r.reserved), (6, 0));

  orders
    .update_status(&order.order_number, OrderStatus::Delivered)
    .await
    .unwrap();
  let r = row(&s, a).await;
  assert_eq!((r.on_hand, r.reserved), (6, 0));

  let err = orders
    .update_status(&order.order_number, OrderStatus::Processing)
    .await
    .unwrap_err();
  assert!(matches!(
    core(&err),
    CoreError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Processing }
  ));
}

#[tokio::test]
async fn status_change_on_missing_order() {
  let s = Arc::new(store().await);
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let err = orders
    .update_status("ORD-19700101-deadbeef", OrderStatus::Processing)
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::OrderNotFound(_)));
}

#[tokio::test]
async fn stale_status_update_is_rejected() {
  let s = store().await;
  let a = stocked_size(&s, 1).await;
  let orders = OrderLifecycle::new(Arc::new(s.clone()));
  let order = orders.create(order_of(vec![line(a, 1)])).await.unwrap();

  let moved = s
    .update_order_status(&order.order_number, OrderStatus::Processing, OrderStatus::Delivered)
    .await
    .unwrap();
  assert!(moved.is_none());
  let moved = s
    .update_order_status(&order.order_number, OrderStatus::InHand, OrderStatus::Processing)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(moved.status, OrderStatus::Processing);
  assert!(moved.updated_at >= order.updated_at);
}

#[tokio::test]
async fn deleting_an_open_order_releases_stock() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let order = orders.create(order_of(vec![line(a, 3)])).await.unwrap();

  orders.delete(&order.order_number).await.unwrap();
  assert_eq!(row(&s, a).await.reserved, 0);
  assert!(s.get_order(&order.order_number).await.unwrap().is_none());

  let err = orders.delete(&order.order_number).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::OrderNotFound(_)));
}

#[tokio::test]
async fn deleting_a_delivered_order_keeps_stock() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let b = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let delivered = orders.create(order_of(vec![line(a, 2)])).await.unwrap();
  orders.create(order_of(vec![line(b, 1)])).await.unwrap();
  orders
    .update_status(&delivered.order_number, OrderStatus::Delivered)
    .await
    .unwrap();

  orders.delete(&delivered.order_number).await.unwrap();
  let r = row(&s, a).await;
  assert_eq!((r.on_hand, r.reserved), (3, 0));
  assert_eq!(row(&s, b).await.reserved, 1);
}

#[tokio::test]
async fn deleting_a_partly_shipped_order_spares_other_reservations() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let shipped = orders.create(order_of(vec![line(a, 2)])).await.unwrap();
  orders.create(order_of(vec![line(a, 2)])).await.unwrap();

  // The line shipped, but the status never reached Delivered.
  let stock = StockService::new(Arc::clone(&s));
  let key = LineKey::new(shipped.order_number.clone(), 0);
  assert!(stock.commit_order_line(&key, a, LOC, 2).await.unwrap());
  let r = row(&s, a).await;
  assert_eq!((r.on_hand, r.reserved), (3, 2));

  orders.delete(&shipped.order_number).await.unwrap();
  let r = row(&s, a).await;
  assert_eq!((r.on_hand, r.reserved), (3, 2));
  assert!(s.reconcile_reservations().await.unwrap().is_empty());
}

#[tokio::test]
async fn repeated_delivery_completes_unshipped_lines() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let order = orders.create(order_of(vec![line(a, 2)])).await.unwrap();

  // Status swapped, commits never ran.
  s.update_order_status(&order.order_number, OrderStatus::InHand, OrderStatus::Delivered)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row(&s, a).await.reserved, 2);

  orders
    .update_status(&order.order_number, OrderStatus::Delivered)
    .await
    .unwrap();
  let r = row(&s, a).await;
  assert_eq!((r.on_hand, r.reserved), (3, 0));
}

#[tokio::test]
async fn settled_order_number_is_not_reused() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let order = orders.create(order_of(vec![line(a, 1)])).await.unwrap();
  orders.delete(&order.order_number).await.unwrap();

  let err = s.insert_order(&order).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::Conflict(_)));
  assert!(s.get_order(&order.order_number).await.unwrap().is_none());
}

#[tokio::test]
async fn gap_in_line_indices_fails_to_decode() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 5).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let order = orders.create(order_of(vec![line(a, 1), line(a, 1)])).await.unwrap();

  let number = order.order_number.clone();
  s.conn
    .call(move |conn| {
      conn.execute(
        "UPDATE order_lines SET line_index = 5 WHERE order_number = ?1 AND line_index = 1",
        rusqlite::params![number],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s.get_order(&order.order_number).await.unwrap_err();
  assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn orders_list_newest_first() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 10).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));

  let first = orders.create(order_of(vec![line(a, 1)])).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  let second = orders.create(order_of(vec![line(a, 1), line(a, 2)])).await.unwrap();

  let listed = orders.list().await.unwrap();
  let numbers: Vec<_> = listed.iter().map(|o| o.order_number.as_str()).collect();
  assert_eq!(numbers, [second.order_number.as_str(), first.order_number.as_str()]);
  assert_eq!(listed[0].products.len(), 2);
  assert_eq!(listed[0].products[1].quantity, 2);
}

#[tokio::test]
async fn duplicate_order_number_is_a_conflict() {
  let s = Arc::new(store().await);
  let a = stocked_size(&s, 10).await;
  let orders = OrderLifecycle::new(Arc::clone(&s));
  let order = orders.create(order_of(vec![line(a, 1)])).await.unwrap();

  let err = s.insert_order(&order).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::Conflict(_)));
}
