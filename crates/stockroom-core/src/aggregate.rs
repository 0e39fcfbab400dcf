//! Read-side rollups over the catalog and the ledger.
//!
//! Pure projection: nothing here writes, and nothing waits on ledger writers.
//! A view reflects each row as of the moment it was read.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error,
  catalog::{ProductView, SizeView, Variant, VariantView},
  store::{CatalogStore, InventoryLedger},
};

pub struct Aggregator<S> {
  store: Arc<S>,
}

impl<S> Clone for Aggregator<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: CatalogStore + InventoryLedger> Aggregator<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// A live size with its per-location rows and totals.
  pub async fn size_view(&self, size_id: Uuid) -> Result<SizeView, S::Error> {
    let size = self
      .store
      .get_size(size_id)
      .await?
      .filter(|s| !s.is_deleted)
      .ok_or(Error::SizeNotFound(size_id))?;
    let rows = self.store.rows_for_size(size_id).await?;
    Ok(SizeView::build(size, rows))
  }

  /// A live variant, looked up by SKU, with all its live sizes.
  pub async fn variant_view_by_sku(&self, sku: &str) -> Result<VariantView, S::Error> {
    let variant = self
      .store
      .get_variant_by_sku(sku)
      .await?
      .filter(|v| !v.is_deleted)
      .ok_or_else(|| Error::VariantSkuNotFound(sku.to_owned()))?;
    self.expand_variant(variant).await
  }

  /// A live variant with all its live sizes.
  pub async fn variant_view(&self, variant_id: Uuid) -> Result<VariantView, S::Error> {
    let variant = self
      .store
      .get_variant(variant_id)
      .await?
      .filter(|v| !v.is_deleted)
      .ok_or(Error::VariantNotFound(variant_id))?;
    self.expand_variant(variant).await
  }

  /// A live product joined down through its live variants and sizes.
  pub async fn product_view(&self, product_id: Uuid) -> Result<ProductView, S::Error> {
    let product = self
      .store
      .get_product(product_id)
      .await?
      .filter(|p| !p.is_deleted)
      .ok_or(Error::ProductNotFound(product_id))?;

    let mut variants = Vec::new();
    for variant in self.store.variants_for_product(product_id).await? {
      if variant.is_deleted {
        continue;
      }
      variants.push(self.expand_variant(variant).await?);
    }

    Ok(ProductView::build(product, variants))
  }

  async fn expand_variant(&self, variant: Variant) -> Result<VariantView, S::Error> {
    let mut sizes = Vec::new();
    for size in self.store.sizes_for_variant(variant.variant_id).await? {
      if size.is_deleted {
        continue;
      }
      let rows = self.store.rows_for_size(size.size_id).await?;
      sizes.push(SizeView::build(size, rows));
    }
    Ok(VariantView::build(variant, sizes))
  }
}
