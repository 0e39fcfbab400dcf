//! [`CatalogStore`] for [`SqliteStore`], including the cascade archive.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use stockroom_core::{
  Error as CoreError,
  archive::{ArchiveEntry, DocumentKind},
  catalog::{NewProduct, NewSize, NewVariant, Product, ProductStatus, Size, Variant},
  store::CatalogStore,
};
use uuid::Uuid;

use crate::{
  Error, Result, SqliteStore,
  encode::{
    ARCHIVE_COLUMNS, INVENTORY_COLUMNS, PRODUCT_COLUMNS, RawArchive, RawProduct, RawSize,
    RawVariant, SIZE_COLUMNS, VARIANT_COLUMNS, encode_dt, encode_product_status, encode_uuid,
    inventory_row,
  },
};

// ─── Cascade archive ─────────────────────────────────────────────────────────

/// Where a cascade archive starts.
#[derive(Debug, Clone, Copy)]
enum Root {
  Product,
  Variant,
  Size,
}

impl Root {
  fn not_found(self, id: Uuid) -> CoreError {
    match self {
      Root::Product => CoreError::ProductNotFound(id),
      Root::Variant => CoreError::VariantNotFound(id),
      Root::Size => CoreError::SizeNotFound(id),
    }
  }
}

fn live_variants(conn: &rusqlite::Connection, product_id: &str) -> rusqlite::Result<Vec<RawVariant>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {VARIANT_COLUMNS} FROM variants WHERE product_id = ?1 AND is_deleted = 0"
  ))?;
  let rows = stmt
    .query_map(rusqlite::params![product_id], RawVariant::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn live_sizes(conn: &rusqlite::Connection, variant_id: &str) -> rusqlite::Result<Vec<RawSize>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SIZE_COLUMNS} FROM sizes WHERE variant_id = ?1 AND is_deleted = 0"
  ))?;
  let rows = stmt
    .query_map(rusqlite::params![variant_id], RawSize::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Snapshot and soft-delete `root` and every live descendant inside `tx`.
/// Returns `None` if the root is absent or already deleted.
fn cascade(
  tx:         &rusqlite::Transaction<'_>,
  root:       Root,
  id:         &str,
  deleted_by: &str,
  at:         &str,
) -> rusqlite::Result<Option<Vec<RawArchive>>> {
  let mut product: Option<RawProduct> = None;
  let mut variants: Vec<RawVariant> = Vec::new();
  let mut sizes: Vec<RawSize> = Vec::new();

  match root {
    Root::Product => {
      let Some(p) = tx
        .query_row(
          &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1 AND is_deleted = 0"),
          rusqlite::params![id],
          RawProduct::from_row,
        )
        .optional()?
      else {
        return Ok(None);
      };
      variants = live_variants(tx, &p.product_id)?;
      product = Some(p);
    }
    Root::Variant => {
      let Some(v) = tx
        .query_row(
          &format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE variant_id = ?1 AND is_deleted = 0"),
          rusqlite::params![id],
          RawVariant::from_row,
        )
        .optional()?
      else {
        return Ok(None);
      };
      variants.push(v);
    }
    Root::Size => {
      let Some(s) = tx
        .query_row(
          &format!("SELECT {SIZE_COLUMNS} FROM sizes WHERE size_id = ?1 AND is_deleted = 0"),
          rusqlite::params![id],
          RawSize::from_row,
        )
        .optional()?
      else {
        return Ok(None);
      };
      sizes.push(s);
    }
  }

  for v in &variants {
    sizes.extend(live_sizes(tx, &v.variant_id)?);
  }

  let mut entries = Vec::with_capacity(1 + variants.len() + sizes.len());

  if let Some(p) = &product {
    entries.push(RawArchive::new(DocumentKind::Product, &p.product_id, &p.snapshot(), deleted_by, at));
    tx.execute(
      "UPDATE products SET is_deleted = 1, status = ?2 WHERE product_id = ?1",
      rusqlite::params![p.product_id, encode_product_status(ProductStatus::Archived)],
    )?;
  }

  for v in &variants {
    entries.push(RawArchive::new(DocumentKind::Variant, &v.variant_id, &v.snapshot(), deleted_by, at));
    tx.execute(
      "UPDATE variants SET is_deleted = 1 WHERE variant_id = ?1",
      rusqlite::params![v.variant_id],
    )?;
  }

  for s in &sizes {
    let inventory = {
      let mut stmt = tx.prepare(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE size_id = ?1 ORDER BY location"
      ))?;
      let rows = stmt
        .query_map(rusqlite::params![s.size_id], inventory_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      rows
    };
    entries.push(RawArchive::new(
      DocumentKind::Size,
      &s.size_id,
      &s.snapshot(&inventory),
      deleted_by,
      at,
    ));
    tx.execute(
      "UPDATE sizes SET is_deleted = 1 WHERE size_id = ?1",
      rusqlite::params![s.size_id],
    )?;
  }

  for e in &entries {
    tx.execute(
      "INSERT INTO archive (archive_id, kind, original_id, snapshot, deleted_by, recorded_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![e.archive_id, e.kind, e.original_id, e.snapshot, e.deleted_by, e.recorded_at],
    )?;
  }

  Ok(Some(entries))
}

impl SqliteStore {
  async fn archive(&self, root: Root, id: Uuid, deleted_by: &str) -> Result<Vec<ArchiveEntry>> {
    let id_str     = encode_uuid(id);
    let deleted_by = deleted_by.to_owned();
    let at_str     = encode_dt(Utc::now());

    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(entries) = cascade(&tx, root, &id_str, &deleted_by, &at_str)? else {
          return Ok(None);
        };
        tx.commit()?;
        Ok(Some(entries))
      })
      .await?
      .ok_or_else(|| Error::from(root.not_found(id)))?;

    tracing::info!(?root, %id, documents = raws.len(), "archived");
    raws.into_iter().map(RawArchive::into_entry).collect()
  }

  async fn query_one<T, F>(&self, sql: String, id: String, map: F) -> Result<Option<T>>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let raw = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, rusqlite::params![id], map).optional()?))
      .await?;
    Ok(raw)
  }

  async fn query_many<T, F>(&self, sql: String, id: String, map: F) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id], map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws)
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  // ── Products ──────────────────────────────────────────────────────────────

  async fn create_product(&self, input: NewProduct) -> Result<Product> {
    input.validate()?;
    let product = Product {
      product_id:   Uuid::new_v4(),
      style_number: input.style_number,
      name:         input.name,
      status:       input.status,
      is_deleted:   false,
      created_at:   Utc::now(),
    };

    let id_str     = encode_uuid(product.product_id);
    let style      = product.style_number.clone();
    let name       = product.name.clone();
    let status_str = encode_product_status(product.status);
    let at_str     = encode_dt(product.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO products (product_id, style_number, name, status, is_deleted, created_at)
           VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          rusqlite::params![id_str, style, name, status_str, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| {
        Error::conflict_on_constraint(e, || {
          format!("style number {:?} already exists", product.style_number)
        })
      })?;

    Ok(product)
  }

  async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
    self
      .query_one(
        format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"),
        encode_uuid(id),
        RawProduct::from_row,
      )
      .await?
      .map(RawProduct::into_product)
      .transpose()
  }

  async fn set_product_status(
    &self,
    id:         Uuid,
    status:     ProductStatus,
    changed_by: &str,
  ) -> Result<Product> {
    if status == ProductStatus::Archived {
      self.archive(Root::Product, id, changed_by).await?;
    } else {
      let id_str     = encode_uuid(id);
      let status_str = encode_product_status(status);
      let changed = self
        .conn
        .call(move |conn| {
          Ok(conn.execute(
            "UPDATE products SET status = ?2 WHERE product_id = ?1 AND is_deleted = 0",
            rusqlite::params![id_str, status_str],
          )?)
        })
        .await?;
      if changed == 0 {
        return Err(CoreError::ProductNotFound(id).into());
      }
      tracing::info!(product_id = %id, %status, %changed_by, "product status changed");
    }

    self
      .get_product(id)
      .await?
      .ok_or_else(|| CoreError::ProductNotFound(id).into())
  }

  // ── Variants ──────────────────────────────────────────────────────────────

  async fn create_variant(&self, input: NewVariant) -> Result<Variant> {
    input.validate()?;
    let variant = Variant {
      variant_id: Uuid::new_v4(),
      product_id: input.product_id,
      sku:        input.sku,
      color:      input.color,
      is_deleted: false,
      created_at: Utc::now(),
    };

    let id_str      = encode_uuid(variant.variant_id);
    let product_str = encode_uuid(variant.product_id);
    let sku         = variant.sku.clone();
    let color       = variant.color.clone();
    let at_str      = encode_dt(variant.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO variants (variant_id, product_id, sku, color, is_deleted, created_at)
           SELECT ?1, ?2, ?3, ?4, 0, ?5
            WHERE EXISTS (SELECT 1 FROM products WHERE product_id = ?2 AND is_deleted = 0)",
          rusqlite::params![id_str, product_str, sku, color, at_str],
        )?)
      })
      .await
      .map_err(|e| {
        Error::conflict_on_constraint(e, || format!("sku {:?} already exists", variant.sku))
      })?;

    if inserted == 0 {
      return Err(CoreError::ProductNotFound(variant.product_id).into());
    }
    Ok(variant)
  }

  async fn get_variant(&self, id: Uuid) -> Result<Option<Variant>> {
    self
      .query_one(
        format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE variant_id = ?1"),
        encode_uuid(id),
        RawVariant::from_row,
      )
      .await?
      .map(RawVariant::into_variant)
      .transpose()
  }

  async fn get_variant_by_sku(&self, sku: &str) -> Result<Option<Variant>> {
    self
      .query_one(
        format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE sku = ?1"),
        sku.to_owned(),
        RawVariant::from_row,
      )
      .await?
      .map(RawVariant::into_variant)
      .transpose()
  }

  async fn variants_for_product(&self, product_id: Uuid) -> Result<Vec<Variant>> {
    self
      .query_many(
        format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE product_id = ?1 ORDER BY sku"),
        encode_uuid(product_id),
        RawVariant::from_row,
      )
      .await?
      .into_iter()
      .map(RawVariant::into_variant)
      .collect()
  }

  // ── Sizes ─────────────────────────────────────────────────────────────────

  async fn create_size(&self, input: NewSize) -> Result<Size> {
    input.validate()?;
    let size = Size {
      size_id:    Uuid::new_v4(),
      variant_id: input.variant_id,
      label:      input.label,
      is_deleted: false,
      created_at: Utc::now(),
    };

    let id_str      = encode_uuid(size.size_id);
    let variant_str = encode_uuid(size.variant_id);
    let label       = size.label.clone();
    let at_str      = encode_dt(size.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO sizes (size_id, variant_id, label, is_deleted, created_at)
           SELECT ?1, ?2, ?3, 0, ?4
            WHERE EXISTS (SELECT 1 FROM variants WHERE variant_id = ?2 AND is_deleted = 0)",
          rusqlite::params![id_str, variant_str, label, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(CoreError::VariantNotFound(size.variant_id).into());
    }
    Ok(size)
  }

  async fn get_size(&self, id: Uuid) -> Result<Option<Size>> {
    self
      .query_one(
        format!("SELECT {SIZE_COLUMNS} FROM sizes WHERE size_id = ?1"),
        encode_uuid(id),
        RawSize::from_row,
      )
      .await?
      .map(RawSize::into_size)
      .transpose()
  }

  async fn sizes_for_variant(&self, variant_id: Uuid) -> Result<Vec<Size>> {
    self
      .query_many(
        format!("SELECT {SIZE_COLUMNS} FROM sizes WHERE variant_id = ?1 ORDER BY label"),
        encode_uuid(variant_id),
        RawSize::from_row,
      )
      .await?
      .into_iter()
      .map(RawSize::into_size)
      .collect()
  }

  // ── Archive ───────────────────────────────────────────────────────────────

  async fn archive_product(&self, id: Uuid, deleted_by: &str) -> Result<Vec<ArchiveEntry>> {
    self.archive(Root::Product, id, deleted_by).await
  }

  async fn archive_variant(&self, id: Uuid, deleted_by: &str) -> Result<Vec<ArchiveEntry>> {
    self.archive(Root::Variant, id, deleted_by).await
  }

  async fn archive_size(&self, id: Uuid, deleted_by: &str) -> Result<Vec<ArchiveEntry>> {
    self.archive(Root::Size, id, deleted_by).await
  }

  async fn archive_entries(&self, original_id: Uuid) -> Result<Vec<ArchiveEntry>> {
    self
      .query_many(
        format!(
          "SELECT {ARCHIVE_COLUMNS} FROM archive WHERE original_id = ?1
           ORDER BY recorded_at, rowid"
        ),
        encode_uuid(original_id),
        RawArchive::from_row,
      )
      .await?
      .into_iter()
      .map(RawArchive::into_entry)
      .collect()
  }
}
