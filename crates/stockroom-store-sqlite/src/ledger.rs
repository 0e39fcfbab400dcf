//! [`InventoryLedger`] for [`SqliteStore`].
//!
//! Reservations are a single conditional `UPDATE` whose `WHERE` clause is the
//! precondition, so the check and the increment can never be split by another
//! writer. Multi-statement operations run inside one transaction and roll back
//! by dropping it.
//!
//! A reservation taken for an order is accounted for by a row in `holds`
//! while the order is being created, and afterwards by an order line with no
//! row in `settlements`. Reconciliation rebuilds `reserved` from those two
//! sources.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use stockroom_core::{
  Error as CoreError,
  inventory::{InventoryRow, LineKey, ReservationCorrection, StockDelta},
  store::InventoryLedger,
};
use uuid::Uuid;

use crate::{
  Error, Result, SqliteStore,
  encode::{INVENTORY_COLUMNS, decode_uuid, encode_dt, encode_uuid, inventory_row},
};

const COMMITTED: &str = "committed";
const RELEASED: &str = "released";

/// What a conditional write inside a connection closure ended up doing.
enum Conditional<T> {
  SizeMissing,
  Rejected,
  Applied(T),
}

fn size_is_live(conn: &rusqlite::Connection, size_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sizes WHERE size_id = ?1 AND is_deleted = 0",
        rusqlite::params![size_id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn select_row(
  conn: &rusqlite::Connection,
  size_id: &str,
  location: &str,
) -> rusqlite::Result<Option<InventoryRow>> {
  conn
    .query_row(
      &format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE size_id = ?1 AND location = ?2"
      ),
      rusqlite::params![size_id, location],
      inventory_row,
    )
    .optional()
}

fn reserve_in(
  conn: &rusqlite::Connection,
  size_id: &str,
  location: &str,
  qty: u32,
) -> rusqlite::Result<Conditional<()>> {
  let changed = conn.execute(
    "UPDATE inventory
        SET reserved = reserved + ?3
      WHERE size_id = ?1 AND location = ?2
        AND on_hand - reserved >= ?3
        AND EXISTS (
          SELECT 1 FROM sizes s WHERE s.size_id = ?1 AND s.is_deleted = 0
        )",
    rusqlite::params![size_id, location, qty],
  )?;
  if changed == 1 {
    return Ok(Conditional::Applied(()));
  }
  if !size_is_live(conn, size_id)? {
    return Ok(Conditional::SizeMissing);
  }
  Ok(Conditional::Rejected)
}

fn release_in(
  conn: &rusqlite::Connection,
  size_id: &str,
  location: &str,
  qty: i64,
) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE inventory SET reserved = MAX(reserved - ?3, 0)
      WHERE size_id = ?1 AND location = ?2",
    rusqlite::params![size_id, location, qty],
  )?;
  Ok(())
}

fn commit_in(
  conn: &rusqlite::Connection,
  size_id: &str,
  location: &str,
  qty: u32,
) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE inventory
        SET on_hand  = MAX(on_hand  - ?3, 0),
            reserved = MAX(reserved - ?3, 0)
      WHERE size_id = ?1 AND location = ?2",
    rusqlite::params![size_id, location, qty],
  )?;
  Ok(())
}

impl SqliteStore {
  /// Record `outcome` as the settlement of `key` and apply it to the row, in
  /// one transaction. Returns `false` if the line was already settled.
  async fn settle_line(
    &self,
    key:      &LineKey,
    size_id:  Uuid,
    location: &str,
    qty:      u32,
    outcome:  &'static str,
  ) -> Result<bool> {
    let order_number = key.order_number.clone();
    let line_index   = key.line_index;
    let id_str       = encode_uuid(size_id);
    let loc          = location.to_owned();
    let at_str       = encode_dt(Utc::now());

    let settled = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO settlements
             (order_number, line_index, size_id, location, quantity, outcome, settled_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![order_number, line_index, id_str, loc, qty, outcome, at_str],
        )?;
        if inserted == 0 {
          return Ok(false);
        }
        if outcome == COMMITTED {
          commit_in(&tx, &id_str, &loc, qty)?;
        } else {
          release_in(&tx, &id_str, &loc, i64::from(qty))?;
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(settled)
  }
}

impl InventoryLedger for SqliteStore {
  async fn get_row(&self, size_id: Uuid, location: &str) -> Result<Option<InventoryRow>> {
    let id_str   = encode_uuid(size_id);
    let location = location.to_owned();

    let row = self
      .conn
      .call(move |conn| Ok(select_row(conn, &id_str, &location)?))
      .await?;
    Ok(row)
  }

  async fn rows_for_size(&self, size_id: Uuid) -> Result<Vec<InventoryRow>> {
    let id_str = encode_uuid(size_id);

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE size_id = ?1 ORDER BY location"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], inventory_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn apply_delta(
    &self,
    size_id:  Uuid,
    location: &str,
    delta:    StockDelta,
  ) -> Result<InventoryRow> {
    let id_str   = encode_uuid(size_id);
    let loc      = location.to_owned();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !size_is_live(&tx, &id_str)? {
          return Ok(Conditional::SizeMissing);
        }

        tx.execute(
          "INSERT OR IGNORE INTO inventory (size_id, location) VALUES (?1, ?2)",
          rusqlite::params![id_str, loc],
        )?;
        let changed = tx.execute(
          "UPDATE inventory
              SET on_hand  = on_hand  + ?3,
                  on_order = on_order + ?4,
                  reserved = reserved + ?5
            WHERE size_id = ?1 AND location = ?2
              AND on_hand  + ?3 >= 0
              AND on_order + ?4 >= 0
              AND reserved + ?5 >= 0
              AND reserved + ?5 <= on_hand + ?3",
          rusqlite::params![id_str, loc, delta.on_hand, delta.on_order, delta.reserved],
        )?;
        if changed == 0 {
          // Dropping `tx` discards the baseline row inserted above.
          return Ok(Conditional::Rejected);
        }

        let row = select_row(&tx, &id_str, &loc)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Conditional::Applied(row))
      })
      .await?;

    match outcome {
      Conditional::Applied(row) => Ok(row),
      Conditional::SizeMissing => Err(CoreError::SizeNotFound(size_id).into()),
      Conditional::Rejected => Err(
        CoreError::InsufficientStock { size_id, location: location.to_owned() }.into(),
      ),
    }
  }

  async fn try_reserve(&self, size_id: Uuid, location: &str, qty: u32) -> Result<bool> {
    let id_str = encode_uuid(size_id);
    let loc    = location.to_owned();

    let outcome = self
      .conn
      .call(move |conn| Ok(reserve_in(conn, &id_str, &loc, qty)?))
      .await?;

    match outcome {
      Conditional::Applied(()) => Ok(true),
      Conditional::Rejected => Ok(false),
      Conditional::SizeMissing => Err(CoreError::SizeNotFound(size_id).into()),
    }
  }

  async fn try_hold(
    &self,
    key:      &LineKey,
    size_id:  Uuid,
    location: &str,
    qty:      u32,
  ) -> Result<bool> {
    let order_number = key.order_number.clone();
    let line_index   = key.line_index;
    let id_str       = encode_uuid(size_id);
    let loc          = location.to_owned();
    let at_str       = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = reserve_in(&tx, &id_str, &loc, qty)?;
        if let Conditional::Applied(()) = outcome {
          tx.execute(
            "INSERT INTO holds (order_number, line_index, size_id, location, quantity, held_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![order_number, line_index, id_str, loc, qty, at_str],
          )?;
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await
      .map_err(|e| {
        Error::conflict_on_constraint(e, || {
          format!("line {} of order {} is already held", key.line_index, key.order_number)
        })
      })?;

    match outcome {
      Conditional::Applied(()) => Ok(true),
      Conditional::Rejected => Ok(false),
      Conditional::SizeMissing => Err(CoreError::SizeNotFound(size_id).into()),
    }
  }

  async fn release_hold(&self, key: &LineKey) -> Result<bool> {
    let order_number = key.order_number.clone();
    let line_index   = key.line_index;

    let released = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some((size_id, location, qty)) = tx
          .query_row(
            "SELECT size_id, location, quantity FROM holds
              WHERE order_number = ?1 AND line_index = ?2",
            rusqlite::params![order_number, line_index],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
          )
          .optional()?
        else {
          return Ok(false);
        };
        tx.execute(
          "DELETE FROM holds WHERE order_number = ?1 AND line_index = ?2",
          rusqlite::params![order_number, line_index],
        )?;
        release_in(&tx, &size_id, &location, qty)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(released)
  }

  async fn release(&self, size_id: Uuid, location: &str, qty: u32) -> Result<()> {
    let id_str = encode_uuid(size_id);
    let loc    = location.to_owned();

    self
      .conn
      .call(move |conn| {
        release_in(conn, &id_str, &loc, i64::from(qty))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn commit(&self, size_id: Uuid, location: &str, qty: u32) -> Result<()> {
    let id_str = encode_uuid(size_id);
    let loc    = location.to_owned();

    self
      .conn
      .call(move |conn| {
        commit_in(conn, &id_str, &loc, qty)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn commit_line(
    &self,
    key:      &LineKey,
    size_id:  Uuid,
    location: &str,
    qty:      u32,
  ) -> Result<bool> {
    self.settle_line(key, size_id, location, qty, COMMITTED).await
  }

  async fn release_line(
    &self,
    key:      &LineKey,
    size_id:  Uuid,
    location: &str,
    qty:      u32,
  ) -> Result<bool> {
    self.settle_line(key, size_id, location, qty, RELEASED).await
  }

  async fn reconcile_reservations(&self) -> Result<Vec<ReservationCorrection>> {
    let cutoff_str = encode_dt(Utc::now() - self.hold_ttl);

    let (expired, changed): (usize, Vec<(String, String, i64, i64)>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let expired = tx.execute(
          "DELETE FROM holds WHERE held_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        let rows = {
          let mut stmt = tx.prepare(
            "SELECT i.size_id, i.location, i.on_hand, i.reserved,
                    COALESCE((
                      SELECT SUM(l.quantity)
                        FROM order_lines l
                       WHERE l.size_id  = i.size_id
                         AND l.location = i.location
                         AND NOT EXISTS (
                           SELECT 1 FROM settlements s
                            WHERE s.order_number = l.order_number
                              AND s.line_index   = l.line_index
                         )
                    ), 0)
                  + COALESCE((
                      SELECT SUM(h.quantity)
                        FROM holds h
                       WHERE h.size_id  = i.size_id
                         AND h.location = i.location
                    ), 0) AS outstanding
               FROM inventory i",
          )?;
          let rows = stmt
            .query_map([], |row| {
              Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
              ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        let mut changed = Vec::new();
        for (size_id, location, on_hand, reserved, outstanding) in rows {
          let expected = outstanding.min(on_hand);
          if expected == reserved {
            continue;
          }
          tx.execute(
            "UPDATE inventory SET reserved = ?3 WHERE size_id = ?1 AND location = ?2",
            rusqlite::params![size_id, location, expected],
          )?;
          changed.push((size_id, location, reserved, expected));
        }
        tx.commit()?;
        Ok((expired, changed))
      })
      .await?;

    if expired > 0 {
      tracing::warn!(expired, "dropped expired holds");
    }

    let now = Utc::now();
    let corrections = changed
      .into_iter()
      .map(|(size_id, location, previous, corrected)| {
        Ok(ReservationCorrection {
          size_id: decode_uuid(&size_id)?,
          location,
          previous,
          corrected,
          reconciled_at: now,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    for c in &corrections {
      tracing::warn!(
        size_id = %c.size_id,
        location = %c.location,
        previous = c.previous,
        corrected = c.corrected,
        "reservation count reconciled"
      );
    }
    Ok(corrections)
  }
}
