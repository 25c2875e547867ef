//! # Purchase Lot Repository
//!
//! Purchase bills, their lots, and compare-and-swap lot writes.
//!
//! ## Compare-and-Swap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Take { lot, qty, expected_revision: 3 }                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE purchase_lots                                                  │
//! │     SET remaining_in_stock = ?, revision = revision + 1                │
//! │   WHERE id = ? AND revision = 3                                        │
//! │       │                                                                 │
//! │       ├── 1 row  → applied, lot now at revision 4                      │
//! │       └── 0 rows → someone else moved the lot → DbError::Conflict      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lots are append-only: there is no delete.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{money_text, parse_money, parse_quantity, quantity_text};
use billbook_core::ledger::LedgerMutation;
use billbook_core::{CoreError, LotId, PurchaseBill, PurchaseLot, Quantity};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct LotRow {
    seq: i64,
    id: String,
    organisation_id: String,
    purchase_bill_id: String,
    product_code: String,
    quantity_received: String,
    remaining_in_stock: String,
    unit_cost: String,
    received_at: DateTime<Utc>,
    revision: i64,
}

impl TryFrom<LotRow> for PurchaseLot {
    type Error = DbError;

    fn try_from(row: LotRow) -> DbResult<Self> {
        Ok(PurchaseLot {
            quantity_received: parse_quantity("quantity_received", &row.quantity_received)?,
            remaining_in_stock: parse_quantity("remaining_in_stock", &row.remaining_in_stock)?,
            unit_cost: parse_money("unit_cost", &row.unit_cost)?,
            id: LotId::from(row.id),
            organisation_id: row.organisation_id,
            purchase_bill_id: row.purchase_bill_id,
            product_code: row.product_code,
            received_at: row.received_at,
            sequence: row.seq,
            revision: row.revision,
        })
    }
}

const LOT_COLUMNS: &str = r#"
    seq, id, organisation_id, purchase_bill_id, product_code,
    quantity_received, remaining_in_stock, unit_cost, received_at, revision
"#;

fn into_lots(rows: Vec<LotRow>) -> DbResult<Vec<PurchaseLot>> {
    rows.into_iter().map(PurchaseLot::try_from).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to purchase lots.
#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    /// Creates a new LotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    /// Lots of one product in FIFO order.
    pub async fn list_for_product(&self, organisation_id: &str, code: &str) -> DbResult<Vec<PurchaseLot>> {
        let mut conn = self.pool.acquire().await?;
        load_for_products(&mut conn, organisation_id, &[code.to_string()]).await
    }

    /// Gets a lot by id.
    pub async fn get(&self, lot_id: &LotId) -> DbResult<Option<PurchaseLot>> {
        let row: Option<LotRow> = sqlx::query_as(&format!(
            "SELECT {LOT_COLUMNS} FROM purchase_lots WHERE id = ?1"
        ))
        .bind(lot_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PurchaseLot::try_from).transpose()
    }

    /// Lots created by one purchase bill.
    pub async fn list_for_bill(&self, purchase_bill_id: &str) -> DbResult<Vec<PurchaseLot>> {
        let rows: Vec<LotRow> = sqlx::query_as(&format!(
            "SELECT {LOT_COLUMNS} FROM purchase_lots WHERE purchase_bill_id = ?1 ORDER BY seq"
        ))
        .bind(purchase_bill_id)
        .fetch_all(&self.pool)
        .await?;

        into_lots(rows)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Loads every lot of the given products, FIFO ordered per product.
pub async fn load_for_products(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    codes: &[String],
) -> DbResult<Vec<PurchaseLot>> {
    let mut lots = Vec::new();
    for code in codes {
        let rows: Vec<LotRow> = sqlx::query_as(&format!(
            r#"
            SELECT {LOT_COLUMNS}
            FROM purchase_lots
            WHERE organisation_id = ?1 AND product_code = ?2
            ORDER BY received_at, seq
            "#
        ))
        .bind(organisation_id)
        .bind(code)
        .fetch_all(&mut *conn)
        .await?;

        lots.extend(into_lots(rows)?);
    }
    Ok(lots)
}

/// Loads lots by id. Unknown ids are reported as `LotNotFound`.
pub async fn load_by_ids(conn: &mut SqliteConnection, ids: &[LotId]) -> DbResult<Vec<PurchaseLot>> {
    let mut lots = Vec::with_capacity(ids.len());
    for id in ids {
        let row: Option<LotRow> = sqlx::query_as(&format!(
            "SELECT {LOT_COLUMNS} FROM purchase_lots WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => lots.push(PurchaseLot::try_from(row)?),
            None => return Err(CoreError::LotNotFound(id.to_string()).into()),
        }
    }
    Ok(lots)
}

/// Inserts a purchase bill header.
pub async fn insert_bill(conn: &mut SqliteConnection, bill: &PurchaseBill) -> DbResult<()> {
    debug!(id = %bill.id, bill_amount = %bill.bill_amount, "Inserting purchase bill");

    sqlx::query(
        r#"
        INSERT INTO purchase_bills (
            id, organisation_id, items_total_amount, discount_amount, bill_amount, received_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&bill.id)
    .bind(&bill.organisation_id)
    .bind(money_text(bill.items_total_amount))
    .bind(money_text(bill.discount_amount))
    .bind(money_text(bill.bill_amount))
    .bind(bill.received_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Appends a lot and returns its storage sequence (the FIFO tie-breaker).
pub async fn insert(conn: &mut SqliteConnection, lot: &PurchaseLot) -> DbResult<i64> {
    debug!(
        lot_id = %lot.id,
        product_code = %lot.product_code,
        quantity = %lot.quantity_received,
        "Inserting purchase lot"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO purchase_lots (
            id, organisation_id, purchase_bill_id, product_code,
            quantity_received, remaining_in_stock, unit_cost, received_at, revision
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
        "#,
    )
    .bind(lot.id.as_str())
    .bind(&lot.organisation_id)
    .bind(&lot.purchase_bill_id)
    .bind(&lot.product_code)
    .bind(quantity_text(lot.quantity_received))
    .bind(quantity_text(lot.remaining_in_stock))
    .bind(money_text(lot.unit_cost))
    .bind(lot.received_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Applies one ledger mutation with a compare-and-swap on `revision`.
pub async fn apply_mutation(conn: &mut SqliteConnection, mutation: &LedgerMutation) -> DbResult<()> {
    let (lot_id, delta, expected_revision) = match mutation {
        LedgerMutation::Create(lot) => {
            insert(conn, lot).await?;
            return Ok(());
        }
        LedgerMutation::Take {
            lot_id,
            quantity,
            expected_revision,
        } => (lot_id, -*quantity, *expected_revision),
        LedgerMutation::Restore {
            lot_id,
            quantity,
            expected_revision,
        } => (lot_id, *quantity, *expected_revision),
    };

    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT quantity_received, remaining_in_stock FROM purchase_lots WHERE id = ?1 AND revision = ?2",
    )
    .bind(lot_id.as_str())
    .bind(expected_revision)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((received, remaining)) = row else {
        return Err(DbError::conflict(format!(
            "lot {lot_id} moved past revision {expected_revision}"
        )));
    };

    let received = parse_quantity("quantity_received", &received)?;
    let remaining: Quantity = parse_quantity("remaining_in_stock", &remaining)? + delta;
    if remaining.is_negative() || remaining > received {
        return Err(CoreError::invariant(format!(
            "lot {lot_id} would hold {remaining} of {received}"
        ))
        .into());
    }

    let result = sqlx::query(
        r#"
        UPDATE purchase_lots
        SET remaining_in_stock = ?3, revision = revision + 1
        WHERE id = ?1 AND revision = ?2
        "#,
    )
    .bind(lot_id.as_str())
    .bind(expected_revision)
    .bind(quantity_text(remaining))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "lot {lot_id} moved past revision {expected_revision}"
        )));
    }

    debug!(lot_id = %lot_id, delta = %delta, remaining = %remaining, "Applied lot mutation");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
