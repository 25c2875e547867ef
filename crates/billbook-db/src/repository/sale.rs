//! # Sale Repository
//!
//! Committed sales, their frozen line snapshots, and the consumption records
//! linking purchase bills back to the sales that drew from them.
//!
//! ## Tables
//! ```text
//! sales              one row per sale; status committed → voided
//! sale_items         line snapshots (name, unit, rate, GST) frozen at commit
//! sale_lot_draws     every lot draw in FIFO order; kept after a void
//! sale_consumptions  (lot, sale) → quantity, amount; deleted on void
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{money_text, parse_money, parse_quantity, parse_rate, quantity_text};
use billbook_core::gst::GstSummary;
use billbook_core::{
    CommittedSale, ConsumedItem, GstDetails, LotConsumption, LotId, ResolvedLine, SaleConsumptionRecord,
    SaleStatus,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    organisation_id: String,
    status: SaleStatus,
    items_total_amount: String,
    discount_amount: String,
    bill_amount: String,
    gst_summary: Option<String>,
    created_at: DateTime<Utc>,
    voided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    product_code: String,
    name: String,
    unit: String,
    quantity: String,
    rate: String,
    mrp: String,
    cost: String,
    converted: String,
    stocked: bool,
    hsn: Option<String>,
    sgst: String,
    cgst: String,
    gst_inclusive: bool,
}

impl SaleItemRow {
    fn into_line(self) -> DbResult<ResolvedLine> {
        Ok(ResolvedLine {
            quantity: parse_quantity("sale_item.quantity", &self.quantity)?,
            rate: parse_money("sale_item.rate", &self.rate)?,
            mrp: parse_money("sale_item.mrp", &self.mrp)?,
            cost: parse_money("sale_item.cost", &self.cost)?,
            converted: parse_quantity("sale_item.converted", &self.converted)?,
            gst: GstDetails {
                hsn: self.hsn,
                sgst: parse_rate("sale_item.sgst", &self.sgst)?,
                cgst: parse_rate("sale_item.cgst", &self.cgst)?,
                inclusive: self.gst_inclusive,
            },
            product_code: self.product_code,
            name: self.name,
            unit: self.unit,
            stocked: self.stocked,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DrawRow {
    lot_id: String,
    purchase_bill_id: String,
    product_code: String,
    quantity_taken: String,
    unit_cost: String,
}

impl TryFrom<DrawRow> for LotConsumption {
    type Error = DbError;

    fn try_from(row: DrawRow) -> DbResult<Self> {
        Ok(LotConsumption {
            quantity_taken: parse_quantity("quantity_taken", &row.quantity_taken)?,
            unit_cost: parse_money("unit_cost", &row.unit_cost)?,
            lot_id: LotId::from(row.lot_id),
            purchase_bill_id: row.purchase_bill_id,
            product_code: row.product_code,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConsumptionRow {
    purchase_bill_id: String,
    sale_id: String,
    lot_id: String,
    product_code: String,
    quantity: String,
    amount: String,
}

/// Folds rows into one record per `(purchase_bill_id, sale_id)`, keeping the
/// order in which each pair first appears.
fn group_records(rows: Vec<ConsumptionRow>) -> DbResult<Vec<SaleConsumptionRecord>> {
    let mut records: Vec<SaleConsumptionRecord> = Vec::new();

    for row in rows {
        let item = ConsumedItem {
            quantity: parse_quantity("consumption.quantity", &row.quantity)?,
            amount: parse_money("consumption.amount", &row.amount)?,
            lot_id: LotId::from(row.lot_id),
            product_code: row.product_code,
        };

        match records
            .iter_mut()
            .find(|r| r.purchase_bill_id == row.purchase_bill_id && r.sale_id == row.sale_id)
        {
            Some(record) => record.items.push(item),
            None => {
                let mut record = SaleConsumptionRecord::new(row.purchase_bill_id, row.sale_id);
                record.items.push(item);
                records.push(record);
            }
        }
    }

    Ok(records)
}

const CONSUMPTION_COLUMNS: &str = "c.purchase_bill_id, c.sale_id, c.lot_id, c.product_code, c.quantity, c.amount";

// =============================================================================
// Repository
// =============================================================================

/// Read access to sales and consumption records.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its lines and lot draws.
    pub async fn get(&self, organisation_id: &str, sale_id: &str) -> DbResult<Option<CommittedSale>> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, organisation_id, sale_id).await
    }

    /// Consumption records of one sale, one per purchase bill.
    pub async fn records_for_sale(&self, sale_id: &str) -> DbResult<Vec<SaleConsumptionRecord>> {
        let mut conn = self.pool.acquire().await?;
        records_for_sale(&mut conn, sale_id).await
    }

    /// Consumption records of a purchase bill, one per sale.
    pub async fn records_for_bill(&self, purchase_bill_id: &str) -> DbResult<Vec<SaleConsumptionRecord>> {
        let rows: Vec<ConsumptionRow> = sqlx::query_as(&format!(
            "SELECT {CONSUMPTION_COLUMNS} FROM sale_consumptions c WHERE c.purchase_bill_id = ?1 ORDER BY c.rowid"
        ))
        .bind(purchase_bill_id)
        .fetch_all(&self.pool)
        .await?;

        group_records(rows)
    }

    /// Distinct product codes with consumption records for a sale.
    ///
    /// Empty once the sale is voided.
    pub async fn product_codes(&self, sale_id: &str) -> DbResult<Vec<String>> {
        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT product_code FROM sale_consumptions WHERE sale_id = ?1 ORDER BY product_code",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Loads a sale with its frozen lines and lot draws.
pub async fn get(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    sale_id: &str,
) -> DbResult<Option<CommittedSale>> {
    let row: Option<SaleRow> = sqlx::query_as(
        r#"
        SELECT id, organisation_id, status, items_total_amount, discount_amount,
               bill_amount, gst_summary, created_at, voided_at
        FROM sales
        WHERE organisation_id = ?1 AND id = ?2
        "#,
    )
    .bind(organisation_id)
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items: Vec<SaleItemRow> = sqlx::query_as(
        r#"
        SELECT product_code, name, unit, quantity, rate, mrp, cost, converted,
               stocked, hsn, sgst, cgst, gst_inclusive
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    let draws: Vec<DrawRow> = sqlx::query_as(
        r#"
        SELECT lot_id, purchase_bill_id, product_code, quantity_taken, unit_cost
        FROM sale_lot_draws
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    let gst_summary = match row.gst_summary.as_deref() {
        Some(json) => Some(serde_json::from_str::<GstSummary>(json)?),
        None => None,
    };

    Ok(Some(CommittedSale {
        items_total_amount: parse_money("items_total_amount", &row.items_total_amount)?,
        discount_amount: parse_money("discount_amount", &row.discount_amount)?,
        bill_amount: parse_money("bill_amount", &row.bill_amount)?,
        lines: items
            .into_iter()
            .map(SaleItemRow::into_line)
            .collect::<DbResult<_>>()?,
        consumptions: draws
            .into_iter()
            .map(LotConsumption::try_from)
            .collect::<DbResult<_>>()?,
        gst_summary,
        id: row.id,
        organisation_id: row.organisation_id,
        status: row.status,
        created_at: row.created_at,
        voided_at: row.voided_at,
    }))
}

/// Writes the sale header, line snapshots and lot draws.
pub async fn insert(conn: &mut SqliteConnection, sale: &CommittedSale) -> DbResult<()> {
    debug!(
        sale_id = %sale.id,
        lines = sale.lines.len(),
        draws = sale.consumptions.len(),
        "Inserting sale"
    );

    let gst_summary = sale
        .gst_summary
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| DbError::Unexpected(err.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, organisation_id, status, items_total_amount, discount_amount,
            bill_amount, gst_summary, created_at, voided_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.organisation_id)
    .bind(sale.status)
    .bind(money_text(sale.items_total_amount))
    .bind(money_text(sale.discount_amount))
    .bind(money_text(sale.bill_amount))
    .bind(gst_summary)
    .bind(sale.created_at)
    .bind(sale.voided_at)
    .execute(&mut *conn)
    .await?;

    for (position, line) in sale.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                sale_id, position, product_code, name, unit, quantity,
                rate, mrp, cost, converted, amount, stocked,
                hsn, sgst, cgst, gst_inclusive
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(&line.product_code)
        .bind(&line.name)
        .bind(&line.unit)
        .bind(quantity_text(line.quantity))
        .bind(money_text(line.rate))
        .bind(money_text(line.mrp))
        .bind(money_text(line.cost))
        .bind(quantity_text(line.converted))
        .bind(money_text(line.amount()))
        .bind(line.stocked)
        .bind(&line.gst.hsn)
        .bind(line.gst.sgst.percentage().to_string())
        .bind(line.gst.cgst.percentage().to_string())
        .bind(line.gst.inclusive)
        .execute(&mut *conn)
        .await?;
    }

    for (position, draw) in sale.consumptions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_lot_draws (
                sale_id, position, lot_id, purchase_bill_id, product_code, quantity_taken, unit_cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(draw.lot_id.as_str())
        .bind(&draw.purchase_bill_id)
        .bind(&draw.product_code)
        .bind(quantity_text(draw.quantity_taken))
        .bind(money_text(draw.unit_cost))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Stores consumption records. An existing `(lot, sale)` row is extended.
pub async fn insert_records(conn: &mut SqliteConnection, records: &[SaleConsumptionRecord]) -> DbResult<()> {
    for record in records {
        for item in &record.items {
            let existing: Option<(String, String)> = sqlx::query_as(
                "SELECT quantity, amount FROM sale_consumptions WHERE lot_id = ?1 AND sale_id = ?2",
            )
            .bind(item.lot_id.as_str())
            .bind(&record.sale_id)
            .fetch_optional(&mut *conn)
            .await?;

            match existing {
                Some((quantity, amount)) => {
                    let quantity = parse_quantity("consumption.quantity", &quantity)? + item.quantity;
                    let amount = parse_money("consumption.amount", &amount)? + item.amount;
                    sqlx::query(
                        "UPDATE sale_consumptions SET quantity = ?3, amount = ?4 WHERE lot_id = ?1 AND sale_id = ?2",
                    )
                    .bind(item.lot_id.as_str())
                    .bind(&record.sale_id)
                    .bind(quantity_text(quantity))
                    .bind(money_text(amount))
                    .execute(&mut *conn)
                    .await?;
                }
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO sale_consumptions (
                            purchase_bill_id, sale_id, lot_id, product_code, quantity, amount
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        "#,
                    )
                    .bind(&record.purchase_bill_id)
                    .bind(&record.sale_id)
                    .bind(item.lot_id.as_str())
                    .bind(&item.product_code)
                    .bind(quantity_text(item.quantity))
                    .bind(money_text(item.amount))
                    .execute(&mut *conn)
                    .await?;
                }
            }
        }
    }
    Ok(())
}

/// Consumption records of one sale, one per purchase bill.
pub async fn records_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleConsumptionRecord>> {
    let rows: Vec<ConsumptionRow> = sqlx::query_as(&format!(
        "SELECT {CONSUMPTION_COLUMNS} FROM sale_consumptions c WHERE c.sale_id = ?1 ORDER BY c.rowid"
    ))
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    group_records(rows)
}

/// Every live consumption record touching a product's lots.
pub async fn records_for_product(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    product_code: &str,
) -> DbResult<Vec<SaleConsumptionRecord>> {
    let rows: Vec<ConsumptionRow> = sqlx::query_as(&format!(
        r#"
        SELECT {CONSUMPTION_COLUMNS}
        FROM sale_consumptions c
        JOIN sales s ON s.id = c.sale_id
        WHERE s.organisation_id = ?1 AND c.product_code = ?2 AND s.status = 'committed'
        ORDER BY c.rowid
        "#
    ))
    .bind(organisation_id)
    .bind(product_code)
    .fetch_all(&mut *conn)
    .await?;

    group_records(rows)
}

/// Removes every consumption record of a sale.
pub async fn delete_records_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM sale_consumptions WHERE sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    debug!(sale_id = %sale_id, removed = result.rows_affected(), "Deleted consumption records");
    Ok(result.rows_affected())
}

/// Current status of a sale, if it exists.
pub async fn status(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    sale_id: &str,
) -> DbResult<Option<SaleStatus>> {
    let status: Option<SaleStatus> =
        sqlx::query_scalar("SELECT status FROM sales WHERE organisation_id = ?1 AND id = ?2")
            .bind(organisation_id)
            .bind(sale_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(status)
}

/// Flips a committed sale to voided.
pub async fn mark_voided(conn: &mut SqliteConnection, sale_id: &str, voided_at: DateTime<Utc>) -> DbResult<()> {
    let result = sqlx::query("UPDATE sales SET status = ?2, voided_at = ?3 WHERE id = ?1 AND status = ?4")
        .bind(sale_id)
        .bind(SaleStatus::Voided)
        .bind(voided_at)
        .bind(SaleStatus::Committed)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!("sale {sale_id} changed status during void")));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
