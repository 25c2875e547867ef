//! # Product Repository
//!
//! Database operations for products, their alternate units, GST details and
//! the denormalized stock counter.
//!
//! ## Stock Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.stock is a CACHE                                              │
//! │                                                                         │
//! │  purchase   ──► stock += received      (adjust_stock)                  │
//! │  commit     ──► stock −= converted     (adjust_stock)                  │
//! │  void       ──► stock += restored      (adjust_stock)                  │
//! │  reconcile  ──► stock  = Σ lots.remaining_in_stock   (set_stock)       │
//! │                                                                         │
//! │  Lots are the source of truth; the counter may only lag, never lead.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{money_text, parse_decimal, parse_money, parse_quantity, parse_rate, quantity_text};
use billbook_core::validation::{
    validate_conversion, validate_non_negative_money, validate_product_code, validate_product_name,
    validate_tax_rate, validate_unique_units,
};
use billbook_core::{CoreError, GstDetails, Product, Quantity, Unit};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    organisation_id: String,
    code: String,
    name: String,
    primary_unit: String,
    rate: String,
    mrp: String,
    cost: String,
    stocked: bool,
    stock: String,
    hsn: Option<String>,
    sgst: String,
    cgst: String,
    gst_inclusive: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct UnitRow {
    name: String,
    rate: String,
    mrp: String,
    cost: String,
    conversion: String,
}

impl UnitRow {
    fn into_unit(self) -> DbResult<Unit> {
        Ok(Unit {
            rate: parse_money("unit.rate", &self.rate)?,
            mrp: parse_money("unit.mrp", &self.mrp)?,
            cost: parse_money("unit.cost", &self.cost)?,
            conversion: parse_decimal("unit.conversion", &self.conversion)?,
            name: self.name,
        })
    }
}

impl ProductRow {
    fn into_product(self, units: Vec<Unit>) -> DbResult<Product> {
        Ok(Product {
            rate: parse_money("rate", &self.rate)?,
            mrp: parse_money("mrp", &self.mrp)?,
            cost: parse_money("cost", &self.cost)?,
            stock: parse_quantity("stock", &self.stock)?,
            gst: GstDetails {
                hsn: self.hsn,
                sgst: parse_rate("sgst", &self.sgst)?,
                cgst: parse_rate("cgst", &self.cgst)?,
                inclusive: self.gst_inclusive,
            },
            id: self.id,
            organisation_id: self.organisation_id,
            code: self.code,
            name: self.name,
            primary_unit: self.primary_unit,
            units,
            stocked: self.stocked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = r#"
    id, organisation_id, code, name, primary_unit,
    rate, mrp, cost, stocked, stock,
    hsn, sgst, cgst, gst_inclusive,
    created_at, updated_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product and its units.
    ///
    /// ## Errors
    /// - `Core(Validation)` for a bad code, name, unit, price or tax rate
    /// - `UniqueViolation` if the code already exists in the organisation
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;

        debug!(code = %product.code, organisation_id = %product.organisation_id, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, organisation_id, code, name, primary_unit,
                rate, mrp, cost, stocked, stock,
                hsn, sgst, cgst, gst_inclusive,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.organisation_id)
        .bind(product.code.trim())
        .bind(product.name.trim())
        .bind(&product.primary_unit)
        .bind(money_text(product.rate))
        .bind(money_text(product.mrp))
        .bind(money_text(product.cost))
        .bind(product.stocked)
        .bind(quantity_text(product.stock))
        .bind(&product.gst.hsn)
        .bind(product.gst.sgst.percentage().to_string())
        .bind(product.gst.cgst.percentage().to_string())
        .bind(product.gst.inclusive)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.code.clone(),
            },
            other => other,
        })?;

        for (position, unit) in product.units.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_units (product_id, position, name, rate, mrp, cost, conversion)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&product.id)
            .bind(position as i64)
            .bind(unit.name.trim())
            .bind(money_text(unit.rate))
            .bind(money_text(unit.mrp))
            .bind(money_text(unit.cost))
            .bind(unit.conversion.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a product by code.
    pub async fn get_by_code(&self, organisation_id: &str, code: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        get_by_code(&mut conn, organisation_id, code).await
    }

    /// Lists an organisation's products ordered by code.
    pub async fn list(&self, organisation_id: &str) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE organisation_id = ?1 ORDER BY code"
        ))
        .bind(organisation_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let units = load_units(&mut conn, &row.id).await?;
            products.push(row.into_product(units)?);
        }
        Ok(products)
    }

    /// Replaces a product's GST details and returns the updated product.
    pub async fn set_gst_details(
        &self,
        organisation_id: &str,
        code: &str,
        details: &GstDetails,
    ) -> DbResult<Product> {
        validate_tax_rate("sgst", details.sgst)?;
        validate_tax_rate("cgst", details.cgst)?;

        debug!(code = %code, sgst = %details.sgst, cgst = %details.cgst, "Updating GST details");

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r#"
            UPDATE products SET
                hsn = ?3,
                sgst = ?4,
                cgst = ?5,
                gst_inclusive = ?6,
                updated_at = ?7
            WHERE organisation_id = ?1 AND code = ?2
            "#,
        )
        .bind(organisation_id)
        .bind(code)
        .bind(&details.hsn)
        .bind(details.sgst.percentage().to_string())
        .bind(details.cgst.percentage().to_string())
        .bind(details.inclusive)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::product_not_found(code).into());
        }

        get_by_code(&mut conn, organisation_id, code)
            .await?
            .ok_or_else(|| CoreError::product_not_found(code).into())
    }
}

fn validate_product(product: &Product) -> DbResult<()> {
    validate_product_code(&product.code)?;
    validate_product_name(&product.name)?;
    validate_non_negative_money("rate", product.rate)?;
    validate_non_negative_money("mrp", product.mrp)?;
    validate_non_negative_money("cost", product.cost)?;
    validate_tax_rate("sgst", product.gst.sgst)?;
    validate_tax_rate("cgst", product.gst.cgst)?;
    validate_unique_units(product.units.iter().map(|unit| unit.name.as_str()))?;
    for unit in &product.units {
        validate_conversion(unit.conversion)?;
        validate_non_negative_money("unit.rate", unit.rate)?;
    }
    Ok(())
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

async fn load_units(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<Unit>> {
    let rows: Vec<UnitRow> = sqlx::query_as(
        r#"
        SELECT name, rate, mrp, cost, conversion
        FROM product_units
        WHERE product_id = ?1
        ORDER BY position
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(UnitRow::into_unit).collect()
}

/// Gets one product with its units.
pub async fn get_by_code(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    code: &str,
) -> DbResult<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE organisation_id = ?1 AND code = ?2"
    ))
    .bind(organisation_id)
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let units = load_units(conn, &row.id).await?;
            Ok(Some(row.into_product(units)?))
        }
        None => Ok(None),
    }
}

/// Loads every product among `codes` that exists. Missing codes are skipped;
/// catalog resolution reports them.
pub async fn load_by_codes(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    codes: &[String],
) -> DbResult<Vec<Product>> {
    let mut products = Vec::with_capacity(codes.len());
    for code in codes {
        if let Some(product) = get_by_code(conn, organisation_id, code).await? {
            products.push(product);
        }
    }
    Ok(products)
}

async fn current_stock(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    code: &str,
) -> DbResult<Quantity> {
    let raw: Option<String> = sqlx::query_scalar(
        "SELECT stock FROM products WHERE organisation_id = ?1 AND code = ?2",
    )
    .bind(organisation_id)
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;

    match raw {
        Some(raw) => parse_quantity("stock", &raw),
        None => Err(CoreError::product_not_found(code).into()),
    }
}

/// Adds a signed delta to the stock counter.
pub async fn adjust_stock(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    code: &str,
    delta: Quantity,
) -> DbResult<Quantity> {
    let stock = current_stock(conn, organisation_id, code).await? + delta;
    set_stock(conn, organisation_id, code, stock).await?;
    debug!(code = %code, delta = %delta, stock = %stock, "Adjusted stock counter");
    Ok(stock)
}

/// Overwrites the stock counter.
pub async fn set_stock(
    conn: &mut SqliteConnection,
    organisation_id: &str,
    code: &str,
    stock: Quantity,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE products SET stock = ?3, updated_at = ?4 WHERE organisation_id = ?1 AND code = ?2",
    )
    .bind(organisation_id)
    .bind(code)
    .bind(quantity_text(stock))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::product_not_found(code).into());
    }
    Ok(())
}

/// Flags a product as stock-tracked (set when it is first purchased).
pub async fn mark_stocked(conn: &mut SqliteConnection, organisation_id: &str, code: &str) -> DbResult<()> {
    sqlx::query("UPDATE products SET stocked = 1 WHERE organisation_id = ?1 AND code = ?2 AND stocked = 0")
        .bind(organisation_id)
        .bind(code)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
