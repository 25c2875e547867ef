//! # Sale Coordinator
//!
//! The commit boundary. Every write that moves stock (sale commits, voids,
//! purchases) goes through here.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  commit_sale(request)                                                  │
//! │    │                                                                    │
//! │    ├── validate request                                                 │
//! │    ├── lock product codes (sorted)           ◄── held across retries   │
//! │    │                                                                    │
//! │    └── attempt 1..=max_commit_attempts                                  │
//! │          │                                                              │
//! │          ├── BEGIN                                                      │
//! │          ├── load products → Catalog, lots → LotLedger   (same tx)     │
//! │          ├── plan_sale()                  pure, no writes yet          │
//! │          ├── apply Take mutations         CAS on lot revision          │
//! │          ├── adjust stock counters                                      │
//! │          ├── insert sale, lines, draws, consumption records            │
//! │          └── COMMIT (spawned, runs to completion)                      │
//! │                                                                         │
//! │  Conflict ──► rollback, sleep n × retry_backoff, next attempt          │
//! │  anything else ──► rollback, surface                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancellation
//! Dropping a `commit_sale`/`void_sale` future before the final COMMIT rolls
//! the transaction back. Once COMMIT has been issued it runs on its own task
//! and completes even if the caller goes away.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{DbError, DbResult};
use crate::locks::ProductLocks;
use crate::pool::Database;
use crate::repository::{lot, product, sale};
use billbook_core::catalog::Catalog;
use billbook_core::ledger::LotLedger;
use billbook_core::purchase::{plan_purchase, PurchaseRequest};
use billbook_core::sale::{discount_percentage, plan_sale, plan_void, CommitPhase, CommitRequest};
use billbook_core::{
    CommittedSale, CoreError, GstDetails, LotId, Money, Product, PurchaseBill, PurchaseLineRequest, Quantity,
    SaleStatus,
};

/// Serializes and retries ledger writes for one organisation.
#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    db: Database,
    config: LedgerConfig,
    locks: ProductLocks,
}

impl SaleCoordinator {
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        SaleCoordinator {
            db,
            config,
            locks: ProductLocks::new(),
        }
    }

    /// Shares a lock registry with other coordinators on the same database.
    pub fn with_locks(mut self, locks: ProductLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &ProductLocks {
        &self.locks
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn organisation_id(&self) -> &str {
        &self.config.organisation_id
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Commits a sale: resolves lines, consumes lots FIFO, records
    /// consumption, and persists the sale, all or nothing.
    ///
    /// ## Errors
    /// - `ProductNotFound`: a line names an unknown product
    /// - `InsufficientStock`: a stocked line cannot be covered by its lots
    /// - `Conflict`: concurrent writers kept winning for every attempt
    /// - `InvariantViolation`: stored lot data is inconsistent
    pub async fn commit_sale(&self, request: CommitRequest) -> DbResult<CommittedSale> {
        request.validate()?;

        let sale_id = Uuid::new_v4().to_string();
        let codes: BTreeSet<&str> = request
            .lines
            .iter()
            .map(|line| line.product_code.as_str())
            .collect();
        let _guards = self.locks.acquire(codes).await;

        let request = &request;
        let sale_id = sale_id.as_str();
        let sale = self
            .with_retries("commit_sale", move || self.try_commit(sale_id, request))
            .await?;

        info!(
            sale_id = %sale.id,
            lines = sale.lines.len(),
            bill_amount = %sale.bill_amount,
            discount_pct = %discount_percentage(sale.items_total_amount, sale.discount_amount),
            "Sale committed"
        );
        Ok(sale)
    }

    async fn try_commit(&self, sale_id: &str, request: &CommitRequest) -> DbResult<CommittedSale> {
        let org = self.organisation_id();
        let codes: Vec<String> = request
            .lines
            .iter()
            .map(|line| line.product_code.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut tx = self.db.pool().begin().await?;

        let catalog: Catalog = product::load_by_codes(&mut tx, org, &codes).await?.into_iter().collect();
        let lots = lot::load_for_products(&mut tx, org, &codes).await?;
        let ledger = LotLedger::from_lots(org, lots)?;

        let plan = plan_sale(sale_id, &catalog, &ledger, request)?;
        debug!(
            sale_id = %sale_id,
            phase = %plan.phase,
            draws = plan.consumptions.len(),
            "Sale planned"
        );

        for mutation in &plan.mutations {
            lot::apply_mutation(&mut tx, mutation).await?;
        }
        for (code, delta) in &plan.stock_deltas {
            product::adjust_stock(&mut tx, org, code, *delta).await?;
        }

        let committed = CommittedSale {
            id: sale_id.to_string(),
            organisation_id: org.to_string(),
            status: SaleStatus::Committed,
            items_total_amount: plan.totals.items_total_amount,
            discount_amount: plan.totals.discount_amount,
            bill_amount: plan.totals.bill_amount,
            gst_summary: plan.gst_summary,
            lines: plan.lines,
            consumptions: plan.consumptions,
            created_at: Utc::now(),
            voided_at: None,
        };
        sale::insert(&mut tx, &committed).await?;
        sale::insert_records(&mut tx, &plan.records).await?;

        let phase = plan.phase.advance(CommitPhase::Committed)?;
        commit_detached(tx).await?;
        debug!(sale_id = %sale_id, phase = %phase, "Sale transaction committed");

        Ok(committed)
    }

    /// Voids a committed sale: restores every lot it drew from and removes
    /// its consumption records.
    ///
    /// ## Errors
    /// - `SaleNotFound`: no such sale in this organisation
    /// - `InvalidSaleStatus`: the sale is already voided
    /// - `InvariantViolation`: a restore would push a lot past its received
    ///   quantity (nothing is restored)
    pub async fn void_sale(&self, sale_id: &str) -> DbResult<()> {
        let codes = self.db.sales().product_codes(sale_id).await?;
        let _guards = self.locks.acquire(&codes).await;

        self.with_retries("void_sale", move || self.try_void(sale_id)).await?;

        info!(sale_id = %sale_id, products = codes.len(), "Sale voided");
        Ok(())
    }

    async fn try_void(&self, sale_id: &str) -> DbResult<()> {
        let org = self.organisation_id();
        let mut tx = self.db.pool().begin().await?;

        match sale::status(&mut tx, org, sale_id).await? {
            None => return Err(CoreError::SaleNotFound(sale_id.to_string()).into()),
            Some(SaleStatus::Voided) => {
                return Err(CoreError::InvalidSaleStatus {
                    sale_id: sale_id.to_string(),
                    current_status: SaleStatus::Voided.to_string(),
                }
                .into())
            }
            Some(SaleStatus::Committed) => {}
        }

        let records = sale::records_for_sale(&mut tx, sale_id).await?;
        let lot_ids: Vec<LotId> = records
            .iter()
            .flat_map(|record| record.items.iter().map(|item| item.lot_id.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let lots = lot::load_by_ids(&mut tx, &lot_ids).await?;
        let ledger = LotLedger::from_lots(org, lots)?;

        let plan = plan_void(sale_id, &ledger, &records)?;

        for mutation in &plan.mutations {
            lot::apply_mutation(&mut tx, mutation).await?;
        }
        for (code, delta) in &plan.stock_deltas {
            product::adjust_stock(&mut tx, org, code, *delta).await?;
        }
        sale::delete_records_for_sale(&mut tx, sale_id).await?;
        sale::mark_voided(&mut tx, sale_id, Utc::now()).await?;

        commit_detached(tx).await?;
        debug!(sale_id = %sale_id, lots = plan.restored.iter().count(), "Lots restored");
        Ok(())
    }

    /// Reads back a committed or voided sale.
    pub async fn get_sale(&self, sale_id: &str) -> DbResult<CommittedSale> {
        self.db
            .sales()
            .get(self.organisation_id(), sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Saves a purchase bill received now.
    pub async fn record_purchase(&self, request: PurchaseRequest) -> DbResult<PurchaseBill> {
        self.record_purchase_at(request, Utc::now()).await
    }

    /// Saves a purchase bill: one new lot per distinct product, stock counters
    /// raised, products flagged as stocked.
    pub async fn record_purchase_at(
        &self,
        request: PurchaseRequest,
        received_at: DateTime<Utc>,
    ) -> DbResult<PurchaseBill> {
        request.validate()?;

        let bill_id = Uuid::new_v4().to_string();
        let codes: BTreeSet<&str> = request
            .lines
            .iter()
            .map(|line| line.product_code.as_str())
            .collect();
        let _guards = self.locks.acquire(codes).await;

        let request = &request;
        let bill_id = bill_id.as_str();
        let bill = self
            .with_retries("record_purchase", move || {
                self.try_purchase(bill_id, request, received_at)
            })
            .await?;

        info!(
            purchase_bill_id = %bill.id,
            lots = bill.lots.len(),
            bill_amount = %bill.bill_amount,
            "Purchase recorded"
        );
        Ok(bill)
    }

    async fn try_purchase(
        &self,
        bill_id: &str,
        request: &PurchaseRequest,
        received_at: DateTime<Utc>,
    ) -> DbResult<PurchaseBill> {
        let org = self.organisation_id();
        let codes: Vec<String> = request
            .lines
            .iter()
            .map(|line| line.product_code.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut tx = self.db.pool().begin().await?;

        let catalog: Catalog = product::load_by_codes(&mut tx, org, &codes).await?.into_iter().collect();
        let plan = plan_purchase(bill_id, &catalog, &LotLedger::for_organisation(org), request, received_at)?;

        let mut bill = PurchaseBill {
            id: bill_id.to_string(),
            organisation_id: org.to_string(),
            lots: Vec::with_capacity(plan.lots.len()),
            items_total_amount: plan.totals.items_total_amount,
            discount_amount: plan.totals.discount_amount,
            bill_amount: plan.totals.bill_amount,
            received_at,
        };
        lot::insert_bill(&mut tx, &bill).await?;

        for mut new_lot in plan.lots {
            new_lot.sequence = lot::insert(&mut tx, &new_lot).await?;
            product::adjust_stock(&mut tx, org, &new_lot.product_code, new_lot.quantity_received).await?;
            product::mark_stocked(&mut tx, org, &new_lot.product_code).await?;
            bill.lots.push(new_lot);
        }

        commit_detached(tx).await?;
        Ok(bill)
    }

    /// Adds one new lot for a product. Never merges into an existing lot.
    pub async fn replenish(
        &self,
        product_code: &str,
        quantity: Quantity,
        unit_cost: Money,
        received_at: DateTime<Utc>,
    ) -> DbResult<LotId> {
        let request = PurchaseRequest::new(vec![
            PurchaseLineRequest::new(product_code, quantity).at_cost(unit_cost)
        ]);
        let bill = self.record_purchase_at(request, received_at).await?;

        bill.lots
            .into_iter()
            .next()
            .map(|lot| lot.id)
            .ok_or_else(|| CoreError::invariant(format!("purchase of {product_code} created no lot")).into())
    }

    // =========================================================================
    // Catalog & audit
    // =========================================================================

    /// Replaces a product's GST details.
    pub async fn set_gst_details(&self, product_code: &str, details: &GstDetails) -> DbResult<Product> {
        self.db
            .products()
            .set_gst_details(self.organisation_id(), product_code, details)
            .await
    }

    /// Recomputes a product's stock counter from its lots.
    pub async fn reconcile_stock(&self, product_code: &str) -> DbResult<Quantity> {
        let org = self.organisation_id();
        let _guards = self.locks.acquire([product_code]).await;

        let mut tx = self.db.pool().begin().await?;
        let lots = lot::load_for_products(&mut tx, org, &[product_code.to_string()]).await?;
        let stock: Quantity = lots.iter().map(|lot| lot.remaining_in_stock).sum();
        product::set_stock(&mut tx, org, product_code, stock).await?;
        commit_detached(tx).await?;

        debug!(code = %product_code, stock = %stock, "Stock reconciled");
        Ok(stock)
    }

    /// Checks that every lot of a product has been consumed by exactly what
    /// the live consumption records say.
    pub async fn verify_conservation(&self, product_code: &str) -> DbResult<()> {
        let org = self.organisation_id();
        let mut conn = self.db.pool().acquire().await?;

        let lots = lot::load_for_products(&mut conn, org, &[product_code.to_string()]).await?;
        let records = sale::records_for_product(&mut conn, org, product_code).await?;
        drop(conn);

        let result = LotLedger::from_lots(org, lots)
            .and_then(|ledger| ledger.verify_conservation(product_code, &records));
        if let Err(err) = &result {
            error!(code = %product_code, error = %err, "Conservation check failed");
        }
        Ok(result?)
    }

    // =========================================================================
    // Retry
    // =========================================================================

    async fn with_retries<T, F, Fut>(&self, operation: &str, mut attempt_once: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 1;

        loop {
            match attempt_once().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let backoff = self.config.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Ledger write conflicted, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_invariant_violation() {
                        error!(operation, error = %err, "Ledger invariant violated");
                    } else {
                        debug!(operation, attempt, error = %err, "Ledger write aborted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Issues COMMIT on its own task so dropping the caller cannot interrupt it.
async fn commit_detached(tx: Transaction<'static, Sqlite>) -> DbResult<()> {
    tokio::spawn(async move { tx.commit().await })
        .await
        .map_err(|err| DbError::CommitTask(err.to_string()))??;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
