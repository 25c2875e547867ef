//! # Sale Planning
//!
//! Pure planning for committing and voiding a sale. The database crate runs
//! these plans inside one transaction; nothing here performs I/O.
//!
//! ## Commit Phases
//! ```text
//! ┌─────────┐    ┌───────────┐    ┌───────────┐    ┌───────────┐
//! │ Pending │───►│ Resolving │───►│ Consuming │───►│ Committed │
//! └─────────┘    └─────┬─────┘    └─────┬─────┘    └───────────┘
//!                      │                │
//!                      ▼                ▼
//!                 ┌─────────────────────────┐
//!                 │         Aborted         │  no mutation survives
//!                 └─────────────────────────┘
//! ```
//!
//! ## Totals
//! - `items_total_amount = Σ quantity × rate`
//! - `bill_amount = round(items_total_amount − discount_amount)`, half away
//!   from zero, to a whole currency unit

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::catalog::{resolve_lines, CatalogLookup};
use crate::error::{CoreError, CoreResult};
use crate::gst::{summarize_resolved, GstSummary};
use crate::ledger::{LedgerMutation, LotDeltas, LotLedger};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{LotConsumption, ResolvedLine, SaleConsumptionRecord, SaleLineRequest};
use crate::validation::{validate_discount, validate_line_count, validate_quantity};

// =============================================================================
// Request
// =============================================================================

/// Everything needed to commit one sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommitRequest {
    pub lines: Vec<SaleLineRequest>,
    pub discount_amount: Money,
    /// Whether to compute a GST summary.
    pub wants_tax: bool,
}

impl CommitRequest {
    pub fn new(lines: Vec<SaleLineRequest>) -> Self {
        CommitRequest {
            lines,
            discount_amount: Money::zero(),
            wants_tax: false,
        }
    }

    pub fn with_discount(mut self, discount_amount: Money) -> Self {
        self.discount_amount = discount_amount;
        self
    }

    pub fn with_tax(mut self) -> Self {
        self.wants_tax = true;
        self
    }

    /// Validates request shape before any lookup.
    pub fn validate(&self) -> CoreResult<()> {
        validate_line_count(self.lines.len())?;
        for line in &self.lines {
            validate_quantity(line.quantity)?;
        }
        validate_discount(self.discount_amount)?;
        Ok(())
    }
}

// =============================================================================
// Commit State Machine
// =============================================================================

/// Phase of a single commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    Pending,
    Resolving,
    Consuming,
    Committed,
    Aborted,
}

impl CommitPhase {
    /// Moves to the next phase, rejecting out-of-order transitions.
    pub fn advance(self, next: CommitPhase) -> CoreResult<CommitPhase> {
        use CommitPhase::*;

        let allowed = matches!(
            (self, next),
            (Pending, Resolving)
                | (Resolving, Consuming)
                | (Consuming, Committed)
                | (Resolving, Aborted)
                | (Consuming, Aborted)
        );

        if allowed {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CommitPhase::Committed | CommitPhase::Aborted)
    }
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitPhase::Pending => "pending",
            CommitPhase::Resolving => "resolving",
            CommitPhase::Consuming => "consuming",
            CommitPhase::Committed => "committed",
            CommitPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Bill-level amounts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub items_total_amount: Money,
    pub discount_amount: Money,
    pub bill_amount: Money,
}

/// Computes bill totals for resolved lines.
pub fn compute_totals(lines: &[ResolvedLine], discount_amount: Money) -> SaleTotals {
    let items_total_amount: Money = lines.iter().map(ResolvedLine::amount).sum();
    bill_totals(items_total_amount, discount_amount)
}

/// `bill_amount = round(items_total − discount)`.
pub fn bill_totals(items_total_amount: Money, discount_amount: Money) -> SaleTotals {
    SaleTotals {
        items_total_amount,
        discount_amount,
        bill_amount: (items_total_amount - discount_amount).round_to_unit(),
    }
}

/// Discount as a percentage of the items total, 2 decimal places.
pub fn discount_percentage(items_total_amount: Money, discount_amount: Money) -> Decimal {
    items_total_amount.percentage_of(discount_amount)
}

// =============================================================================
// Commit Planning
// =============================================================================

/// Everything a commit will write, computed without touching storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SalePlan {
    pub sale_id: String,
    pub phase: CommitPhase,
    pub lines: Vec<ResolvedLine>,
    pub totals: SaleTotals,
    pub gst_summary: Option<GstSummary>,
    /// Every draw, in line order then FIFO order.
    pub consumptions: Vec<LotConsumption>,
    /// Take mutations, in the order they must be applied.
    pub mutations: Vec<LedgerMutation>,
    /// One record per purchase bill touched.
    pub records: Vec<SaleConsumptionRecord>,
    /// Net change to each product's denormalized stock.
    pub stock_deltas: BTreeMap<String, Quantity>,
}

/// Plans a sale commit against a catalog and the current ledger.
///
/// Lines are resolved first (any missing product aborts before consumption).
/// Stocked lines then draw FIFO from a scratch copy of the ledger, so several
/// lines of one product see each other's draws. Any shortfall aborts the
/// whole plan.
pub fn plan_sale(
    sale_id: &str,
    catalog: &impl CatalogLookup,
    ledger: &LotLedger,
    request: &CommitRequest,
) -> CoreResult<SalePlan> {
    request.validate()?;

    let phase = CommitPhase::Pending.advance(CommitPhase::Resolving)?;
    let lines = resolve_lines(catalog, &request.lines)?;

    let phase = phase.advance(CommitPhase::Consuming)?;
    let mut scratch = ledger.clone();
    let mut consumptions = Vec::new();
    let mut mutations = Vec::new();
    let mut stock_deltas: BTreeMap<String, Quantity> = BTreeMap::new();

    for line in lines.iter().filter(|line| line.stocked) {
        let plan = scratch.plan_consume(&line.product_code, line.converted)?;
        scratch.apply(&plan.mutations)?;

        *stock_deltas.entry(line.product_code.clone()).or_default() -= line.converted;
        consumptions.extend(plan.consumptions);
        mutations.extend(plan.mutations);
    }

    let totals = compute_totals(&lines, request.discount_amount);
    let gst_summary = request.wants_tax.then(|| summarize_resolved(&lines));
    let records = build_records(sale_id, &consumptions);

    Ok(SalePlan {
        sale_id: sale_id.to_string(),
        phase,
        lines,
        totals,
        gst_summary,
        consumptions,
        mutations,
        records,
        stock_deltas,
    })
}

/// Groups draws into one consumption record per purchase bill, in the order
/// bills were first touched.
pub fn build_records(sale_id: &str, consumptions: &[LotConsumption]) -> Vec<SaleConsumptionRecord> {
    let mut records: Vec<SaleConsumptionRecord> = Vec::new();

    for consumption in consumptions {
        match records
            .iter_mut()
            .find(|record| record.purchase_bill_id == consumption.purchase_bill_id)
        {
            Some(record) => record.extend(consumption),
            None => {
                let mut record = SaleConsumptionRecord::new(&consumption.purchase_bill_id, sale_id);
                record.extend(consumption);
                records.push(record);
            }
        }
    }

    records
}

// =============================================================================
// Void Planning
// =============================================================================

/// Everything a void will write.
#[derive(Debug, Clone, PartialEq)]
pub struct VoidPlan {
    pub sale_id: String,
    /// Restore mutations, one per recorded lot draw.
    pub mutations: Vec<LedgerMutation>,
    /// Net increase per lot.
    pub restored: LotDeltas,
    /// Net change to each product's denormalized stock.
    pub stock_deltas: BTreeMap<String, Quantity>,
}

/// Plans the reversal of every consumption recorded for `sale_id`.
///
/// Fails with `InvariantViolation` if any release would push a lot past its
/// received quantity; in that case nothing is restored.
pub fn plan_void(
    sale_id: &str,
    ledger: &LotLedger,
    records: &[SaleConsumptionRecord],
) -> CoreResult<VoidPlan> {
    let mut scratch = ledger.clone();
    let mut mutations = Vec::new();
    let mut stock_deltas: BTreeMap<String, Quantity> = BTreeMap::new();

    for record in records.iter().filter(|record| record.sale_id == sale_id) {
        for item in &record.items {
            let mutation = scratch.plan_release(&item.lot_id, item.quantity)?;
            scratch.apply(std::slice::from_ref(&mutation))?;

            *stock_deltas.entry(item.product_code.clone()).or_default() += item.quantity;
            mutations.push(mutation);
        }
    }

    let restored = mutations.iter().collect();

    Ok(VoidPlan {
        sale_id: sale_id.to_string(),
        mutations,
        restored,
        stock_deltas,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
