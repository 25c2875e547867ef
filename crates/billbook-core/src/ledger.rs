//! # Purchase Lot Ledger
//!
//! The ordered collection of purchase lots per product, with FIFO consumption,
//! release (reversal) and replenishment.
//!
//! ## Arena + Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   LotLedger (arena, immutable view)                                    │
//! │        │                                                                │
//! │        │ plan_consume / plan_release / plan_replenish   (pure)         │
//! │        ▼                                                                │
//! │   Vec<LedgerMutation>  ── Take / Restore / Create, each carrying the   │
//! │        │                  revision it was planned against             │
//! │        │                                                                │
//! │        ├──► with_mutations() → new LotLedger      (in memory)          │
//! │        │                                                                │
//! │        └──► billbook-db applies them inside one SQL transaction,      │
//! │             each Take/Restore as a compare-and-swap on `revision`      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## FIFO Order
//! Candidate lots are ordered by `(received_at, sequence)`: oldest purchase
//! first, insertion order breaking ties. Consumption is all-or-nothing per
//! call: a shortfall yields `InsufficientStock` and no mutation at all.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{LotConsumption, LotId, PurchaseLot, SaleConsumptionRecord};
use crate::DEFAULT_ORGANISATION_ID;

// =============================================================================
// Mutations
// =============================================================================

/// An intended change to the ledger, applied atomically by a transaction boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerMutation {
    /// Decrement `remaining_in_stock`.
    Take {
        lot_id: LotId,
        quantity: Quantity,
        expected_revision: i64,
    },
    /// Increment `remaining_in_stock` (reversal of a take).
    Restore {
        lot_id: LotId,
        quantity: Quantity,
        expected_revision: i64,
    },
    /// Append a new lot.
    Create(PurchaseLot),
}

impl LedgerMutation {
    /// The lot this mutation touches.
    pub fn lot_id(&self) -> &LotId {
        match self {
            LedgerMutation::Take { lot_id, .. } | LedgerMutation::Restore { lot_id, .. } => lot_id,
            LedgerMutation::Create(lot) => &lot.id,
        }
    }
}

/// Result of planning one FIFO consumption.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionPlan {
    pub product_code: String,
    /// Draws in FIFO order.
    pub consumptions: Vec<LotConsumption>,
    pub mutations: Vec<LedgerMutation>,
}

impl ConsumptionPlan {
    pub fn total_taken(&self) -> Quantity {
        self.consumptions.iter().map(|c| c.quantity_taken).sum()
    }
}

// =============================================================================
// Lot Deltas
// =============================================================================

/// Signed net change in `remaining_in_stock`, per lot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotDeltas(BTreeMap<LotId, Decimal>);

impl LotDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a signed delta for a lot.
    pub fn record(&mut self, lot_id: &LotId, delta: Quantity) {
        *self.0.entry(lot_id.clone()).or_insert(Decimal::ZERO) += delta.value();
    }

    /// Net delta for a lot (zero when untouched).
    pub fn get(&self, lot_id: &LotId) -> Quantity {
        self.0.get(lot_id).copied().map(Quantity::new).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LotId, Quantity)> {
        self.0.iter().map(|(id, delta)| (id, Quantity::new(*delta)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|delta| delta.is_zero())
    }
}

impl<'a> FromIterator<&'a LedgerMutation> for LotDeltas {
    fn from_iter<I: IntoIterator<Item = &'a LedgerMutation>>(iter: I) -> Self {
        let mut deltas = LotDeltas::new();
        for mutation in iter {
            match mutation {
                LedgerMutation::Take { lot_id, quantity, .. } => deltas.record(lot_id, -*quantity),
                LedgerMutation::Restore { lot_id, quantity, .. } => deltas.record(lot_id, *quantity),
                LedgerMutation::Create(_) => {}
            }
        }
        deltas
    }
}

// =============================================================================
// Pure Planning Functions
// =============================================================================

/// Plans a FIFO draw of `needed` units of `product_code` from `lots`.
///
/// `lots` may hold any products in any order. Fails with `InsufficientStock`
/// (naming the shortfall) when the lots cannot cover `needed`.
pub fn plan_consumption(
    lots: &[PurchaseLot],
    product_code: &str,
    needed: Quantity,
) -> CoreResult<Vec<LotConsumption>> {
    if needed.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    let mut candidates: Vec<&PurchaseLot> = lots
        .iter()
        .filter(|lot| lot.product_code == product_code && lot.has_stock())
        .collect();
    candidates.sort_by(|a, b| (a.received_at, a.sequence).cmp(&(b.received_at, b.sequence)));

    let mut outstanding = needed;
    let mut consumptions = Vec::new();

    for lot in candidates {
        if outstanding.is_zero() {
            break;
        }

        let take = lot.remaining_in_stock.min(outstanding);
        consumptions.push(LotConsumption {
            lot_id: lot.id.clone(),
            purchase_bill_id: lot.purchase_bill_id.clone(),
            product_code: lot.product_code.clone(),
            quantity_taken: take,
            unit_cost: lot.unit_cost,
        });
        outstanding -= take;
    }

    if outstanding.is_positive() {
        return Err(CoreError::InsufficientStock {
            product_code: product_code.to_string(),
            short_by: outstanding,
        });
    }

    Ok(consumptions)
}

/// Checks that `quantity` can be released back into `lot`.
///
/// Releasing past the originally received quantity is a ledger corruption.
pub fn plan_release(lot: &PurchaseLot, quantity: Quantity) -> CoreResult<()> {
    if quantity.is_negative() {
        return Err(CoreError::invariant(format!(
            "negative release of {quantity} into lot {}",
            lot.id
        )));
    }

    if lot.remaining_in_stock + quantity > lot.quantity_received {
        return Err(CoreError::invariant(format!(
            "release of {quantity} into lot {} would exceed received {} (remaining {})",
            lot.id, lot.quantity_received, lot.remaining_in_stock
        )));
    }

    Ok(())
}

// =============================================================================
// Lot Ledger
// =============================================================================

/// In-memory arena of one organisation's purchase lots.
#[derive(Debug, Clone)]
pub struct LotLedger {
    organisation_id: String,
    lots: Vec<PurchaseLot>,
    index: HashMap<LotId, usize>,
    next_sequence: i64,
}

impl Default for LotLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LotLedger {
    /// Empty ledger for the default organisation.
    pub fn new() -> Self {
        Self::for_organisation(DEFAULT_ORGANISATION_ID)
    }

    /// Empty ledger for an organisation.
    pub fn for_organisation(organisation_id: impl Into<String>) -> Self {
        LotLedger {
            organisation_id: organisation_id.into(),
            lots: Vec::new(),
            index: HashMap::new(),
            next_sequence: 1,
        }
    }

    /// Builds a ledger from persisted lots, checking each lot's bounds.
    pub fn from_lots(
        organisation_id: impl Into<String>,
        lots: impl IntoIterator<Item = PurchaseLot>,
    ) -> CoreResult<Self> {
        let mut ledger = Self::for_organisation(organisation_id);
        for lot in lots {
            ledger.insert(lot)?;
        }
        Ok(ledger)
    }

    fn insert(&mut self, lot: PurchaseLot) -> CoreResult<()> {
        if lot.remaining_in_stock.is_negative() || lot.remaining_in_stock > lot.quantity_received {
            return Err(CoreError::invariant(format!(
                "lot {} has remaining {} outside 0..={}",
                lot.id, lot.remaining_in_stock, lot.quantity_received
            )));
        }
        if self.index.contains_key(&lot.id) {
            return Err(CoreError::invariant(format!("duplicate lot {}", lot.id)));
        }

        self.next_sequence = self.next_sequence.max(lot.sequence + 1);
        self.index.insert(lot.id.clone(), self.lots.len());
        self.lots.push(lot);
        Ok(())
    }

    pub fn organisation_id(&self) -> &str {
        &self.organisation_id
    }

    pub fn lots(&self) -> &[PurchaseLot] {
        &self.lots
    }

    pub fn get(&self, lot_id: &LotId) -> CoreResult<&PurchaseLot> {
        self.index
            .get(lot_id)
            .map(|&i| &self.lots[i])
            .ok_or_else(|| CoreError::LotNotFound(lot_id.to_string()))
    }

    /// Lots of one product in FIFO order.
    pub fn lots_for(&self, product_code: &str) -> Vec<&PurchaseLot> {
        let mut lots: Vec<&PurchaseLot> = self
            .lots
            .iter()
            .filter(|lot| lot.product_code == product_code)
            .collect();
        lots.sort_by(|a, b| (a.received_at, a.sequence).cmp(&(b.received_at, b.sequence)));
        lots
    }

    /// Σ remaining_in_stock over a product's lots.
    pub fn remaining(&self, product_code: &str) -> Quantity {
        self.lots
            .iter()
            .filter(|lot| lot.product_code == product_code)
            .map(|lot| lot.remaining_in_stock)
            .sum()
    }

    /// Σ quantity_received over a product's lots.
    pub fn received(&self, product_code: &str) -> Quantity {
        self.lots
            .iter()
            .filter(|lot| lot.product_code == product_code)
            .map(|lot| lot.quantity_received)
            .sum()
    }

    // -------------------------------------------------------------------------
    // Planning (pure)
    // -------------------------------------------------------------------------

    /// Plans a FIFO consumption against the current state.
    pub fn plan_consume(&self, product_code: &str, needed: Quantity) -> CoreResult<ConsumptionPlan> {
        let consumptions = plan_consumption(&self.lots, product_code, needed)?;

        let mutations = consumptions
            .iter()
            .map(|c| {
                let lot = self.get(&c.lot_id)?;
                Ok(LedgerMutation::Take {
                    lot_id: c.lot_id.clone(),
                    quantity: c.quantity_taken,
                    expected_revision: lot.revision,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(ConsumptionPlan {
            product_code: product_code.to_string(),
            consumptions,
            mutations,
        })
    }

    /// Plans returning `quantity` to a lot.
    pub fn plan_release(&self, lot_id: &LotId, quantity: Quantity) -> CoreResult<LedgerMutation> {
        let lot = self.get(lot_id)?;
        plan_release(lot, quantity)?;
        Ok(LedgerMutation::Restore {
            lot_id: lot_id.clone(),
            quantity,
            expected_revision: lot.revision,
        })
    }

    /// Plans a brand-new lot. Every call yields a distinct lot id.
    pub fn plan_replenish(
        &self,
        purchase_bill_id: &str,
        product_code: &str,
        quantity: Quantity,
        unit_cost: Money,
        received_at: DateTime<Utc>,
    ) -> CoreResult<LedgerMutation> {
        if !quantity.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if unit_cost.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_cost".to_string(),
            }
            .into());
        }

        Ok(LedgerMutation::Create(PurchaseLot {
            id: LotId::generate(),
            organisation_id: self.organisation_id.clone(),
            purchase_bill_id: purchase_bill_id.to_string(),
            product_code: product_code.to_string(),
            quantity_received: quantity,
            remaining_in_stock: quantity,
            unit_cost,
            received_at,
            sequence: self.next_sequence,
            revision: 0,
        }))
    }

    // -------------------------------------------------------------------------
    // Applying mutations
    // -------------------------------------------------------------------------

    /// Returns a new ledger with every mutation applied, or an error and no state.
    pub fn with_mutations(&self, mutations: &[LedgerMutation]) -> CoreResult<LotLedger> {
        let mut next = self.clone();
        for mutation in mutations {
            next.apply_one(mutation)?;
        }
        Ok(next)
    }

    /// Applies mutations atomically: all of them, or none on error.
    pub fn apply(&mut self, mutations: &[LedgerMutation]) -> CoreResult<()> {
        *self = self.with_mutations(mutations)?;
        Ok(())
    }

    fn apply_one(&mut self, mutation: &LedgerMutation) -> CoreResult<()> {
        match mutation {
            LedgerMutation::Create(lot) => {
                let mut lot = lot.clone();
                lot.sequence = lot.sequence.max(self.next_sequence);
                self.insert(lot)
            }
            LedgerMutation::Take {
                lot_id,
                quantity,
                expected_revision,
            } => {
                let lot = self.lot_at_revision(lot_id, *expected_revision)?;
                if *quantity > lot.remaining_in_stock {
                    return Err(CoreError::InsufficientStock {
                        product_code: lot.product_code.clone(),
                        short_by: *quantity - lot.remaining_in_stock,
                    });
                }
                lot.remaining_in_stock -= *quantity;
                lot.revision += 1;
                Ok(())
            }
            LedgerMutation::Restore {
                lot_id,
                quantity,
                expected_revision,
            } => {
                let lot = self.lot_at_revision(lot_id, *expected_revision)?;
                plan_release(lot, *quantity)?;
                lot.remaining_in_stock += *quantity;
                lot.revision += 1;
                Ok(())
            }
        }
    }

    fn lot_at_revision(&mut self, lot_id: &LotId, expected: i64) -> CoreResult<&mut PurchaseLot> {
        let i = *self
            .index
            .get(lot_id)
            .ok_or_else(|| CoreError::LotNotFound(lot_id.to_string()))?;
        let lot = &mut self.lots[i];
        if lot.revision != expected {
            return Err(CoreError::invariant(format!(
                "lot {lot_id} is at revision {}, mutation planned against {expected}",
                lot.revision
            )));
        }
        Ok(lot)
    }

    // -------------------------------------------------------------------------
    // Convenience (plan + apply)
    // -------------------------------------------------------------------------

    /// Consumes FIFO and returns the draws. Leaves the ledger untouched on error.
    pub fn consume(&mut self, product_code: &str, needed: Quantity) -> CoreResult<Vec<LotConsumption>> {
        let plan = self.plan_consume(product_code, needed)?;
        self.apply(&plan.mutations)?;
        Ok(plan.consumptions)
    }

    /// Returns `quantity` to a lot.
    pub fn release(&mut self, lot_id: &LotId, quantity: Quantity) -> CoreResult<()> {
        let mutation = self.plan_release(lot_id, quantity)?;
        self.apply(std::slice::from_ref(&mutation))
    }

    /// Appends a new lot and returns its id.
    pub fn replenish(
        &mut self,
        purchase_bill_id: &str,
        product_code: &str,
        quantity: Quantity,
        unit_cost: Money,
        received_at: DateTime<Utc>,
    ) -> CoreResult<LotId> {
        let mutation =
            self.plan_replenish(purchase_bill_id, product_code, quantity, unit_cost, received_at)?;
        let lot_id = mutation.lot_id().clone();
        self.apply(std::slice::from_ref(&mutation))?;
        Ok(lot_id)
    }

    // -------------------------------------------------------------------------
    // Conservation
    // -------------------------------------------------------------------------

    /// Checks every lot of a product against the consumption records of
    /// non-voided sales: `received − remaining == Σ recorded`.
    pub fn verify_conservation(
        &self,
        product_code: &str,
        records: &[SaleConsumptionRecord],
    ) -> CoreResult<()> {
        for lot in self.lots_for(product_code) {
            let recorded: Quantity = records
                .iter()
                .map(|record| record.quantity_for_lot(&lot.id))
                .sum();

            if recorded > lot.quantity_received {
                return Err(CoreError::invariant(format!(
                    "lot {} recorded consumption {} exceeds received {}",
                    lot.id, recorded, lot.quantity_received
                )));
            }
            if lot.quantity_consumed() != recorded {
                return Err(CoreError::invariant(format!(
                    "lot {} of {} has consumed {} but records sum to {}",
                    lot.id,
                    product_code,
                    lot.quantity_consumed(),
                    recorded
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap()
    }

    fn ledger_with_two_lots() -> (LotLedger, LotId, LotId) {
        let mut ledger = LotLedger::new();
        let first = ledger
            .replenish("pb-1", "RICE", Quantity::from(5), Money::from(40), t(1))
            .unwrap();
        let second = ledger
            .replenish("pb-2", "RICE", Quantity::from(5), Money::from(42), t(2))
            .unwrap();
        (ledger, first, second)
    }

    #[test]
    fn test_fifo_order() {
        let (mut ledger, first, second) = ledger_with_two_lots();

        let taken = ledger.consume("RICE", Quantity::from(7)).unwrap();

        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].lot_id, first);
        assert_eq!(taken[0].quantity_taken, Quantity::from(5));
        assert_eq!(taken[1].lot_id, second);
        assert_eq!(taken[1].quantity_taken, Quantity::from(2));
        assert_eq!(ledger.get(&first).unwrap().remaining_in_stock, Quantity::zero());
        assert_eq!(ledger.get(&second).unwrap().remaining_in_stock, Quantity::from(3));
    }

    #[test]
    fn test_fifo_ignores_insertion_order_of_older_receipts() {
        let mut ledger = LotLedger::new();
        let late = ledger
            .replenish("pb-late", "RICE", Quantity::from(5), Money::from(40), t(3))
            .unwrap();
        let early = ledger
            .replenish("pb-early", "RICE", Quantity::from(5), Money::from(40), t(1))
            .unwrap();

        let taken = ledger.consume("RICE", Quantity::from(6)).unwrap();
        assert_eq!(taken[0].lot_id, early);
        assert_eq!(taken[1].lot_id, late);
    }

    #[test]
    fn test_ties_broken_by_sequence() {
        let mut ledger = LotLedger::new();
        let a = ledger
            .replenish("pb-1", "RICE", Quantity::from(1), Money::from(40), t(1))
            .unwrap();
        let b = ledger
            .replenish("pb-1", "RICE", Quantity::from(1), Money::from(40), t(1))
            .unwrap();

        let taken = ledger.consume("RICE", Quantity::from(2)).unwrap();
        assert_eq!(taken[0].lot_id, a);
        assert_eq!(taken[1].lot_id, b);
    }

    #[test]
    fn test_all_or_nothing_on_shortfall() {
        let (mut ledger, first, second) = ledger_with_two_lots();

        let err = ledger.consume("RICE", Quantity::from(12)).unwrap_err();

        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_code: "RICE".to_string(),
                short_by: Quantity::from(2),
            }
        );
        assert_eq!(ledger.get(&first).unwrap().remaining_in_stock, Quantity::from(5));
        assert_eq!(ledger.get(&second).unwrap().remaining_in_stock, Quantity::from(5));
        assert_eq!(ledger.get(&first).unwrap().revision, 0);
    }

    #[test]
    fn test_fractional_consumption() {
        let mut ledger = LotLedger::new();
        ledger
            .replenish("pb-1", "SUGAR", Quantity::new(dec!(1.5)), Money::from(44), t(1))
            .unwrap();

        let taken = ledger.consume("SUGAR", Quantity::new(dec!(0.25))).unwrap();
        assert_eq!(taken[0].amount(), Money::from(11));
        assert_eq!(ledger.remaining("SUGAR"), Quantity::new(dec!(1.25)));
    }

    #[test]
    fn test_release_restores_and_rejects_over_release() {
        let (mut ledger, first, _) = ledger_with_two_lots();
        ledger.consume("RICE", Quantity::from(3)).unwrap();

        ledger.release(&first, Quantity::from(3)).unwrap();
        assert_eq!(ledger.get(&first).unwrap().remaining_in_stock, Quantity::from(5));

        let err = ledger.release(&first, Quantity::from(1)).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(ledger.get(&first).unwrap().remaining_in_stock, Quantity::from(5));
    }

    #[test]
    fn test_release_unknown_lot() {
        let mut ledger = LotLedger::new();
        assert!(matches!(
            ledger.release(&LotId::from("nope"), Quantity::from(1)),
            Err(CoreError::LotNotFound(_))
        ));
    }

    #[test]
    fn test_replenish_never_merges() {
        let mut ledger = LotLedger::new();
        let a = ledger
            .replenish("pb-1", "RICE", Quantity::from(5), Money::from(40), t(1))
            .unwrap();
        let b = ledger
            .replenish("pb-1", "RICE", Quantity::from(5), Money::from(40), t(1))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(ledger.lots_for("RICE").len(), 2);
        assert_eq!(ledger.received("RICE"), Quantity::from(10));
    }

    #[test]
    fn test_replenish_rejects_non_positive_quantity() {
        let mut ledger = LotLedger::new();
        let err = ledger
            .replenish("pb-1", "RICE", Quantity::zero(), Money::from(40), t(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_with_mutations_is_pure() {
        let (ledger, first, _) = ledger_with_two_lots();
        let plan = ledger.plan_consume("RICE", Quantity::from(4)).unwrap();

        let next = ledger.with_mutations(&plan.mutations).unwrap();

        assert_eq!(ledger.get(&first).unwrap().remaining_in_stock, Quantity::from(5));
        assert_eq!(next.get(&first).unwrap().remaining_in_stock, Quantity::from(1));
        assert_eq!(next.get(&first).unwrap().revision, 1);
    }

    #[test]
    fn test_stale_revision_is_rejected() {
        let (mut ledger, _, _) = ledger_with_two_lots();
        let plan = ledger.plan_consume("RICE", Quantity::from(1)).unwrap();
        ledger.apply(&plan.mutations).unwrap();

        let err = ledger.apply(&plan.mutations).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_deltas_from_mutations() {
        let (ledger, first, second) = ledger_with_two_lots();
        let plan = ledger.plan_consume("RICE", Quantity::from(7)).unwrap();
        let restore = ledger.plan_release(&first, Quantity::zero()).unwrap();

        let mut mutations = plan.mutations.clone();
        mutations.push(restore);
        let deltas: LotDeltas = mutations.iter().collect();

        assert_eq!(deltas.get(&first), Quantity::from(-5));
        assert_eq!(deltas.get(&second), Quantity::from(-2));
        assert!(!deltas.is_empty());
        assert!(LotDeltas::new().is_empty());
    }

    #[test]
    fn test_from_lots_rejects_out_of_bounds_lot() {
        let (ledger, first, _) = ledger_with_two_lots();
        let mut lot = ledger.get(&first).unwrap().clone();
        lot.remaining_in_stock = Quantity::from(6);

        assert!(LotLedger::from_lots("org", [lot]).unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_conservation_against_records() {
        let (mut ledger, _, _) = ledger_with_two_lots();
        let taken = ledger.consume("RICE", Quantity::from(7)).unwrap();

        let mut records: BTreeMap<String, SaleConsumptionRecord> = BTreeMap::new();
        for c in &taken {
            records
                .entry(c.purchase_bill_id.clone())
                .or_insert_with(|| SaleConsumptionRecord::new(c.purchase_bill_id.clone(), "sale-1"))
                .extend(c);
        }
        let records: Vec<_> = records.into_values().collect();

        assert!(ledger.verify_conservation("RICE", &records).is_ok());
        assert_eq!(
            ledger.remaining("RICE"),
            ledger.received("RICE") - Quantity::from(7)
        );

        let err = ledger.verify_conservation("RICE", &records[..1]).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_consume_zero_is_empty() {
        let (mut ledger, _, _) = ledger_with_two_lots();
        assert!(ledger.consume("RICE", Quantity::zero()).unwrap().is_empty());
    }
}
