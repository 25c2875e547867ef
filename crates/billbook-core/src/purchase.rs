//! # Purchase Planning
//!
//! Turns a purchase bill into new lots. Each distinct product on a bill gets
//! exactly one lot; repeated lines of the same product are merged first.
//!
//! ```text
//! lines:  RICE 10 kg @40 │ RICE 1 bag(25 kg) @38 │ SOAP 2 box(12)
//!            │                    │                    │
//!            └────── merge ───────┘                    │
//!                      ▼                               ▼
//! lots:   RICE 35 kg @ (10×40 + 25×38)/35      SOAP 24 pcs @ product.cost
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::catalog::CatalogLookup;
use crate::error::CoreResult;
use crate::ledger::{LedgerMutation, LotLedger};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::sale::{bill_totals, SaleTotals};
use crate::types::{PurchaseLineRequest, PurchaseLot};
use crate::validation::{
    validate_conversion, validate_discount, validate_line_count, validate_non_negative_money,
    validate_quantity,
};

/// A purchase bill as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseRequest {
    pub lines: Vec<PurchaseLineRequest>,
    pub discount_amount: Money,
}

impl PurchaseRequest {
    pub fn new(lines: Vec<PurchaseLineRequest>) -> Self {
        PurchaseRequest {
            lines,
            discount_amount: Money::zero(),
        }
    }

    pub fn with_discount(mut self, discount_amount: Money) -> Self {
        self.discount_amount = discount_amount;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        validate_line_count(self.lines.len())?;
        for line in &self.lines {
            validate_quantity(line.quantity)?;
            if let Some(cost) = line.unit_cost {
                validate_non_negative_money("unit_cost", cost)?;
            }
        }
        validate_discount(self.discount_amount)?;
        Ok(())
    }
}

/// The lots a purchase bill will create.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchasePlan {
    pub purchase_bill_id: String,
    pub received_at: DateTime<Utc>,
    pub lots: Vec<PurchaseLot>,
    pub mutations: Vec<LedgerMutation>,
    pub totals: SaleTotals,
}

struct MergedLine {
    product_code: String,
    quantity: Quantity,
    cost: Money,
}

/// Plans a purchase bill: one new lot per distinct product.
///
/// Quantities are converted to primary units. A line without an explicit
/// `unit_cost` (per primary unit) is costed at the product's cost. Merged
/// lines get the quantity-weighted cost.
pub fn plan_purchase(
    purchase_bill_id: &str,
    catalog: &impl CatalogLookup,
    ledger: &LotLedger,
    request: &PurchaseRequest,
    received_at: DateTime<Utc>,
) -> CoreResult<PurchasePlan> {
    request.validate()?;

    let mut merged: Vec<MergedLine> = Vec::new();
    for line in &request.lines {
        let product = catalog.get(&line.product_code)?;
        let converted = match line.unit.as_deref().and_then(|name| product.unit(name)) {
            Some(unit) => {
                validate_conversion(unit.conversion)?;
                line.quantity.converted(unit.conversion)
            }
            None => line.quantity,
        };
        let unit_cost = line.unit_cost.unwrap_or(product.cost);
        validate_non_negative_money("unit_cost", unit_cost)?;
        let cost = unit_cost.times(converted);

        match merged.iter_mut().find(|m| m.product_code == product.code) {
            Some(existing) => {
                existing.quantity += converted;
                existing.cost += cost;
            }
            None => merged.push(MergedLine {
                product_code: product.code.clone(),
                quantity: converted,
                cost,
            }),
        }
    }

    let mut scratch = ledger.clone();
    let mut lots = Vec::with_capacity(merged.len());
    let mut mutations = Vec::with_capacity(merged.len());

    for line in &merged {
        let unit_cost = Money::new(line.cost.amount() / line.quantity.value());
        let mutation = scratch.plan_replenish(
            purchase_bill_id,
            &line.product_code,
            line.quantity,
            unit_cost,
            received_at,
        )?;
        scratch.apply(std::slice::from_ref(&mutation))?;

        if let LedgerMutation::Create(lot) = &mutation {
            lots.push(scratch.get(&lot.id)?.clone());
        }
        mutations.push(mutation);
    }

    let items_total: Money = merged.iter().map(|m| m.cost).sum();

    Ok(PurchasePlan {
        purchase_bill_id: purchase_bill_id.to_string(),
        received_at,
        lots,
        mutations,
        totals: bill_totals(items_total, request.discount_amount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::product;
    use crate::catalog::Catalog;
    use crate::CoreError;

    #[test]
    fn test_merges_lines_per_product() {
        let catalog: Catalog = [product("RICE", 40, true), product("SOAP", 30, true)]
            .into_iter()
            .collect();
        let request = PurchaseRequest::new(vec![
            PurchaseLineRequest::new("RICE", Quantity::from(10)).at_cost(Money::from(40)),
            PurchaseLineRequest::new("SOAP", Quantity::from(2)).in_unit("BOX"),
            PurchaseLineRequest::new("RICE", Quantity::from(10)).at_cost(Money::from(38)),
        ])
        .with_discount(Money::new(rust_decimal_macros::dec!(0.5)));

        let plan = plan_purchase("pb-1", &catalog, &LotLedger::new(), &request, Utc::now()).unwrap();

        assert_eq!(plan.lots.len(), 2);
        assert_eq!(plan.lots[0].product_code, "RICE");
        assert_eq!(plan.lots[0].quantity_received, Quantity::from(20));
        assert_eq!(plan.lots[0].remaining_in_stock, Quantity::from(20));
        assert_eq!(plan.lots[0].unit_cost, Money::from(39));
        assert_eq!(plan.lots[1].quantity_received, Quantity::from(24));
        // SOAP defaults to product cost 28 per piece.
        assert_eq!(plan.lots[1].unit_cost, Money::from(28));
        assert_eq!(plan.totals.items_total_amount, Money::from(780 + 672));
        assert_eq!(plan.totals.bill_amount, Money::from(1452));
        assert!(plan.lots[0].sequence < plan.lots[1].sequence);
    }

    #[test]
    fn test_oversized_product_cost_is_rejected() {
        let mut gold = product("GOLD", 40, true);
        gold.cost = Money::from(crate::MAX_AMOUNT + 1);
        let catalog: Catalog = [gold].into_iter().collect();
        let request = PurchaseRequest::new(vec![PurchaseLineRequest::new(
            "GOLD",
            Quantity::from(crate::MAX_QUANTITY),
        )]);

        assert!(matches!(
            plan_purchase("pb-1", &catalog, &LotLedger::new(), &request, Utc::now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_product() {
        let catalog = Catalog::new();
        let request = PurchaseRequest::new(vec![PurchaseLineRequest::new("RICE", Quantity::from(1))]);
        assert_eq!(
            plan_purchase("pb-1", &catalog, &LotLedger::new(), &request, Utc::now()),
            Err(CoreError::product_not_found("RICE"))
        );
    }
}
