//! # Domain Types
//!
//! Core domain types used throughout Billbook's inventory engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────────┐ │
//! │  │    Product      │   │   PurchaseLot    │   │ SaleConsumption-     │ │
//! │  │  ─────────────  │   │  ──────────────  │   │ Record               │ │
//! │  │  code (org-uniq)│   │  id (LotId)      │   │  ──────────────────  │ │
//! │  │  units[]        │◄──│  product_code    │◄──│  purchase_bill_id    │ │
//! │  │  rate/mrp/cost  │   │  quantity_recv'd │   │  sale_id             │ │
//! │  │  stocked, stock │   │  remaining       │   │  items[] (lot, qty)  │ │
//! │  └─────────────────┘   │  received_at     │   └──────────────────────┘ │
//! │                        └──────────────────┘                             │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────────┐ │
//! │  │  ResolvedLine   │   │  CommittedSale   │   │    TaxRate           │ │
//! │  │  rate × qty     │──►│  totals, GST?    │   │  percentage (9, 2.5) │ │
//! │  │  converted      │   │  consumptions[]  │   └──────────────────────┘ │
//! │  └─────────────────┘   └──────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger Invariant
//! For every lot: `0 ≤ remaining_in_stock ≤ quantity_received`, and
//! `quantity_received − remaining_in_stock` equals the sum of the quantities
//! recorded against it by non-voided sales.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::gst::GstSummary;
use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Tax Rate
// =============================================================================

/// A GST component rate expressed as a percentage (`9` = 9%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(#[ts(type = "string")] Decimal);

impl TaxRate {
    /// Creates a tax rate from a percentage.
    #[inline]
    pub const fn from_percentage(pct: Decimal) -> Self {
        TaxRate(pct)
    }

    /// Returns the rate as a percentage.
    #[inline]
    pub const fn percentage(&self) -> Decimal {
        self.0
    }

    /// Returns the rate as a fraction (`9%` → `0.09`).
    #[inline]
    pub fn fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

// =============================================================================
// Product
// =============================================================================

/// An alternate selling/purchasing unit of a product (e.g. "box" of 12).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Unit {
    /// Unit name, matched case-insensitively.
    pub name: String,
    pub rate: Money,
    pub mrp: Money,
    pub cost: Money,
    /// How many primary units one of this unit holds.
    #[ts(type = "string")]
    pub conversion: Decimal,
}

/// GST settings attached to a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GstDetails {
    /// HSN classification code.
    pub hsn: Option<String>,
    pub sgst: TaxRate,
    pub cgst: TaxRate,
    /// Whether the selling rate already includes tax.
    pub inclusive: bool,
}

/// A product in an organisation's catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Organisation this product belongs to.
    pub organisation_id: String,

    /// Business identifier, unique within the organisation.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Name of the unit every lot quantity is measured in.
    pub primary_unit: String,

    /// Alternate units with their own prices and conversion factor.
    pub units: Vec<Unit>,

    /// Selling rate per primary unit.
    pub rate: Money,

    /// Maximum retail price per primary unit.
    pub mrp: Money,

    /// Purchase cost per primary unit.
    pub cost: Money,

    /// Whether sales draw down purchase lots.
    pub stocked: bool,

    /// Denormalized stock counter. Lots are authoritative; this is a cache.
    pub stock: Quantity,

    /// GST settings.
    pub gst: GstDetails,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an unstocked product with no alternate units and no GST.
    pub fn new(
        organisation_id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        primary_unit: impl Into<String>,
        rate: Money,
    ) -> Self {
        let now = Utc::now();
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            organisation_id: organisation_id.into(),
            code: code.into(),
            name: name.into(),
            primary_unit: primary_unit.into(),
            units: Vec::new(),
            rate,
            mrp: rate,
            cost: rate,
            stocked: false,
            stock: Quantity::zero(),
            gst: GstDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_prices(mut self, mrp: Money, cost: Money) -> Self {
        self.mrp = mrp;
        self.cost = cost;
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn with_gst(mut self, gst: GstDetails) -> Self {
        self.gst = gst;
        self
    }

    /// Finds a named unit, ignoring case.
    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units
            .iter()
            .find(|unit| unit.name.eq_ignore_ascii_case(name.trim()))
    }
}

// =============================================================================
// Purchase Lots
// =============================================================================

/// Identifier of a purchase lot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LotId(String);

impl LotId {
    /// Generates a fresh lot id.
    pub fn generate() -> Self {
        LotId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for LotId {
    fn from(id: String) -> Self {
        LotId(id)
    }
}

impl From<&str> for LotId {
    fn from(id: &str) -> Self {
        LotId(id.to_string())
    }
}

/// One line of a purchase bill: a batch of stock bought at one cost.
///
/// Lots are never deleted. `remaining_in_stock` only moves through
/// consumption (decrement) and its reversal (increment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseLot {
    pub id: LotId,
    pub organisation_id: String,
    /// The purchase bill this lot arrived on.
    pub purchase_bill_id: String,
    pub product_code: String,
    /// Received quantity in primary units.
    pub quantity_received: Quantity,
    pub remaining_in_stock: Quantity,
    /// Cost per primary unit.
    pub unit_cost: Money,
    /// Creation time of the purchase bill. FIFO ordering key.
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    /// Insertion sequence, breaks `received_at` ties.
    pub sequence: i64,
    /// Optimistic-concurrency revision, bumped on every stock change.
    pub revision: i64,
}

impl PurchaseLot {
    /// Quantity already drawn out of this lot.
    #[inline]
    pub fn quantity_consumed(&self) -> Quantity {
        self.quantity_received - self.remaining_in_stock
    }

    #[inline]
    pub fn has_stock(&self) -> bool {
        self.remaining_in_stock.is_positive()
    }
}

/// What a single FIFO step took from a single lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LotConsumption {
    pub lot_id: LotId,
    pub purchase_bill_id: String,
    pub product_code: String,
    pub quantity_taken: Quantity,
    pub unit_cost: Money,
}

impl LotConsumption {
    /// Cost of goods drawn: `quantity_taken × unit_cost`.
    #[inline]
    pub fn amount(&self) -> Money {
        self.unit_cost.times(self.quantity_taken)
    }
}

// =============================================================================
// Sale Consumption Records
// =============================================================================

/// A product quantity a sale drew from one lot of a purchase bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsumedItem {
    pub lot_id: LotId,
    pub product_code: String,
    pub quantity: Quantity,
    pub amount: Money,
}

/// Back-reference from a purchase bill to a sale that drew from its lots.
///
/// Keyed by `(purchase_bill_id, sale_id)`. If the same sale draws from the
/// same lot again the existing item is extended, never replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleConsumptionRecord {
    pub purchase_bill_id: String,
    pub sale_id: String,
    pub items: Vec<ConsumedItem>,
}

impl SaleConsumptionRecord {
    pub fn new(purchase_bill_id: impl Into<String>, sale_id: impl Into<String>) -> Self {
        SaleConsumptionRecord {
            purchase_bill_id: purchase_bill_id.into(),
            sale_id: sale_id.into(),
            items: Vec::new(),
        }
    }

    /// Adds a consumption, merging with an existing item for the same lot.
    pub fn extend(&mut self, consumption: &LotConsumption) {
        let amount = consumption.amount();
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.lot_id == consumption.lot_id)
        {
            item.quantity += consumption.quantity_taken;
            item.amount += amount;
            return;
        }

        self.items.push(ConsumedItem {
            lot_id: consumption.lot_id.clone(),
            product_code: consumption.product_code.clone(),
            quantity: consumption.quantity_taken,
            amount,
        });
    }

    /// Total quantity recorded against `lot_id`.
    pub fn quantity_for_lot(&self, lot_id: &LotId) -> Quantity {
        self.items
            .iter()
            .filter(|item| &item.lot_id == lot_id)
            .map(|item| item.quantity)
            .sum()
    }
}

// =============================================================================
// Sales
// =============================================================================

/// The status of a committed sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Lots consumed, sale in effect.
    Committed,
    /// Lots restored, consumption records removed.
    Voided,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Committed => "committed",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested sale line, as the REST layer hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_code: String,
    /// Quantity in `unit` (or the primary unit when `unit` is absent).
    pub quantity: Quantity,
    pub unit: Option<String>,
}

impl SaleLineRequest {
    pub fn new(product_code: impl Into<String>, quantity: Quantity) -> Self {
        SaleLineRequest {
            product_code: product_code.into(),
            quantity,
            unit: None,
        }
    }

    pub fn in_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A sale line after catalog resolution. Frozen once the sale commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedLine {
    pub product_code: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    /// Unit the quantity was requested in.
    pub unit: String,
    pub quantity: Quantity,
    pub rate: Money,
    pub mrp: Money,
    pub cost: Money,
    /// Quantity in primary units: `quantity × conversion`.
    pub converted: Quantity,
    pub stocked: bool,
    pub gst: GstDetails,
}

impl ResolvedLine {
    /// Line amount: `quantity × rate`.
    #[inline]
    pub fn amount(&self) -> Money {
        self.rate.times(self.quantity)
    }
}

/// The outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommittedSale {
    pub id: String,
    pub organisation_id: String,
    pub status: SaleStatus,
    pub lines: Vec<ResolvedLine>,
    pub items_total_amount: Money,
    pub discount_amount: Money,
    /// `round(items_total_amount − discount_amount)`.
    pub bill_amount: Money,
    /// Absent when tax was not requested (distinct from a zero-tax summary).
    pub gst_summary: Option<GstSummary>,
    /// Every lot draw in FIFO order, per line.
    pub consumptions: Vec<LotConsumption>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Purchases
// =============================================================================

/// A requested purchase line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseLineRequest {
    pub product_code: String,
    pub quantity: Quantity,
    pub unit: Option<String>,
    /// Cost per primary unit; defaults to the product's cost.
    pub unit_cost: Option<Money>,
}

impl PurchaseLineRequest {
    pub fn new(product_code: impl Into<String>, quantity: Quantity) -> Self {
        PurchaseLineRequest {
            product_code: product_code.into(),
            quantity,
            unit: None,
            unit_cost: None,
        }
    }

    pub fn in_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn at_cost(mut self, unit_cost: Money) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }
}

/// A saved purchase bill and the lots it created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseBill {
    pub id: String,
    pub organisation_id: String,
    pub lots: Vec<PurchaseLot>,
    pub items_total_amount: Money,
    pub discount_amount: Money,
    pub bill_amount: Money,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot(received: i64, remaining: i64) -> PurchaseLot {
        PurchaseLot {
            id: LotId::from("lot-1"),
            organisation_id: "org".to_string(),
            purchase_bill_id: "pb-1".to_string(),
            product_code: "RICE".to_string(),
            quantity_received: Quantity::from(received),
            remaining_in_stock: Quantity::from(remaining),
            unit_cost: Money::from(40),
            received_at: Utc::now(),
            sequence: 1,
            revision: 0,
        }
    }

    #[test]
    fn test_tax_rate_fraction() {
        let rate = TaxRate::from_percentage(dec!(9));
        assert_eq!(rate.fraction(), dec!(0.09));
        assert_eq!(rate.to_string(), "9%");
        assert!(TaxRate::default().is_zero());
    }

    #[test]
    fn test_lot_consumed_quantity() {
        let lot = lot(10, 4);
        assert_eq!(lot.quantity_consumed(), Quantity::from(6));
        assert!(lot.has_stock());
        assert!(!self::lot(10, 0).has_stock());
    }

    #[test]
    fn test_consumption_record_extends_same_lot() {
        let mut record = SaleConsumptionRecord::new("pb-1", "sale-1");
        let take = LotConsumption {
            lot_id: LotId::from("lot-1"),
            purchase_bill_id: "pb-1".to_string(),
            product_code: "RICE".to_string(),
            quantity_taken: Quantity::from(2),
            unit_cost: Money::from(40),
        };

        record.extend(&take);
        record.extend(&take);

        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].quantity, Quantity::from(4));
        assert_eq!(record.items[0].amount, Money::from(160));
        assert_eq!(record.quantity_for_lot(&LotId::from("lot-1")), Quantity::from(4));
    }

    #[test]
    fn test_sale_status_strings() {
        assert_eq!(SaleStatus::Committed.as_str(), "committed");
        assert_eq!(SaleStatus::Voided.to_string(), "voided");
    }
}
