//! # billbook-core: Pure Ledger Logic for Billbook
//!
//! This crate is the **heart** of Billbook's inventory engine. It contains the
//! cost-ledger and tax logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Billbook Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               REST layer / React client (external)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ commit_sale / void_sale                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           billbook-db (SaleCoordinator, repositories)           │   │
//! │  │      transactions, CAS writes, retries, per-product locks       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plans + mutation commands             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ billbook-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │ catalog  │  │   gst    │  │  ledger  │  │     sale     │   │   │
//! │  │   │ resolve  │  │ summary  │  │  FIFO    │  │ plan/totals  │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, PurchaseLot, SaleConsumptionRecord, ...)
//! - [`money`] - Exact decimal `Money` with fixed rounding rules
//! - [`quantity`] - Stock `Quantity` in primary-unit terms
//! - [`catalog`] - Product resolution (units, rates, conversions)
//! - [`gst`] - GST summary and SGST/CGST slabs
//! - [`ledger`] - Purchase lot arena, FIFO consumption planning, mutations
//! - [`sale`] - Sale commit/void planning and bill totals
//! - [`purchase`] - Purchase bills into new lots
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use billbook_core::ledger::LotLedger;
//! use billbook_core::{Money, Quantity};
//! use chrono::{Duration, Utc};
//!
//! let mut ledger = LotLedger::new();
//! let t1 = Utc::now();
//! let old = ledger.replenish("bill-1", "RICE", Quantity::from(5), Money::from(40), t1).unwrap();
//! let new = ledger
//!     .replenish("bill-2", "RICE", Quantity::from(5), Money::from(42), t1 + Duration::days(1))
//!     .unwrap();
//!
//! let taken = ledger.consume("RICE", Quantity::from(7)).unwrap();
//! assert_eq!(taken[0].lot_id, old);
//! assert_eq!(taken[0].quantity_taken, Quantity::from(5));
//! assert_eq!(taken[1].lot_id, new);
//! assert_eq!(taken[1].quantity_taken, Quantity::from(2));
//! ```

pub mod catalog;
pub mod error;
pub mod gst;
pub mod ledger;
pub mod money;
pub mod purchase;
pub mod quantity;
pub mod sale;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

/// Default organisation for single-tenant deployments.
///
/// Every row carries an organisation id so multi-organisation installs share
/// one schema; product codes are unique per organisation.
pub const DEFAULT_ORGANISATION_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum line items accepted in one sale commit.
pub const MAX_SALE_LINES: usize = 500;

/// Largest quantity accepted on one line, in the requested unit.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest rate, cost, discount or unit cost accepted.
pub const MAX_AMOUNT: i64 = 10_000_000_000;

/// Largest primary units per named unit.
///
/// With the other bounds, a full bill of MAX_SALE_LINES lines stays far
/// inside `Decimal` range.
pub const MAX_CONVERSION: i64 = 1_000_000;

/// Default number of attempts for a commit that loses a concurrency race.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;
