//! # Repository Module
//!
//! Database repository implementations for Billbook.
//!
//! ## Two Kinds of Access
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Repository structs (ProductRepository, LotRepository, SaleRepository) │
//! │  └── own a pool clone; one statement (or one small tx) per call        │
//! │      used for reads and administrative edits                           │
//! │                                                                         │
//! │  Free functions taking `&mut SqliteConnection`                         │
//! │  └── run inside the SaleCoordinator's transaction                      │
//! │      every ledger write goes through these                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decimal Storage
//! Money, quantities and tax percentages are TEXT columns holding the exact
//! decimal string. A value that fails to parse is reported as
//! `DbError::CorruptValue`, never silently defaulted.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products, units, GST details, stock cache
//! - [`LotRepository`](lot::LotRepository) - Purchase bills and lots
//! - [`SaleRepository`](sale::SaleRepository) - Sales, line snapshots, consumption records

pub mod lot;
pub mod product;
pub mod sale;

use billbook_core::{Money, Quantity, TaxRate};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

/// Parses a stored decimal column.
pub(crate) fn parse_decimal(field: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw).map_err(|_| DbError::corrupt(field, raw))
}

pub(crate) fn parse_money(field: &str, raw: &str) -> DbResult<Money> {
    parse_decimal(field, raw).map(Money::new)
}

pub(crate) fn parse_quantity(field: &str, raw: &str) -> DbResult<Quantity> {
    parse_decimal(field, raw).map(Quantity::new)
}

pub(crate) fn parse_rate(field: &str, raw: &str) -> DbResult<TaxRate> {
    parse_decimal(field, raw).map(TaxRate::from_percentage)
}

/// Text form of a money column.
pub(crate) fn money_text(amount: Money) -> String {
    amount.amount().to_string()
}

/// Text form of a quantity column.
pub(crate) fn quantity_text(quantity: Quantity) -> String {
    quantity.value().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_text_round_trip() {
        let money = Money::new(dec!(133.335));
        assert_eq!(parse_money("rate", &money_text(money)).unwrap(), money);

        let qty = Quantity::new(dec!(0.250));
        assert_eq!(quantity_text(qty), "0.250");
        assert_eq!(parse_quantity("stock", "0.250").unwrap(), qty);
    }

    #[test]
    fn test_corrupt_value() {
        assert!(matches!(
            parse_rate("sgst", "nine"),
            Err(DbError::CorruptValue { field, value }) if field == "sgst" && value == "nine"
        ));
    }
}
