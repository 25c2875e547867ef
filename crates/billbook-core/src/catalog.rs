//! # Product Catalog
//!
//! Read-only product lookup and line resolution.
//!
//! ## Resolution Rule
//! ```text
//! request: (code, quantity, unit?)
//!      │
//!      ▼
//! product = catalog[code] ──── missing ──► ProductNotFound
//!      │
//!      ├── unit named AND matches product.units (case-insensitive)
//!      │      rate/mrp/cost = unit.*,    converted = quantity × conversion
//!      │
//!      └── otherwise
//!             rate/mrp/cost = product.*, converted = quantity
//! ```
//!
//! Resolution never touches stock. Prices, conversions and tax rates are
//! bounds-checked before any arithmetic, so a product built outside the
//! repository cannot overflow a line amount.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{Product, ResolvedLine, SaleLineRequest};
use crate::validation::{
    validate_conversion, validate_non_negative_money, validate_quantity, validate_tax_rate,
};

// =============================================================================
// Lookup Trait
// =============================================================================

/// Anything that can look products up by code within one organisation.
pub trait CatalogLookup {
    fn find(&self, code: &str) -> Option<&Product>;

    /// Looks a product up, failing with `ProductNotFound`.
    fn get(&self, code: &str) -> CoreResult<&Product> {
        self.find(code)
            .ok_or_else(|| CoreError::product_not_found(code))
    }
}

/// In-memory catalog keyed by product code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<String, Product>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.code.clone(), product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl FromIterator<Product> for Catalog {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for product in iter {
            catalog.insert(product);
        }
        catalog
    }
}

impl CatalogLookup for Catalog {
    fn find(&self, code: &str) -> Option<&Product> {
        self.products.get(code)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolves one requested line against the catalog.
pub fn resolve_line(catalog: &impl CatalogLookup, request: &SaleLineRequest) -> CoreResult<ResolvedLine> {
    let product = catalog.get(&request.product_code)?;

    let named_unit = request
        .unit
        .as_deref()
        .and_then(|name| product.unit(name));

    validate_quantity(request.quantity)?;

    let (unit, rate, mrp, cost, converted) = match named_unit {
        Some(unit) => {
            validate_conversion(unit.conversion)?;
            (
                unit.name.clone(),
                unit.rate,
                unit.mrp,
                unit.cost,
                request.quantity.converted(unit.conversion),
            )
        }
        None => (
            product.primary_unit.clone(),
            product.rate,
            product.mrp,
            product.cost,
            request.quantity,
        ),
    };

    validate_non_negative_money("rate", rate)?;
    validate_non_negative_money("mrp", mrp)?;
    validate_non_negative_money("cost", cost)?;
    validate_tax_rate("sgst", product.gst.sgst)?;
    validate_tax_rate("cgst", product.gst.cgst)?;

    let line = ResolvedLine {
        product_code: product.code.clone(),
        name: product.name.clone(),
        unit,
        quantity: request.quantity,
        rate,
        mrp,
        cost,
        converted,
        stocked: product.stocked,
        gst: product.gst.clone(),
    };

    Ok(line)
}

/// Resolves every line, failing fast on the first missing product.
pub fn resolve_lines(
    catalog: &impl CatalogLookup,
    requests: &[SaleLineRequest],
) -> CoreResult<Vec<ResolvedLine>> {
    requests
        .iter()
        .map(|request| resolve_line(catalog, request))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::{GstDetails, Unit};
    use crate::{Money, Quantity};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub(crate) fn product(code: &str, rate: i64, stocked: bool) -> Product {
        Product {
            id: format!("id-{code}"),
            organisation_id: crate::DEFAULT_ORGANISATION_ID.to_string(),
            code: code.to_string(),
            name: format!("{code} name"),
            primary_unit: "pcs".to_string(),
            units: vec![Unit {
                name: "Box".to_string(),
                rate: Money::from(rate * 12 - 10),
                mrp: Money::from(rate * 12),
                cost: Money::from(rate * 10),
                conversion: dec!(12),
            }],
            rate: Money::from(rate),
            mrp: Money::from(rate + 5),
            cost: Money::from(rate - 2),
            stocked,
            stock: Quantity::zero(),
            gst: GstDetails::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_primary_unit() {
        let catalog: Catalog = [product("SOAP", 30, true)].into_iter().collect();
        let line = resolve_line(&catalog, &SaleLineRequest::new("SOAP", Quantity::from(3))).unwrap();

        assert_eq!(line.unit, "pcs");
        assert_eq!(line.rate, Money::from(30));
        assert_eq!(line.converted, Quantity::from(3));
        assert_eq!(line.amount(), Money::from(90));
    }

    #[test]
    fn test_resolve_named_unit_case_insensitive() {
        let catalog: Catalog = [product("SOAP", 30, true)].into_iter().collect();
        let request = SaleLineRequest::new("SOAP", Quantity::from(2)).in_unit("BOX");
        let line = resolve_line(&catalog, &request).unwrap();

        assert_eq!(line.unit, "Box");
        assert_eq!(line.rate, Money::from(350));
        assert_eq!(line.cost, Money::from(300));
        assert_eq!(line.converted, Quantity::from(24));
        assert_eq!(line.quantity, Quantity::from(2));
    }

    #[test]
    fn test_unknown_unit_falls_back_to_product_prices() {
        let catalog: Catalog = [product("SOAP", 30, true)].into_iter().collect();
        let request = SaleLineRequest::new("SOAP", Quantity::from(2)).in_unit("crate");
        let line = resolve_line(&catalog, &request).unwrap();

        assert_eq!(line.rate, Money::from(30));
        assert_eq!(line.converted, Quantity::from(2));
    }

    #[test]
    fn test_oversized_prices_are_rejected_before_multiplying() {
        let mut huge = product("GOLD", 30, true);
        huge.rate = Money::from(1_000_000_000_000_000);
        let catalog: Catalog = [huge].into_iter().collect();

        let err = resolve_line(&catalog, &SaleLineRequest::new("GOLD", Quantity::from(3)))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));

        let mut wide = product("WIRE", 30, true);
        wide.units[0].conversion = Decimal::from(crate::MAX_CONVERSION) * dec!(10);
        let catalog: Catalog = [wide].into_iter().collect();
        let request = SaleLineRequest::new("WIRE", Quantity::from(5)).in_unit("box");
        assert!(resolve_line(&catalog, &request).is_err());
    }

    #[test]
    fn test_missing_product_fails_fast() {
        let catalog: Catalog = [product("SOAP", 30, true)].into_iter().collect();
        let requests = vec![
            SaleLineRequest::new("SOAP", Quantity::from(1)),
            SaleLineRequest::new("GHOST", Quantity::from(1)),
        ];

        assert_eq!(
            resolve_lines(&catalog, &requests),
            Err(CoreError::product_not_found("GHOST"))
        );
    }
}
