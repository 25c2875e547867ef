//! # GST Calculator
//!
//! Per-line and aggregate GST across heterogeneous SGST/CGST slabs.
//!
//! ## Formulae
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per line                                                               │
//! │    fraction = (sgst% + cgst%) / 100                                     │
//! │    tax      = amount × fraction                                         │
//! │    taxable  = inclusive ? amount − tax : amount                         │
//! │                                                                         │
//! │  Totals                                                                 │
//! │    total_tax             = Σ tax                                        │
//! │    total_taxable_amount  = Σ taxable                                    │
//! │    total_amount_with_tax = Σ (tax + taxable)                            │
//! │                                                                         │
//! │  Slabs (SGST and CGST independently, non-zero % only)                   │
//! │    component = line's own sgst% (or cgst%) / 100                        │
//! │    slab tax     = Σ amount × component                                  │
//! │    slab taxable = Σ (inclusive ? amount − amount × component : amount)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every figure is left unrounded. Slabs are listed in order of first
//! appearance among the lines.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{ResolvedLine, TaxRate};

// =============================================================================
// Input
// =============================================================================

/// A priced line as far as GST is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GstLine {
    pub hsn: Option<String>,
    pub amount: Money,
    pub sgst: TaxRate,
    pub cgst: TaxRate,
    pub inclusive: bool,
}

impl GstLine {
    pub fn new(amount: Money, sgst: TaxRate, cgst: TaxRate, inclusive: bool) -> Self {
        GstLine {
            hsn: None,
            amount,
            sgst,
            cgst,
            inclusive,
        }
    }
}

impl From<&ResolvedLine> for GstLine {
    fn from(line: &ResolvedLine) -> Self {
        GstLine {
            hsn: line.gst.hsn.clone(),
            amount: line.amount(),
            sgst: line.gst.sgst,
            cgst: line.gst.cgst,
            inclusive: line.gst.inclusive,
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// One line with its computed tax figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GstLineResult {
    #[serde(flatten)]
    #[ts(flatten)]
    pub line: GstLine,
    pub tax_amount: Money,
    pub taxable_amount: Money,
}

/// Aggregate of every line carrying one SGST (or CGST) percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GstSlab {
    pub slab: TaxRate,
    pub total_tax_amount: Money,
    pub total_taxable_amount: Money,
}

/// Slab lists for both GST components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GstSlabs {
    pub sgst: Vec<GstSlab>,
    pub cgst: Vec<GstSlab>,
}

/// The GST summary of a bill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GstSummary {
    pub total_tax: Money,
    pub total_taxable_amount: Money,
    pub total_amount_with_tax: Money,
    pub lines: Vec<GstLineResult>,
    pub slabs: GstSlabs,
}

// =============================================================================
// Calculation
// =============================================================================

#[derive(Clone, Copy)]
enum Component {
    Sgst,
    Cgst,
}

impl Component {
    fn rate(self, line: &GstLine) -> TaxRate {
        match self {
            Component::Sgst => line.sgst,
            Component::Cgst => line.cgst,
        }
    }
}

/// Computes the GST summary for a list of lines.
///
/// Pure; malformed rates are the caller's problem.
pub fn summarize(lines: &[GstLine]) -> GstSummary {
    let results: Vec<GstLineResult> = lines.iter().map(line_result).collect();

    let total_tax = results.iter().map(|r| r.tax_amount).sum();
    let total_taxable_amount = results.iter().map(|r| r.taxable_amount).sum();
    let total_amount_with_tax = results
        .iter()
        .map(|r| r.tax_amount + r.taxable_amount)
        .sum();

    GstSummary {
        total_tax,
        total_taxable_amount,
        total_amount_with_tax,
        slabs: GstSlabs {
            sgst: slabs(lines, Component::Sgst),
            cgst: slabs(lines, Component::Cgst),
        },
        lines: results,
    }
}

/// Summarizes resolved sale lines (amount = quantity × rate).
pub fn summarize_resolved(lines: &[ResolvedLine]) -> GstSummary {
    let gst_lines: Vec<GstLine> = lines.iter().map(GstLine::from).collect();
    summarize(&gst_lines)
}

fn line_result(line: &GstLine) -> GstLineResult {
    let fraction = line.sgst.fraction() + line.cgst.fraction();
    let tax_amount = line.amount * fraction;
    let taxable_amount = if line.inclusive {
        line.amount - tax_amount
    } else {
        line.amount
    };

    GstLineResult {
        line: line.clone(),
        tax_amount,
        taxable_amount,
    }
}

fn slabs(lines: &[GstLine], component: Component) -> Vec<GstSlab> {
    let mut slabs: Vec<GstSlab> = Vec::new();

    for line in lines {
        let rate = component.rate(line);
        if rate.is_zero() {
            continue;
        }

        let tax = line.amount.tax_at(rate);
        let taxable = if line.inclusive {
            line.amount - tax
        } else {
            line.amount
        };

        match slabs.iter_mut().find(|slab| slab.slab == rate) {
            Some(slab) => {
                slab.total_tax_amount += tax;
                slab.total_taxable_amount += taxable;
            }
            None => slabs.push(GstSlab {
                slab: rate,
                total_tax_amount: tax,
                total_taxable_amount: taxable,
            }),
        }
    }

    slabs
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pct(value: rust_decimal::Decimal) -> TaxRate {
        TaxRate::from_percentage(value)
    }

    #[test]
    fn test_mixed_slabs_example() {
        let lines = vec![
            GstLine::new(Money::from(100), pct(dec!(10)), pct(dec!(0)), true),
            GstLine::new(Money::from(100), pct(dec!(10)), pct(dec!(20)), false),
        ];

        let summary = summarize(&lines);

        assert_eq!(summary.total_tax, Money::from(40));
        assert_eq!(summary.total_taxable_amount, Money::from(190));
        assert_eq!(summary.total_amount_with_tax, Money::from(230));

        assert_eq!(summary.slabs.sgst.len(), 1);
        assert_eq!(summary.slabs.sgst[0].slab, pct(dec!(10)));
        assert_eq!(summary.slabs.sgst[0].total_tax_amount, Money::from(20));
        assert_eq!(summary.slabs.sgst[0].total_taxable_amount, Money::from(190));

        assert_eq!(summary.slabs.cgst.len(), 1);
        assert_eq!(summary.slabs.cgst[0].slab, pct(dec!(20)));
        assert_eq!(summary.slabs.cgst[0].total_tax_amount, Money::from(20));
        assert_eq!(summary.slabs.cgst[0].total_taxable_amount, Money::from(100));
    }

    #[test]
    fn test_per_line_results() {
        let lines = vec![GstLine::new(Money::from(100), pct(dec!(9)), pct(dec!(9)), true)];
        let summary = summarize(&lines);

        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.lines[0].tax_amount, Money::from(18));
        assert_eq!(summary.lines[0].taxable_amount, Money::from(82));
        assert_eq!(summary.total_amount_with_tax, Money::from(100));
    }

    #[test]
    fn test_zero_rate_lines_count_in_totals_only() {
        let lines = vec![
            GstLine::new(Money::from(50), pct(dec!(0)), pct(dec!(0)), false),
            GstLine::new(Money::from(200), pct(dec!(2.5)), pct(dec!(2.5)), false),
        ];
        let summary = summarize(&lines);

        assert_eq!(summary.total_taxable_amount, Money::from(250));
        assert_eq!(summary.total_tax, Money::from(10));
        assert_eq!(summary.slabs.sgst.len(), 1);
        assert_eq!(summary.slabs.sgst[0].total_taxable_amount, Money::from(200));
    }

    #[test]
    fn test_slabs_keep_first_appearance_order() {
        let lines = vec![
            GstLine::new(Money::from(10), pct(dec!(14)), pct(dec!(14)), false),
            GstLine::new(Money::from(10), pct(dec!(2.5)), pct(dec!(2.5)), false),
            GstLine::new(Money::from(10), pct(dec!(14)), pct(dec!(14)), false),
        ];
        let summary = summarize(&lines);

        let order: Vec<TaxRate> = summary.slabs.sgst.iter().map(|s| s.slab).collect();
        assert_eq!(order, vec![pct(dec!(14)), pct(dec!(2.5))]);
        assert_eq!(summary.slabs.sgst[0].total_tax_amount, Money::new(dec!(2.8)));
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&[]);
        assert!(summary.total_tax.is_zero());
        assert!(summary.slabs.sgst.is_empty());
        assert!(summary.lines.is_empty());
    }
}
