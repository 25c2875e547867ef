//! # Seed Data Generator
//!
//! Populates a database with demo products, purchase bills and a sale for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed $BILLBOOK_DB_PATH (default ./billbook.db)
//! cargo run -p billbook-db --bin seed
//!
//! # Specify database path
//! cargo run -p billbook-db --bin seed -- --db ./data/billbook.db
//!
//! # More logging
//! RUST_LOG=debug cargo run -p billbook-db --bin seed
//! ```
//!
//! Database, organisation and retry settings come from `BILLBOOK_*`
//! variables (see `DbConfig::from_env` and `LedgerConfig::from_env`).

use billbook_core::purchase::PurchaseRequest;
use billbook_core::sale::CommitRequest;
use billbook_core::{
    GstDetails, Money, Product, PurchaseLineRequest, Quantity, SaleLineRequest, TaxRate, Unit,
};
use billbook_db::{Database, DbConfig, LedgerConfig, SaleCoordinator};
use rust_decimal::Decimal;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (code, name, primary unit, rate, cost, GST %, box size)
const PRODUCTS: &[(&str, &str, &str, i64, i64, i64, Option<i64>)] = &[
    ("RICE", "Basmati Rice", "kg", 90, 72, 5, None),
    ("SUGAR", "Sugar", "kg", 48, 40, 5, None),
    ("SOAP", "Bath Soap", "pcs", 35, 27, 18, Some(12)),
    ("TEA", "Assam Tea 250g", "pcs", 140, 110, 5, Some(20)),
    ("PEN", "Ball Pen", "pcs", 10, 6, 12, Some(50)),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn demo_product(organisation_id: &str, entry: &(&str, &str, &str, i64, i64, i64, Option<i64>)) -> Product {
    let (code, name, primary_unit, rate, cost, gst, box_size) = *entry;
    let half = TaxRate::from_percentage(Decimal::new(gst * 5, 1));

    let mut product = Product::new(organisation_id, code, name, primary_unit, Money::from(rate))
        .with_prices(Money::from(rate + rate / 10), Money::from(cost))
        .with_gst(GstDetails {
            hsn: None,
            sgst: half,
            cgst: half,
            inclusive: false,
        });

    if let Some(size) = box_size {
        product = product.with_unit(Unit {
            name: "box".to_string(),
            rate: Money::from(rate * size * 95 / 100),
            mrp: Money::from(rate * size),
            cost: Money::from(cost * size),
            conversion: Decimal::from(size),
        });
    }
    product
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Billbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $BILLBOOK_DB_PATH or ./billbook.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db_config = match &db_path {
        Some(path) => DbConfig::new(path),
        None => DbConfig::from_env()?,
    };
    let location = format!("{:?}", db_config.location);
    let config = LedgerConfig::from_env()?;
    let db = Database::new(db_config).await?;
    info!(location = %location, organisation_id = %config.organisation_id, "Connected");

    let organisation_id = config.organisation_id.clone();
    if !db.products().list(&organisation_id).await?.is_empty() {
        warn!("Database already has products; skipping seed");
        return Ok(());
    }

    for entry in PRODUCTS {
        db.products().insert(&demo_product(&organisation_id, entry)).await?;
    }
    info!(count = PRODUCTS.len(), "Products created");

    let coordinator = SaleCoordinator::new(db, config);

    // Two deliveries so FIFO has something to choose between.
    let first = coordinator
        .record_purchase(PurchaseRequest::new(vec![
            PurchaseLineRequest::new("RICE", Quantity::from(50)),
            PurchaseLineRequest::new("SUGAR", Quantity::from(25)),
            PurchaseLineRequest::new("SOAP", Quantity::from(2)).in_unit("box"),
            PurchaseLineRequest::new("TEA", Quantity::from(1)).in_unit("box"),
            PurchaseLineRequest::new("PEN", Quantity::from(2)).in_unit("box"),
        ]))
        .await?;
    let second = coordinator
        .record_purchase(
            PurchaseRequest::new(vec![
                PurchaseLineRequest::new("RICE", Quantity::from(30)).at_cost(Money::from(75)),
                PurchaseLineRequest::new("SOAP", Quantity::from(24)).at_cost(Money::from(28)),
            ])
            .with_discount(Money::from(50)),
        )
        .await?;
    info!(first = %first.id, second = %second.id, "Purchase bills recorded");

    let sale = coordinator
        .commit_sale(
            CommitRequest::new(vec![
                SaleLineRequest::new("RICE", Quantity::new(Decimal::new(525, 1))),
                SaleLineRequest::new("SOAP", Quantity::from(1)).in_unit("box"),
                SaleLineRequest::new("PEN", Quantity::from(3)),
            ])
            .with_discount(Money::from(20))
            .with_tax(),
        )
        .await?;

    for code in ["RICE", "SOAP", "PEN"] {
        coordinator.verify_conservation(code).await?;
    }

    println!();
    println!("✓ Seeded {}", location);
    println!("  Products: {}", PRODUCTS.len());
    println!("  Purchase bills: {}, {}", first.id, second.id);
    println!("  Sale: {} (bill amount {})", sale.id, sale.bill_amount);

    Ok(())
}
