//! End-to-end ledger flows against an in-memory database.

use billbook_core::purchase::PurchaseRequest;
use billbook_core::sale::CommitRequest;
use billbook_core::{
    CoreError, GstDetails, Money, Product, PurchaseLineRequest, Quantity, SaleLineRequest, SaleStatus, TaxRate,
    Unit,
};
use billbook_db::repository::product;
use billbook_db::{Database, DbConfig, DbError, LedgerConfig, SaleCoordinator};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::time::Duration;

async fn coordinator() -> SaleCoordinator {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let config = LedgerConfig::default().retry_backoff(Duration::from_millis(1));
    SaleCoordinator::new(db, config)
}

async fn add_product(coordinator: &SaleCoordinator, product: Product) {
    coordinator.database().products().insert(&product).await.unwrap();
}

fn item(coordinator: &SaleCoordinator, code: &str, rate: Money) -> Product {
    Product::new(coordinator.organisation_id(), code, format!("{code} item"), "pcs", rate)
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, d, 10, 0, 0).unwrap()
}

async fn stock_of(coordinator: &SaleCoordinator, code: &str) -> Quantity {
    coordinator
        .database()
        .products()
        .get_by_code(coordinator.organisation_id(), code)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn remaining(coordinator: &SaleCoordinator, code: &str) -> Vec<Quantity> {
    coordinator
        .database()
        .lots()
        .list_for_product(coordinator.organisation_id(), code)
        .await
        .unwrap()
        .into_iter()
        .map(|lot| lot.remaining_in_stock)
        .collect()
}

fn sell(code: &str, quantity: Quantity) -> CommitRequest {
    CommitRequest::new(vec![SaleLineRequest::new(code, quantity)])
}

#[tokio::test]
async fn test_fifo_across_purchase_bills() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;

    c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();
    c.replenish("RICE", Quantity::from(5), Money::from(50), day(2)).await.unwrap();
    assert_eq!(stock_of(&c, "RICE").await, Quantity::from(10));

    let sale = c.commit_sale(sell("RICE", Quantity::from(7))).await.unwrap();

    assert_eq!(sale.status, SaleStatus::Committed);
    assert_eq!(sale.consumptions.len(), 2);
    assert_eq!(sale.consumptions[0].quantity_taken, Quantity::from(5));
    assert_eq!(sale.consumptions[1].quantity_taken, Quantity::from(2));
    assert_eq!(remaining(&c, "RICE").await, vec![Quantity::zero(), Quantity::from(3)]);
    assert_eq!(stock_of(&c, "RICE").await, Quantity::from(3));

    let records = c.database().sales().records_for_sale(&sale.id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].items[0].amount, Money::from(200));
    assert_eq!(records[1].items[0].amount, Money::from(100));

    c.verify_conservation("RICE").await.unwrap();
}

#[tokio::test]
async fn test_receipt_time_orders_lots_not_insertion() {
    let c = coordinator().await;
    add_product(&c, item(&c, "TEA", Money::from(20))).await;

    let late = c.replenish("TEA", Quantity::from(4), Money::from(12), day(9)).await.unwrap();
    let early = c.replenish("TEA", Quantity::from(4), Money::from(10), day(3)).await.unwrap();

    let sale = c.commit_sale(sell("TEA", Quantity::from(5))).await.unwrap();
    assert_eq!(sale.consumptions[0].lot_id, early);
    assert_eq!(sale.consumptions[1].lot_id, late);
    assert_eq!(sale.consumptions[1].quantity_taken, Quantity::from(1));
}

#[tokio::test]
async fn test_shortfall_leaves_every_lot_untouched() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;
    add_product(&c, item(&c, "SUGAR", Money::from(40))).await;
    c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();
    c.replenish("SUGAR", Quantity::from(1), Money::from(30), day(1)).await.unwrap();

    let request = CommitRequest::new(vec![
        SaleLineRequest::new("RICE", Quantity::from(3)),
        SaleLineRequest::new("SUGAR", Quantity::from(2)),
    ]);
    let err = c.commit_sale(request).await.unwrap_err();

    match err {
        DbError::Core(CoreError::InsufficientStock { product_code, short_by }) => {
            assert_eq!(product_code, "SUGAR");
            assert_eq!(short_by, Quantity::from(1));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(remaining(&c, "RICE").await, vec![Quantity::from(5)]);
    assert_eq!(remaining(&c, "SUGAR").await, vec![Quantity::from(1)]);
    assert_eq!(stock_of(&c, "RICE").await, Quantity::from(5));
}

#[tokio::test]
async fn test_same_product_on_two_lines_draws_once_from_each_lot() {
    let c = coordinator().await;
    add_product(&c, item(&c, "PEN", Money::from(10))).await;
    c.replenish("PEN", Quantity::from(3), Money::from(6), day(1)).await.unwrap();
    c.replenish("PEN", Quantity::from(3), Money::from(7), day(2)).await.unwrap();

    let request = CommitRequest::new(vec![
        SaleLineRequest::new("PEN", Quantity::from(2)),
        SaleLineRequest::new("PEN", Quantity::from(2)),
    ]);
    c.commit_sale(request).await.unwrap();

    assert_eq!(remaining(&c, "PEN").await, vec![Quantity::zero(), Quantity::from(2)]);
    c.verify_conservation("PEN").await.unwrap();

    let too_many = CommitRequest::new(vec![
        SaleLineRequest::new("PEN", Quantity::from(1)),
        SaleLineRequest::new("PEN", Quantity::from(2)),
    ]);
    assert!(c.commit_sale(too_many).await.is_err());
    assert_eq!(remaining(&c, "PEN").await, vec![Quantity::zero(), Quantity::from(2)]);
}

#[tokio::test]
async fn test_commit_then_void_restores_everything() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;
    c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();
    c.replenish("RICE", Quantity::from(5), Money::from(50), day(2)).await.unwrap();

    let sale = c.commit_sale(sell("RICE", Quantity::from(7))).await.unwrap();
    c.void_sale(&sale.id).await.unwrap();

    assert_eq!(remaining(&c, "RICE").await, vec![Quantity::from(5), Quantity::from(5)]);
    assert_eq!(stock_of(&c, "RICE").await, Quantity::from(10));
    assert!(c.database().sales().records_for_sale(&sale.id).await.unwrap().is_empty());

    let voided = c.get_sale(&sale.id).await.unwrap();
    assert_eq!(voided.status, SaleStatus::Voided);
    assert!(voided.voided_at.is_some());
    assert_eq!(voided.consumptions.len(), 2);

    c.verify_conservation("RICE").await.unwrap();
}

#[tokio::test]
async fn test_void_twice_and_unknown_sale() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;
    c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();

    let sale = c.commit_sale(sell("RICE", Quantity::from(2))).await.unwrap();
    c.void_sale(&sale.id).await.unwrap();

    let again = c.void_sale(&sale.id).await.unwrap_err();
    assert!(matches!(again, DbError::Core(CoreError::InvalidSaleStatus { .. })));
    assert_eq!(remaining(&c, "RICE").await, vec![Quantity::from(5)]);

    let missing = c.void_sale("no-such-sale").await.unwrap_err();
    assert!(matches!(missing, DbError::Core(CoreError::SaleNotFound(_))));
}

#[tokio::test]
async fn test_unstocked_products_sell_without_lots() {
    let c = coordinator().await;
    add_product(&c, item(&c, "SERVICE", Money::from(250))).await;

    let sale = c.commit_sale(sell("SERVICE", Quantity::from(2))).await.unwrap();

    assert!(sale.consumptions.is_empty());
    assert_eq!(sale.bill_amount, Money::from(500));
    assert!(stock_of(&c, "SERVICE").await.is_zero());
}

#[tokio::test]
async fn test_named_unit_consumes_converted_quantity() {
    let c = coordinator().await;
    let soap = item(&c, "SOAP", Money::from(30)).with_unit(Unit {
        name: "box".to_string(),
        rate: Money::from(340),
        mrp: Money::from(360),
        cost: Money::from(300),
        conversion: dec!(12),
    });
    add_product(&c, soap).await;

    let bill = c
        .record_purchase_at(
            PurchaseRequest::new(vec![PurchaseLineRequest::new("SOAP", Quantity::from(2)).in_unit("BOX")]),
            day(1),
        )
        .await
        .unwrap();
    assert_eq!(bill.lots[0].quantity_received, Quantity::from(24));

    let sale = c
        .commit_sale(CommitRequest::new(vec![
            SaleLineRequest::new("SOAP", Quantity::from(1)).in_unit("box")
        ]))
        .await
        .unwrap();

    assert_eq!(sale.lines[0].unit, "box");
    assert_eq!(sale.lines[0].converted, Quantity::from(12));
    assert_eq!(sale.items_total_amount, Money::from(340));
    assert_eq!(remaining(&c, "SOAP").await, vec![Quantity::from(12)]);
}

#[tokio::test]
async fn test_gst_summary_persisted_only_when_requested() {
    let c = coordinator().await;
    let soap = item(&c, "SOAP", Money::from(100)).with_gst(GstDetails {
        hsn: Some("3401".to_string()),
        sgst: TaxRate::from_percentage(dec!(9)),
        cgst: TaxRate::from_percentage(dec!(9)),
        inclusive: false,
    });
    add_product(&c, soap).await;

    let taxed = c.commit_sale(sell("SOAP", Quantity::from(2)).with_tax()).await.unwrap();
    let untaxed = c.commit_sale(sell("SOAP", Quantity::from(1))).await.unwrap();

    let stored = c.get_sale(&taxed.id).await.unwrap();
    let summary = stored.gst_summary.as_ref().expect("tax was requested");
    assert_eq!(summary.total_tax, Money::from(36));
    assert_eq!(summary.total_amount_with_tax, Money::from(236));
    assert_eq!(summary.slabs.sgst.len(), 1);
    assert_eq!(summary.lines[0].line.hsn.as_deref(), Some("3401"));
    assert_eq!(stored.gst_summary, taxed.gst_summary);

    assert!(c.get_sale(&untaxed.id).await.unwrap().gst_summary.is_none());
}

#[tokio::test]
async fn test_bill_amount_rounding_and_discount() {
    let c = coordinator().await;
    add_product(&c, item(&c, "OIL", Money::new(dec!(133.335)))).await;
    add_product(&c, item(&c, "SALT", Money::new(dec!(100)))).await;

    let odd = c.commit_sale(sell("OIL", Quantity::from(1))).await.unwrap();
    assert_eq!(odd.items_total_amount, Money::new(dec!(133.335)));
    assert_eq!(odd.bill_amount, Money::from(133));

    let discounted = c
        .commit_sale(sell("SALT", Quantity::from(2)).with_discount(Money::new(dec!(10.5))))
        .await
        .unwrap();
    assert_eq!(discounted.bill_amount, Money::from(190));

    let stored = c.get_sale(&odd.id).await.unwrap();
    assert_eq!(stored.lines[0].rate, Money::new(dec!(133.335)));
    assert_eq!(stored.bill_amount, Money::from(133));
}

#[tokio::test]
async fn test_sale_lines_are_frozen_snapshots() {
    let c = coordinator().await;
    add_product(&c, item(&c, "SOAP", Money::from(30))).await;

    let sale = c.commit_sale(sell("SOAP", Quantity::from(1)).with_tax()).await.unwrap();

    let details = GstDetails {
        hsn: None,
        sgst: TaxRate::from_percentage(dec!(14)),
        cgst: TaxRate::from_percentage(dec!(14)),
        inclusive: true,
    };
    let updated = c.set_gst_details("SOAP", &details).await.unwrap();
    assert_eq!(updated.gst, details);

    let stored = c.get_sale(&sale.id).await.unwrap();
    assert!(stored.lines[0].gst.sgst.is_zero());
    assert_eq!(stored.lines[0].name, "SOAP item");
}

#[tokio::test]
async fn test_replenish_never_merges() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;

    let first = c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();
    let second = c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(remaining(&c, "RICE").await.len(), 2);

    let product = c
        .database()
        .products()
        .get_by_code(c.organisation_id(), "RICE")
        .await
        .unwrap()
        .unwrap();
    assert!(product.stocked);
}

#[tokio::test]
async fn test_purchase_merges_lines_and_defaults_cost() {
    let c = coordinator().await;
    let rice = item(&c, "RICE", Money::from(100)).with_prices(Money::from(110), Money::from(70));
    add_product(&c, rice).await;

    let bill = c
        .record_purchase_at(
            PurchaseRequest::new(vec![
                PurchaseLineRequest::new("RICE", Quantity::from(4)),
                PurchaseLineRequest::new("RICE", Quantity::from(6)).at_cost(Money::from(80)),
            ])
            .with_discount(Money::new(dec!(0.4))),
            day(1),
        )
        .await
        .unwrap();

    assert_eq!(bill.lots.len(), 1);
    assert_eq!(bill.lots[0].quantity_received, Quantity::from(10));
    assert_eq!(bill.lots[0].unit_cost, Money::from(76));
    assert_eq!(bill.items_total_amount, Money::from(760));
    assert_eq!(bill.bill_amount, Money::from(760));

    let lots = c.database().lots().list_for_bill(&bill.id).await.unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].sequence, bill.lots[0].sequence);
}

#[tokio::test]
async fn test_reconcile_rebuilds_stock_from_lots() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;
    c.replenish("RICE", Quantity::new(dec!(2.5)), Money::from(40), day(1)).await.unwrap();
    c.commit_sale(sell("RICE", Quantity::new(dec!(0.5)))).await.unwrap();

    let mut conn = c.database().pool().acquire().await.unwrap();
    product::set_stock(&mut conn, c.organisation_id(), "RICE", Quantity::from(99))
        .await
        .unwrap();
    drop(conn);

    let stock = c.reconcile_stock("RICE").await.unwrap();
    assert_eq!(stock, Quantity::from(2));
    assert_eq!(stock_of(&c, "RICE").await, Quantity::from(2));
}

#[tokio::test]
async fn test_conservation_detects_tampered_lot() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;
    c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();
    c.commit_sale(sell("RICE", Quantity::from(2))).await.unwrap();
    c.verify_conservation("RICE").await.unwrap();

    sqlx::query("UPDATE purchase_lots SET remaining_in_stock = '4' WHERE product_code = 'RICE'")
        .execute(c.database().pool())
        .await
        .unwrap();

    let err = c.verify_conservation("RICE").await.unwrap_err();
    assert!(err.is_invariant_violation());
}

#[tokio::test]
async fn test_organisations_are_isolated() {
    let c = coordinator().await;
    add_product(&c, item(&c, "RICE", Money::from(100))).await;
    c.replenish("RICE", Quantity::from(5), Money::from(40), day(1)).await.unwrap();

    let other = SaleCoordinator::new(
        c.database().clone(),
        LedgerConfig::default().organisation_id("org-2"),
    );
    add_product(&other, item(&other, "RICE", Money::from(90))).await;

    let result = other.commit_sale(sell("RICE", Quantity::from(1))).await;
    assert!(result.is_ok(), "unstocked in org-2, so no lots are needed");
    assert_eq!(remaining(&c, "RICE").await, vec![Quantity::from(5)]);

    let sale = c.commit_sale(sell("RICE", Quantity::from(1))).await.unwrap();
    let missing = other.get_sale(&sale.id).await.unwrap_err();
    assert!(matches!(missing, DbError::Core(CoreError::SaleNotFound(_))));
}
