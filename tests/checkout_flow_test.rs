mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use uuid::Uuid;

use b2b_commerce_api::{
    entities::{BuyerStatus, OrderStatus, OrderType, PaymentStatus},
    errors::{QuantityBound, ServiceError},
    events::Event,
    gateway::{GatewayError, GatewayPayment},
    services::{
        checkout::{CartLine, PlaceOrderRequest},
        orders::OrderListQuery,
    },
};

use common::{active_buyer, address, seed_buyer, ProductSeed, TestContext};

fn cart(lines: &[(Uuid, i32)]) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: lines
            .iter()
            .map(|(product_id, quantity)| CartLine {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        shipping_address: address(),
    }
}

#[tokio::test]
async fn two_seller_checkout_is_confirmed_once_payment_lands() {
    let mut ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let s1 = Uuid::new_v4();
    let s2 = Uuid::new_v4();

    let mut p = ProductSeed::new(s1, "Steel Pallet", dec!(120));
    p.corporate_price = Some(dec!(100));
    p.min_order_qty = 2;
    p.max_order_qty = 10;
    p.stock = 20;
    let p = p.insert(&ctx.db).await;

    let mut q = ProductSeed::new(s2, "Shrink Wrap", dec!(50));
    q.stock = 10;
    let q = q.insert(&ctx.db).await;

    let receipt = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 5), (q.id, 3)]))
        .await
        .expect("checkout succeeds");

    assert_eq!(receipt.orders.len(), 2);
    assert_eq!(receipt.total_amount, dec!(650));
    assert_eq!(receipt.currency, "INR");
    assert_eq!(
        ctx.gateway.sessions(),
        vec![(receipt.gateway_order_id.clone(), dec!(650))]
    );

    let by_seller = |seller| {
        receipt
            .orders
            .iter()
            .find(|o| o.seller_id == seller)
            .expect("order for seller")
    };
    assert_eq!(by_seller(s1).grand_total, dec!(500));
    assert_eq!(by_seller(s2).grand_total, dec!(150));
    for order in &receipt.orders {
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.order_type, OrderType::Direct);
        assert_eq!(order.gateway_order_id, receipt.gateway_order_id);
        assert_eq!(
            order.payment_session_id.as_deref(),
            Some(receipt.payment_session_id.as_str())
        );
        assert_eq!(order.discount_amount, dec!(0));
        assert_eq!(order.shipping_address, address());
    }

    // Stock is untouched until payment is confirmed.
    assert_eq!(ctx.product(p.id).await.stock, 20);
    let placed = ctx
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::OrderPlaced { .. }))
        .count();
    assert_eq!(placed, 2);

    ctx.gateway.settle("cf_pay_1", dec!(650));
    let outcome = ctx
        .services
        .reconciliation
        .verify_payment(&buyer, &receipt.gateway_order_id)
        .await
        .expect("verification succeeds");

    assert_eq!(outcome.newly_confirmed, 2);
    assert_eq!(outcome.gateway_payment_id, "cf_pay_1");
    for order in &outcome.orders {
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("cf_pay_1"));
        assert!(order.paid_at.is_some());
    }

    let p_after = ctx.product(p.id).await;
    let q_after = ctx.product(q.id).await;
    assert_eq!((p_after.stock, p_after.order_count), (15, 5));
    assert_eq!((q_after.stock, q_after.order_count), (7, 3));

    // A second verification changes nothing.
    let again = ctx
        .services
        .reconciliation
        .verify_payment(&buyer, &receipt.gateway_order_id)
        .await
        .expect("repeat verification succeeds");
    assert_eq!(again.newly_confirmed, 0);
    assert_eq!(ctx.product(p.id).await.stock, 15);
    assert_eq!(ctx.product(q.id).await.stock, 7);
}

#[tokio::test]
async fn quantity_outside_range_persists_nothing() {
    let ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let mut p = ProductSeed::new(Uuid::new_v4(), "Drum", dec!(10));
    p.min_order_qty = 2;
    p.max_order_qty = 10;
    let p = p.insert(&ctx.db).await;
    let other = ProductSeed::new(Uuid::new_v4(), "Lid", dec!(2))
        .insert(&ctx.db)
        .await;

    let err = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(other.id, 1), (p.id, 11)]))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::QuantityOutOfRange {
            bound: QuantityBound::Maximum,
            limit: 10,
            requested: 11,
            ..
        }
    );

    let err = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 1)]))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::QuantityOutOfRange {
            bound: QuantityBound::Minimum,
            limit: 2,
            ..
        }
    );

    assert_eq!(ctx.order_count().await, 0);
    assert!(ctx.gateway.sessions().is_empty());
}

#[tokio::test]
async fn duplicate_lines_are_merged_before_range_checks() {
    let ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let mut p = ProductSeed::new(Uuid::new_v4(), "Bolt Box", dec!(4));
    p.min_order_qty = 5;
    let p = p.insert(&ctx.db).await;

    let receipt = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 3), (p.id, 2)]))
        .await
        .expect("merged quantity meets minimum");
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.orders[0].items.0.len(), 1);
    assert_eq!(receipt.orders[0].items.0[0].quantity, 5);
    assert_eq!(receipt.total_amount, dec!(20));
}

#[tokio::test]
async fn catalog_gaps_are_reported_per_product() {
    let ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;

    let unknown = Uuid::new_v4();
    let err = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(unknown, 1)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotInCatalog(id) if id == unknown);

    let mut hidden = ProductSeed::new(Uuid::new_v4(), "Hidden", dec!(1));
    hidden.entry_active = false;
    let hidden = hidden.insert(&ctx.db).await;
    let err = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(hidden.id, 1)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotInCatalog(_));

    let mut retired = ProductSeed::new(Uuid::new_v4(), "Retired", dec!(1));
    retired.product_active = false;
    let retired = retired.insert(&ctx.db).await;
    let err = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(retired.id, 1)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ProductUnavailable(id) if id == retired.id);

    assert_eq!(ctx.order_count().await, 0);
}

#[tokio::test]
async fn inactive_buyers_are_refused() {
    let ctx = TestContext::new().await;
    let suspended = seed_buyer(&ctx.db, BuyerStatus::Suspended, None).await;
    let p = ProductSeed::new(Uuid::new_v4(), "Crate", dec!(9))
        .insert(&ctx.db)
        .await;

    let err = ctx
        .services
        .checkout
        .place_order(&suspended, cart(&[(p.id, 1)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
    assert_eq!(ctx.order_count().await, 0);
}

#[tokio::test]
async fn session_failure_leaves_orders_pending_without_session() {
    let ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let p = ProductSeed::new(Uuid::new_v4(), "Crate", dec!(9))
        .insert(&ctx.db)
        .await;
    ctx.gateway.fail_sessions(true);

    let err = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 2)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Gateway(GatewayError::Transport(_)));

    assert_eq!(ctx.order_count().await, 1);
    let orders = ctx.orders().await;
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(orders[0].payment_status, PaymentStatus::Unpaid);
    assert!(orders[0].payment_session_id.is_none());
}

#[tokio::test]
async fn verification_reports_gateway_side_gaps() {
    let ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let p = ProductSeed::new(Uuid::new_v4(), "Crate", dec!(9))
        .insert(&ctx.db)
        .await;
    let receipt = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 2)]))
        .await
        .expect("checkout succeeds");

    let err = ctx
        .services
        .reconciliation
        .verify_payment(&buyer, &receipt.gateway_order_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PaymentNotComplete(status) if status == "ACTIVE");

    ctx.gateway.set_status("PAID");
    ctx.gateway.push_payment(GatewayPayment {
        payment_id: "cf_failed".into(),
        status: "FAILED".into(),
        amount: dec!(18),
        paid_at: None,
    });
    let err = ctx
        .services
        .reconciliation
        .verify_payment(&buyer, &receipt.gateway_order_id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::Gateway(GatewayError::NoSuccessfulPayment(_))
    );

    ctx.gateway.settle("cf_ok", dec!(18));
    let err = ctx
        .services
        .reconciliation
        .verify_payment(&buyer, "B2B-19700101-unknown")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NoMatchingOrders(_));

    // Another buyer cannot confirm someone else's checkout.
    let stranger = active_buyer(&ctx.db).await;
    let err = ctx
        .services
        .reconciliation
        .verify_payment(&stranger, &receipt.gateway_order_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NoMatchingOrders(_));

    assert_eq!(ctx.product(p.id).await.stock, 100);
}

#[tokio::test]
async fn confirmation_goes_through_when_stock_ran_short() {
    let mut ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let mut p = ProductSeed::new(Uuid::new_v4(), "Rare Valve", dec!(40));
    p.stock = 4;
    let p = p.insert(&ctx.db).await;

    let receipt = ctx
        .services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 3)]))
        .await
        .expect("checkout succeeds");

    // Stock drained by another channel before payment lands.
    let mut drained = ctx.product(p.id).await.into_active_model();
    drained.stock = Set(1);
    drained.update(&*ctx.db).await.expect("drain stock");
    ctx.drain_events();

    ctx.gateway.settle("cf_pay_short", dec!(120));
    let outcome = ctx
        .services
        .reconciliation
        .verify_payment(&buyer, &receipt.gateway_order_id)
        .await
        .expect("verification succeeds");

    assert_eq!(outcome.newly_confirmed, 1);
    assert_eq!(outcome.orders[0].status, OrderStatus::Confirmed);
    let after = ctx.product(p.id).await;
    assert_eq!((after.stock, after.order_count), (1, 0));

    let shortfalls: Vec<Event> = ctx
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::StockShortfall { .. }))
        .collect();
    assert_eq!(
        shortfalls,
        vec![Event::StockShortfall {
            order_id: receipt.orders[0].id,
            product_id: p.id,
            quantity: 3,
        }]
    );
}

#[tokio::test]
async fn order_listing_pages_are_bounded() {
    let ctx = TestContext::new().await;
    let buyer = active_buyer(&ctx.db).await;
    let p = ProductSeed::new(Uuid::new_v4(), "Drill Bit Set", dec!(15))
        .insert(&ctx.db)
        .await;
    ctx.services
        .checkout
        .place_order(&buyer, cart(&[(p.id, 2)]))
        .await
        .expect("checkout succeeds");

    let page = ctx
        .services
        .orders
        .list_orders(
            &buyer,
            OrderListQuery {
                page: Some(10_000),
                limit: Some(500),
            },
        )
        .await
        .expect("listing succeeds");
    assert!(page.orders.is_empty());
    assert_eq!((page.total, page.limit), (1, 50));

    let err = ctx
        .services
        .orders
        .list_orders(
            &buyer,
            OrderListQuery {
                page: Some(u64::MAX),
                limit: Some(50),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
