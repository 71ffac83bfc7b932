#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use b2b_commerce_api::{
    auth::BuyerPrincipal,
    config::CommerceConfig,
    db,
    entities::{
        buyer, catalog_entry, product, product::ProductTags, quote, quote::QuoteItems,
        BuyerStatus, OrderModel, ProductModel, QuoteLineItem, QuoteModel, QuoteStatus,
        ShippingAddress,
    },
    events::{self, Event},
    gateway::{
        GatewayError, GatewayOrderStatus, GatewayPayment, PaymentGateway, PaymentSession,
        RefundReceipt, SessionCustomer,
    },
    ids::UuidIdGenerator,
    notifications::EventNotifier,
    services::Services,
};

/// Scriptable stand-in for the payment gateway.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeGatewayState>,
}

#[derive(Default)]
struct FakeGatewayState {
    status: Option<String>,
    payments: Vec<GatewayPayment>,
    fail_sessions: bool,
    fail_refunds: bool,
    sessions: Vec<(String, Decimal)>,
    refunds: Vec<(String, Decimal, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRefund {
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub refund_id: String,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeGatewayState) -> T) -> T {
        let mut guard = self.state.lock().expect("gateway state poisoned");
        f(&mut guard)
    }

    /// Report the order paid with one successful payment.
    pub fn settle(&self, payment_id: &str, amount: Decimal) {
        self.with_state(|s| {
            s.status = Some("PAID".into());
            s.payments.push(GatewayPayment {
                payment_id: payment_id.into(),
                status: "SUCCESS".into(),
                amount,
                paid_at: Some(Utc::now()),
            });
        });
    }

    pub fn set_status(&self, status: &str) {
        self.with_state(|s| s.status = Some(status.into()));
    }

    pub fn push_payment(&self, payment: GatewayPayment) {
        self.with_state(|s| s.payments.push(payment));
    }

    pub fn fail_sessions(&self, fail: bool) {
        self.with_state(|s| s.fail_sessions = fail);
    }

    pub fn fail_refunds(&self, fail: bool) {
        self.with_state(|s| s.fail_refunds = fail);
    }

    pub fn sessions(&self) -> Vec<(String, Decimal)> {
        self.with_state(|s| s.sessions.clone())
    }

    pub fn refunds(&self) -> Vec<RecordedRefund> {
        self.with_state(|s| {
            s.refunds
                .iter()
                .map(|(gateway_order_id, amount, refund_id)| RecordedRefund {
                    gateway_order_id: gateway_order_id.clone(),
                    amount: *amount,
                    refund_id: refund_id.clone(),
                })
                .collect()
        })
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(
        &self,
        gateway_order_id: &str,
        amount: Decimal,
        _currency: &str,
        _customer: &SessionCustomer,
    ) -> Result<PaymentSession, GatewayError> {
        self.with_state(|s| {
            if s.fail_sessions {
                return Err(GatewayError::Transport("connection refused".into()));
            }
            s.sessions.push((gateway_order_id.to_string(), amount));
            Ok(PaymentSession {
                gateway_order_id: gateway_order_id.to_string(),
                payment_session_id: format!("session_{}", gateway_order_id),
            })
        })
    }

    async fn get_order_status(
        &self,
        _gateway_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        Ok(self.with_state(|s| {
            GatewayOrderStatus::parse(s.status.as_deref().unwrap_or("ACTIVE"))
        }))
    }

    async fn list_payments(
        &self,
        _gateway_order_id: &str,
    ) -> Result<Vec<GatewayPayment>, GatewayError> {
        Ok(self.with_state(|s| s.payments.clone()))
    }

    async fn create_refund(
        &self,
        gateway_order_id: &str,
        amount: Decimal,
        refund_id: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        self.with_state(|s| {
            if s.fail_refunds {
                return Err(GatewayError::Status {
                    status: 503,
                    message: "refunds temporarily unavailable".into(),
                });
            }
            s.refunds
                .push((gateway_order_id.to_string(), amount, refund_id.to_string()));
            Ok(RefundReceipt {
                refund_id: refund_id.to_string(),
                status: "PENDING".into(),
            })
        })
    }
}

/// Services wired against a fresh in-memory database and a fake gateway.
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub gateway: Arc<FakeGateway>,
    pub services: Services,
    events: mpsc::Receiver<Event>,
}

impl TestContext {
    pub async fn new() -> Self {
        let pool = db::establish_connection("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        db::run_migrations(&pool).await.expect("migrations");
        let db = Arc::new(pool);

        let (sender, events) = events::channel(1024);
        let gateway = FakeGateway::new();
        let services = Services::new(
            db.clone(),
            gateway.clone(),
            Arc::new(UuidIdGenerator),
            sender.clone(),
            Arc::new(EventNotifier::new(sender)),
            &test_commerce_config(),
        );

        Self {
            db,
            gateway,
            services,
            events,
        }
    }

    /// Everything published since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn product(&self, id: Uuid) -> ProductModel {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query product")
            .expect("product exists")
    }

    pub async fn order(&self, id: Uuid) -> OrderModel {
        b2b_commerce_api::entities::Order::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query order")
            .expect("order exists")
    }

    pub async fn orders(&self) -> Vec<OrderModel> {
        b2b_commerce_api::entities::Order::find()
            .all(&*self.db)
            .await
            .expect("query orders")
    }

    pub async fn order_count(&self) -> usize {
        self.orders().await.len()
    }

    pub async fn quote(&self, id: Uuid) -> QuoteModel {
        quote::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query quote")
            .expect("quote exists")
    }
}

pub fn test_commerce_config() -> CommerceConfig {
    CommerceConfig {
        default_page_size: 20,
        max_page_size: 50,
        ..CommerceConfig::default()
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        contact_name: "Asha Rao".into(),
        phone: "9876543210".into(),
        line1: "14 Industrial Estate".into(),
        line2: None,
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411019".into(),
        country: "IN".into(),
    }
}

pub async fn seed_buyer(
    db: &DatabaseConnection,
    status: BuyerStatus,
    default_address: Option<ShippingAddress>,
) -> BuyerPrincipal {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let model = buyer::ActiveModel {
        id: Set(id),
        email: Set(format!("procurement-{}@acme.test", id.simple())),
        phone: Set("9123456780".into()),
        company_name: Set("Acme Industries".into()),
        status: Set(status),
        default_address: Set(default_address),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert buyer");
    model.into()
}

pub async fn active_buyer(db: &DatabaseConnection) -> BuyerPrincipal {
    seed_buyer(db, BuyerStatus::Active, Some(address())).await
}

/// A seller product with its corporate catalog entry.
#[derive(Debug, Clone)]
pub struct ProductSeed {
    pub seller_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub base_price: Decimal,
    pub corporate_price: Option<Decimal>,
    pub min_order_qty: i32,
    pub max_order_qty: i32,
    pub stock: i32,
    pub order_count: i32,
    pub product_active: bool,
    pub entry_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ProductSeed {
    pub fn new(seller_id: Uuid, name: &str, base_price: Decimal) -> Self {
        Self {
            seller_id,
            name: name.into(),
            category: None,
            tags: Vec::new(),
            base_price,
            corporate_price: None,
            min_order_qty: 1,
            max_order_qty: 1000,
            stock: 100,
            order_count: 0,
            product_active: true,
            entry_active: true,
            created_at: Utc::now(),
        }
    }

    pub async fn insert(self, db: &DatabaseConnection) -> ProductModel {
        let id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(id),
            seller_id: Set(self.seller_id),
            name: Set(self.name.clone()),
            description: Set(Some(format!("{} for industrial buyers", self.name))),
            sku: Set(format!("SKU-{}", id.simple())),
            category: Set(self.category),
            tags: Set(ProductTags(self.tags)),
            base_price: Set(self.base_price),
            stock: Set(self.stock),
            order_count: Set(self.order_count),
            is_active: Set(self.product_active),
            image_url: Set(None),
            created_at: Set(self.created_at),
            updated_at: Set(self.created_at),
        }
        .insert(db)
        .await
        .expect("insert product");

        catalog_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(id),
            corporate_price: Set(self.corporate_price),
            min_order_qty: Set(self.min_order_qty),
            max_order_qty: Set(self.max_order_qty),
            is_active: Set(self.entry_active),
            created_at: Set(self.created_at),
            updated_at: Set(self.created_at),
        }
        .insert(db)
        .await
        .expect("insert catalog entry");

        product
    }
}

/// A sent quote addressed by buyer id and contact email.
pub async fn seed_quote(
    db: &DatabaseConnection,
    seller_id: Uuid,
    buyer_id: Option<Uuid>,
    contact_email: &str,
    lines: Vec<QuoteLineItem>,
    final_amount: Decimal,
    valid_until: DateTime<Utc>,
) -> QuoteModel {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let total: Decimal = lines
        .iter()
        .map(|l| l.unit_price * Decimal::from(l.quantity))
        .sum();
    quote::ActiveModel {
        id: Set(id),
        quote_number: Set(format!("QT-{}", &id.simple().to_string()[..8])),
        seller_id: Set(seller_id),
        buyer_id: Set(buyer_id),
        contact_email: Set(contact_email.to_string()),
        items: Set(QuoteItems(lines)),
        total_amount: Set(total),
        final_amount: Set(final_amount),
        notes: Set(None),
        valid_until: Set(valid_until),
        status: Set(QuoteStatus::Sent),
        converted_order_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert quote")
}

pub fn quote_line(product: &ProductModel, quantity: i32, unit_price: Decimal) -> QuoteLineItem {
    QuoteLineItem {
        product_id: product.id,
        name: product.name.clone(),
        sku: Some(product.sku.clone()),
        quantity,
        unit_price,
    }
}

pub fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}
