//! Prometheus counters for the order workflow, registered on the default
//! registry and exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref ORDERS_PLACED: IntCounter = register_int_counter!(
        "b2b_orders_placed_total",
        "Seller orders created by checkout or quote conversion"
    )
    .expect("metric can be created");
    pub static ref PAYMENTS_CONFIRMED: IntCounter = register_int_counter!(
        "b2b_payments_confirmed_total",
        "Orders moved to confirmed/paid by reconciliation"
    )
    .expect("metric can be created");
    pub static ref STOCK_SHORTFALLS: IntCounter = register_int_counter!(
        "b2b_stock_shortfalls_total",
        "Line items whose stock could not be decremented at confirmation"
    )
    .expect("metric can be created");
    pub static ref ORDER_CANCELLATIONS: IntCounter = register_int_counter!(
        "b2b_order_cancellations_total",
        "Total number of order cancellations"
    )
    .expect("metric can be created");
    pub static ref REFUND_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "b2b_refund_outcomes_total",
        "Refund attempts by outcome",
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref QUOTE_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "b2b_quote_transitions_total",
        "Quotes leaving the sent state",
        &["to"]
    )
    .expect("metric can be created");
    pub static ref WORKFLOW_FAILURES: IntCounterVec = register_int_counter_vec!(
        "b2b_workflow_failures_total",
        "Failed workflow operations",
        &["operation", "error_code"]
    )
    .expect("metric can be created");
}

/// Count a failed operation under its error code.
pub fn record_failure(operation: &str, error_code: &str) {
    WORKFLOW_FAILURES
        .with_label_values(&[operation, error_code])
        .inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
