use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of the identifiers minted by the order workflow.
///
/// Swappable so tests can pin identifiers and deployments can plug in a
/// different suffix scheme.
pub trait IdGenerator: Send + Sync {
    /// Unique suffix appended to dated identifiers
    fn suffix(&self) -> String;

    fn record_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Identifier shared by every order created in one checkout action and
    /// used as the gateway's order reference.
    fn gateway_order_id(&self, prefix: &str, now: DateTime<Utc>) -> String {
        format!("{}-{}-{}", prefix, now.format("%Y%m%d"), self.suffix())
    }

    /// Human-facing order reference. Unique per order; the refund id is
    /// derived from it and must stay within the gateway's 40 characters.
    fn order_number(&self, now: DateTime<Utc>) -> String {
        format!("ORD-{}-{}", now.format("%Y%m%d"), self.suffix().to_uppercase())
    }
}

/// Hex characters of randomness in each minted suffix (64 bits)
const SUFFIX_LEN: usize = 16;

/// Default generator backed by random UUID v4 values.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn suffix(&self) -> String {
        let simple = Uuid::new_v4().simple().to_string();
        simple[..SUFFIX_LEN].to_string()
    }
}

/// Refund identifier for an order. Derived rather than random so that a
/// retried refund reaches the gateway under the same reference.
pub fn refund_id_for(order_number: &str) -> String {
    format!("{}-refund", order_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn gateway_order_id_is_prefixed_and_dated() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let id = UuidIdGenerator.gateway_order_id("B2B", now);
        assert!(id.starts_with("B2B-20250309-"));
        assert_eq!(id.len(), "B2B-20250309-".len() + SUFFIX_LEN);
    }

    #[test]
    fn order_numbers_do_not_collide() {
        let now = Utc::now();
        let numbers: HashSet<String> = (0..100_000)
            .map(|_| UuidIdGenerator.order_number(now))
            .collect();
        assert_eq!(numbers.len(), 100_000);
    }

    #[test]
    fn refund_id_fits_the_gateway_limit() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let number = UuidIdGenerator.order_number(now);
        assert!(number.starts_with("ORD-20250309-"));
        assert_eq!(number, number.to_uppercase());
        assert!(refund_id_for(&number).len() <= 40);
    }

    #[test]
    fn refund_id_is_stable() {
        assert_eq!(refund_id_for("ORD-20250309-ABCD1234"), "ORD-20250309-ABCD1234-refund");
        assert_eq!(refund_id_for("X"), refund_id_for("X"));
    }
}
