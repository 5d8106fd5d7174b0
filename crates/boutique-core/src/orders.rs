//! Order-level domain logic: order numbers and the totals unit-of-work.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{round_cents, DeliveryPolicy};

/// One (product, size, quantity) triple to be turned into a line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: i64,
    pub size: Option<String>,
    pub quantity: u32,
}

impl LineRequest {
    /// `price × quantity`, rounded to cents.
    #[must_use]
    pub fn line_total(&self, unit_price: Decimal) -> Decimal {
        round_cents(unit_price * Decimal::from(self.quantity))
    }
}

/// Public order reference: 32 uppercase hex characters from a v4 UUID.
///
/// Generated once when the order row is first written; nothing regenerates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// Accepts an existing order number if it has the expected shape.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let candidate = raw.trim().to_uppercase();
        (candidate.len() == 32 && candidate.chars().all(|c| c.is_ascii_hexdigit()))
            .then_some(Self(candidate))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three derived money fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub order_total: Decimal,
    pub delivery_cost: Decimal,
    pub grand_total: Decimal,
}

impl OrderTotals {
    /// Totals for an order with no line items.
    pub const EMPTY: Self = Self {
        order_total: Decimal::ZERO,
        delivery_cost: Decimal::ZERO,
        grand_total: Decimal::ZERO,
    };

    /// Recomputes order totals from the current line totals.
    ///
    /// Must be called after every line-item insert or delete so the stored
    /// order never disagrees with its lines.
    pub fn compute<I>(line_totals: I, policy: &DeliveryPolicy) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let order_total = round_cents(line_totals.into_iter().sum());
        let delivery_cost = policy.charge_for(order_total).delivery;
        Self {
            order_total,
            delivery_cost,
            grand_total: order_total + delivery_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal literal")
    }

    #[test]
    fn order_number_is_32_uppercase_hex() {
        let number = OrderNumber::generate();
        assert_eq!(number.as_str().len(), 32);
        assert!(number
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn order_numbers_are_unique() {
        assert_ne!(OrderNumber::generate(), OrderNumber::generate());
    }

    #[test]
    fn order_number_parse_normalizes_case() {
        let parsed = OrderNumber::parse("0123456789abcdef0123456789abcdef").expect("valid");
        assert_eq!(parsed.as_str(), "0123456789ABCDEF0123456789ABCDEF");
        assert!(OrderNumber::parse("too-short").is_none());
        assert!(OrderNumber::parse("ZZ23456789ABCDEF0123456789ABCDEF").is_none());
    }

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        let line = LineRequest {
            product_id: 1,
            size: Some("L".to_string()),
            quantity: 2,
        };
        assert_eq!(line.line_total(dec("15.00")), dec("30.00"));
    }

    #[test]
    fn totals_below_threshold_add_delivery() {
        let totals = OrderTotals::compute([dec("15.00"), dec("30.00")], &DeliveryPolicy::default());
        assert_eq!(totals.order_total, dec("45.00"));
        assert_eq!(totals.delivery_cost, dec("4.50"));
        assert_eq!(totals.grand_total, dec("49.50"));
    }

    #[test]
    fn totals_at_threshold_are_free_delivery() {
        let totals = OrderTotals::compute([dec("25.00"), dec("25.00")], &DeliveryPolicy::default());
        assert_eq!(totals.delivery_cost, Decimal::ZERO);
        assert_eq!(totals.grand_total, dec("50.00"));
    }

    #[test]
    fn totals_independent_of_line_order() {
        let lines = [dec("19.99"), dec("4.01"), dec("0.33"), dec("12.50")];
        let mut reversed = lines;
        reversed.reverse();
        let policy = DeliveryPolicy::default();
        assert_eq!(
            OrderTotals::compute(lines, &policy),
            OrderTotals::compute(reversed, &policy)
        );
    }

    #[test]
    fn empty_order_has_zero_totals() {
        let totals = OrderTotals::compute(std::iter::empty(), &DeliveryPolicy::default());
        assert_eq!(totals.order_total, Decimal::ZERO);
        assert_eq!(totals.delivery_cost, Decimal::ZERO);
        assert_eq!(totals.grand_total, Decimal::ZERO);
    }
}
