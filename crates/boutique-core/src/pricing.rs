//! Prices a bag against current product prices.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::bag::Bag;
use crate::money::{round_cents, DeliveryPolicy};
use crate::CoreError;

/// Resolves a product's current unit price.
pub trait ProductLookup {
    fn unit_price(&self, product_id: i64) -> Option<Decimal>;
}

impl ProductLookup for HashMap<i64, Decimal> {
    fn unit_price(&self, product_id: i64) -> Option<Decimal> {
        self.get(&product_id).copied()
    }
}

/// A single priced bag line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BagLine {
    pub product_id: i64,
    pub size: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BagSummary {
    pub lines: Vec<BagLine>,
    pub subtotal: Decimal,
    pub item_count: u64,
    pub delivery: Decimal,
    pub free_delivery_delta: Decimal,
    pub free_delivery_threshold: Decimal,
    pub grand_total: Decimal,
}

/// Prices every line of `bag` and applies the delivery policy.
///
/// # Errors
///
/// Returns [`CoreError::ProductNotFound`] if any product id in the bag has no
/// price in `lookup`.
pub fn price_bag<L>(bag: &Bag, lookup: &L, policy: &DeliveryPolicy) -> Result<BagSummary, CoreError>
where
    L: ProductLookup + ?Sized,
{
    let lines = bag
        .lines()
        .into_iter()
        .map(|line| {
            let unit_price = lookup
                .unit_price(line.product_id)
                .ok_or(CoreError::ProductNotFound(line.product_id))?;
            Ok(BagLine {
                line_total: line.line_total(unit_price),
                product_id: line.product_id,
                size: line.size,
                quantity: line.quantity,
                unit_price,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let subtotal = round_cents(lines.iter().map(|l| l.line_total).sum());
    let item_count = lines.iter().map(|l| u64::from(l.quantity)).sum();
    let charge = policy.charge_for(subtotal);

    Ok(BagSummary {
        lines,
        subtotal,
        item_count,
        delivery: charge.delivery,
        free_delivery_delta: charge.free_delivery_delta,
        free_delivery_threshold: policy.free_delivery_threshold,
        grand_total: subtotal + charge.delivery,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal literal")
    }

    fn prices(entries: &[(i64, &str)]) -> HashMap<i64, Decimal> {
        entries.iter().map(|(id, p)| (*id, dec(p))).collect()
    }

    #[test]
    fn unsized_bag_below_threshold() {
        let mut bag = Bag::new();
        bag.add(1, None, 2).unwrap();
        let summary = price_bag(&bag, &prices(&[(1, "20.00")]), &DeliveryPolicy::default()).unwrap();
        assert_eq!(summary.subtotal, dec("40.00"));
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.delivery, dec("4.00"));
        assert_eq!(summary.grand_total, dec("44.00"));
        assert_eq!(summary.free_delivery_delta, dec("10.00"));
        assert_eq!(summary.free_delivery_threshold, dec("50"));
    }

    #[test]
    fn sized_lines_priced_individually() {
        let mut bag = Bag::new();
        bag.add(3, Some("M"), 1).unwrap();
        bag.add(3, Some("L"), 2).unwrap();
        let summary = price_bag(&bag, &prices(&[(3, "15.00")]), &DeliveryPolicy::default()).unwrap();
        assert_eq!(summary.lines.len(), 2);
        let totals: Vec<Decimal> = summary.lines.iter().map(|l| l.line_total).collect();
        assert_eq!(totals, vec![dec("30.00"), dec("15.00")]);
        assert_eq!(summary.subtotal, dec("45.00"));
        assert_eq!(summary.delivery, dec("4.50"));
        assert_eq!(summary.grand_total, dec("49.50"));
    }

    #[test]
    fn threshold_reached_delivers_free() {
        let mut bag = Bag::new();
        bag.add(1, None, 5).unwrap();
        let summary = price_bag(&bag, &prices(&[(1, "10.00")]), &DeliveryPolicy::default()).unwrap();
        assert_eq!(summary.delivery, Decimal::ZERO);
        assert_eq!(summary.free_delivery_delta, Decimal::ZERO);
        assert_eq!(summary.grand_total, dec("50.00"));
    }

    #[test]
    fn empty_bag_prices_to_zero() {
        let summary = price_bag(&Bag::new(), &prices(&[]), &DeliveryPolicy::default()).unwrap();
        assert!(summary.lines.is_empty());
        assert_eq!(summary.subtotal, Decimal::ZERO);
        assert_eq!(summary.grand_total, Decimal::ZERO);
        assert_eq!(summary.item_count, 0);
    }

    #[test]
    fn unknown_product_fails() {
        let mut bag = Bag::new();
        bag.add(1, None, 1).unwrap();
        bag.add(2, None, 1).unwrap();
        let err = price_bag(&bag, &prices(&[(1, "5.00")]), &DeliveryPolicy::default()).unwrap_err();
        assert_eq!(err, CoreError::ProductNotFound(2));
    }

    #[test]
    fn grand_total_is_subtotal_plus_delivery() {
        let policy = DeliveryPolicy::default();
        let lookup = prices(&[(1, "0.99"), (2, "12.49"), (3, "33.33"), (4, "0.01")]);
        for quantities in [
            [1, 1, 1, 0],
            [3, 0, 1, 0],
            [0, 2, 0, 0],
            [10, 1, 0, 0],
            [0, 0, 2, 0],
            [0, 0, 0, 1],
            [0, 0, 0, 4],
        ] {
            let mut bag = Bag::new();
            for (id, qty) in (1_i64..).zip(quantities) {
                if qty > 0 {
                    bag.add(id, None, qty).unwrap();
                }
            }
            let summary = price_bag(&bag, &lookup, &policy).unwrap();
            assert_eq!(summary.grand_total, summary.subtotal + summary.delivery);
            assert_eq!(
                summary.delivery.is_zero(),
                summary.subtotal >= policy.free_delivery_threshold,
                "subtotal {}",
                summary.subtotal
            );
        }
    }

    #[test]
    fn one_cent_bag_pays_one_cent_delivery() {
        let mut bag = Bag::new();
        bag.add(1, None, 1).unwrap();
        let summary = price_bag(&bag, &prices(&[(1, "0.01")]), &DeliveryPolicy::default()).unwrap();
        assert_eq!(summary.subtotal, dec("0.01"));
        assert_eq!(summary.delivery, dec("0.01"));
        assert_eq!(summary.grand_total, dec("0.02"));
    }
}
