//! Exact-decimal money helpers and the delivery pricing policy.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Free-delivery threshold and standard delivery rate (a percentage of the
/// subtotal) applied to bags and orders alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub free_delivery_threshold: Decimal,
    pub standard_delivery_percentage: Decimal,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            free_delivery_threshold: Decimal::new(50, 0),
            standard_delivery_percentage: Decimal::new(10, 0),
        }
    }
}

/// Delivery cost for a given subtotal plus how far the subtotal is from the
/// free-delivery threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryCharge {
    pub delivery: Decimal,
    pub free_delivery_delta: Decimal,
}

impl DeliveryPolicy {
    /// Delivery is free at or above the threshold; otherwise it is the
    /// standard percentage of the subtotal, rounded up to the next cent so
    /// a positive subtotal below the threshold never ships free.
    #[must_use]
    pub fn charge_for(&self, subtotal: Decimal) -> DeliveryCharge {
        if subtotal >= self.free_delivery_threshold {
            return DeliveryCharge {
                delivery: Decimal::ZERO,
                free_delivery_delta: Decimal::ZERO,
            };
        }

        DeliveryCharge {
            delivery: round_cents_up(
                subtotal * self.standard_delivery_percentage / Decimal::ONE_HUNDRED,
            ),
            free_delivery_delta: round_cents(self.free_delivery_threshold - subtotal),
        }
    }
}

/// Round to two decimal places, midpoint away from zero, and pin the scale at 2
/// so `4` renders as `4.00`.
#[must_use]
pub fn round_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Round to two decimal places away from zero, scale pinned at 2.
fn round_cents_up(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::AwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Converts a decimal amount to the processor's integer minor units
/// (cents for two-decimal currencies). Returns `None` on overflow.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (round_cents(amount) * Decimal::ONE_HUNDRED).trunc().to_i64()
}

/// Inverse of [`to_minor_units`].
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
