//! Cart totals computation.
//!
//! Pure functions of a cart snapshot and an optional applied coupon. The
//! cart summary and the final checkout stage are two distinct computation
//! modes: tax only exists at checkout.

use rust_decimal::Decimal;

use sundrift_core::{AppliedCoupon, CartSnapshot, Money};

/// Shipping and tax policy constants, from configuration.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    /// Orders at or above this subtotal ship free.
    pub free_delivery_threshold: Money,
    /// Flat fee charged below the threshold. A step function, not
    /// interpolated.
    pub flat_shipping_fee: Money,
    /// Tax rate applied to the discounted subtotal at checkout.
    pub tax_rate: Decimal,
}

/// Which stage a quote is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingStage {
    /// Cart page summary: no tax.
    CartSummary,
    /// Final checkout stage: tax on the discounted subtotal.
    Checkout,
}

/// Computed totals for a cart snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    /// Sum of unit price times quantity over all lines.
    pub subtotal: Money,
    /// The applied coupon's discount, zero if none.
    pub discount: Money,
    /// Flat shipping fee, or zero at/above the free-delivery threshold.
    pub shipping: Money,
    /// Tax on the discounted subtotal; zero on the cart-summary stage.
    pub tax: Money,
    /// Grand total. Never negative: the discount is clamped at a zero
    /// subtotal before shipping and tax are added.
    pub total: Money,
}

/// Compute totals for a snapshot and optional applied coupon.
#[must_use]
pub fn quote(
    snapshot: &CartSnapshot,
    coupon: Option<&AppliedCoupon>,
    policy: &PricingPolicy,
    stage: PricingStage,
) -> PriceBreakdown {
    let subtotal = snapshot.subtotal();
    let discount = coupon.map_or(Money::ZERO, |c| c.discount_amount);
    let discounted = subtotal.saturating_sub(discount);

    // An empty cart ships nothing, so it ships free.
    let shipping = if snapshot.is_empty() || subtotal >= policy.free_delivery_threshold {
        Money::ZERO
    } else {
        policy.flat_shipping_fee
    };

    let tax = match stage {
        PricingStage::CartSummary => Money::ZERO,
        PricingStage::Checkout => discounted.at_rate(policy.tax_rate),
    };

    PriceBreakdown {
        subtotal,
        discount,
        shipping,
        tax,
        total: discounted + shipping + tax,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use sundrift_core::{CouponCode, CouponScope, LineItem, OwnerMode, ProductRef};

    fn policy() -> PricingPolicy {
        PricingPolicy {
            free_delivery_threshold: Money::from_major(500),
            flat_shipping_fee: Money::from_major(50),
            tax_rate: Decimal::from_str("0.05").unwrap(),
        }
    }

    fn cart() -> CartSnapshot {
        CartSnapshot::from_items(
            OwnerMode::Guest,
            vec![
                LineItem::new(ProductRef::new("prod-1"), Money::from_major(100), 2),
                LineItem::new(ProductRef::new("prod-2"), Money::from_major(50), 1),
            ],
        )
    }

    fn coupon(discount: i64) -> AppliedCoupon {
        AppliedCoupon {
            code: CouponCode::new("SAVE"),
            discount_amount: Money::from_major(discount),
            scope: CouponScope::Cart,
        }
    }

    #[test]
    fn test_cart_summary_without_coupon() {
        let quote = quote(&cart(), None, &policy(), PricingStage::CartSummary);
        assert_eq!(quote.subtotal, Money::from_major(250));
        assert_eq!(quote.shipping, Money::from_major(50));
        assert_eq!(quote.tax, Money::ZERO);
        assert_eq!(quote.total, Money::from_major(300));
    }

    #[test]
    fn test_cart_summary_with_coupon() {
        let quote = quote(
            &cart(),
            Some(&coupon(30)),
            &policy(),
            PricingStage::CartSummary,
        );
        assert_eq!(quote.discount, Money::from_major(30));
        assert_eq!(quote.total, Money::from_major(270));
    }

    #[test]
    fn test_checkout_stage_adds_tax_on_discounted_subtotal() {
        let quote = quote(&cart(), Some(&coupon(30)), &policy(), PricingStage::Checkout);
        // (250 - 30) * 0.05 = 11
        assert_eq!(quote.tax, Money::from_major(11));
        assert_eq!(quote.total, Money::from_major(281));
    }

    #[test]
    fn test_total_never_negative() {
        let quote = quote(
            &cart(),
            Some(&coupon(10_000)),
            &policy(),
            PricingStage::CartSummary,
        );
        // Discount clamps at a zero subtotal before shipping is added.
        assert_eq!(quote.total, Money::from_major(50));
    }

    #[test]
    fn test_free_delivery_at_threshold() {
        let big_cart = CartSnapshot::from_items(
            OwnerMode::Guest,
            vec![LineItem::new(
                ProductRef::new("prod-1"),
                Money::from_major(500),
                1,
            )],
        );
        let quote = quote(&big_cart, None, &policy(), PricingStage::CartSummary);
        assert_eq!(quote.shipping, Money::ZERO);
        assert_eq!(quote.total, Money::from_major(500));
    }

    #[test]
    fn test_shipping_threshold_uses_pre_discount_subtotal() {
        let big_cart = CartSnapshot::from_items(
            OwnerMode::Guest,
            vec![LineItem::new(
                ProductRef::new("prod-1"),
                Money::from_major(500),
                1,
            )],
        );
        // The discount drops the payable amount below the threshold, but
        // free delivery keys off the subtotal itself.
        let quote = quote(
            &big_cart,
            Some(&coupon(100)),
            &policy(),
            PricingStage::CartSummary,
        );
        assert_eq!(quote.shipping, Money::ZERO);
        assert_eq!(quote.total, Money::from_major(400));
    }

    #[test]
    fn test_empty_cart_is_all_zeros() {
        let empty = CartSnapshot::empty(OwnerMode::Guest);
        let quote = quote(&empty, None, &policy(), PricingStage::Checkout);
        assert_eq!(quote.subtotal, Money::ZERO);
        assert_eq!(quote.shipping, Money::ZERO);
        assert_eq!(quote.total, Money::ZERO);
    }
}
