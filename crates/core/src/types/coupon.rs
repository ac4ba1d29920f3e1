//! Coupons accepted by the validation service.

use serde::{Deserialize, Serialize};

use crate::types::id::CouponCode;
use crate::types::money::Money;

/// What part of the order a coupon discount applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponScope {
    /// Discount off the cart subtotal.
    Cart,
    /// Discount tied to a specific product.
    Product,
    /// Discount off the shipping fee.
    Shipping,
}

/// A coupon the validation service accepted for a specific cart.
///
/// The discount amount is computed server-side against the subtotal the cart
/// had at validation time. Any later cart mutation invalidates it; a stale
/// discount must never be displayed as valid, so the cart store clears the
/// coupon on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    /// The code the buyer entered.
    pub code: CouponCode,
    /// Absolute discount, fixed at validation time.
    pub discount_amount: Money,
    /// What the discount applies to.
    pub scope: CouponScope,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_roundtrip() {
        let coupon = AppliedCoupon {
            code: CouponCode::new("SAVE10"),
            discount_amount: Money::from_major(10),
            scope: CouponScope::Cart,
        };
        let json = serde_json::to_string(&coupon).unwrap();
        assert!(json.contains("\"scope\":\"cart\""));
        let parsed: AppliedCoupon = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, coupon);
    }
}
