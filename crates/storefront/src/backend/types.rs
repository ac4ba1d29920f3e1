//! Request and response payloads exchanged with the backend.

use serde::{Deserialize, Serialize};

use sundrift_core::{
    AppliedCoupon, CartSnapshot, CouponCode, CouponScope, Email, LineId, LineItem, Money,
    ProductRef, User,
};

// =============================================================================
// Identity
// =============================================================================

/// Account-creation payload.
///
/// The verified OTP proves the buyer owns the email; the backend rejects
/// registrations whose code does not match the one it issued.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub password: String,
    pub otp: String,
    pub role: String,
}

impl RegistrationRequest {
    /// Role assigned to accounts created through checkout.
    pub const CUSTOMER_ROLE: &'static str = "customer";
}

/// Result of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    /// The authenticated user.
    pub user: User,
    /// Bearer token for session-bound calls.
    pub token: String,
}

/// Profile fields synced best-effort before order submission.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

/// Line item as returned by the backend.
///
/// Fields are optional so one partially-hydrated line is dropped instead of
/// failing the whole read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemDto {
    #[serde(default)]
    pub line_id: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub quantity: u32,
}

impl LineItemDto {
    /// Convert to a domain line item, or `None` if the line is unusable.
    #[must_use]
    pub fn into_line_item(self) -> Option<LineItem> {
        let product = ProductRef::new(self.product?);
        if product.is_blank() || self.quantity == 0 {
            return None;
        }
        Some(LineItem {
            line_id: self.line_id.map_or_else(LineId::generate, LineId::new),
            product,
            unit_price: self.unit_price?,
            quantity: self.quantity,
        })
    }
}

/// Cart payload returned by every cart read and mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub items: Vec<LineItemDto>,
}

impl CartResponse {
    /// The usable line items, in server order.
    #[must_use]
    pub fn into_line_items(self) -> Vec<LineItem> {
        self.items
            .into_iter()
            .filter_map(LineItemDto::into_line_item)
            .collect()
    }
}

// =============================================================================
// Coupons
// =============================================================================

/// One line of a coupon validation payload.
#[derive(Debug, Clone, Serialize)]
pub struct CouponLine {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Payload sent to the coupon validation service.
///
/// Always built from the *current* cart snapshot; the discount the service
/// computes is only meaningful for this exact subtotal.
#[derive(Debug, Clone, Serialize)]
pub struct CouponValidationRequest {
    pub code: CouponCode,
    pub subtotal: Money,
    pub items: Vec<CouponLine>,
}

impl CouponValidationRequest {
    /// Build the payload from a cart snapshot.
    #[must_use]
    pub fn from_snapshot(code: CouponCode, snapshot: &CartSnapshot) -> Self {
        Self {
            code,
            subtotal: snapshot.subtotal(),
            items: snapshot
                .items()
                .iter()
                .map(|line| CouponLine {
                    product: line.product.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        }
    }
}

/// Accepted coupon as described by the validation service.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponPayload {
    pub code: CouponCode,
    pub discount_amount: Money,
    pub scope: CouponScope,
}

/// What the validation service replied.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponValidationResponse {
    pub valid: bool,
    #[serde(default)]
    pub coupon: Option<CouponPayload>,
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// Shipping details recorded on an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderShipping {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
}

/// Coupon fields recorded on an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCoupon {
    pub code: CouponCode,
    pub discount_amount: Money,
}

impl From<&AppliedCoupon> for OrderCoupon {
    fn from(coupon: &AppliedCoupon) -> Self {
        Self {
            code: coupon.code.clone(),
            discount_amount: coupon.discount_amount,
        }
    }
}

/// Payment choice recorded on an order. Gateway integration is out of scope;
/// the backend only stores the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Pay on delivery.
    CashOnDelivery,
    /// Mocked card payment.
    MockCard,
}

/// Order submission payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub items: Vec<LineItem>,
    pub total: Money,
    pub shipping: OrderShipping,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<OrderCoupon>,
}

/// Response to a submitted order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sundrift_core::OwnerMode;

    #[test]
    fn test_partially_hydrated_lines_are_dropped() {
        let response = CartResponse {
            items: vec![
                LineItemDto {
                    line_id: Some("line-1".into()),
                    product: Some("prod-1".into()),
                    unit_price: Some(Money::from_major(10)),
                    quantity: 2,
                },
                LineItemDto {
                    line_id: None,
                    product: None,
                    unit_price: Some(Money::from_major(5)),
                    quantity: 1,
                },
                LineItemDto {
                    line_id: Some("line-3".into()),
                    product: Some("prod-3".into()),
                    unit_price: None,
                    quantity: 1,
                },
            ],
        };

        let items = response.into_line_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product, ProductRef::new("prod-1"));
    }

    #[test]
    fn test_missing_line_id_gets_generated() {
        let dto = LineItemDto {
            line_id: None,
            product: Some("prod-1".into()),
            unit_price: Some(Money::from_major(10)),
            quantity: 1,
        };
        assert!(dto.into_line_item().is_some());
    }

    #[test]
    fn test_coupon_request_reflects_snapshot() {
        let snapshot = CartSnapshot::from_items(
            OwnerMode::Guest,
            vec![
                LineItem::new(ProductRef::new("prod-1"), Money::from_major(100), 2),
                LineItem::new(ProductRef::new("prod-2"), Money::from_major(50), 1),
            ],
        );
        let request =
            CouponValidationRequest::from_snapshot(CouponCode::new("SAVE10"), &snapshot);
        assert_eq!(request.subtotal, Money::from_major(250));
        assert_eq!(request.items.len(), 2);
    }

    #[test]
    fn test_order_request_omits_missing_coupon() {
        let request = OrderRequest {
            items: Vec::new(),
            total: Money::ZERO,
            shipping: OrderShipping {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: Email::parse("buyer@example.com").unwrap(),
                phone: "555-0100".into(),
                address: "1 Analytical Way".into(),
            },
            payment_method: PaymentMethod::CashOnDelivery,
            coupon: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("coupon"));
        assert!(json.contains("cash_on_delivery"));
    }
}
