//! Coupon validation.
//!
//! The validator builds its payload from the *current* cart snapshot and
//! delegates to the external validation collaborator; the discount it
//! records is only meaningful for that exact subtotal. The cart store is
//! responsible for clearing the result on any later mutation.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use sundrift_core::{AppliedCoupon, CartSnapshot, CouponCode};

use crate::backend::types::CouponValidationRequest;
use crate::backend::{BackendError, CouponGateway};

/// Fallback reason when the collaborator's response is malformed.
const GENERIC_REJECTION: &str = "invalid coupon";

/// Errors from coupon validation.
#[derive(Debug, Error)]
pub enum CouponError {
    /// The validation service rejected the code. The reason is surfaced
    /// verbatim to the user.
    #[error("{0}")]
    Rejected(String),

    /// The validation service could not be reached.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Validates coupon codes against cart snapshots.
pub struct CouponValidator {
    gateway: Arc<dyn CouponGateway>,
}

impl CouponValidator {
    /// Create a validator over the given collaborator.
    #[must_use]
    pub fn new(gateway: Arc<dyn CouponGateway>) -> Self {
        Self { gateway }
    }

    /// Validate a code against the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::Rejected`] with the collaborator's reason (or a
    /// generic fallback for malformed acceptances), or
    /// [`CouponError::Backend`] when the collaborator is unreachable.
    #[instrument(skip(self, snapshot), fields(code = %code))]
    pub async fn validate(
        &self,
        code: &CouponCode,
        snapshot: &CartSnapshot,
    ) -> Result<AppliedCoupon, CouponError> {
        let request = CouponValidationRequest::from_snapshot(code.normalized(), snapshot);

        let response = match self.gateway.validate_coupon(&request).await {
            Ok(response) => response,
            // An HTTP-level rejection carries the backend's reason.
            Err(BackendError::Rejected { message, .. }) => {
                return Err(CouponError::Rejected(message));
            }
            Err(other) => return Err(CouponError::Backend(other)),
        };

        if !response.valid {
            return Err(CouponError::Rejected(
                response
                    .reason
                    .unwrap_or_else(|| GENERIC_REJECTION.to_owned()),
            ));
        }

        // An acceptance without a coupon payload is malformed; never surface
        // it as a valid discount.
        response
            .coupon
            .map(|payload| AppliedCoupon {
                code: payload.code,
                discount_amount: payload.discount_amount,
                scope: payload.scope,
            })
            .ok_or_else(|| CouponError::Rejected(GENERIC_REJECTION.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use sundrift_core::{CouponScope, LineItem, Money, OwnerMode, ProductRef};

    fn snapshot() -> CartSnapshot {
        CartSnapshot::from_items(
            OwnerMode::Guest,
            vec![LineItem::new(
                ProductRef::new("prod-1"),
                Money::from_major(100),
                2,
            )],
        )
    }

    #[tokio::test]
    async fn test_accepted_coupon_is_normalized() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .seed_coupon("SAVE10", Money::from_major(10), CouponScope::Cart)
            .await;

        let validator = CouponValidator::new(backend);
        let coupon = validator
            .validate(&CouponCode::new(" save10 "), &snapshot())
            .await
            .unwrap();

        assert_eq!(coupon.code, CouponCode::new("SAVE10"));
        assert_eq!(coupon.discount_amount, Money::from_major(10));
    }

    #[tokio::test]
    async fn test_rejection_reason_is_verbatim() {
        let backend = Arc::new(MemoryBackend::new());
        let validator = CouponValidator::new(backend);

        let err = validator
            .validate(&CouponCode::new("NOPE"), &snapshot())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid or expired coupon");
    }

    #[tokio::test]
    async fn test_malformed_acceptance_falls_back_to_generic_reason() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_coupon_response_malformed(true).await;

        let validator = CouponValidator::new(backend);
        let err = validator
            .validate(&CouponCode::new("SAVE10"), &snapshot())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), GENERIC_REJECTION);
    }
}
