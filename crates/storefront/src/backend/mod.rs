//! Backend collaborator contracts.
//!
//! The engine talks to the REST backend exclusively through the gateway
//! traits in this module, so the cart store and the checkout machine can be
//! exercised against the in-memory implementation while production wires in
//! [`HttpBackend`].

mod http;
mod memory;
pub mod types;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use thiserror::Error;

use sundrift_core::{Email, LineItem, OrderId, ProductRef, User};

use types::{
    AuthSession, CouponValidationRequest, CouponValidationResponse, OrderRequest, ProfileUpdate,
    RegistrationRequest,
};

/// Errors from backend collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure reaching the backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend asked us to slow down.
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),

    /// The backend failed (5xx).
    #[error("backend unavailable (HTTP {0})")]
    Unavailable(u16),

    /// The backend rejected the request: validation failure, bad
    /// credentials, or a business rule such as an expired coupon.
    #[error("{message}")]
    Rejected {
        /// HTTP status the rejection arrived with.
        status: u16,
        /// Reason, surfaced verbatim to the user where appropriate.
        message: String,
    },

    /// A session-bound call was made without an active session.
    #[error("no active session")]
    Unauthenticated,

    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Build a rejection.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Whether this is a definitive rejection rather than a transport fault.
    ///
    /// Rejections become state-local error messages in the checkout machine;
    /// transport faults are returned to the caller with no state transition.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Identity, OTP, and credential operations.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Whether an account exists for this email.
    async fn identity_exists(&self, email: &Email) -> Result<bool, BackendError>;

    /// Ask the backend to send a one-time code to this email.
    ///
    /// The backend may reject unreachable or disposable addresses.
    async fn issue_otp(&self, email: &Email) -> Result<(), BackendError>;

    /// Check a one-time code previously issued to this email.
    async fn verify_otp(&self, email: &Email, code: &str) -> Result<(), BackendError>;

    /// Create an account. The verified OTP in the request is the proof that
    /// the buyer owns the email.
    async fn register(&self, request: &RegistrationRequest) -> Result<User, BackendError>;

    /// Exchange credentials for a session.
    async fn login(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError>;

    /// Best-effort sync of profile fields. Callers treat failures as
    /// non-fatal.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), BackendError>;
}

/// Remote cart operations. All calls are session-bound; every mutation
/// returns the server's full, authoritative line-item list.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Fetch the authenticated user's cart.
    async fn fetch_cart(&self) -> Result<Vec<LineItem>, BackendError>;

    /// Add units of a product.
    async fn add_line(
        &self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<Vec<LineItem>, BackendError>;

    /// Set the quantity of a product's line.
    async fn update_line(
        &self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<Vec<LineItem>, BackendError>;

    /// Remove a product's line.
    async fn remove_line(&self, product: &ProductRef) -> Result<Vec<LineItem>, BackendError>;

    /// Remove every line.
    async fn clear_cart(&self) -> Result<(), BackendError>;
}

/// Coupon validation against a cart snapshot.
#[async_trait]
pub trait CouponGateway: Send + Sync {
    /// Validate a code against the payload built from the current cart.
    async fn validate_coupon(
        &self,
        request: &CouponValidationRequest,
    ) -> Result<CouponValidationResponse, BackendError>;
}

/// Order submission.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit the order and return its backend-assigned ID.
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderId, BackendError>;
}
