//! In-memory backend implementation.
//!
//! Implements all four gateway contracts against process-local state, useful
//! for tests and development scenarios where no backend is running. Failure
//! knobs let tests drive the error paths the HTTP backend would produce.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sundrift_core::{
    CouponScope, Email, LineId, LineItem, Money, OrderId, ProductRef, User, UserId,
};

use crate::backend::types::{
    AuthSession, CouponPayload, CouponValidationRequest, CouponValidationResponse, OrderRequest,
    ProfileUpdate, RegistrationRequest,
};
use crate::backend::{
    BackendError, CartGateway, CouponGateway, IdentityGateway, OrderGateway,
};

/// Process-local backend for tests and development.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    issued_otps: HashMap<String, String>,
    session: Option<User>,
    cart: Vec<LineItem>,
    coupons: HashMap<String, (Money, CouponScope)>,
    orders: Vec<OrderRequest>,
    next_user: u64,
    next_order: u64,
    next_line: u64,
    reject_otp_issue: Option<String>,
    identity_unavailable: bool,
    coupon_response_malformed: bool,
    cart_unavailable: bool,
    orders_unavailable: bool,
    reject_orders: Option<String>,
}

struct Account {
    user: User,
    password: String,
}

impl MemoryBackend {
    /// The code "sent" by every OTP issuance.
    pub const OTP_CODE: &'static str = "482916";

    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account directly, bypassing the OTP flow.
    pub async fn seed_account(
        &self,
        email: &Email,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> User {
        let mut state = self.state.write().await;
        state.next_user += 1;
        let user = User {
            id: UserId::new(format!("user-{}", state.next_user)),
            email: email.clone(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            phone: None,
        };
        state.accounts.insert(
            email.as_str().to_owned(),
            Account {
                user: user.clone(),
                password: password.to_owned(),
            },
        );
        user
    }

    /// Register a coupon code the validation service will accept.
    pub async fn seed_coupon(&self, code: &str, discount: Money, scope: CouponScope) {
        self.state
            .write()
            .await
            .coupons
            .insert(code.trim().to_uppercase(), (discount, scope));
    }

    /// Replace the remote cart contents.
    pub async fn seed_cart(&self, items: Vec<LineItem>) {
        self.state.write().await.cart = items;
    }

    /// Pretend a user already logged in.
    pub async fn seed_session(&self, user: User) {
        self.state.write().await.session = Some(user);
    }

    /// Make OTP issuance fail with a rejection (e.g. a disposable address).
    pub async fn set_reject_otp_issue(&self, reason: Option<&str>) {
        self.state.write().await.reject_otp_issue = reason.map(str::to_owned);
    }

    /// Make identity calls fail as if the backend were down.
    pub async fn set_identity_unavailable(&self, unavailable: bool) {
        self.state.write().await.identity_unavailable = unavailable;
    }

    /// Make coupon validation return an acceptance with no coupon payload.
    pub async fn set_coupon_response_malformed(&self, malformed: bool) {
        self.state.write().await.coupon_response_malformed = malformed;
    }

    /// Make cart calls fail as if the backend were down.
    pub async fn set_cart_unavailable(&self, unavailable: bool) {
        self.state.write().await.cart_unavailable = unavailable;
    }

    /// Make order submission fail as if the backend were down.
    pub async fn set_orders_unavailable(&self, unavailable: bool) {
        self.state.write().await.orders_unavailable = unavailable;
    }

    /// Make order submission fail with a rejection (e.g. payment declined).
    pub async fn set_reject_orders(&self, reason: Option<&str>) {
        self.state.write().await.reject_orders = reason.map(str::to_owned);
    }

    /// Orders submitted so far.
    pub async fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.state.read().await.orders.clone()
    }

    /// Current remote cart contents.
    pub async fn cart_items(&self) -> Vec<LineItem> {
        self.state.read().await.cart.clone()
    }

    /// The logged-in user, if any.
    pub async fn session_user(&self) -> Option<User> {
        self.state.read().await.session.clone()
    }
}

impl MemoryState {
    fn require_session(&self) -> Result<&User, BackendError> {
        self.session.as_ref().ok_or(BackendError::Unauthenticated)
    }

    fn next_line_id(&mut self) -> LineId {
        self.next_line += 1;
        LineId::new(format!("srv-line-{}", self.next_line))
    }
}

#[async_trait]
impl IdentityGateway for MemoryBackend {
    async fn identity_exists(&self, email: &Email) -> Result<bool, BackendError> {
        let state = self.state.read().await;
        if state.identity_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        Ok(state.accounts.contains_key(email.as_str()))
    }

    async fn issue_otp(&self, email: &Email) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        if let Some(reason) = &state.reject_otp_issue {
            return Err(BackendError::rejected(422, reason.clone()));
        }
        state
            .issued_otps
            .insert(email.as_str().to_owned(), Self::OTP_CODE.to_owned());
        Ok(())
    }

    async fn verify_otp(&self, email: &Email, code: &str) -> Result<(), BackendError> {
        let state = self.state.read().await;
        match state.issued_otps.get(email.as_str()) {
            Some(issued) if issued.as_str() == code => Ok(()),
            _ => Err(BackendError::rejected(401, "Invalid OTP")),
        }
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<User, BackendError> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(request.email.as_str()) {
            return Err(BackendError::rejected(
                409,
                "an account with this email already exists",
            ));
        }
        // The verified OTP is the proof the buyer owns the address.
        match state.issued_otps.get(request.email.as_str()) {
            Some(issued) if issued == &request.otp => {}
            _ => return Err(BackendError::rejected(403, "OTP verification required")),
        }
        state.issued_otps.remove(request.email.as_str());

        state.next_user += 1;
        let user = User {
            id: UserId::new(format!("user-{}", state.next_user)),
            email: request.email.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            phone: request.phone.clone(),
        };
        state.accounts.insert(
            request.email.as_str().to_owned(),
            Account {
                user: user.clone(),
                password: request.password.clone(),
            },
        );
        Ok(user)
    }

    async fn login(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        let mut state = self.state.write().await;
        if state.identity_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        match state.accounts.get(email.as_str()) {
            Some(account) if account.password == password => {
                let user = account.user.clone();
                state.session = Some(user.clone());
                Ok(AuthSession {
                    token: format!("token-{}", user.id),
                    user,
                })
            }
            _ => Err(BackendError::rejected(401, "invalid email or password")),
        }
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        let email = state.require_session()?.email.as_str().to_owned();
        if let Some(account) = state.accounts.get_mut(&email) {
            account.user.first_name = update.first_name.clone();
            account.user.last_name = update.last_name.clone();
            account.user.phone = update.phone.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl CartGateway for MemoryBackend {
    async fn fetch_cart(&self) -> Result<Vec<LineItem>, BackendError> {
        let state = self.state.read().await;
        if state.cart_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        state.require_session()?;
        Ok(state.cart.clone())
    }

    async fn add_line(
        &self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<Vec<LineItem>, BackendError> {
        let mut state = self.state.write().await;
        if state.cart_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        state.require_session()?;

        if let Some(line) = state.cart.iter_mut().find(|line| &line.product == product) {
            line.quantity += quantity;
        } else {
            let line_id = state.next_line_id();
            state.cart.push(LineItem {
                line_id,
                product: product.clone(),
                // Dev backend has no catalog; priced items arrive via seed_cart.
                unit_price: Money::ZERO,
                quantity,
            });
        }
        Ok(state.cart.clone())
    }

    async fn update_line(
        &self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<Vec<LineItem>, BackendError> {
        let mut state = self.state.write().await;
        if state.cart_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        state.require_session()?;

        if !state.cart.iter().any(|line| &line.product == product) {
            return Err(BackendError::rejected(404, "line not found"));
        }
        if quantity == 0 {
            state.cart.retain(|line| &line.product != product);
        } else if let Some(line) = state.cart.iter_mut().find(|line| &line.product == product) {
            line.quantity = quantity;
        }
        Ok(state.cart.clone())
    }

    async fn remove_line(&self, product: &ProductRef) -> Result<Vec<LineItem>, BackendError> {
        let mut state = self.state.write().await;
        if state.cart_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        state.require_session()?;
        state.cart.retain(|line| &line.product != product);
        Ok(state.cart.clone())
    }

    async fn clear_cart(&self) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        if state.cart_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        state.require_session()?;
        state.cart.clear();
        Ok(())
    }
}

#[async_trait]
impl CouponGateway for MemoryBackend {
    async fn validate_coupon(
        &self,
        request: &CouponValidationRequest,
    ) -> Result<CouponValidationResponse, BackendError> {
        let state = self.state.read().await;
        if state.coupon_response_malformed {
            return Ok(CouponValidationResponse {
                valid: true,
                coupon: None,
                reason: None,
            });
        }

        let code = request.code.normalized();
        match state.coupons.get(code.as_str()) {
            Some((discount, scope)) => Ok(CouponValidationResponse {
                valid: true,
                coupon: Some(CouponPayload {
                    code,
                    discount_amount: *discount,
                    scope: *scope,
                }),
                reason: None,
            }),
            None => Ok(CouponValidationResponse {
                valid: false,
                coupon: None,
                reason: Some("invalid or expired coupon".to_owned()),
            }),
        }
    }
}

#[async_trait]
impl OrderGateway for MemoryBackend {
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderId, BackendError> {
        let mut state = self.state.write().await;
        if state.orders_unavailable {
            return Err(BackendError::Unavailable(503));
        }
        if let Some(reason) = &state.reject_orders {
            return Err(BackendError::rejected(422, reason.clone()));
        }
        state.require_session()?;

        state.next_order += 1;
        let order_id = OrderId::new(format!("order-{}", state.next_order));
        state.orders.push(request.clone());
        Ok(order_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_identity_round_trip() {
        let backend = MemoryBackend::new();
        assert!(!backend.identity_exists(&email("a@x.com")).await.unwrap());

        backend.seed_account(&email("a@x.com"), "hunter22", "Ada", "L").await;
        assert!(backend.identity_exists(&email("a@x.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_otp_issue_verify_register_login() {
        let backend = MemoryBackend::new();
        let buyer = email("new@x.com");

        backend.issue_otp(&buyer).await.unwrap();
        assert!(backend.verify_otp(&buyer, "000000").await.is_err());
        backend
            .verify_otp(&buyer, MemoryBackend::OTP_CODE)
            .await
            .unwrap();

        let request = RegistrationRequest {
            first_name: "New".into(),
            last_name: "Buyer".into(),
            email: buyer.clone(),
            phone: None,
            password: "secret1".into(),
            otp: MemoryBackend::OTP_CODE.into(),
            role: RegistrationRequest::CUSTOMER_ROLE.into(),
        };
        backend.register(&request).await.unwrap();

        let session = backend.login(&buyer, "secret1").await.unwrap();
        assert_eq!(session.user.email, buyer);
        assert!(backend.session_user().await.is_some());
    }

    #[tokio::test]
    async fn test_register_without_verified_otp_is_rejected() {
        let backend = MemoryBackend::new();
        let request = RegistrationRequest {
            first_name: "New".into(),
            last_name: "Buyer".into(),
            email: email("new@x.com"),
            phone: None,
            password: "secret1".into(),
            otp: "123456".into(),
            role: RegistrationRequest::CUSTOMER_ROLE.into(),
        };
        let err = backend.register(&request).await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_cart_requires_session() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.fetch_cart().await,
            Err(BackendError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_cart_mutations_return_full_list() {
        let backend = MemoryBackend::new();
        let user = backend.seed_account(&email("a@x.com"), "pw", "A", "B").await;
        backend.seed_session(user).await;

        let product = ProductRef::new("prod-1");
        let items = backend.add_line(&product, 2).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);

        let items = backend.update_line(&product, 5).await.unwrap();
        assert_eq!(items[0].quantity, 5);

        let items = backend.remove_line(&product).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_coupon_validation_unknown_code() {
        let backend = MemoryBackend::new();
        let request = CouponValidationRequest {
            code: sundrift_core::CouponCode::new("NOPE"),
            subtotal: Money::from_major(100),
            items: Vec::new(),
        };
        let response = backend.validate_coupon(&request).await.unwrap();
        assert!(!response.valid);
        assert_eq!(response.reason.as_deref(), Some("invalid or expired coupon"));
    }
}
