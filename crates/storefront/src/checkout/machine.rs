//! The checkout identity-resolution state machine.
//!
//! A purchase can only be submitted by an authenticated identity. When the
//! buyer confirms the shipping form, the machine determines whether they are
//! a new user, an existing user, or already authenticated, and drives them
//! through password login or OTP verification plus credential creation
//! before the order goes out. One transition method per user action; no
//! nested callback chains.
//!
//! The order payload is captured when the shipping form is confirmed, so the
//! cart reconciliation that happens on mid-checkout login cannot change what
//! the buyer is purchasing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use sundrift_core::{AppliedCoupon, Email, IdentityContext, LineItem, OrderId};

use crate::backend::types::{
    OrderCoupon, OrderRequest, OrderShipping, PaymentMethod, ProfileUpdate, RegistrationRequest,
};
use crate::backend::{BackendError, IdentityGateway, OrderGateway};
use crate::cart::CartStore;
use crate::checkout::forms::{
    self, OtpFormError, PasswordFormError, ShippingForm, ShippingFormError, ShippingInfo,
};
use crate::pricing::{PriceBreakdown, PricingStage};

/// Where the checkout currently stands.
///
/// Recoverable failures are recorded on the state (`error`) and keep the
/// buyer in place; they are not `Err` returns.
#[derive(Debug, Clone)]
pub enum CheckoutState {
    /// Collecting shipping details. `error` carries the most recent
    /// recoverable failure, e.g. a rejected OTP issuance or a failed order.
    CollectingInfo {
        /// State-local error message, if any.
        error: Option<String>,
    },
    /// The email belongs to an existing account; waiting for its password.
    AwaitingPassword {
        /// The identifier being resolved.
        email: Email,
        /// State-local error message, if any.
        error: Option<String>,
    },
    /// A one-time code was sent to the email; waiting for it.
    AwaitingOtp {
        /// The identifier being verified.
        email: Email,
        /// How many resends have been requested.
        resend_count: u32,
        /// Resend is disabled until this deadline.
        resend_available_at: Instant,
        /// State-local error message, if any.
        error: Option<String>,
    },
    /// The code was verified; waiting for the new account's password.
    AwaitingNewPassword {
        /// The verified identifier.
        email: Email,
        /// State-local error message, if any.
        error: Option<String>,
    },
    /// The order was placed.
    Completed {
        /// Backend-assigned order ID.
        order_id: OrderId,
    },
}

impl CheckoutState {
    /// Short human-readable name, used in error messages and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CollectingInfo { .. } => "shipping details",
            Self::AwaitingPassword { .. } => "password entry",
            Self::AwaitingOtp { .. } => "code verification",
            Self::AwaitingNewPassword { .. } => "password creation",
            Self::Completed { .. } => "completed",
        }
    }

    /// The state-local error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::CollectingInfo { error }
            | Self::AwaitingPassword { error, .. }
            | Self::AwaitingOtp { error, .. }
            | Self::AwaitingNewPassword { error, .. } => error.as_deref(),
            Self::Completed { .. } => None,
        }
    }
}

/// Errors returned to the caller without a state transition.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Shipping form failed validation.
    #[error(transparent)]
    Shipping(#[from] ShippingFormError),

    /// OTP input failed validation.
    #[error(transparent)]
    Otp(#[from] OtpFormError),

    /// New password failed validation.
    #[error(transparent)]
    Password(#[from] PasswordFormError),

    /// Checkout cannot start over an empty cart.
    #[error("your cart is empty")]
    EmptyCart,

    /// The action does not apply to the current step.
    #[error("cannot {action} during {state}")]
    InvalidState {
        /// What was attempted.
        action: &'static str,
        /// Name of the current state.
        state: &'static str,
    },

    /// A request for this session is already in flight. Duplicate
    /// submissions are rejected, not queued.
    #[error("another request is already in progress")]
    Busy,

    /// Resend is still cooling down.
    #[error("wait {remaining_secs}s before requesting a new code")]
    ResendCooldown {
        /// Seconds until resend is available.
        remaining_secs: u64,
    },

    /// A collaborator was unreachable on a critical path. No state
    /// transition occurred; the buyer can retry.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Order payload captured when the buyer confirms the shipping form.
#[derive(Debug, Clone)]
struct OrderDraft {
    items: Vec<LineItem>,
    coupon: Option<AppliedCoupon>,
    totals: PriceBreakdown,
}

/// Per-checkout session data. Created when the shipping form is confirmed,
/// destroyed on success or when the machine is dropped.
#[derive(Debug, Clone)]
struct CheckoutSession {
    shipping: ShippingInfo,
    payment: PaymentMethod,
    draft: OrderDraft,
    verified_otp: Option<String>,
}

/// The checkout state machine.
///
/// Holds no cart state of its own: it borrows the cart store to capture the
/// order draft and to clear it after a successful submission.
pub struct CheckoutMachine {
    state: CheckoutState,
    session: Option<CheckoutSession>,
    identity_gateway: Arc<dyn IdentityGateway>,
    orders: Arc<dyn OrderGateway>,
    otp_resend_cooldown: Duration,
    in_flight: bool,
}

impl CheckoutMachine {
    /// Create a machine at the shipping-details step.
    #[must_use]
    pub fn new(
        identity_gateway: Arc<dyn IdentityGateway>,
        orders: Arc<dyn OrderGateway>,
        otp_resend_cooldown: Duration,
    ) -> Self {
        Self {
            state: CheckoutState::CollectingInfo { error: None },
            session: None,
            identity_gateway,
            orders,
            otp_resend_cooldown,
            in_flight: false,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// The confirmed shipping details, if the form was submitted.
    #[must_use]
    pub fn shipping_info(&self) -> Option<&ShippingInfo> {
        self.session.as_ref().map(|session| &session.shipping)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Confirm the shipping form and start identity resolution.
    ///
    /// Authenticated callers skip resolution and go straight to order
    /// submission. Otherwise the identity collaborator decides: an existing
    /// account waits for its password, an unknown one gets an OTP issued.
    ///
    /// # Errors
    ///
    /// Form validation failures, [`CheckoutError::EmptyCart`], and transport
    /// errors are returned with no state transition. An OTP issuance
    /// rejection (unreachable or disposable address) is recorded on the
    /// shipping step instead.
    #[instrument(skip_all)]
    pub async fn submit_shipping(
        &mut self,
        form: ShippingForm,
        payment: PaymentMethod,
        identity: &IdentityContext,
        cart: &mut CartStore,
    ) -> Result<(), CheckoutError> {
        if !matches!(self.state, CheckoutState::CollectingInfo { .. }) {
            return Err(CheckoutError::InvalidState {
                action: "submit shipping details",
                state: self.state.name(),
            });
        }
        let shipping = form.validate()?;
        if cart.snapshot().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.begin_request()?;
        let result = self.resolve_identity(shipping, payment, identity, cart).await;
        self.in_flight = false;
        result
    }

    async fn resolve_identity(
        &mut self,
        shipping: ShippingInfo,
        payment: PaymentMethod,
        identity: &IdentityContext,
        cart: &mut CartStore,
    ) -> Result<(), CheckoutError> {
        let email = shipping.email.clone();

        // The draft is what the buyer saw and confirmed; identity
        // transitions after this point must not change the order.
        let draft = OrderDraft {
            items: cart.snapshot().items().to_vec(),
            coupon: cart.coupon().cloned(),
            totals: cart.totals(PricingStage::Checkout),
        };
        self.session = Some(CheckoutSession {
            shipping,
            payment,
            draft,
            verified_otp: None,
        });

        if identity.is_authenticated() {
            return self.submit_order(cart).await;
        }

        if self.identity_gateway.identity_exists(&email).await? {
            self.state = CheckoutState::AwaitingPassword { email, error: None };
            return Ok(());
        }

        match self.identity_gateway.issue_otp(&email).await {
            Ok(()) => {
                self.state = CheckoutState::AwaitingOtp {
                    email,
                    resend_count: 0,
                    resend_available_at: Instant::now() + self.otp_resend_cooldown,
                    error: None,
                };
                Ok(())
            }
            // The address was rejected; stay on the shipping step so the
            // buyer can fix the identifier.
            Err(e) if e.is_rejection() => {
                self.state = CheckoutState::CollectingInfo {
                    error: Some(e.to_string()),
                };
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Submit the password for an existing account.
    ///
    /// A wrong password stays on this step with an error; retries are
    /// unlimited. Success logs in, reconciles the cart, and submits the
    /// order.
    ///
    /// # Errors
    ///
    /// Transport errors are returned with no state transition.
    #[instrument(skip_all)]
    pub async fn submit_password(
        &mut self,
        password: &str,
        identity: &mut IdentityContext,
        cart: &mut CartStore,
    ) -> Result<(), CheckoutError> {
        let CheckoutState::AwaitingPassword { email, .. } = &self.state else {
            return Err(CheckoutError::InvalidState {
                action: "submit a password",
                state: self.state.name(),
            });
        };
        let email = email.clone();

        self.begin_request()?;
        let result = self.login_and_submit(&email, password, identity, cart).await;
        self.in_flight = false;
        result
    }

    async fn login_and_submit(
        &mut self,
        email: &Email,
        password: &str,
        identity: &mut IdentityContext,
        cart: &mut CartStore,
    ) -> Result<(), CheckoutError> {
        match self.identity_gateway.login(email, password).await {
            Ok(session) => {
                identity.set_authenticated(session.user);
                if let Err(e) = cart.sign_in().await {
                    // The order draft was captured at shipping confirmation;
                    // a failed reconciliation does not block the purchase.
                    warn!(error = %e, "cart reconciliation after checkout login failed");
                }
                self.submit_order(cart).await
            }
            Err(e) if e.is_rejection() => {
                self.set_state_error(e.to_string());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Submit the one-time code.
    ///
    /// A rejected code stays on this step with an error and does not clear
    /// the input. A verified code advances to password creation, carrying
    /// the code as proof for registration.
    ///
    /// # Errors
    ///
    /// [`OtpFormError`] if the input is not exactly six characters;
    /// transport errors with no state transition.
    #[instrument(skip_all)]
    pub async fn submit_otp(&mut self, code: &str) -> Result<(), CheckoutError> {
        let CheckoutState::AwaitingOtp { email, .. } = &self.state else {
            return Err(CheckoutError::InvalidState {
                action: "submit a code",
                state: self.state.name(),
            });
        };
        let email = email.clone();
        forms::validate_otp_input(code)?;

        self.begin_request()?;
        let result = match self.identity_gateway.verify_otp(&email, code).await {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.verified_otp = Some(code.to_owned());
                }
                self.state = CheckoutState::AwaitingNewPassword { email, error: None };
                Ok(())
            }
            Err(e) if e.is_rejection() => {
                self.set_state_error(e.to_string());
                Ok(())
            }
            Err(e) => Err(e.into()),
        };
        self.in_flight = false;
        result
    }

    /// Request a fresh one-time code.
    ///
    /// Disabled until the cooldown deadline; each resend widens the next
    /// window linearly to discourage abuse. A successful resend invalidates
    /// the previous code, so callers reset the OTP input.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::ResendCooldown`] while the window is active;
    /// transport errors with no state transition.
    #[instrument(skip_all)]
    pub async fn resend_otp(&mut self) -> Result<(), CheckoutError> {
        let CheckoutState::AwaitingOtp {
            email,
            resend_count,
            resend_available_at,
            ..
        } = &self.state
        else {
            return Err(CheckoutError::InvalidState {
                action: "resend the code",
                state: self.state.name(),
            });
        };
        let (email, resend_count, resend_available_at) =
            (email.clone(), *resend_count, *resend_available_at);

        let now = Instant::now();
        if now < resend_available_at {
            return Err(CheckoutError::ResendCooldown {
                remaining_secs: (resend_available_at - now).as_secs().max(1),
            });
        }

        self.begin_request()?;
        let result = match self.identity_gateway.issue_otp(&email).await {
            Ok(()) => {
                let resend_count = resend_count + 1;
                self.state = CheckoutState::AwaitingOtp {
                    email,
                    resend_count,
                    resend_available_at: now + self.otp_resend_cooldown * (resend_count + 1),
                    error: None,
                };
                Ok(())
            }
            Err(e) if e.is_rejection() => {
                self.set_state_error(e.to_string());
                Ok(())
            }
            Err(e) => Err(e.into()),
        };
        self.in_flight = false;
        result
    }

    /// Create the account, log in with the new credentials, and submit.
    ///
    /// The registration carries the verified OTP as proof the buyer owns the
    /// email.
    ///
    /// # Errors
    ///
    /// [`PasswordFormError`] for length/confirmation failures; transport
    /// errors with no state transition.
    #[instrument(skip_all)]
    pub async fn submit_new_password(
        &mut self,
        password: &str,
        confirm: &str,
        identity: &mut IdentityContext,
        cart: &mut CartStore,
    ) -> Result<(), CheckoutError> {
        let CheckoutState::AwaitingNewPassword { email, .. } = &self.state else {
            return Err(CheckoutError::InvalidState {
                action: "create a password",
                state: self.state.name(),
            });
        };
        let email = email.clone();
        forms::validate_new_password(password, confirm)?;

        self.begin_request()?;
        let result = self
            .register_and_submit(&email, password, identity, cart)
            .await;
        self.in_flight = false;
        result
    }

    async fn register_and_submit(
        &mut self,
        email: &Email,
        password: &str,
        identity: &mut IdentityContext,
        cart: &mut CartStore,
    ) -> Result<(), CheckoutError> {
        let Some(session) = self.session.as_ref() else {
            return Err(CheckoutError::InvalidState {
                action: "register",
                state: self.state.name(),
            });
        };

        let request = RegistrationRequest {
            first_name: session.shipping.first_name.clone(),
            last_name: session.shipping.last_name.clone(),
            email: email.clone(),
            phone: Some(session.shipping.phone.clone()),
            password: password.to_owned(),
            otp: session.verified_otp.clone().unwrap_or_default(),
            role: RegistrationRequest::CUSTOMER_ROLE.to_owned(),
        };

        match self.identity_gateway.register(&request).await {
            Ok(_) => self.login_and_submit(email, password, identity, cart).await,
            Err(e) if e.is_rejection() => {
                self.set_state_error(e.to_string());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Abandon identity resolution and return to editing the shipping
    /// details. The session (and therefore the form) stays populated.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::InvalidState`] outside the resolution sub-states.
    pub fn cancel_resolution(&mut self) -> Result<(), CheckoutError> {
        match self.state {
            CheckoutState::AwaitingPassword { .. }
            | CheckoutState::AwaitingOtp { .. }
            | CheckoutState::AwaitingNewPassword { .. } => {
                self.state = CheckoutState::CollectingInfo { error: None };
                Ok(())
            }
            _ => Err(CheckoutError::InvalidState {
                action: "go back",
                state: self.state.name(),
            }),
        }
    }

    // =========================================================================
    // Order Submission
    // =========================================================================

    /// Final submission: best-effort profile sync, then the order itself.
    ///
    /// Success clears the cart and completes the session. Failure returns
    /// control to the shipping step with the error; the form and the cart
    /// stay populated for a retry.
    async fn submit_order(&mut self, cart: &mut CartStore) -> Result<(), CheckoutError> {
        let Some(session) = self.session.as_ref() else {
            return Err(CheckoutError::InvalidState {
                action: "submit the order",
                state: self.state.name(),
            });
        };

        // Non-critical: a failed profile sync must never block the order.
        let update = ProfileUpdate {
            first_name: session.shipping.first_name.clone(),
            last_name: session.shipping.last_name.clone(),
            phone: Some(session.shipping.phone.clone()),
            address: Some(session.shipping.address.clone()),
        };
        if let Err(e) = self.identity_gateway.update_profile(&update).await {
            warn!(error = %e, "profile sync before order submission failed");
        }

        let request = OrderRequest {
            items: session.draft.items.clone(),
            total: session.draft.totals.total,
            shipping: OrderShipping {
                first_name: session.shipping.first_name.clone(),
                last_name: session.shipping.last_name.clone(),
                email: session.shipping.email.clone(),
                phone: session.shipping.phone.clone(),
                address: session.shipping.address.clone(),
            },
            payment_method: session.payment,
            coupon: session.draft.coupon.as_ref().map(OrderCoupon::from),
        };

        match self.orders.submit_order(&request).await {
            Ok(order_id) => {
                if let Err(e) = cart.clear().await {
                    warn!(error = %e, "cart clear after a successful order failed");
                }
                info!(order_id = %order_id, "order placed");
                self.session = None;
                self.state = CheckoutState::Completed { order_id };
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "order submission failed");
                self.state = CheckoutState::CollectingInfo {
                    error: Some(order_failure_message(&e)),
                };
                Ok(())
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Duplicate-submission guard: one remote transition per session at a
    /// time.
    fn begin_request(&mut self) -> Result<(), CheckoutError> {
        if self.in_flight {
            return Err(CheckoutError::Busy);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Record a recoverable failure on the current state.
    fn set_state_error(&mut self, message: String) {
        match &mut self.state {
            CheckoutState::CollectingInfo { error }
            | CheckoutState::AwaitingPassword { error, .. }
            | CheckoutState::AwaitingOtp { error, .. }
            | CheckoutState::AwaitingNewPassword { error, .. } => *error = Some(message),
            CheckoutState::Completed { .. } => {}
        }
    }
}

fn order_failure_message(error: &BackendError) -> String {
    if error.is_rejection() {
        error.to_string()
    } else {
        "Could not submit your order. Please try again.".to_owned()
    }
}
