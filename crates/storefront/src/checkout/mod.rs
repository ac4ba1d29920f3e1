//! Checkout: identity resolution and order submission.
//!
//! The buyer confirms shipping details, resolves to an authenticated
//! identity (login for existing accounts, OTP verification plus credential
//! creation for new ones), and the order is submitted. [`CheckoutMachine`]
//! drives the whole flow as an explicit state machine.

mod forms;
mod machine;

pub use forms::{
    MIN_PASSWORD_LENGTH, OTP_LENGTH, OtpFormError, PasswordFormError, ShippingForm,
    ShippingFormError, ShippingInfo, validate_new_password, validate_otp_input,
};
pub use machine::{CheckoutError, CheckoutMachine, CheckoutState};

pub use crate::backend::types::PaymentMethod;
