//! Checkout form validation.
//!
//! Validation failures are caught here, at the boundary closest to the
//! input, and never reach the state machine as a transition.

use thiserror::Error;

use sundrift_core::{Email, EmailError};

/// Required length of a one-time code.
pub const OTP_LENGTH: usize = 6;

/// Minimum length of a newly created password.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Raw shipping form as submitted by the UI.
#[derive(Debug, Clone, Default)]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Validated shipping details for a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
}

/// Shipping form validation failures.
#[derive(Debug, Error)]
pub enum ShippingFormError {
    /// First name missing.
    #[error("first name is required")]
    MissingFirstName,
    /// Last name missing.
    #[error("last name is required")]
    MissingLastName,
    /// Email failed to parse.
    #[error("{0}")]
    InvalidEmail(#[from] EmailError),
    /// Phone number missing.
    #[error("phone number is required")]
    MissingPhone,
    /// Address missing.
    #[error("delivery address is required")]
    MissingAddress,
}

impl ShippingForm {
    /// Validate the form into shipping details.
    ///
    /// # Errors
    ///
    /// Returns the first failed check; fields are trimmed before checking.
    pub fn validate(self) -> Result<ShippingInfo, ShippingFormError> {
        let first_name = self.first_name.trim().to_owned();
        if first_name.is_empty() {
            return Err(ShippingFormError::MissingFirstName);
        }

        let last_name = self.last_name.trim().to_owned();
        if last_name.is_empty() {
            return Err(ShippingFormError::MissingLastName);
        }

        let email = Email::parse(self.email.trim())?;

        let phone = self.phone.trim().to_owned();
        if phone.is_empty() {
            return Err(ShippingFormError::MissingPhone);
        }

        let address = self.address.trim().to_owned();
        if address.is_empty() {
            return Err(ShippingFormError::MissingAddress);
        }

        Ok(ShippingInfo {
            first_name,
            last_name,
            email,
            phone,
            address,
        })
    }
}

/// One-time code input failures.
#[derive(Debug, Error)]
pub enum OtpFormError {
    /// The code is not exactly [`OTP_LENGTH`] characters.
    #[error("the code must be exactly {OTP_LENGTH} digits")]
    WrongLength,
}

/// Check a one-time code input before it is submitted for verification.
///
/// # Errors
///
/// Returns [`OtpFormError::WrongLength`] unless the code is exactly
/// [`OTP_LENGTH`] characters.
pub fn validate_otp_input(code: &str) -> Result<(), OtpFormError> {
    if code.chars().count() == OTP_LENGTH {
        Ok(())
    } else {
        Err(OtpFormError::WrongLength)
    }
}

/// New-password input failures.
#[derive(Debug, Error)]
pub enum PasswordFormError {
    /// Shorter than [`MIN_PASSWORD_LENGTH`].
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,
    /// Password and confirmation differ.
    #[error("passwords do not match")]
    Mismatch,
}

/// Check a new password and its confirmation.
///
/// # Errors
///
/// Returns [`PasswordFormError::TooShort`] or
/// [`PasswordFormError::Mismatch`].
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), PasswordFormError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordFormError::TooShort);
    }
    if password != confirm {
        return Err(PasswordFormError::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ShippingForm {
        ShippingForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "buyer@example.com".into(),
            phone: "555-0100".into(),
            address: "1 Analytical Way".into(),
        }
    }

    #[test]
    fn test_valid_form() {
        let info = form().validate().unwrap();
        assert_eq!(info.email.as_str(), "buyer@example.com");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let mut raw = form();
        raw.first_name = "  Ada  ".into();
        raw.email = " buyer@example.com ".into();
        let info = raw.validate().unwrap();
        assert_eq!(info.first_name, "Ada");
        assert_eq!(info.email.as_str(), "buyer@example.com");
    }

    #[test]
    fn test_missing_fields() {
        let mut raw = form();
        raw.first_name = " ".into();
        assert!(matches!(
            raw.validate(),
            Err(ShippingFormError::MissingFirstName)
        ));

        let mut raw = form();
        raw.address = String::new();
        assert!(matches!(
            raw.validate(),
            Err(ShippingFormError::MissingAddress)
        ));
    }

    #[test]
    fn test_invalid_email() {
        let mut raw = form();
        raw.email = "not-an-email".into();
        assert!(matches!(
            raw.validate(),
            Err(ShippingFormError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_otp_length() {
        assert!(validate_otp_input("482916").is_ok());
        assert!(validate_otp_input("12345").is_err());
        assert!(validate_otp_input("1234567").is_err());
        assert!(validate_otp_input("").is_err());
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password("secret", "secret").is_ok());
        assert!(matches!(
            validate_new_password("short", "short"),
            Err(PasswordFormError::TooShort)
        ));
        assert!(matches!(
            validate_new_password("secret1", "secret2"),
            Err(PasswordFormError::Mismatch)
        ));
    }
}
