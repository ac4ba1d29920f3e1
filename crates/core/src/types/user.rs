//! User identity types.

use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::id::UserId;

/// An authenticated storefront customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend-assigned user ID.
    pub id: UserId,
    /// The email the account is keyed on.
    pub email: Email,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact phone number, if the user provided one.
    pub phone: Option<String>,
}

impl User {
    /// Display name: "First Last".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Authentication state for the current session.
///
/// Drives which cart storage is authoritative: no user means guest mode and
/// local persistence, a user means the remote store. Passed explicitly to the
/// components that need it - there is no ambient global identity.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    user: Option<User>,
}

impl IdentityContext {
    /// An unauthenticated context.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user: None }
    }

    /// A context already holding an authenticated user.
    #[must_use]
    pub const fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// The authenticated user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Record a successful login or registration.
    pub fn set_authenticated(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Drop the authenticated user.
    pub fn sign_out(&mut self) {
        self.user = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::new("user-1"),
            email: Email::parse("buyer@example.com").unwrap(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            phone: None,
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(user().full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_identity_transitions() {
        let mut identity = IdentityContext::anonymous();
        assert!(!identity.is_authenticated());

        identity.set_authenticated(user());
        assert!(identity.is_authenticated());
        assert_eq!(identity.user().unwrap().email.as_str(), "buyer@example.com");

        identity.sign_out();
        assert!(!identity.is_authenticated());
    }
}
