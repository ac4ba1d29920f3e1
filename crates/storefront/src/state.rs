//! Engine wiring.
//!
//! [`Storefront`] assembles the HTTP backend, guest cart storage, and cart
//! store from configuration, and owns the identity context. It is the object
//! a UI layer holds; everything else is reachable from it.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use sundrift_core::{Email, IdentityContext};

use crate::backend::types::AuthSession;
use crate::backend::{BackendError, HttpBackend, IdentityGateway};
use crate::cart::{CartStore, JsonFileCartStorage};
use crate::checkout::CheckoutMachine;
use crate::config::StorefrontConfig;
use crate::notify::{Notification, Notifier};

/// The assembled storefront engine.
pub struct Storefront {
    config: StorefrontConfig,
    backend: HttpBackend,
    /// Authentication state, explicit rather than ambient.
    pub identity: IdentityContext,
    /// The cart store; all cart access goes through it.
    pub cart: CartStore,
}

impl Storefront {
    /// Wire the engine from configuration.
    ///
    /// Restores any persisted guest cart and returns the receiver the UI
    /// drains for notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP backend cannot be constructed.
    pub async fn new(
        config: StorefrontConfig,
    ) -> Result<(Self, UnboundedReceiver<Notification>), BackendError> {
        let backend = HttpBackend::new(&config.backend)?;
        let storage = Arc::new(JsonFileCartStorage::new(config.cart.guest_cart_path.clone()));
        let (notifier, notifications) = Notifier::channel();

        let cart = CartStore::restore(
            storage,
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            notifier,
            config.pricing.clone(),
            config.cart.persist_cooldown,
        )
        .await;

        Ok((
            Self {
                config,
                backend,
                identity: IdentityContext::anonymous(),
                cart,
            },
            notifications,
        ))
    }

    /// Start a checkout over the current cart.
    ///
    /// Each call is a fresh session; drop the machine to abandon it.
    #[must_use]
    pub fn open_checkout(&self) -> CheckoutMachine {
        CheckoutMachine::new(
            Arc::new(self.backend.clone()),
            Arc::new(self.backend.clone()),
            self.config.checkout.otp_resend_cooldown,
        )
    }

    /// Log in and run the guest → authenticated cart reconciliation.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection or transport error; identity and cart
    /// are unchanged in that case.
    pub async fn sign_in(&mut self, email: &Email, password: &str) -> Result<(), BackendError> {
        let AuthSession { user, .. } = self.backend.login(email, password).await?;
        self.identity.set_authenticated(user);
        if let Err(e) = self.cart.sign_in().await {
            // The login itself succeeded; the cart surfaces its own
            // notification and stays on the guest snapshot.
            warn!(error = %e, "cart reconciliation after sign-in failed");
        }
        Ok(())
    }

    /// Log out: drop the backend session and reload the guest cart.
    pub async fn sign_out(&mut self) {
        self.backend.clear_session().await;
        self.identity.sign_out();
        self.cart.sign_out().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, CartConfig, CheckoutConfig};
    use crate::pricing::PricingPolicy;
    use secrecy::SecretString;
    use std::time::Duration;
    use sundrift_core::Money;
    use url::Url;

    fn config(dir: &std::path::Path) -> StorefrontConfig {
        StorefrontConfig {
            backend: BackendConfig {
                base_url: Url::parse("https://api.sundrift.test/v1/").unwrap(),
                api_key: SecretString::from("k".repeat(32)),
            },
            pricing: PricingPolicy {
                free_delivery_threshold: Money::from_major(500),
                flat_shipping_fee: Money::from_major(50),
                tax_rate: rust_decimal::Decimal::new(5, 2),
            },
            cart: CartConfig {
                guest_cart_path: dir.join("guest_cart.json"),
                persist_cooldown: Duration::from_millis(400),
            },
            checkout: CheckoutConfig {
                otp_resend_cooldown: Duration::from_secs(60),
            },
        }
    }

    #[tokio::test]
    async fn test_wiring_starts_as_guest_with_empty_cart() {
        let dir = tempfile::tempdir().unwrap();
        let (storefront, _notifications) = Storefront::new(config(dir.path())).await.unwrap();

        assert!(!storefront.identity.is_authenticated());
        assert!(storefront.cart.snapshot().is_empty());

        let checkout = storefront.open_checkout();
        assert!(matches!(
            checkout.state(),
            crate::checkout::CheckoutState::CollectingInfo { .. }
        ));
    }
}
