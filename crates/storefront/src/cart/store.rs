//! The cart store.
//!
//! Owns the authoritative [`CartSnapshot`] and the applied coupon, and
//! switches backing storage on identity transitions: guest carts persist
//! locally through [`GuestCartStorage`], authenticated carts mirror the
//! remote store through [`CartGateway`]. The reconciliation transitions are
//! explicit methods ([`CartStore::sign_in`], [`CartStore::sign_out`]), not
//! side effects of observers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use sundrift_core::{
    AppliedCoupon, CartSnapshot, CouponCode, LineItem, Money, OwnerMode, ProductRef,
};

use crate::backend::{BackendError, CartGateway, CouponGateway};
use crate::cart::storage::GuestCartStorage;
use crate::coupon::{CouponError, CouponValidator};
use crate::notify::Notifier;
use crate::pricing::{self, PriceBreakdown, PricingPolicy, PricingStage};

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A mutation for this product has not settled yet. Rapid repeated
    /// triggers for the same line are rejected here instead of being left to
    /// UI disabling.
    #[error("a cart update for {product} is already in flight")]
    MutationInFlight {
        /// The product whose mutation is pending.
        product: ProductRef,
    },

    /// Remote cart operation failed. The in-memory snapshot is unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Dual-mode cart store.
///
/// All mutations are serialized per store instance: methods take `&mut self`
/// and the caller awaits each one before issuing the next.
pub struct CartStore {
    snapshot: CartSnapshot,
    coupon: Option<AppliedCoupon>,
    storage: Arc<dyn GuestCartStorage>,
    gateway: Arc<dyn CartGateway>,
    validator: CouponValidator,
    notifier: Notifier,
    policy: PricingPolicy,
    persist_cooldown: Duration,
    /// True while a sign-in reconciliation is replacing the snapshot.
    reconciling: bool,
    /// Local persistence stays off until this deadline after a
    /// reconciliation settles.
    persist_resume_at: Option<Instant>,
    in_flight: HashSet<ProductRef>,
}

impl CartStore {
    /// Restore a guest cart store from local storage.
    ///
    /// A missing record yields an empty cart; an unreadable one is treated
    /// the same, with a warning.
    pub async fn restore(
        storage: Arc<dyn GuestCartStorage>,
        gateway: Arc<dyn CartGateway>,
        coupons: Arc<dyn CouponGateway>,
        notifier: Notifier,
        policy: PricingPolicy,
        persist_cooldown: Duration,
    ) -> Self {
        let items = match storage.load().await {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to load the guest cart, starting empty");
                Vec::new()
            }
        };

        Self {
            snapshot: CartSnapshot::from_items(OwnerMode::Guest, items),
            coupon: None,
            storage,
            gateway,
            validator: CouponValidator::new(coupons),
            notifier,
            policy,
            persist_cooldown,
            reconciling: false,
            persist_resume_at: None,
            in_flight: HashSet::new(),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        &self.snapshot
    }

    /// The currently applied coupon, if any.
    #[must_use]
    pub const fn coupon(&self) -> Option<&AppliedCoupon> {
        self.coupon.as_ref()
    }

    /// The identity mode the store is operating in.
    #[must_use]
    pub const fn mode(&self) -> OwnerMode {
        self.snapshot.mode()
    }

    /// Totals for the current snapshot and applied coupon.
    #[must_use]
    pub fn totals(&self, stage: PricingStage) -> PriceBreakdown {
        pricing::quote(&self.snapshot, self.coupon.as_ref(), &self.policy, stage)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add units of a product.
    ///
    /// Guest mode merges into the in-memory list and persists; authenticated
    /// mode is one gateway round trip whose response replaces the snapshot.
    /// `unit_price` is the price shown to the buyer; the remote store prices
    /// lines itself.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::MutationInFlight`] if a mutation for this product
    /// has not settled, or [`CartError::Backend`] if the remote call fails
    /// (the snapshot is left unchanged).
    #[instrument(skip(self, unit_price), fields(product = %product))]
    pub async fn add(
        &mut self,
        product: &ProductRef,
        unit_price: Money,
        quantity: u32,
    ) -> Result<(), CartError> {
        if product.is_blank() || quantity == 0 {
            return Ok(());
        }
        self.begin_mutation(product)?;

        let result = match self.snapshot.mode() {
            OwnerMode::Guest => {
                self.snapshot.upsert(product.clone(), unit_price, quantity);
                self.on_items_changed().await;
                Ok(true)
            }
            OwnerMode::Authenticated => {
                let outcome = self.gateway.add_line(product, quantity).await;
                self.apply_remote(outcome, "Could not add the item to your cart")
                    .map(|()| true)
            }
        };

        self.finish_mutation(product);
        self.settle(result)
    }

    /// Set the quantity of a product's line. A quantity of zero removes it.
    ///
    /// # Errors
    ///
    /// Same as [`CartStore::add`].
    #[instrument(skip(self), fields(product = %product))]
    pub async fn update_quantity(
        &mut self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.begin_mutation(product)?;

        let result = match self.snapshot.mode() {
            OwnerMode::Guest => {
                let changed = self.snapshot.set_quantity(product, quantity);
                if changed {
                    self.on_items_changed().await;
                }
                Ok(changed)
            }
            OwnerMode::Authenticated => {
                let outcome = if quantity == 0 {
                    self.gateway.remove_line(product).await
                } else {
                    self.gateway.update_line(product, quantity).await
                };
                self.apply_remote(outcome, "Could not update your cart")
                    .map(|()| true)
            }
        };

        self.finish_mutation(product);
        self.settle(result)
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// Same as [`CartStore::add`].
    pub async fn remove(&mut self, product: &ProductRef) -> Result<(), CartError> {
        self.update_quantity(product, 0).await
    }

    /// Remove everything: items, coupon, and the persisted guest record.
    ///
    /// Called on explicit clear and after a successful order submission.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Backend`] if the remote clear fails; nothing is
    /// changed in that case.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<(), CartError> {
        if self.snapshot.mode() == OwnerMode::Authenticated {
            if let Err(e) = self.gateway.clear_cart().await {
                warn!(error = %e, "remote cart clear failed");
                self.notifier.error("Could not clear your cart");
                return Err(CartError::Backend(e));
            }
        }

        self.snapshot.clear();
        self.coupon = None;
        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "failed to clear the persisted guest cart");
        }
        Ok(())
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Validate a code against the current snapshot and apply it, replacing
    /// any previously applied coupon. At most one coupon is active per cart.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::Rejected`] with the collaborator's reason, or
    /// [`CouponError::Backend`] when it is unreachable. The previously
    /// applied coupon survives a failed validation.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn apply_coupon(&mut self, code: &CouponCode) -> Result<AppliedCoupon, CouponError> {
        let coupon = self.validator.validate(code, &self.snapshot).await?;
        self.coupon = Some(coupon.clone());
        Ok(coupon)
    }

    /// Drop the applied coupon. Idempotent.
    pub fn clear_coupon(&mut self) {
        self.coupon = None;
    }

    // =========================================================================
    // Identity Transitions
    // =========================================================================

    /// Guest → Authenticated reconciliation, called on login/signup success.
    ///
    /// Ordering contract: local persistence is suppressed *before* the remote
    /// fetch starts and stays suppressed for a fixed cool-down after it
    /// settles, so the fetched remote cart never overwrites the saved guest
    /// record and late item churn never writes stale guest state.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Backend`] if the fetch fails; the store stays in
    /// guest mode with its snapshot unchanged.
    #[instrument(skip(self))]
    pub async fn sign_in(&mut self) -> Result<(), CartError> {
        self.reconciling = true;

        match self.gateway.fetch_cart().await {
            Ok(items) => {
                // The remote cart replaces the working items while the
                // snapshot is still guest-owned; the suppression window keeps
                // this replacement out of the guest record.
                self.snapshot.replace(OwnerMode::Guest, items);
                self.on_items_changed().await;
                self.snapshot.set_mode(OwnerMode::Authenticated);
                self.coupon = None;
                self.persist_resume_at = Some(Instant::now() + self.persist_cooldown);
                self.reconciling = false;
                debug!(items = self.snapshot.items().len(), "remote cart is now authoritative");
                Ok(())
            }
            Err(e) => {
                self.reconciling = false;
                warn!(error = %e, "failed to fetch the remote cart on sign-in");
                self.notifier.error("Could not load your saved cart");
                Err(CartError::Backend(e))
            }
        }
    }

    /// Authenticated → Guest transition, called on logout.
    ///
    /// Reloads whatever guest cart previously existed in local storage (or
    /// empty) and clears the applied coupon.
    #[instrument(skip(self))]
    pub async fn sign_out(&mut self) {
        let items = match self.storage.load().await {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to reload the guest cart on sign-out");
                Vec::new()
            }
        };
        self.snapshot.replace(OwnerMode::Guest, items);
        self.coupon = None;
        self.in_flight.clear();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// At-most-once guard. A second mutation for a product whose previous
    /// mutation has not settled fails fast instead of relying on the UI to
    /// disable the trigger.
    fn begin_mutation(&mut self, product: &ProductRef) -> Result<(), CartError> {
        if !self.in_flight.insert(product.clone()) {
            return Err(CartError::MutationInFlight {
                product: product.clone(),
            });
        }
        Ok(())
    }

    fn finish_mutation(&mut self, product: &ProductRef) {
        self.in_flight.remove(product);
    }

    /// Replace the snapshot with the server's authoritative response, or
    /// surface the failure without touching the previous snapshot.
    fn apply_remote(
        &mut self,
        outcome: Result<Vec<LineItem>, BackendError>,
        failure_note: &str,
    ) -> Result<(), CartError> {
        match outcome {
            Ok(items) => {
                self.snapshot.replace(OwnerMode::Authenticated, items);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "remote cart mutation failed");
                self.notifier.error(failure_note);
                Err(CartError::Backend(e))
            }
        }
    }

    /// Post-mutation bookkeeping: a changed cart invalidates the applied
    /// coupon, whose discount was computed for the previous subtotal.
    fn settle(&mut self, result: Result<bool, CartError>) -> Result<(), CartError> {
        match result {
            Ok(changed) => {
                if changed && self.coupon.take().is_some() {
                    debug!("cleared the applied coupon after a cart mutation");
                    self.notifier
                        .info("Coupon removed: the cart changed since it was applied");
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn persist_suppressed(&self) -> bool {
        self.reconciling
            || self
                .persist_resume_at
                .is_some_and(|resume_at| Instant::now() < resume_at)
    }

    /// Local-persistence effect, fired after every item change.
    ///
    /// Writes the guest record unless the snapshot is remote-owned or the
    /// reconciliation window suppresses it. Persistence is best-effort: the
    /// in-memory cart stays usable even if the write fails.
    async fn on_items_changed(&self) {
        if self.snapshot.mode() != OwnerMode::Guest || self.persist_suppressed() {
            return;
        }
        if let Err(e) = self.storage.save(self.snapshot.items()).await {
            warn!(error = %e, "failed to persist the guest cart");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cart::storage::MemoryCartStorage;
    use rust_decimal::Decimal;

    fn policy() -> PricingPolicy {
        PricingPolicy {
            free_delivery_threshold: Money::from_major(500),
            flat_shipping_fee: Money::from_major(50),
            tax_rate: Decimal::new(5, 2),
        }
    }

    async fn guest_store() -> (CartStore, Arc<MemoryCartStorage>, Arc<MemoryBackend>) {
        let storage = Arc::new(MemoryCartStorage::new());
        let backend = Arc::new(MemoryBackend::new());
        let (notifier, _rx) = Notifier::channel();
        let store = CartStore::restore(
            storage.clone(),
            backend.clone(),
            backend.clone(),
            notifier,
            policy(),
            Duration::from_millis(400),
        )
        .await;
        (store, storage, backend)
    }

    #[tokio::test]
    async fn test_guest_add_persists() {
        let (mut store, storage, _backend) = guest_store().await;
        let product = ProductRef::new("prod-1");

        store.add(&product, Money::from_major(100), 2).await.unwrap();

        assert_eq!(store.snapshot().total_quantity(), 2);
        let persisted = storage.persisted().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_guest_add_blank_or_zero_is_noop() {
        let (mut store, storage, _backend) = guest_store().await;

        store
            .add(&ProductRef::new("  "), Money::from_major(10), 1)
            .await
            .unwrap();
        store
            .add(&ProductRef::new("prod-1"), Money::from_major(10), 0)
            .await
            .unwrap();

        assert!(store.snapshot().is_empty());
        assert!(storage.persisted().await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_guard() {
        let (mut store, _storage, _backend) = guest_store().await;
        let product = ProductRef::new("prod-1");

        store.begin_mutation(&product).unwrap();
        let err = store.begin_mutation(&product).unwrap_err();
        assert!(matches!(err, CartError::MutationInFlight { .. }));

        store.finish_mutation(&product);
        store.begin_mutation(&product).unwrap();
    }

    #[tokio::test]
    async fn test_mutation_clears_coupon_and_clear_is_idempotent() {
        let (mut store, _storage, backend) = guest_store().await;
        let product = ProductRef::new("prod-1");
        store.add(&product, Money::from_major(100), 2).await.unwrap();

        backend
            .seed_coupon(
                "SAVE10",
                Money::from_major(10),
                sundrift_core::CouponScope::Cart,
            )
            .await;
        store.apply_coupon(&CouponCode::new("SAVE10")).await.unwrap();
        assert!(store.coupon().is_some());

        store.update_quantity(&product, 3).await.unwrap();
        assert!(store.coupon().is_none());

        store.clear_coupon();
        store.clear_coupon();
        assert!(store.coupon().is_none());
    }

    #[tokio::test]
    async fn test_failed_validation_keeps_previous_coupon() {
        let (mut store, _storage, backend) = guest_store().await;
        store
            .add(&ProductRef::new("prod-1"), Money::from_major(100), 1)
            .await
            .unwrap();
        backend
            .seed_coupon(
                "SAVE10",
                Money::from_major(10),
                sundrift_core::CouponScope::Cart,
            )
            .await;

        store.apply_coupon(&CouponCode::new("SAVE10")).await.unwrap();
        assert!(store.apply_coupon(&CouponCode::new("BOGUS")).await.is_err());
        assert_eq!(
            store.coupon().unwrap().code,
            CouponCode::new("SAVE10")
        );
    }
}
