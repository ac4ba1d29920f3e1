//! Cart line items and snapshots.

use serde::{Deserialize, Serialize};

use crate::types::id::{LineId, ProductRef};
use crate::types::money::Money;

/// Which identity owns a cart snapshot.
///
/// Guest carts live in local persistent storage; authenticated carts mirror
/// the remote store. The mode decides which storage is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerMode {
    /// Unauthenticated session; cart lives in local persistent storage only.
    Guest,
    /// Logged-in session; the remote store is the single source of truth.
    Authenticated,
}

/// One product-reference/quantity pair in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable identifier for this line (server-assigned or locally generated).
    pub line_id: LineId,
    /// The product this line refers to.
    pub product: ProductRef,
    /// Unit price at the time the line was added.
    pub unit_price: Money,
    /// Number of units. Always > 0; a zero quantity means removal.
    pub quantity: u32,
}

impl LineItem {
    /// Create a line item with a freshly generated local line ID.
    #[must_use]
    pub fn new(product: ProductRef, unit_price: Money, quantity: u32) -> Self {
        Self {
            line_id: LineId::generate(),
            product,
            unit_price,
            quantity,
        }
    }

    /// Price of this line: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Whether this line survives the read/write boundary filter.
    fn is_well_formed(&self) -> bool {
        self.quantity > 0 && !self.product.is_blank()
    }
}

/// An ordered sequence of line items plus the identity mode that owns it.
///
/// Created empty on first load, mutated through the cart store, persisted
/// locally (guest) or remotely (authenticated), and cleared on successful
/// order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    mode: OwnerMode,
    items: Vec<LineItem>,
}

impl CartSnapshot {
    /// Create an empty snapshot in the given mode.
    #[must_use]
    pub const fn empty(mode: OwnerMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
        }
    }

    /// Build a snapshot from a raw item list, dropping malformed lines.
    ///
    /// Persisted guest carts and backend responses can contain lines with
    /// blank product references or zero quantities; those never enter a
    /// snapshot.
    #[must_use]
    pub fn from_items(mode: OwnerMode, items: Vec<LineItem>) -> Self {
        Self {
            mode,
            items: sanitize(items),
        }
    }

    /// The owner mode of this snapshot.
    #[must_use]
    pub const fn mode(&self) -> OwnerMode {
        self.mode
    }

    /// The line items, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of unit price times quantity over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Find the line for a product, if present.
    #[must_use]
    pub fn find(&self, product: &ProductRef) -> Option<&LineItem> {
        self.items.iter().find(|line| &line.product == product)
    }

    /// Add units of a product, merging into an existing line if present.
    pub fn upsert(&mut self, product: ProductRef, unit_price: Money, quantity: u32) {
        if quantity == 0 || product.is_blank() {
            return;
        }
        match self.items.iter_mut().find(|line| line.product == product) {
            Some(line) => line.quantity += quantity,
            None => self.items.push(LineItem::new(product, unit_price, quantity)),
        }
    }

    /// Set the quantity of a product's line. Zero removes the line.
    ///
    /// Returns `true` if the cart changed.
    pub fn set_quantity(&mut self, product: &ProductRef, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product);
        }
        match self.items.iter_mut().find(|line| &line.product == product) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a product's line. Returns `true` if a line was removed.
    pub fn remove(&mut self, product: &ProductRef) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.product != product);
        self.items.len() != before
    }

    /// Replace all items, dropping malformed lines and switching mode.
    pub fn replace(&mut self, mode: OwnerMode, items: Vec<LineItem>) {
        self.mode = mode;
        self.items = sanitize(items);
    }

    /// Switch the owner mode without touching the items.
    pub fn set_mode(&mut self, mode: OwnerMode) {
        self.mode = mode;
    }

    /// Remove all items, keeping the mode.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Drop lines with blank product references or zero quantities.
fn sanitize(items: Vec<LineItem>) -> Vec<LineItem> {
    items
        .into_iter()
        .filter(LineItem::is_well_formed)
        .collect()
}
