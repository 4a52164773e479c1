//! Cart, cart item, and customization value types. See `spec.md` §3.

use crate::types::{CartItemId, ExtraId, MenuItemId, Money, Size};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-item customization: size, extras, and free-text instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customization {
    pub size: Option<Size>,
    pub extras: BTreeSet<ExtraId>,
    pub special_instructions: Option<String>,
    /// Sum of the selected extras' prices. Kept denormalized on the
    /// customization so `CartItem::item_total` never needs the price table.
    pub price_adjustment: Money,
}

impl Customization {
    #[must_use]
    pub fn none() -> Self {
        Self {
            size: None,
            extras: BTreeSet::new(),
            special_instructions: None,
            price_adjustment: Money::ZERO,
        }
    }
}

impl Default for Customization {
    fn default() -> Self {
        Self::none()
    }
}

/// A single line item in a cart. Each `addItem` call creates a fresh
/// identity — repeats of the same menu item are never merged
/// (`spec.md` §4.1), so a customer can track them independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub base_price: Money,
    pub quantity: u32,
    pub customization: Customization,
}

impl CartItem {
    /// `itemTotal = (basePrice × sizeMultiplier + priceAdjustment) × quantity`.
    /// `sizeMultiplier` is already folded into `base_price` by the time the
    /// item is constructed (`CartEngine::add_item` applies it once), so
    /// here we only add the adjustment and scale by quantity.
    #[must_use]
    pub fn item_total(&self) -> Money {
        (self.base_price + self.customization.price_adjustment).times(self.quantity)
    }
}

/// An in-progress shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartItemId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: CartItemId::generate(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `subtotal = Σ itemTotal`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::item_total).sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}
