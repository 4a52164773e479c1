//! CartEngine: add/update/remove operations and totals. See `spec.md` §4.1.

use super::model::{Cart, CartItem, Customization};
use crate::errors::{EngineError, EngineResult};
use crate::types::{CartItemId, ExtraId, ExtrasPriceTable, MenuItemId, Money, Size, SizeMultipliers};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A catalog entry as resolved by the injected `MenuCatalog`.
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub price: Money,
    pub available: bool,
    /// Presentations (sizes) this item can be ordered in. Empty means the
    /// item has no size variants and is added to the cart directly.
    pub presentations: Vec<Size>,
}

/// Read-only menu lookup the engine depends on. The remote-backed
/// implementation lives in `crate::remote::menu`.
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    async fn find(&self, id: &MenuItemId) -> EngineResult<Option<MenuItem>>;
}

/// Outcome of a successful `add_item` call, echoing the enriched item
/// back to the caller for message composition.
#[derive(Debug, Clone)]
pub struct AddItemOutcome {
    pub item: CartItem,
    pub message: String,
}

/// Stateless cart operations, parameterized by an injected menu catalog
/// and price tables. Holds no cart state itself.
pub struct CartEngine {
    catalog: Arc<dyn MenuCatalog>,
    size_multipliers: SizeMultipliers,
    extras_prices: ExtrasPriceTable,
}

impl CartEngine {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn MenuCatalog>,
        size_multipliers: SizeMultipliers,
        extras_prices: ExtrasPriceTable,
    ) -> Self {
        Self {
            catalog,
            size_multipliers,
            extras_prices,
        }
    }

    /// Resolves `menu_item_id` against the injected catalog without
    /// touching the cart. Lets callers inspect a catalog entry (e.g. its
    /// `presentations`) before deciding how to call `add_item`.
    pub async fn lookup(&self, menu_item_id: &MenuItemId) -> EngineResult<Option<MenuItem>> {
        self.catalog.find(menu_item_id).await
    }

    /// Resolves `menu_item_id`, applies size/extras pricing, and appends a
    /// freshly-identified item to the cart. Never merges with an existing
    /// identical item.
    pub async fn add_item(
        &self,
        cart: &mut Cart,
        menu_item_id: &MenuItemId,
        qty: u32,
        size: Option<Size>,
        extras: impl IntoIterator<Item = ExtraId>,
        special_instructions: Option<String>,
    ) -> EngineResult<AddItemOutcome> {
        if qty == 0 {
            return Err(EngineError::Validation(
                "quantity must be >= 1 when adding an item".into(),
            ));
        }

        let catalog_item = self
            .catalog
            .find(menu_item_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("menu item {menu_item_id}")))?;

        if !catalog_item.available {
            return Err(EngineError::NotFound(format!(
                "menu item {menu_item_id} is currently unavailable"
            )));
        }

        let multiplier = size.map_or_else(|| Decimal::from(1), |s| self.size_multipliers.get(s));
        let base_price = catalog_item.price.scale(multiplier);

        let mut extra_ids = Vec::new();
        let mut price_adjustment = Money::ZERO;
        for extra in extras {
            let price = self
                .extras_prices
                .price_of(&extra)
                .ok_or_else(|| EngineError::NotFound(format!("extra {extra}")))?;
            price_adjustment = price_adjustment + price;
            extra_ids.push(extra);
        }

        let customization = Customization {
            size,
            extras: extra_ids.into_iter().collect(),
            special_instructions,
            price_adjustment,
        };

        let item = CartItem {
            id: CartItemId::generate(),
            menu_item_id: catalog_item.id.clone(),
            name: catalog_item.name.clone(),
            base_price,
            quantity: qty,
            customization,
        };

        cart.items.push(item.clone());
        cart.touch();

        Ok(AddItemOutcome {
            message: format!("Added {}x {} to your cart.", item.quantity, item.name),
            item,
        })
    }

    /// `qty = 0` removes the item; negative quantities never reach here
    /// because `qty` is unsigned — callers validate raw input upstream.
    pub fn update_quantity(&self, cart: &mut Cart, item_id: CartItemId, qty: u32) -> EngineResult<()> {
        if qty == 0 {
            return self.remove_item(cart, item_id);
        }
        let item = cart
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| EngineError::NotFound(format!("cart item {item_id}")))?;
        item.quantity = qty;
        cart.touch();
        Ok(())
    }

    pub fn remove_item(&self, cart: &mut Cart, item_id: CartItemId) -> EngineResult<()> {
        let before = cart.items.len();
        cart.items.retain(|i| i.id != item_id);
        if cart.items.len() == before {
            return Err(EngineError::NotFound(format!("cart item {item_id}")));
        }
        cart.touch();
        Ok(())
    }

    pub fn clear(&self, cart: &mut Cart) {
        cart.items.clear();
        cart.touch();
    }

    /// Human-readable cart summary, e.g. for the `reviewingCart` stage.
    #[must_use]
    pub fn summary(&self, cart: &Cart) -> String {
        if cart.is_empty() {
            return "Your cart is empty.".to_string();
        }
        let mut lines: Vec<String> = cart
            .items
            .iter()
            .map(|i| format!("{}x {} — {}", i.quantity, i.name, i.item_total()))
            .collect();
        lines.push(format!("Subtotal: {}", cart.subtotal()));
        lines.join("\n")
    }

    /// `{subtotal, tax}` where `tax = round(subtotal × taxRate)`.
    #[must_use]
    pub fn totals(&self, cart: &Cart, tax_rate: Decimal) -> CartTotals {
        let subtotal = cart.subtotal();
        let tax = subtotal.scale(tax_rate);
        CartTotals { subtotal, tax }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Money,
    pub tax: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Catalog {}
        #[async_trait]
        impl MenuCatalog for Catalog {
            async fn find(&self, id: &MenuItemId) -> EngineResult<Option<MenuItem>>;
        }
    }

    fn engine_with(mock: MockCatalog) -> CartEngine {
        let mut extras = rustc_hash::FxHashMap::default();
        extras.insert(ExtraId::new("cheese"), Money::parse("0.75").unwrap());
        CartEngine::new(
            Arc::new(mock),
            SizeMultipliers::default(),
            ExtrasPriceTable::new(extras),
        )
    }

    #[tokio::test]
    async fn lookup_surfaces_presentations_without_mutating_cart() {
        let mut mock = MockCatalog::new();
        mock.expect_find().returning(|id| {
            Ok(Some(MenuItem {
                id: id.clone(),
                name: "Burger".into(),
                price: Money::parse("10.00").unwrap(),
                available: true,
                presentations: vec![Size::Small, Size::Large],
            }))
        });
        let engine = engine_with(mock);
        let item = engine.lookup(&MenuItemId::new("burger")).await.unwrap().unwrap();
        assert_eq!(item.presentations, vec![Size::Small, Size::Large]);
    }

    #[tokio::test]
    async fn add_item_not_found() {
        let mut mock = MockCatalog::new();
        mock.expect_find().returning(|_| Ok(None));
        let engine = engine_with(mock);
        let mut cart = Cart::new();
        let err = engine
            .add_item(&mut cart, &MenuItemId::new("missing"), 1, None, vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_item_unavailable() {
        let mut mock = MockCatalog::new();
        mock.expect_find().returning(|id| {
            Ok(Some(MenuItem {
                id: id.clone(),
                name: "Soda".into(),
                price: Money::parse("2.00").unwrap(),
                available: false,
                presentations: vec![],
            }))
        });
        let engine = engine_with(mock);
        let mut cart = Cart::new();
        let err = engine
            .add_item(&mut cart, &MenuItemId::new("soda"), 1, None, vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_item_applies_size_and_extras() {
        let mut mock = MockCatalog::new();
        mock.expect_find().returning(|id| {
            Ok(Some(MenuItem {
                id: id.clone(),
                name: "Burger".into(),
                price: Money::parse("10.00").unwrap(),
                available: true,
                presentations: vec![Size::Large],
            }))
        });
        let engine = engine_with(mock);
        let mut cart = Cart::new();
        let outcome = engine
            .add_item(
                &mut cart,
                &MenuItemId::new("burger"),
                2,
                Some(Size::Large),
                vec![ExtraId::new("cheese")],
                None,
            )
            .await
            .unwrap();
        // base 10.00 * 1.3 = 13.00, + 0.75 adjustment = 13.75, * qty 2 = 27.50
        assert_eq!(outcome.item.item_total().to_string(), "27.50");
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn add_item_rejects_zero_quantity() {
        let mock = MockCatalog::new();
        let engine = engine_with(mock);
        let mut cart = Cart::new();
        let err = engine
            .add_item(&mut cart, &MenuItemId::new("x"), 0, None, vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn update_quantity_zero_removes_item() {
        let mut mock = MockCatalog::new();
        mock.expect_find().returning(|id| {
            Ok(Some(MenuItem {
                id: id.clone(),
                name: "Tea".into(),
                price: Money::parse("1.00").unwrap(),
                available: true,
                presentations: vec![],
            }))
        });
        let engine = engine_with(mock);
        let mut cart = Cart::new();
        let outcome = engine
            .add_item(&mut cart, &MenuItemId::new("tea"), 1, None, vec![], None)
            .await
            .unwrap();
        engine.update_quantity(&mut cart, outcome.item.id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn repeated_add_item_does_not_merge() {
        let mut mock = MockCatalog::new();
        mock.expect_find().returning(|id| {
            Ok(Some(MenuItem {
                id: id.clone(),
                name: "Tea".into(),
                price: Money::parse("1.00").unwrap(),
                available: true,
                presentations: vec![],
            }))
        });
        let engine = engine_with(mock);
        let mut cart = Cart::new();
        engine
            .add_item(&mut cart, &MenuItemId::new("tea"), 1, None, vec![], None)
            .await
            .unwrap();
        engine
            .add_item(&mut cart, &MenuItemId::new("tea"), 1, None, vec![], None)
            .await
            .unwrap();
        assert_eq!(cart.items.len(), 2);
    }
}
