//! Cart & pricing engine: items, customization, totals. See `spec.md` §4.1.

mod engine;
mod model;

pub use engine::{AddItemOutcome, CartEngine, CartTotals, MenuCatalog, MenuItem};
pub use model::{Cart, CartItem, Customization};
