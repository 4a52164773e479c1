//! Typed primitives shared across the engine: identifiers, money, and
//! distance. See `spec.md` §3.

mod distance;
mod ids;
mod money;

pub use distance::{Distance, LatLng};
pub use ids::{
    BranchId, CartItemId, ExtraId, IdempotencyKey, MenuItemId, OrderId, SessionId, TenantId,
    UserRef,
};
pub use money::Money;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cup/portion size. `Customization::size = None` is represented as the
/// absence of this field, not a sentinel variant, so that "no size"
/// carries no multiplier at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl Size {
    #[must_use]
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Xlarge => "xlarge",
        }
    }

    #[must_use]
    pub fn parse_wire(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "xlarge" => Some(Self::Xlarge),
            _ => None,
        }
    }
}

/// Tenant-configurable size -> multiplier table, injected as a read-only
/// map. `CartEngine` never mutates it (`spec.md` §4.1).
#[derive(Debug, Clone)]
pub struct SizeMultipliers(FxHashMap<Size, Decimal>);

impl SizeMultipliers {
    #[must_use]
    pub fn get(&self, size: Size) -> Decimal {
        self.0
            .get(&size)
            .copied()
            .unwrap_or_else(|| Decimal::from_str("1.0").expect("static decimal"))
    }
}

impl Default for SizeMultipliers {
    /// Defaults from `spec.md` §3: small 0.8, medium 1.0, large 1.3, xlarge 1.5.
    fn default() -> Self {
        let mut map = FxHashMap::default();
        map.insert(Size::Small, Decimal::from_str("0.8").unwrap());
        map.insert(Size::Medium, Decimal::from_str("1.0").unwrap());
        map.insert(Size::Large, Decimal::from_str("1.3").unwrap());
        map.insert(Size::Xlarge, Decimal::from_str("1.5").unwrap());
        Self(map)
    }
}

/// Tenant-configurable extras price table, injected as a read-only map.
#[derive(Debug, Clone, Default)]
pub struct ExtrasPriceTable(FxHashMap<ExtraId, Money>);

impl ExtrasPriceTable {
    #[must_use]
    pub fn new(prices: FxHashMap<ExtraId, Money>) -> Self {
        Self(prices)
    }

    #[must_use]
    pub fn price_of(&self, id: &ExtraId) -> Option<Money> {
        self.0.get(id).copied()
    }
}
