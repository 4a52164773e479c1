//! DeliveryPricer: zone-based fee computation. See `spec.md` §4.2.

mod delivery;

pub use delivery::{validate_address, DeliveryPricer, FeeResult, Zone, ZoneResolution, ZoneResolver};
