//! DeliveryPricer: zone selection, mileage formula, free-delivery rules.
//! See `spec.md` §4.2.

use crate::errors::{EngineError, EngineResult};
use crate::types::{Distance, LatLng, Money};
use serde::{Deserialize, Serialize};

/// A delivery zone as returned by the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub base_cost: Money,
    pub base_distance_km: f64,
    pub incremental_cost: Money,
    pub distance_increment_km: f64,
    pub minimum_order: Money,
    pub estimated_time_min: u32,
    pub allows_free_delivery: bool,
    pub minimum_for_free_delivery: Money,
}

/// Result of a successful fee computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeResult {
    pub fee: Money,
    pub free_applied: bool,
}

/// Delegates to the remote distance/zone resolution and applies the
/// zone's pricing formula. Never computes distance itself.
pub struct DeliveryPricer;

impl Default for DeliveryPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryPricer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `computeFee(zone, distanceKm, subtotal) -> (fee, freeApplied, reason?)`.
    ///
    /// Evaluation order per `spec.md` §4.2: free-delivery predicate first
    /// (it short-circuits the whole formula to zero), then the
    /// minimum-order predicate, then the stepped mileage formula.
    pub fn compute_fee(
        &self,
        zone: &Zone,
        distance: Distance,
        subtotal: Money,
    ) -> EngineResult<FeeResult> {
        let free_applies = zone.allows_free_delivery
            && !zone.minimum_for_free_delivery.is_zero()
            && subtotal >= zone.minimum_for_free_delivery;

        if free_applies {
            return Ok(FeeResult {
                fee: Money::ZERO,
                free_applied: true,
            });
        }

        if subtotal < zone.minimum_order {
            let remaining = zone.minimum_order.saturating_sub(subtotal);
            return Err(EngineError::MinimumNotMet { remaining });
        }

        let fee = if distance.km() <= zone.base_distance_km {
            zone.base_cost
        } else {
            let extra_km = distance.km() - zone.base_distance_km;
            let steps = (extra_km / zone.distance_increment_km).ceil() as u32;
            zone.base_cost + zone.incremental_cost.times(steps)
        };

        Ok(FeeResult {
            fee,
            free_applied: false,
        })
    }
}

/// Outcome of resolving a delivery address against the remote zone
/// catalog: exactly one zone, or `OutOfZone`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneResolution {
    pub distance: Distance,
}

/// Abstraction over the remote distance/zone calculation, implemented by
/// `crate::remote::client::RemoteClient`.
#[async_trait::async_trait]
pub trait ZoneResolver: Send + Sync {
    async fn calculate_delivery_cost(
        &self,
        restaurant: LatLng,
        destination: LatLng,
    ) -> EngineResult<Option<(Zone, Distance)>>;
}

/// `validateAddress(restaurantLoc, userLoc) -> (zone?, distanceKm)`,
/// interpreting a missing zone as `OutOfZone`.
pub async fn validate_address(
    resolver: &dyn ZoneResolver,
    restaurant: LatLng,
    destination: LatLng,
) -> EngineResult<(Zone, Distance)> {
    resolver
        .calculate_delivery_cost(restaurant, destination)
        .await?
        .ok_or(EngineError::OutOfZone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> Zone {
        Zone {
            id: "z1".into(),
            name: "Central".into(),
            base_cost: Money::parse("5.00").unwrap(),
            base_distance_km: 2.0,
            incremental_cost: Money::parse("2.00").unwrap(),
            distance_increment_km: 1.0,
            minimum_order: Money::parse("10.00").unwrap(),
            estimated_time_min: 30,
            allows_free_delivery: true,
            minimum_for_free_delivery: Money::parse("50.00").unwrap(),
        }
    }

    #[test]
    fn free_delivery_applies_at_threshold() {
        let pricer = DeliveryPricer::new();
        let result = pricer
            .compute_fee(&zone(), Distance::from_km(1.23), Money::parse("60.00").unwrap())
            .unwrap();
        assert!(result.free_applied);
        assert_eq!(result.fee, Money::ZERO);
    }

    #[test]
    fn free_delivery_applies_at_exact_minimum() {
        let pricer = DeliveryPricer::new();
        let result = pricer
            .compute_fee(&zone(), Distance::from_km(1.0), Money::parse("50.00").unwrap())
            .unwrap();
        assert!(result.free_applied);
    }

    #[test]
    fn stepped_pricing_scenario_3() {
        let pricer = DeliveryPricer::new();
        let result = pricer
            .compute_fee(&zone(), Distance::from_km(3.5), Money::parse("20.00").unwrap())
            .unwrap();
        assert_eq!(result.fee.to_string(), "9.00");
        assert!(!result.free_applied);
    }

    #[test]
    fn boundary_at_base_distance() {
        let pricer = DeliveryPricer::new();
        let result = pricer
            .compute_fee(&zone(), Distance::from_km(2.0), Money::parse("20.00").unwrap())
            .unwrap();
        assert_eq!(result.fee.to_string(), "5.00");
    }

    #[test]
    fn boundary_just_past_base_distance() {
        let pricer = DeliveryPricer::new();
        let result = pricer
            .compute_fee(
                &zone(),
                Distance::from_km(2.0001),
                Money::parse("20.00").unwrap(),
            )
            .unwrap();
        assert_eq!(result.fee.to_string(), "7.00");
    }

    #[test]
    fn minimum_not_met_surfaces_remaining_delta() {
        let pricer = DeliveryPricer::new();
        let err = pricer
            .compute_fee(&zone(), Distance::from_km(1.0), Money::parse("4.00").unwrap())
            .unwrap_err();
        match err {
            EngineError::MinimumNotMet { remaining } => {
                assert_eq!(remaining.to_string(), "6.00");
            }
            other => panic!("expected MinimumNotMet, got {other:?}"),
        }
    }
}
