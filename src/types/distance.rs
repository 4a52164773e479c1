//! Distance in kilometers, as returned by the remote backend's mileage
//! calculation. The pricer never computes distance itself (`spec.md` §4.2).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative distance in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f64);

impl Distance {
    /// Construct from kilometers. Negative distances clamp to zero —
    /// the remote backend is trusted but not infallible.
    #[must_use]
    pub fn from_km(km: f64) -> Self {
        Self(km.max(0.0))
    }

    #[must_use]
    pub fn km(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} km", self.0)
    }
}

/// Latitude/longitude pair used for restaurant and customer locations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}
