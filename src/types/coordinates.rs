use serde::{Deserialize, Serialize};

use crate::constants::COORDINATE_ROUNDING_ERROR_THRESHOLD;

/// Coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether two coordinates denote the same stop, up to rounding noise
    /// introduced by client-side coordinate truncation.
    pub fn is_same_place(&self, other: &Coordinates) -> bool {
        (self.lat - other.lat).abs() <= COORDINATE_ROUNDING_ERROR_THRESHOLD
            && (self.lng - other.lng).abs() <= COORDINATE_ROUNDING_ERROR_THRESHOLD
    }
}

/// Haversine distance between two coordinates in kilometers.
pub fn haversine_distance(a: &Coordinates, b: &Coordinates) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
