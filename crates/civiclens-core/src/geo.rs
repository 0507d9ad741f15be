//! Great-circle distance between WGS84 coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two points given in degrees.
///
/// Non-finite input yields NaN.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// A WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Distance to another point in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// True when `other` lies within `radius_m` meters (inclusive).
    pub fn within(&self, other: &GeoPoint, radius_m: f64) -> bool {
        self.distance_to(other) <= radius_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        for &(lat, lon) in &[(0.0, 0.0), (52.2297, 21.0122), (-33.86, 151.21), (89.9, -179.9)] {
            assert_eq!(distance(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = (28.6139, 77.2090);
        let b = (19.0760, 72.8777);
        let ab = distance(a.0, a.1, b.0, b.1);
        let ba = distance(b.0, b.1, a.0, a.1);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_thousandth_degree_latitude_at_equator() {
        let d = distance(0.0, 0.0, 0.001, 0.0);
        assert!((d - 111.0).abs() <= 1.0, "got {d}");
    }

    #[test]
    fn test_known_city_pair() {
        // Delhi to Mumbai is roughly 1150 km.
        let d = distance(28.6139, 77.2090, 19.0760, 72.8777);
        assert!((d / 1000.0 - 1150.0).abs() < 20.0, "got {d}");
    }

    #[test]
    fn test_non_finite_input_is_nan() {
        assert!(distance(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_within_is_inclusive() {
        let origin = GeoPoint::new(0.0, 0.0);
        let other = GeoPoint::new(0.001, 0.0);
        let d = origin.distance_to(&other);
        assert!(origin.within(&other, d));
        assert!(!origin.within(&other, d - 0.01));
    }
}
