//! Geographic helpers used by job listing and by every write that stores a
//! coordinate.

use serde::Serialize;

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Round a coordinate to 3 decimal places (~100 m)
pub fn round_coord(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Haversine great-circle distance in kilometers
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// A coordinate pair that is always rounded to storage precision.
///
/// The only way to build one is through [`GeoPoint::new`], so anything that
/// persists a `GeoPoint` persists rounded values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat: round_coord(lat),
            lng: round_coord(lng),
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_coord() {
        assert_eq!(round_coord(37.774929), 37.775);
        assert_eq!(round_coord(-122.419416), -122.419);
        assert_eq!(round_coord(0.0004), 0.0);
    }

    #[test]
    fn test_geo_point_rounds_on_construction() {
        let point = GeoPoint::new(37.774929, -122.419416);
        assert_eq!(point.lat(), 37.775);
        assert_eq!(point.lng(), -122.419);
    }

    #[test]
    fn test_geo_point_serializes_rounded_values() {
        let value = serde_json::to_value(GeoPoint::new(30.267153, -97.743061)).unwrap();
        assert_eq!(value, serde_json::json!({ "lat": 30.267, "lng": -97.743 }));
    }

    #[test]
    fn test_distance_identical_points_is_zero() {
        assert_eq!(distance_km(51.5, -0.12, 51.5, -0.12), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let there = distance_km(37.775, -122.419, 34.052, -118.244);
        let back = distance_km(34.052, -118.244, 37.775, -122.419);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_distance_known_value() {
        // San Francisco to Los Angeles, roughly 559 km
        let d = distance_km(37.7749, -122.4194, 34.0522, -118.2437);
        assert!((d - 559.0).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.195).abs() < 0.01, "got {}", d);
    }
}
