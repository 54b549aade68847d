//! Geographic math shared between client and server.
//!
//! The client shows "you are 312 m away" with the same function the server
//! uses to deny the claim, so the numbers always agree.

use serde::{Deserialize, Serialize};

use crate::constants::EARTH_RADIUS_M;

/// A GPS fix in decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90..=90
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude, -180..=180
    #[serde(alias = "lng")]
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a new coordinate pair
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and inside their ranges.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to another point in meters
    #[must_use]
    pub fn distance_m(self, other: Self) -> f64 {
        haversine_m(self, other)
    }
}

/// Great-circle distance between two points in meters.
///
/// Uses the haversine formula on a sphere of radius [`EARTH_RADIUS_M`].
#[must_use]
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinates::new(35.8324, -115.4320);
        assert!(haversine_m(p, p).abs() < f64::EPSILON);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // One degree along a meridian is R * pi / 180.
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((haversine_m(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric() {
        let goodsprings = Coordinates::new(35.8324, -115.4320);
        let strip = Coordinates::new(36.170, -115.140);
        let there = haversine_m(goodsprings, strip);
        let back = haversine_m(strip, goodsprings);
        assert!((there - back).abs() < 1e-9);
        // Roughly 45 km between the two.
        assert!(there > 40_000.0 && there < 50_000.0, "got {there}");
    }

    #[test]
    fn test_antipodal_does_not_nan() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(0.0, 180.0);
        let d = haversine_m(a, b);
        assert!(d.is_finite());
        assert!((d - EARTH_RADIUS_M * std::f64::consts::PI).abs() < 1.0);
    }

    #[test]
    fn test_validity() {
        assert!(Coordinates::new(36.1, -115.1).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::NAN).is_valid());
    }
}
