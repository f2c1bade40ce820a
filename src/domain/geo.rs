//! Great-circle distance between coordinates
//!
//! Single shared implementation used by both the map's distance filter
//! and its distance labels, so the two can never drift apart.

use crate::domain::types::Coordinate;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers. Pure and deterministic; produces
/// NaN for non-finite input, which callers are expected to have
/// validated upstream via `Coordinate::is_valid`.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points_are_zero() {
        let a = Coordinate::new(51.505, -0.09);
        assert_eq!(distance_km(a, a), 0.0);
        let b = Coordinate::new(-33.86, 151.21);
        assert_eq!(distance_km(b, b), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = Coordinate::new(51.505, -0.09);
        let b = Coordinate::new(48.8566, 2.3522);
        assert_eq!(distance_km(a, b), distance_km(b, a));
    }

    #[test]
    fn test_known_distance_london_paris() {
        // London center to Paris center, roughly 340 km
        let london = Coordinate::new(51.5074, -0.1278);
        let paris = Coordinate::new(48.8566, 2.3522);
        let d = distance_km(london, paris);
        assert!((d - 343.5).abs() < 2.0, "got {d}");
    }

    #[test]
    fn test_small_equatorial_offset() {
        // 0.01 degrees of longitude at the equator is about 1.11 km,
        // just outside the default 1 km radius
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 0.01);
        let d = distance_km(a, b);
        assert!(d > 1.0 && d < 1.2, "got {d}");
    }

    #[test]
    fn test_invalid_input_is_nan() {
        let a = Coordinate::new(f64::NAN, 0.0);
        let b = Coordinate::new(0.0, 0.0);
        assert!(distance_km(a, b).is_nan());
    }
}
