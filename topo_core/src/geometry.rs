//! # Plane Geometry
//!
//! Free functions over [`Point`]s. Azimuths are grid bearings measured
//! clockwise from north, in radians, normalised to `[0, 2π)`.
//!
//! ```text
//!            N (0)
//!            |
//!   W (3π/2) +---- E (π/2)
//!            |
//!            S (π)
//! ```

use std::f64::consts::{PI, TAU};

use crate::points::Point;
use crate::units::Radians;

/// Coordinate difference `to - from` as (ΔE, ΔN)
pub fn delta(from: &Point, to: &Point) -> (f64, f64) {
    (to.easting - from.easting, to.northing - from.northing)
}

/// Horizontal distance between two points
pub fn distance(from: &Point, to: &Point) -> f64 {
    let (de, dn) = delta(from, to);
    de.hypot(dn)
}

/// Grid azimuth of the line `from -> to`.
///
/// Coincident points have no direction; they return 0.
pub fn azimuth(from: &Point, to: &Point) -> Radians {
    let (de, dn) = delta(from, to);
    if de == 0.0 && dn == 0.0 {
        return Radians(0.0);
    }
    normalize(Radians(de.atan2(dn)))
}

/// Wrap an angle into `[0, 2π)`
pub fn normalize(angle: Radians) -> Radians {
    let wrapped = angle.0.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        Radians(0.0)
    } else {
        Radians(wrapped)
    }
}

/// Wrap an angle difference into `(-π, π]`
pub fn wrap_signed(angle: Radians) -> Radians {
    let wrapped = normalize(angle).0;
    if wrapped > PI {
        Radians(wrapped - TAU)
    } else {
        Radians(wrapped)
    }
}

/// Offset `(departure, latitude)` of a line with the given azimuth and length
pub fn components(azimuth: Radians, distance: f64) -> (f64, f64) {
    (distance * azimuth.0.sin(), distance * azimuth.0.cos())
}

/// Polar (radiation) computation: the point at `distance` along `azimuth`
/// from `origin`.
pub fn polar(id: impl Into<String>, origin: &Point, azimuth: Radians, distance: f64) -> Point {
    let (de, dn) = components(azimuth, distance);
    Point::new(id, origin.easting + de, origin.northing + dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPSILON: f64 = 1e-12;

    fn origin() -> Point {
        Point::new("O", 0.0, 0.0)
    }

    #[test]
    fn test_cardinal_azimuths() {
        let o = origin();
        assert!((azimuth(&o, &Point::new("N", 0.0, 10.0)).0 - 0.0).abs() < EPSILON);
        assert!((azimuth(&o, &Point::new("E", 10.0, 0.0)).0 - FRAC_PI_2).abs() < EPSILON);
        assert!((azimuth(&o, &Point::new("S", 0.0, -10.0)).0 - PI).abs() < EPSILON);
        assert!((azimuth(&o, &Point::new("W", -10.0, 0.0)).0 - 3.0 * FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_coincident_points() {
        assert_eq!(azimuth(&origin(), &origin()).0, 0.0);
        assert_eq!(distance(&origin(), &origin()), 0.0);
    }

    #[test]
    fn test_distance() {
        let p = Point::new("P", 3.0, 4.0);
        assert!((distance(&origin(), &p) - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_normalize_and_wrap() {
        assert!((normalize(Radians(-FRAC_PI_2)).0 - 3.0 * FRAC_PI_2).abs() < EPSILON);
        assert!((normalize(Radians(5.0 * PI)).0 - PI).abs() < 1e-9);
        assert!((wrap_signed(Radians(3.0 * FRAC_PI_2)).0 + FRAC_PI_2).abs() < EPSILON);
        assert!((wrap_signed(Radians(PI)).0 - PI).abs() < EPSILON);
    }

    #[test]
    fn test_polar_roundtrip() {
        let o = Point::new("O", 100.0, 200.0);
        let az = Radians(1.234);
        let p = polar("P", &o, az, 57.5);
        assert!((distance(&o, &p) - 57.5).abs() < 1e-9);
        assert!((azimuth(&o, &p).0 - 1.234).abs() < 1e-12);
    }
}
