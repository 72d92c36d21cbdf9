//! Geodesy on a spherical earth.
//!
//! Distances are in meters, angles in degrees, bearings clockwise from
//! true north.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.lat.abs() <= 90.0 && self.lon.abs() <= 180.0
    }
}

/// Great-circle distance (Haversine).
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` towards `b`, in [0, 360).
pub fn bearing_deg(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Distance from `p` to the nearest point on segment `a`-`b`.
///
/// Projects onto a local equirectangular plane scaled at the segment's mean
/// latitude. Good for segments of a few kilometers; no geodesic correction.
pub fn distance_to_segment_m(p: &Coordinate, a: &Coordinate, b: &Coordinate) -> f64 {
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();
    let to_xy = |c: &Coordinate| {
        (
            EARTH_RADIUS_M * c.lon.to_radians() * cos_lat,
            EARTH_RADIUS_M * c.lat.to_radians(),
        )
    };
    let (xp, yp) = to_xy(p);
    let (xa, ya) = to_xy(a);
    let (xb, yb) = to_xy(b);

    let l2 = (xb - xa).powi(2) + (yb - ya).powi(2);
    if l2 == 0.0 {
        return distance_m(p, a);
    }

    let t = (((xp - xa) * (xb - xa) + (yp - ya) * (yb - ya)) / l2).clamp(0.0, 1.0);
    let projx = xa + t * (xb - xa);
    let projy = ya + t * (yb - ya);
    ((xp - projx).powi(2) + (yp - projy).powi(2)).sqrt()
}

/// Point reached travelling `distance_m` from `origin` along `bearing`.
pub fn destination(origin: &Coordinate, bearing: f64, distance_m: f64) -> Coordinate {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    Coordinate {
        lat: phi2.to_degrees(),
        lon: (lambda2.to_degrees() + 540.0) % 360.0 - 180.0,
    }
}

/// Wraps any angle into [0, 360).
pub fn normalize_deg(angle: f64) -> f64 {
    let r = angle.rem_euclid(360.0);
    // rem_euclid may round up to the modulus for tiny negative inputs
    if r >= 360.0 { 0.0 } else { r }
}

/// Smallest absolute difference between two headings, in [0, 180].
pub fn angular_difference_deg(a: f64, b: f64) -> f64 {
    let diff = (normalize_deg(a) - normalize_deg(b)).abs();
    if diff > 180.0 { 360.0 - diff } else { diff }
}
