pub mod grid;

use serde::{Deserialize, Serialize};

/// Mean earth radius of the spherical model, in meters.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }
}

/// Great-circle distance in meters (haversine on the spherical model).
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS * c
}

/// Direct geodesic problem on the sphere: the point reached from `origin` after
/// `distance_m` meters along `bearing_deg` (clockwise from north).
pub fn destination_point(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();
    let bearing = bearing_deg.to_radians();
    let delta = distance_m / EARTH_RADIUS;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint {
        longitude: lon2.to_degrees(),
        latitude: lat2.to_degrees(),
    }
}

/// Bearing in degrees, [0, 360), from one grid position to another.
///
/// Computed in pixel space, not on the sphere. Grid rows grow southwards so the
/// y difference is inverted before `atan2(dx, dy)`.
pub fn azimuth(from: (f64, f64), to: (f64, f64)) -> f64 {
    let dx = to.0 - from.0;
    let dy = from.1 - to.1;

    let deg = dx.atan2(dy).to_degrees();
    let deg = if deg < 0.0 { deg + 360.0 } else { deg };
    // -1e-15 + 360 rounds to 360
    if deg >= 360.0 { 0.0 } else { deg }
}

/// Signed smallest difference `to - from`, in (-180, 180].
pub fn angular_delta(from_deg: f64, to_deg: f64) -> f64 {
    let delta = (to_deg - from_deg).rem_euclid(360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}
