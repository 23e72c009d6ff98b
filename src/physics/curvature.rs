use crate::geo::EARTH_RADIUS;

/// Vertical drop of the sphere below the tangent plane at `distance_m`.
///
/// `None` past one earth radius, where the square root is undefined.
pub fn curvature_adjustment(distance_m: f64) -> Option<f64> {
    if !(0.0..=EARTH_RADIUS).contains(&distance_m) {
        return None;
    }
    Some(EARTH_RADIUS - (EARTH_RADIUS * EARTH_RADIUS - distance_m * distance_m).sqrt())
}

/// Angle (radians) from the observer's eye to a terrain sample, corrected for
/// curvature. `None` at zero distance (the observer's own cell).
pub fn elevation_angle(observer_height: f64, cell_height: f64, distance_m: f64) -> Option<f64> {
    if distance_m <= 0.0 {
        return None;
    }
    let drop = curvature_adjustment(distance_m)?;
    Some(((cell_height - drop - observer_height) / distance_m).atan())
}

/// Lowest terrain elevation at `distance_m` that would still clear a horizon of
/// `max_angle` radians.
pub fn required_visible_height(observer_height: f64, distance_m: f64, max_angle: f64) -> Option<f64> {
    let drop = curvature_adjustment(distance_m)?;
    Some(observer_height + distance_m * max_angle.tan() + drop)
}

/// Distance to the geometric horizon for an eye `height_m` above a smooth sphere.
pub fn horizon_distance(height_m: f64) -> f64 {
    (2.0 * EARTH_RADIUS * height_m.max(0.0) + height_m.max(0.0).powi(2)).sqrt()
}
