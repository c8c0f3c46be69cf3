//! Great-circle distance between GPS fixes.

use crate::models::GpsFix;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Central angles below this are indistinguishable from GPS jitter.
const SMALL_EPSILON: f64 = 1e-8;

/// Haversine distance in meters between two fixes.
///
/// A NaN or sub-epsilon central angle clamps to zero so that accumulated
/// distance stays monotone under degenerate fixes.
#[must_use]
pub fn haversine_meters(from: &GpsFix, to: &GpsFix) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let angle = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    if !angle.is_finite() || angle < SMALL_EPSILON {
        return 0.0;
    }
    angle * EARTH_RADIUS_M
}
