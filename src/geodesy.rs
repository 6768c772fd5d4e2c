// Geodesy module - horizontal distance calculations
//
// Great-circle distances on a spherical Earth, reported in metres,
// nautical miles or feet. Altitude is ignored throughout.

use std::f64::consts::PI;

use crate::constants::{METRES_PER_NM, MTOF};

/// Degrees to radians conversion factor
const DTOR: f64 = PI / 180.0;

/// Average radius for spherical Earth approximation in meters
const SPHERICAL_R: f64 = 6371e3;

/// Returns great-circle distance in meters between two lat/lon points
///
/// **Assumes spherical Earth and ignores altitude**. Accuracy is ~0.5% for most purposes.
/// Uses the haversine form, which stays well conditioned for the short
/// separations that matter when pairing aircraft.
///
/// # Arguments
/// * `lat0`, `lon0` - First point (latitude, longitude) in degrees
/// * `lat1`, `lon1` - Second point (latitude, longitude) in degrees
///
/// # Returns
/// Distance in meters. Non-finite inputs yield NaN.
///
/// # Example
/// ```
/// use track_pairing::geodesy::greatcircle;
/// let distance = greatcircle(51.5, -0.1, 48.8, 2.3); // London to Paris
/// assert!(distance > 300e3);
/// ```
pub fn greatcircle(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    let lat0_rad = lat0 * DTOR;
    let lat1_rad = lat1 * DTOR;
    let dlat = (lat1 - lat0) * DTOR;
    let dlon = (lon1 - lon0) * DTOR;

    let a = (dlat / 2.0).sin().powi(2)
        + lat0_rad.cos() * lat1_rad.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * SPHERICAL_R * a.sqrt().clamp(0.0, 1.0).asin()
}

/// Great-circle distance in nautical miles
#[inline]
pub fn greatcircle_nm(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    greatcircle(lat0, lon0, lat1, lon1) / METRES_PER_NM
}

/// Great-circle distance in feet
#[inline]
pub fn greatcircle_ft(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    greatcircle(lat0, lon0, lat1, lon1) * MTOF
}
