//! Rotation-angle normalization.

/// Normalize an angle in degrees to the canonical range (-180, 180].
///
/// Idempotent: normalizing an already-normalized angle returns it
/// unchanged, and any multiple of 360 added to the input normalizes to the
/// same value.
#[inline]
pub fn normalize_angle(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(360.0);
    if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}
