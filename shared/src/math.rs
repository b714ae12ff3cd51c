//! Vector helpers shared by the movement model and the interpolator

use glam::Vec3;

/// Lengths below this are treated as zero when normalizing.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Normalizes `v`, returning it unchanged when its length is close to zero.
///
/// Keeps NaN out of entity state when a command carries a degenerate
/// orientation (e.g. front parallel to up, or a vertical front that gets
/// flattened).
pub fn safe_normalize(v: Vec3) -> Vec3 {
    let length = v.length();
    if length < NORMALIZE_EPSILON || !length.is_finite() {
        v
    } else {
        v / length
    }
}

/// Linear interpolation between `from` and `to`.
///
/// `factor` is clamped to `[0, 1]`.
pub fn lerp(from: Vec3, to: Vec3, factor: f32) -> Vec3 {
    from.lerp(to, factor.clamp(0.0, 1.0))
}

/// True when every component is finite.
pub fn is_finite(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}
