//! Axis alignment between the device's sensor frame and the host's world frame.

use nalgebra::{UnitQuaternion, Vector3};
use std::f64::consts::FRAC_PI_2;

/// Aligns a device-reported rotation to the host's world frame.
///
/// Equivalent to `fromRotationVector(-pi/2, 0, 0)`: a quaternion built from
/// the exponential map of a rotation vector, rather than Euler angles.
pub fn axes_offset() -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(Vector3::new(-FRAC_PI_2, 0.0, 0.0))
}

/// Applies `AXES_OFFSET` on the left, as specified for legacy rotation and
/// `RotationData` packets.
pub fn apply_axes_offset(rotation: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    axes_offset() * rotation
}

/// Remaps an acceleration payload's axes as `(y, x, z)`.
pub fn remap_acceleration(raw: Vector3<f64>) -> Vector3<f64> {
    Vector3::new(raw.y, raw.x, raw.z)
}
