//! Additional math helpers layered on top of `glam`.

use glam::{Mat3, Quat, Vec3};

/// Builds the skew-symmetric matrix `S(v)` such that `S(v) * u == v.cross(u)`.
pub fn skew_symmetric(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Inverts a 3x3 matrix from its adjugate and an already-computed determinant.
///
/// The caller is responsible for checking the determinant against zero.
pub fn inverse_from_determinant(m: Mat3, determinant: f32) -> Mat3 {
    let a = m.x_axis;
    let b = m.y_axis;
    let c = m.z_axis;
    Mat3::from_cols(b.cross(c), c.cross(a), a.cross(b)).transpose() * (1.0 / determinant)
}

/// Inverts a 3x3 matrix, or returns `None` when the determinant is below
/// `epsilon` in magnitude.
pub fn invert_checked(m: Mat3, epsilon: f32) -> Option<Mat3> {
    let determinant = m.determinant();
    if determinant.abs() <= epsilon {
        None
    } else {
        Some(inverse_from_determinant(m, determinant))
    }
}

/// Rotates a body-local inverse inertia tensor into world space: `R * I * R^T`.
pub fn world_inertia_inverse(orientation: Quat, local_inverse: Mat3) -> Mat3 {
    let rotation = Mat3::from_quat(orientation);
    rotation * local_inverse * rotation.transpose()
}

/// Converts angular velocity (radians/sec) into a rotation delta over `dt`.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// First-order orientation step `normalize(q + 0.5 * (0, w) * q)`.
///
/// A tangent-space step with immediate renormalization. Only valid for the
/// small pseudo-velocities produced by a single position-projection pass.
pub fn integrate_orientation_tangent(q: Quat, w: Vec3) -> Quat {
    let pure = Quat::from_xyzw(w.x, w.y, w.z, 0.0);
    (q + pure * q * 0.5).normalize()
}
