//! Candidate-pose integration between the velocity and position phases.

use crate::core::body::RigidBodyComponents;
use crate::utils::math::angular_velocity_to_quat;

/// Advances the constrained poses by the constrained velocities.
///
/// The results are candidates only: the position solver corrects them before
/// the world commits. Static bodies carry zero velocity and stay put.
pub fn integrate_candidate_poses(bodies: &mut RigidBodyComponents, dt: f32) {
    for i in 0..bodies.nb_enabled() {
        let linear = bodies.constrained_linear_velocities[i];
        let angular = bodies.constrained_angular_velocities[i];

        bodies.constrained_positions[i] += linear * dt;

        let delta = angular_velocity_to_quat(angular, dt);
        bodies.constrained_orientations[i] =
            (delta * bodies.constrained_orientations[i]).normalize();
    }
}
