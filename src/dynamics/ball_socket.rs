//! Solver kernels for ball-and-socket joints.
//!
//! A ball-and-socket joint forces the two anchor points to coincide, which
//! removes the three relative translation degrees of freedom at the anchor.
//! The kernels run over the enabled rows of the joint family in array order:
//! pre-solve derives the per-step effective mass, warm-start replays the
//! impulse carried from the previous step, the velocity kernel is one
//! Gauss-Seidel sweep, and the position kernel projects the constraint error
//! out of the candidate poses.

use glam::{Mat3, Vec3};

use crate::config::MACHINE_EPSILON;
use crate::core::body::RigidBodyComponents;
use crate::core::joint::{BallSocketJointComponents, JointComponents};
use crate::core::transform::TransformComponents;
use crate::core::types::PositionCorrection;
use crate::utils::math::{
    integrate_orientation_tangent, inverse_from_determinant, invert_checked, skew_symmetric,
    world_inertia_inverse,
};

/// Maps a ball-socket row to its base joint row and the two body rows.
///
/// A miss means the caller broke a precondition (an enabled joint pointing at
/// a removed body); the row is skipped in release builds.
fn resolve_rows(
    bodies: &RigidBodyComponents,
    joints: &JointComponents,
    ball_sockets: &BallSocketJointComponents,
    i: usize,
) -> Option<(usize, usize, usize)> {
    let joint_row = joints.row_of(ball_sockets.joint_entities[i]);
    debug_assert!(joint_row.is_some(), "ball-socket row without a base joint row");
    let joint_row = joint_row?;

    let body1 = bodies.row_of(joints.body1_entities[joint_row]);
    let body2 = bodies.row_of(joints.body2_entities[joint_row]);
    debug_assert!(
        body1.is_some() && body2.is_some(),
        "enabled joint references a removed body"
    );
    let (body1, body2) = (body1?, body2?);

    debug_assert!(
        body1 < bodies.nb_enabled() && body2 < bodies.nb_enabled(),
        "enabled joint references a disabled body"
    );
    Some((joint_row, body1, body2))
}

/// Effective mass of the three translation constraints:
/// `K = diag(m1^-1 + m2^-1) + U1*I1*U1^T + U2*I2*U2^T`.
fn effective_mass(
    inverse_mass_sum: f32,
    r1_world: Vec3,
    r2_world: Vec3,
    i1: Mat3,
    i2: Mat3,
) -> Mat3 {
    let u1 = skew_symmetric(r1_world);
    let u2 = skew_symmetric(r2_world);
    Mat3::from_diagonal(Vec3::splat(inverse_mass_sum))
        + u1 * i1 * u1.transpose()
        + u2 * i2 * u2.transpose()
}

/// Recomputes every per-step derived joint field so the velocity iterations
/// can run as pure arithmetic.
///
/// Called once per step, before any velocity iteration. When warm starting
/// is off the accumulated impulses are reset here.
pub fn init_before_solve(
    bodies: &RigidBodyComponents,
    transforms: &TransformComponents,
    joints: &JointComponents,
    ball_sockets: &mut BallSocketJointComponents,
    dt: f32,
    beta: f32,
    warm_start: bool,
) {
    debug_assert!(dt > 0.0, "zero or negative dt would produce an unbounded bias");
    let bias_factor = beta / dt;

    for i in 0..ball_sockets.nb_enabled() {
        let Some((joint_row, body1, body2)) = resolve_rows(bodies, joints, ball_sockets, i) else {
            continue;
        };

        ball_sockets.i1[i] = bodies.inverse_inertia_world[body1];
        ball_sockets.i2[i] = bodies.inverse_inertia_world[body2];

        let q1 = transforms
            .get(joints.body1_entities[joint_row])
            .map(|t| t.rotation);
        let q2 = transforms
            .get(joints.body2_entities[joint_row])
            .map(|t| t.rotation);
        debug_assert!(q1.is_some() && q2.is_some(), "body without a transform row");
        let (Some(q1), Some(q2)) = (q1, q2) else {
            continue;
        };

        ball_sockets.r1_world[i] = q1 * ball_sockets.local_anchors_body1[i];
        ball_sockets.r2_world[i] = q2 * ball_sockets.local_anchors_body2[i];
        let r1_world = ball_sockets.r1_world[i];
        let r2_world = ball_sockets.r2_world[i];

        let inverse_mass_sum = bodies.inverse_masses[body1] + bodies.inverse_masses[body2];
        let k = effective_mass(
            inverse_mass_sum,
            r1_world,
            r2_world,
            ball_sockets.i1[i],
            ball_sockets.i2[i],
        );

        // A singular K or a joint between two non-dynamic bodies leaves the
        // inverse at zero; the row is then inert for this step.
        ball_sockets.inverse_mass_matrices[i] = Mat3::ZERO;
        if bodies.body_types[body1].is_dynamic() || bodies.body_types[body2].is_dynamic() {
            if let Some(inverse) = invert_checked(k, MACHINE_EPSILON) {
                ball_sockets.inverse_mass_matrices[i] = inverse;
            }
        }

        ball_sockets.bias_vectors[i] = Vec3::ZERO;
        if joints.position_corrections[joint_row] == PositionCorrection::Baumgarte {
            let x1 = bodies.centers_of_mass[body1];
            let x2 = bodies.centers_of_mass[body2];
            ball_sockets.bias_vectors[i] = bias_factor * (x2 + r2_world - x1 - r1_world);
        }

        if !warm_start {
            ball_sockets.impulses[i] = Vec3::ZERO;
        }
    }
}

/// Applies the impulses accumulated during the previous step as the initial
/// guess, preserving temporal coherence across steps.
pub fn warm_start(
    bodies: &mut RigidBodyComponents,
    joints: &JointComponents,
    ball_sockets: &BallSocketJointComponents,
) {
    for i in 0..ball_sockets.nb_enabled() {
        let Some((_, body1, body2)) = resolve_rows(bodies, joints, ball_sockets, i) else {
            continue;
        };
        apply_anchor_impulse(bodies, ball_sockets, i, body1, body2, ball_sockets.impulses[i]);
    }
}

/// Relative velocity of the two anchor points: `J*v`.
pub fn anchor_velocity_residual(
    bodies: &RigidBodyComponents,
    ball_sockets: &BallSocketJointComponents,
    i: usize,
    body1: usize,
    body2: usize,
) -> Vec3 {
    let v1 = bodies.constrained_linear_velocities[body1];
    let v2 = bodies.constrained_linear_velocities[body2];
    let w1 = bodies.constrained_angular_velocities[body1];
    let w2 = bodies.constrained_angular_velocities[body2];
    v2 + w2.cross(ball_sockets.r2_world[i]) - v1 - w1.cross(ball_sockets.r1_world[i])
}

/// Impulse increment that drives the anchor velocity toward the bias target.
///
/// With a zero `inverse_mass_matrices[i]` this returns zero and the row is a
/// no-op, which is exactly how singular and static-static joints stay inert.
pub(crate) fn velocity_delta(
    bodies: &RigidBodyComponents,
    ball_sockets: &BallSocketJointComponents,
    i: usize,
    body1: usize,
    body2: usize,
) -> Vec3 {
    let jv = anchor_velocity_residual(bodies, ball_sockets, i, body1, body2);
    ball_sockets.inverse_mass_matrices[i] * (-jv - ball_sockets.bias_vectors[i])
}

/// Applies `impulse` at the anchor: `-impulse` to body 1 and `+impulse` to
/// body 2, each masked by the body's lock factors.
fn apply_anchor_impulse(
    bodies: &mut RigidBodyComponents,
    ball_sockets: &BallSocketJointComponents,
    i: usize,
    body1: usize,
    body2: usize,
    impulse: Vec3,
) {
    let r1_world = ball_sockets.r1_world[i];
    let r2_world = ball_sockets.r2_world[i];

    let angular_impulse_body1 = impulse.cross(r1_world);
    bodies.constrained_linear_velocities[body1] +=
        bodies.inverse_masses[body1] * bodies.linear_lock_factors[body1] * (-impulse);
    bodies.constrained_angular_velocities[body1] +=
        bodies.angular_lock_factors[body1] * (ball_sockets.i1[i] * angular_impulse_body1);

    let angular_impulse_body2 = -impulse.cross(r2_world);
    bodies.constrained_linear_velocities[body2] +=
        bodies.inverse_masses[body2] * bodies.linear_lock_factors[body2] * impulse;
    bodies.constrained_angular_velocities[body2] +=
        bodies.angular_lock_factors[body2] * (ball_sockets.i2[i] * angular_impulse_body2);
}

pub(crate) fn accumulate_and_apply(
    bodies: &mut RigidBodyComponents,
    ball_sockets: &mut BallSocketJointComponents,
    i: usize,
    body1: usize,
    body2: usize,
    delta: Vec3,
) {
    // Equality constraint: the accumulated multiplier is unbounded, so no
    // clamping happens before application.
    ball_sockets.impulses[i] += delta;
    apply_anchor_impulse(bodies, ball_sockets, i, body1, body2, delta);
}

/// One Sequential Impulse sweep over the enabled joints, in array order.
pub fn solve_velocity_constraint(
    bodies: &mut RigidBodyComponents,
    joints: &JointComponents,
    ball_sockets: &mut BallSocketJointComponents,
) {
    for i in 0..ball_sockets.nb_enabled() {
        let Some((_, body1, body2)) = resolve_rows(bodies, joints, ball_sockets, i) else {
            continue;
        };
        let delta = velocity_delta(bodies, ball_sockets, i, body1, body2);
        accumulate_and_apply(bodies, ball_sockets, i, body1, body2, delta);
    }
}

/// Position error of the two anchor points, from the constrained poses.
pub fn anchor_position_error(
    bodies: &RigidBodyComponents,
    joints: &JointComponents,
    ball_sockets: &BallSocketJointComponents,
    i: usize,
) -> Vec3 {
    let Some((_, body1, body2)) = resolve_rows(bodies, joints, ball_sockets, i) else {
        return Vec3::ZERO;
    };
    let q1 = bodies.constrained_orientations[body1];
    let q2 = bodies.constrained_orientations[body2];
    let x1 = bodies.constrained_positions[body1];
    let x2 = bodies.constrained_positions[body2];
    x2 + q2 * ball_sockets.local_anchors_body2[i] - x1 - q1 * ball_sockets.local_anchors_body1[i]
}

/// One non-linear Gauss-Seidel sweep over the joints whose correction
/// technique is position projection.
///
/// Works entirely on the constrained poses: geometry and effective mass are
/// recomputed from the current candidate orientations, the pseudo-impulse
/// moves positions directly, and orientations are renormalized after every
/// update. Velocities are never touched.
pub fn solve_position_constraint(
    bodies: &mut RigidBodyComponents,
    joints: &JointComponents,
    ball_sockets: &mut BallSocketJointComponents,
) {
    for i in 0..ball_sockets.nb_enabled() {
        let Some((joint_row, body1, body2)) = resolve_rows(bodies, joints, ball_sockets, i) else {
            continue;
        };

        if joints.position_corrections[joint_row] != PositionCorrection::NonLinearGaussSeidel {
            continue;
        }

        let q1 = bodies.constrained_orientations[body1];
        let q2 = bodies.constrained_orientations[body2];

        ball_sockets.i1[i] = world_inertia_inverse(q1, bodies.inverse_inertia_local[body1]);
        ball_sockets.i2[i] = world_inertia_inverse(q2, bodies.inverse_inertia_local[body2]);

        ball_sockets.r1_world[i] = q1 * ball_sockets.local_anchors_body1[i];
        ball_sockets.r2_world[i] = q2 * ball_sockets.local_anchors_body2[i];
        let r1_world = ball_sockets.r1_world[i];
        let r2_world = ball_sockets.r2_world[i];

        let inverse_mass_body1 = bodies.inverse_masses[body1];
        let inverse_mass_body2 = bodies.inverse_masses[body2];
        let k = effective_mass(
            inverse_mass_body1 + inverse_mass_body2,
            r1_world,
            r2_world,
            ball_sockets.i1[i],
            ball_sockets.i2[i],
        );

        ball_sockets.inverse_mass_matrices[i] = Mat3::ZERO;
        let determinant = k.determinant();
        if determinant.abs() <= MACHINE_EPSILON {
            // Singular configuration: skip the whole update for this joint.
            continue;
        }
        if bodies.body_types[body1].is_dynamic() || bodies.body_types[body2].is_dynamic() {
            ball_sockets.inverse_mass_matrices[i] = inverse_from_determinant(k, determinant);
        }

        let x1 = bodies.constrained_positions[body1];
        let x2 = bodies.constrained_positions[body2];
        let constraint_error = x2 + r2_world - x1 - r1_world;

        let lambda = ball_sockets.inverse_mass_matrices[i] * (-constraint_error);

        // Pseudo-velocities: applied to the candidate poses only.
        let angular_impulse_body1 = lambda.cross(r1_world);
        let v1 = inverse_mass_body1 * bodies.linear_lock_factors[body1] * (-lambda);
        let w1 = bodies.angular_lock_factors[body1] * (ball_sockets.i1[i] * angular_impulse_body1);
        bodies.constrained_positions[body1] = x1 + v1;
        bodies.constrained_orientations[body1] = integrate_orientation_tangent(q1, w1);

        let angular_impulse_body2 = -lambda.cross(r2_world);
        let v2 = inverse_mass_body2 * bodies.linear_lock_factors[body2] * lambda;
        let w2 = bodies.angular_lock_factors[body2] * (ball_sockets.i2[i] * angular_impulse_body2);
        bodies.constrained_positions[body2] = x2 + v2;
        bodies.constrained_orientations[body2] = integrate_orientation_tangent(q2, w2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::body::RigidBodyDesc;
    use crate::core::joint::BallSocketJointDesc;
    use crate::core::types::Transform;
    use crate::utils::allocator::EntityAllocator;
    use glam::Quat;

    struct Fixture {
        bodies: RigidBodyComponents,
        transforms: TransformComponents,
        joints: JointComponents,
        ball_sockets: BallSocketJointComponents,
    }

    fn two_body_fixture(desc1: RigidBodyDesc, desc2: RigidBodyDesc) -> Fixture {
        let mut entities = EntityAllocator::new();
        let mut bodies = RigidBodyComponents::new();
        let mut transforms = TransformComponents::new();
        let mut joints = JointComponents::new();
        let mut ball_sockets = BallSocketJointComponents::new();

        let b1 = entities.create();
        let b2 = entities.create();
        transforms.insert(b1, Transform::new(desc1.position, desc1.orientation));
        transforms.insert(b2, Transform::new(desc2.position, desc2.orientation));
        bodies.insert(b1, &desc1);
        bodies.insert(b2, &desc2);

        // Mirror the world's begin-of-step work for the two rows.
        for i in 0..2 {
            let q = bodies.constrained_orientations[i];
            bodies.inverse_inertia_world[i] = world_inertia_inverse(q, bodies.inverse_inertia_local[i]);
        }

        let joint = entities.create();
        let desc = BallSocketJointDesc::new(b1, b2)
            .with_local_anchor_2(Vec3::Y)
            .with_position_correction(PositionCorrection::NonLinearGaussSeidel);
        joints.insert(joint, b1, b2, desc.position_correction);
        ball_sockets.insert(joint, &desc);

        Fixture {
            bodies,
            transforms,
            joints,
            ball_sockets,
        }
    }

    #[test]
    fn pre_solver_is_idempotent() {
        let mut fixture = two_body_fixture(
            RigidBodyDesc::fixed(),
            RigidBodyDesc::dynamic().with_position(Vec3::new(0.0, -1.0, 0.0)),
        );

        init_before_solve(
            &fixture.bodies,
            &fixture.transforms,
            &fixture.joints,
            &mut fixture.ball_sockets,
            1.0 / 60.0,
            0.2,
            true,
        );
        let first = (
            fixture.ball_sockets.inverse_mass_matrices[0],
            fixture.ball_sockets.bias_vectors[0],
            fixture.ball_sockets.r1_world[0],
            fixture.ball_sockets.r2_world[0],
        );

        init_before_solve(
            &fixture.bodies,
            &fixture.transforms,
            &fixture.joints,
            &mut fixture.ball_sockets,
            1.0 / 60.0,
            0.2,
            true,
        );
        assert_eq!(first.0, fixture.ball_sockets.inverse_mass_matrices[0]);
        assert_eq!(first.1, fixture.ball_sockets.bias_vectors[0]);
        assert_eq!(first.2, fixture.ball_sockets.r1_world[0]);
        assert_eq!(first.3, fixture.ball_sockets.r2_world[0]);
    }

    #[test]
    fn effective_mass_inverse_is_symmetric() {
        let mut fixture = two_body_fixture(
            RigidBodyDesc::dynamic().with_orientation(Quat::from_axis_angle(Vec3::X, 0.3)),
            RigidBodyDesc::dynamic()
                .with_position(Vec3::new(0.0, -1.0, 0.0))
                .with_mass(3.0),
        );

        init_before_solve(
            &fixture.bodies,
            &fixture.transforms,
            &fixture.joints,
            &mut fixture.ball_sockets,
            1.0 / 60.0,
            0.2,
            true,
        );

        let inverse = fixture.ball_sockets.inverse_mass_matrices[0];
        let transposed = inverse.transpose();
        for col in 0..3 {
            for row in 0..3 {
                assert!((inverse.col(col)[row] - transposed.col(col)[row]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn static_static_joint_is_inert() {
        let mut fixture = two_body_fixture(
            RigidBodyDesc::fixed(),
            RigidBodyDesc::fixed().with_position(Vec3::new(0.0, -1.0, 0.0)),
        );

        init_before_solve(
            &fixture.bodies,
            &fixture.transforms,
            &fixture.joints,
            &mut fixture.ball_sockets,
            1.0 / 60.0,
            0.2,
            true,
        );
        assert_eq!(fixture.ball_sockets.inverse_mass_matrices[0], Mat3::ZERO);

        fixture.bodies.constrained_linear_velocities[0] = Vec3::ZERO;
        solve_velocity_constraint(
            &mut fixture.bodies,
            &fixture.joints,
            &mut fixture.ball_sockets,
        );
        assert_eq!(fixture.ball_sockets.impulses[0], Vec3::ZERO);
        assert_eq!(fixture.bodies.constrained_linear_velocities[0], Vec3::ZERO);
        assert_eq!(fixture.bodies.constrained_linear_velocities[1], Vec3::ZERO);
    }

    #[test]
    fn one_sweep_cancels_anchor_velocity_of_hanging_body() {
        let mut fixture = two_body_fixture(
            RigidBodyDesc::fixed(),
            RigidBodyDesc::dynamic().with_position(Vec3::new(0.0, -1.0, 0.0)),
        );

        init_before_solve(
            &fixture.bodies,
            &fixture.transforms,
            &fixture.joints,
            &mut fixture.ball_sockets,
            1.0 / 60.0,
            0.2,
            true,
        );

        // Gravity kick on the hanging body.
        fixture.bodies.constrained_linear_velocities[1] = Vec3::new(0.0, -9.81 / 60.0, 0.0);

        solve_velocity_constraint(
            &mut fixture.bodies,
            &fixture.joints,
            &mut fixture.ball_sockets,
        );

        let residual = anchor_velocity_residual(&fixture.bodies, &fixture.ball_sockets, 0, 0, 1);
        assert!(residual.length() < 1e-5, "residual {residual:?}");
        assert!(fixture.ball_sockets.impulses[0].y > 0.0);
    }
}
