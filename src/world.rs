//! The owning container: component stores, solver configuration, and the
//! step pipeline that drives the kernels in order.

use std::time::Instant;

use glam::Vec3;

use crate::config::SolverConfig;
use crate::core::body::{RigidBodyComponents, RigidBodyDesc};
use crate::core::joint::{BallSocketJointComponents, BallSocketJointDesc, JointComponents};
use crate::core::transform::TransformComponents;
use crate::core::types::{Transform, Velocity};
use crate::dynamics::ball_socket;
use crate::dynamics::integrator::integrate_candidate_poses;
use crate::dynamics::parallel::{self, color_joints, JointBatches};
use crate::utils::allocator::{EntityAllocator, EntityId};
use crate::utils::logging::ScopedTimer;
use crate::utils::math::world_inertia_inverse;
use crate::utils::profiling::{PhaseTimer, SolverProfiler};

/// Where the step pipeline currently stands.
///
/// Each transition happens exactly once per step. Skipping warm starting is
/// allowed by the configuration flag, but the `PreSolved` state is always
/// traversed (that is where disabled warm starts zero the impulses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Idle,
    PreSolved,
    Iterating,
    VelocityDone,
    PositionPhase,
    Done,
}

/// A self-contained solver world.
///
/// Owns the component stores and borrows them exclusively for the duration
/// of a step; several worlds never share state.
pub struct World {
    entities: EntityAllocator,
    pub bodies: RigidBodyComponents,
    pub transforms: TransformComponents,
    pub joints: JointComponents,
    pub ball_sockets: BallSocketJointComponents,
    pub config: SolverConfig,
    pub profiler: SolverProfiler,
    phase: StepPhase,
    parallel_enabled: bool,
    batches: JointBatches,
    batches_dirty: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            entities: EntityAllocator::new(),
            bodies: RigidBodyComponents::new(),
            transforms: TransformComponents::new(),
            joints: JointComponents::new(),
            ball_sockets: BallSocketJointComponents::new(),
            config,
            profiler: SolverProfiler::default(),
            phase: StepPhase::Idle,
            parallel_enabled: false,
            batches: JointBatches::default(),
            batches_dirty: true,
        }
    }

    // --- lifecycle -------------------------------------------------------

    pub fn create_body(&mut self, desc: &RigidBodyDesc) -> EntityId {
        let entity = self.entities.create();
        self.transforms
            .insert(entity, Transform::new(desc.position, desc.orientation));
        self.bodies.insert(entity, desc);

        if let Some(row) = self.bodies.row_of(entity) {
            self.bodies.inverse_inertia_world[row] =
                world_inertia_inverse(desc.orientation, self.bodies.inverse_inertia_local[row]);
        }

        log::debug!("created body {entity:?} ({:?})", desc.body_type);
        entity
    }

    /// Removes a body together with every joint attached to it.
    pub fn remove_body(&mut self, body: EntityId) {
        for joint in self.joints.joints_of_body(body) {
            self.remove_joint(joint);
        }
        self.bodies.remove(body);
        self.transforms.remove(body);
        self.entities.destroy(body);
        self.batches_dirty = true;
        log::debug!("removed body {body:?}");
    }

    pub fn create_ball_socket_joint(&mut self, desc: &BallSocketJointDesc) -> EntityId {
        debug_assert!(
            self.entities.is_alive(desc.body1) && self.entities.is_alive(desc.body2),
            "joint endpoints must be live bodies"
        );

        let entity = self.entities.create();
        self.joints
            .insert(entity, desc.body1, desc.body2, desc.position_correction);
        self.ball_sockets.insert(entity, desc);
        self.batches_dirty = true;
        log::debug!("created ball-socket joint {entity:?}");
        entity
    }

    pub fn remove_joint(&mut self, joint: EntityId) {
        self.ball_sockets.remove(joint);
        self.joints.remove(joint);
        self.entities.destroy(joint);
        self.batches_dirty = true;
        log::debug!("removed joint {joint:?}");
    }

    /// Drops the accumulated impulse of a joint.
    ///
    /// Call this after changing the identity or mass properties of an
    /// attached body: the solver cannot detect a stale warm-start seed.
    pub fn reset_joint_impulse(&mut self, joint: EntityId) {
        if let Some(row) = self.ball_sockets.row_of(joint) {
            self.ball_sockets.impulses[row] = Vec3::ZERO;
        }
    }

    /// Enables or disables a body; joints follow, staying enabled only while
    /// both endpoints are.
    pub fn set_body_enabled(&mut self, body: EntityId, enabled: bool) {
        self.bodies.set_enabled(body, enabled);
        self.transforms.set_enabled(body, enabled);

        for joint in self.joints.joints_of_body(body) {
            let Some(joint_row) = self.joints.row_of(joint) else {
                continue;
            };
            let joint_enabled = self.bodies.is_enabled(self.joints.body1_entities[joint_row])
                && self.bodies.is_enabled(self.joints.body2_entities[joint_row]);
            self.joints.set_enabled(joint, joint_enabled);
            self.ball_sockets.set_enabled(joint, joint_enabled);
        }
        self.batches_dirty = true;
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    pub fn step_phase(&self) -> StepPhase {
        self.phase
    }

    // --- accessors -------------------------------------------------------

    pub fn transform(&self, body: EntityId) -> Option<Transform> {
        self.transforms.get(body).copied()
    }

    pub fn set_transform(&mut self, body: EntityId, transform: Transform) {
        if let Some(pose) = self.transforms.get_mut(body) {
            *pose = transform;
        }
    }

    pub fn velocity(&self, body: EntityId) -> Option<Velocity> {
        let row = self.bodies.row_of(body)?;
        Some(Velocity::new(
            self.bodies.linear_velocities[row],
            self.bodies.angular_velocities[row],
        ))
    }

    pub fn set_velocity(&mut self, body: EntityId, velocity: Velocity) {
        if let Some(row) = self.bodies.row_of(body) {
            self.bodies.linear_velocities[row] = velocity.linear;
            self.bodies.angular_velocities[row] = velocity.angular;
        }
    }

    /// Accumulated impulse of a joint, as carried across steps.
    pub fn joint_impulse(&self, joint: EntityId) -> Option<Vec3> {
        let row = self.ball_sockets.row_of(joint)?;
        Some(self.ball_sockets.impulses[row])
    }

    /// Relative velocity of the joint's anchor points, from the constrained
    /// velocity buffers.
    pub fn anchor_velocity_residual(&self, joint: EntityId) -> Option<Vec3> {
        let row = self.ball_sockets.row_of(joint)?;
        let joint_row = self.joints.row_of(joint)?;
        let body1 = self.bodies.row_of(self.joints.body1_entities[joint_row])?;
        let body2 = self.bodies.row_of(self.joints.body2_entities[joint_row])?;
        Some(ball_socket::anchor_velocity_residual(
            &self.bodies,
            &self.ball_sockets,
            row,
            body1,
            body2,
        ))
    }

    /// Separation of the joint's anchor points, from the constrained poses.
    pub fn anchor_position_error(&self, joint: EntityId) -> Option<Vec3> {
        let row = self.ball_sockets.row_of(joint)?;
        Some(ball_socket::anchor_position_error(
            &self.bodies,
            &self.joints,
            &self.ball_sockets,
            row,
        ))
    }

    // --- step pipeline ---------------------------------------------------

    /// Runs the whole pipeline for one step:
    /// copy-in + pre-solve, warm start, N velocity iterations, candidate
    /// pose integration, M position iterations, commit.
    pub fn solve_step(&mut self, dt: f32) {
        debug_assert!(dt > 0.0, "the caller must reject a non-positive time step");
        let _scope = ScopedTimer::new("solve_step");
        let step_start = Instant::now();

        self.profiler.reset();
        self.profiler.body_count = self.bodies.nb_enabled();
        self.profiler.joint_count = self.ball_sockets.nb_enabled();
        self.profiler.velocity_iterations = self.config.velocity_iterations;
        self.profiler.position_iterations = self.config.position_iterations;

        self.begin_step(dt);
        self.apply_warm_start();
        for _ in 0..self.config.velocity_iterations {
            self.velocity_iteration();
        }
        self.integrate_candidates(dt);
        for _ in 0..self.config.position_iterations {
            self.position_iteration();
        }
        self.commit();

        self.profiler.total_step_time = step_start.elapsed();
    }

    /// Copies body state into the constrained working buffers and runs the
    /// joint pre-solver.
    pub fn begin_step(&mut self, dt: f32) {
        debug_assert_eq!(self.phase, StepPhase::Idle, "step phases out of order");
        let _timer = PhaseTimer::new(&mut self.profiler.pre_solve_time);

        for i in 0..self.bodies.nb_enabled() {
            let entity = self.bodies.entities[i];
            let pose = self.transforms.get(entity).copied();
            debug_assert!(pose.is_some(), "body without a transform row");
            let Some(pose) = pose else {
                continue;
            };

            self.bodies.centers_of_mass[i] = pose.position;
            self.bodies.constrained_positions[i] = pose.position;
            self.bodies.constrained_orientations[i] = pose.rotation;
            self.bodies.inverse_inertia_world[i] =
                world_inertia_inverse(pose.rotation, self.bodies.inverse_inertia_local[i]);
            self.bodies.constrained_linear_velocities[i] = self.bodies.linear_velocities[i];
            self.bodies.constrained_angular_velocities[i] = self.bodies.angular_velocities[i];
        }

        ball_socket::init_before_solve(
            &self.bodies,
            &self.transforms,
            &self.joints,
            &mut self.ball_sockets,
            dt,
            self.config.beta,
            self.config.warm_start,
        );

        log::trace!("pre-solved {} joints", self.ball_sockets.nb_enabled());
        self.phase = StepPhase::PreSolved;
    }

    /// Seeds the iterative solver with the previous step's impulses.
    pub fn apply_warm_start(&mut self) {
        debug_assert_eq!(self.phase, StepPhase::PreSolved, "step phases out of order");
        let _timer = PhaseTimer::new(&mut self.profiler.warm_start_time);

        if self.config.warm_start {
            ball_socket::warm_start(&mut self.bodies, &self.joints, &self.ball_sockets);
        }
        self.phase = StepPhase::Iterating;
    }

    /// One velocity-solver iteration over all enabled joints.
    pub fn velocity_iteration(&mut self) {
        debug_assert_eq!(self.phase, StepPhase::Iterating, "step phases out of order");
        let _timer = PhaseTimer::new(&mut self.profiler.velocity_time);

        if self.parallel_enabled {
            if self.batches_dirty {
                self.batches = color_joints(&self.joints, &self.ball_sockets);
                self.batches_dirty = false;
            }
            parallel::solve_velocity_batched(
                &mut self.bodies,
                &self.joints,
                &mut self.ball_sockets,
                &self.batches,
            );
        } else {
            ball_socket::solve_velocity_constraint(
                &mut self.bodies,
                &self.joints,
                &mut self.ball_sockets,
            );
        }
    }

    /// Writes candidate constrained poses from the solved velocities.
    pub fn integrate_candidates(&mut self, dt: f32) {
        debug_assert_eq!(self.phase, StepPhase::Iterating, "step phases out of order");
        self.phase = StepPhase::VelocityDone;
        let _timer = PhaseTimer::new(&mut self.profiler.integrate_time);

        integrate_candidate_poses(&mut self.bodies, dt);
        self.phase = StepPhase::PositionPhase;
    }

    /// One position-solver iteration over the projection-corrected joints.
    pub fn position_iteration(&mut self) {
        debug_assert_eq!(
            self.phase,
            StepPhase::PositionPhase,
            "step phases out of order"
        );
        let _timer = PhaseTimer::new(&mut self.profiler.position_time);

        ball_socket::solve_position_constraint(
            &mut self.bodies,
            &self.joints,
            &mut self.ball_sockets,
        );
    }

    /// Publishes the constrained buffers back to body state and transforms.
    pub fn commit(&mut self) {
        debug_assert_eq!(
            self.phase,
            StepPhase::PositionPhase,
            "step phases out of order"
        );
        self.phase = StepPhase::Done;

        for i in 0..self.bodies.nb_enabled() {
            self.bodies.linear_velocities[i] = self.bodies.constrained_linear_velocities[i];
            self.bodies.angular_velocities[i] = self.bodies.constrained_angular_velocities[i];

            let position = self.bodies.constrained_positions[i];
            let rotation = self.bodies.constrained_orientations[i].normalize();
            self.bodies.constrained_orientations[i] = rotation;
            self.bodies.centers_of_mass[i] = position;

            let entity = self.bodies.entities[i];
            if let Some(pose) = self.transforms.get_mut(entity) {
                pose.position = position;
                pose.rotation = rotation;
            }
        }

        self.phase = StepPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BodyType;

    #[test]
    fn removing_a_body_removes_its_joints() {
        let mut world = World::new();
        let a = world.create_body(&RigidBodyDesc::fixed());
        let b = world.create_body(&RigidBodyDesc::dynamic().with_position(Vec3::NEG_Y));
        let joint = world.create_ball_socket_joint(
            &BallSocketJointDesc::new(a, b).with_local_anchor_2(Vec3::Y),
        );

        world.remove_body(b);
        assert!(world.joint_impulse(joint).is_none());
        assert_eq!(world.joints.len(), 0);
        assert_eq!(world.ball_sockets.len(), 0);
        assert!(world.transform(b).is_none());
    }

    #[test]
    fn disabling_an_endpoint_disables_the_joint() {
        let mut world = World::new();
        let a = world.create_body(&RigidBodyDesc::fixed());
        let b = world.create_body(&RigidBodyDesc::dynamic().with_position(Vec3::NEG_Y));
        let joint = world.create_ball_socket_joint(
            &BallSocketJointDesc::new(a, b).with_local_anchor_2(Vec3::Y),
        );

        world.set_body_enabled(b, false);
        assert!(!world.joints.is_enabled(joint));
        assert_eq!(world.ball_sockets.nb_enabled(), 0);

        world.set_body_enabled(b, true);
        assert!(world.joints.is_enabled(joint));
        assert_eq!(world.ball_sockets.nb_enabled(), 1);
    }

    #[test]
    fn solve_step_commits_constrained_state() {
        let mut world = World::new();
        let body = world.create_body(&RigidBodyDesc::dynamic());
        world.set_velocity(body, Velocity::new(Vec3::X, Vec3::ZERO));

        world.solve_step(1.0 / 60.0);

        let transform = world.transform(body).unwrap();
        assert!((transform.position.x - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(
            world.bodies.body_types[world.bodies.row_of(body).unwrap()],
            BodyType::Dynamic
        );
    }
}
