//! Pivot Physics – the iterative constraint solver core of a 3D rigid-body
//! engine.
//!
//! The crate advances body velocities so that, after integration, the joint
//! constraints hold to a tolerance, and corrects accumulated position drift.
//! Bodies and joints live in structure-of-arrays component stores addressed
//! by stable entity handles; the solver kernels are plain indexed arithmetic
//! over those rows.
//!
//! A step runs four cooperating passes over the enabled joints:
//!
//! 1. **Pre-solve** – derive world anchors, effective mass `K⁻¹`, and the
//!    Baumgarte bias for each joint.
//! 2. **Warm start** – replay the impulse accumulated during the previous
//!    step for temporal coherence.
//! 3. **Velocity solve** – N Sequential Impulse (projected Gauss-Seidel)
//!    iterations driving the anchor velocity to the bias target.
//! 4. **Position solve** – M non-linear Gauss-Seidel iterations projecting
//!    the residual anchor separation out of the candidate poses.
//!
//! # Example
//!
//! ```rust
//! use pivot_physics::{BallSocketJointDesc, RigidBodyDesc, Vec3, World};
//!
//! let mut world = World::new();
//!
//! // A pendulum: a fixed pivot with a dynamic bob hanging one unit below.
//! let pivot = world.create_body(&RigidBodyDesc::fixed());
//! let bob = world.create_body(
//!     &RigidBodyDesc::dynamic().with_position(Vec3::new(0.0, -1.0, 0.0)),
//! );
//! world.create_ball_socket_joint(
//!     &BallSocketJointDesc::new(pivot, bob).with_local_anchor_2(Vec3::Y),
//! );
//!
//! world.solve_step(1.0 / 60.0);
//! ```

pub mod config;
pub mod core;
pub mod dynamics;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use crate::config::SolverConfig;
pub use crate::core::{
    body::{RigidBodyComponents, RigidBodyDesc},
    joint::{BallSocketJointComponents, BallSocketJointDesc, JointComponents},
    transform::TransformComponents,
    types::{BodyType, InertiaTensorExt, PositionCorrection, Transform, Velocity},
};
pub use crate::dynamics::{
    ball_socket::{
        anchor_position_error, anchor_velocity_residual, init_before_solve,
        solve_position_constraint, solve_velocity_constraint, warm_start,
    },
    integrator::integrate_candidate_poses,
    parallel::{color_joints, JointBatches},
};
pub use crate::utils::allocator::{EntityAllocator, EntityId};
pub use crate::utils::profiling::SolverProfiler;
pub use crate::world::{StepPhase, World};
