//! Solver kernels, candidate-pose integration, and the parallel batcher.

pub mod ball_socket;
pub mod integrator;
pub mod parallel;

pub use integrator::integrate_candidate_poses;
pub use parallel::{color_joints, JointBatches};
