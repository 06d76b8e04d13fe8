//! Core types describing physics entities, components, and shared data.

pub mod body;
pub mod joint;
pub mod transform;
pub mod types;

pub use body::{RigidBodyComponents, RigidBodyDesc};
pub use joint::{BallSocketJointComponents, BallSocketJointDesc, JointComponents};
pub use transform::TransformComponents;
pub use types::{BodyType, InertiaTensorExt, PositionCorrection, Transform, Velocity};
