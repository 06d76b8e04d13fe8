//! Global configuration constants and per-world solver tunables.

use serde::{Deserialize, Serialize};

/// Baumgarte positional feedback coefficient folded into the velocity bias.
pub const DEFAULT_JOINT_BETA: f32 = 0.2;

/// Number of velocity-solver iterations performed per step.
pub const DEFAULT_VELOCITY_ITERATIONS: u32 = 10;

/// Number of position-solver iterations performed per step.
pub const DEFAULT_POSITION_ITERATIONS: u32 = 5;

/// Determinant threshold below which an effective mass matrix is treated as
/// singular and its joint row degenerates to a no-op.
pub const MACHINE_EPSILON: f32 = f32::EPSILON;

/// Per-world solver tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Baumgarte positional-drift coefficient.
    pub beta: f32,
    /// Velocity-solver iteration count (N).
    pub velocity_iterations: u32,
    /// Position-solver iteration count (M).
    pub position_iterations: u32,
    /// Whether accumulated impulses seed the next step's solve.
    pub warm_start: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            beta: DEFAULT_JOINT_BETA,
            velocity_iterations: DEFAULT_VELOCITY_ITERATIONS,
            position_iterations: DEFAULT_POSITION_ITERATIONS,
            warm_start: true,
        }
    }
}
