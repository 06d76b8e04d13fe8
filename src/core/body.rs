use std::collections::HashMap;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::MACHINE_EPSILON;
use crate::core::types::BodyType;
use crate::utils::allocator::EntityId;
use crate::utils::math::invert_checked;

/// Description of a rigid body handed to [`crate::world::World::create_body`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBodyDesc {
    pub body_type: BodyType,
    pub position: Vec3,
    pub orientation: Quat,
    pub mass: f32,
    /// Inertia tensor about the center of mass, in the body's local frame.
    pub local_inertia: Mat3,
    /// Per-axis factors in {0, 1} masking solver linear velocity changes.
    ///
    /// Asymmetric locks between two dynamic bodies are applied as-is and
    /// momentum conservation is not symmetrized across the pair.
    pub linear_lock_factors: Vec3,
    /// Per-axis factors in {0, 1} masking solver angular velocity changes.
    pub angular_lock_factors: Vec3,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            mass: 1.0,
            local_inertia: Mat3::IDENTITY,
            linear_lock_factors: Vec3::ONE,
            angular_lock_factors: Vec3::ONE,
        }
    }
}

impl RigidBodyDesc {
    pub fn dynamic() -> Self {
        Self::default()
    }

    pub fn kinematic() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            ..Self::default()
        }
    }

    pub fn fixed() -> Self {
        Self {
            body_type: BodyType::Static,
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_local_inertia(mut self, inertia: Mat3) -> Self {
        self.local_inertia = inertia;
        self
    }

    pub fn with_linear_lock_factors(mut self, factors: Vec3) -> Self {
        self.linear_lock_factors = factors;
        self
    }

    pub fn with_angular_lock_factors(mut self, factors: Vec3) -> Self {
        self.angular_lock_factors = factors;
        self
    }

    /// Zero for non-dynamic bodies and for degenerate mass values.
    pub(crate) fn inverse_mass(&self) -> f32 {
        if !self.body_type.is_dynamic() || self.mass.abs() < MACHINE_EPSILON {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    pub(crate) fn inverse_local_inertia(&self) -> Mat3 {
        if !self.body_type.is_dynamic() {
            return Mat3::ZERO;
        }
        invert_checked(self.local_inertia, MACHINE_EPSILON).unwrap_or(Mat3::ZERO)
    }
}

/// Structure-of-arrays storage for rigid-body solver state.
///
/// Enabled components occupy rows `[0, nb_enabled)`; disabled rows live
/// beyond. All columns stay aligned row-for-row, and `rows` maps an entity
/// to its current row in O(1).
#[derive(Default)]
pub struct RigidBodyComponents {
    rows: HashMap<EntityId, usize>,
    nb_enabled: usize,

    pub entities: Vec<EntityId>,
    pub body_types: Vec<BodyType>,
    pub inverse_masses: Vec<f32>,
    pub inverse_inertia_local: Vec<Mat3>,
    pub inverse_inertia_world: Vec<Mat3>,
    pub centers_of_mass: Vec<Vec3>,
    pub linear_lock_factors: Vec<Vec3>,
    pub angular_lock_factors: Vec<Vec3>,

    // External velocity state, copied into the constrained buffers at the
    // start of a step and committed back at the end.
    pub linear_velocities: Vec<Vec3>,
    pub angular_velocities: Vec<Vec3>,

    // Working buffers owned by the solver during a step.
    pub constrained_linear_velocities: Vec<Vec3>,
    pub constrained_angular_velocities: Vec<Vec3>,
    pub constrained_positions: Vec<Vec3>,
    pub constrained_orientations: Vec<Quat>,
}

impl RigidBodyComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an enabled component row for `entity`.
    pub fn insert(&mut self, entity: EntityId, desc: &RigidBodyDesc) {
        debug_assert!(!self.rows.contains_key(&entity));

        let row = self.entities.len();
        self.entities.push(entity);
        self.body_types.push(desc.body_type);
        self.inverse_masses.push(desc.inverse_mass());
        self.inverse_inertia_local.push(desc.inverse_local_inertia());
        self.inverse_inertia_world.push(Mat3::ZERO);
        self.centers_of_mass.push(desc.position);
        self.linear_lock_factors.push(desc.linear_lock_factors);
        self.angular_lock_factors.push(desc.angular_lock_factors);
        self.linear_velocities.push(Vec3::ZERO);
        self.angular_velocities.push(Vec3::ZERO);
        self.constrained_linear_velocities.push(Vec3::ZERO);
        self.constrained_angular_velocities.push(Vec3::ZERO);
        self.constrained_positions.push(desc.position);
        self.constrained_orientations.push(desc.orientation);
        self.rows.insert(entity, row);

        // New rows are enabled: move past any disabled tail.
        self.swap_rows(row, self.nb_enabled);
        self.nb_enabled += 1;
    }

    pub fn remove(&mut self, entity: EntityId) {
        let Some(mut row) = self.rows.get(&entity).copied() else {
            return;
        };

        if row < self.nb_enabled {
            self.nb_enabled -= 1;
            self.swap_rows(row, self.nb_enabled);
            row = self.nb_enabled;
        }

        let last = self.entities.len() - 1;
        self.swap_rows(row, last);

        self.entities.pop();
        self.body_types.pop();
        self.inverse_masses.pop();
        self.inverse_inertia_local.pop();
        self.inverse_inertia_world.pop();
        self.centers_of_mass.pop();
        self.linear_lock_factors.pop();
        self.angular_lock_factors.pop();
        self.linear_velocities.pop();
        self.angular_velocities.pop();
        self.constrained_linear_velocities.pop();
        self.constrained_angular_velocities.pop();
        self.constrained_positions.pop();
        self.constrained_orientations.pop();
        self.rows.remove(&entity);
    }

    pub fn set_enabled(&mut self, entity: EntityId, enabled: bool) {
        let Some(row) = self.rows.get(&entity).copied() else {
            return;
        };
        let currently_enabled = row < self.nb_enabled;
        if enabled == currently_enabled {
            return;
        }

        if enabled {
            self.swap_rows(row, self.nb_enabled);
            self.nb_enabled += 1;
        } else {
            self.nb_enabled -= 1;
            self.swap_rows(row, self.nb_enabled);
        }
    }

    pub fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.rows.get(&entity).copied()
    }

    pub fn is_enabled(&self, entity: EntityId) -> bool {
        self.row_of(entity)
            .map(|row| row < self.nb_enabled)
            .unwrap_or(false)
    }

    pub fn nb_enabled(&self) -> usize {
        self.nb_enabled
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entities.swap(a, b);
        self.body_types.swap(a, b);
        self.inverse_masses.swap(a, b);
        self.inverse_inertia_local.swap(a, b);
        self.inverse_inertia_world.swap(a, b);
        self.centers_of_mass.swap(a, b);
        self.linear_lock_factors.swap(a, b);
        self.angular_lock_factors.swap(a, b);
        self.linear_velocities.swap(a, b);
        self.angular_velocities.swap(a, b);
        self.constrained_linear_velocities.swap(a, b);
        self.constrained_angular_velocities.swap(a, b);
        self.constrained_positions.swap(a, b);
        self.constrained_orientations.swap(a, b);
        self.rows.insert(self.entities[a], a);
        self.rows.insert(self.entities[b], b);
    }
}
