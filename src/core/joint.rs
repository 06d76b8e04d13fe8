use std::collections::HashMap;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::types::PositionCorrection;
use crate::utils::allocator::EntityId;

/// Description of a ball-and-socket joint handed to
/// [`crate::world::World::create_ball_socket_joint`].
///
/// Anchor points are expressed in each body's local frame, relative to the
/// center of mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSocketJointDesc {
    pub body1: EntityId,
    pub body2: EntityId,
    pub local_anchor_body1: Vec3,
    pub local_anchor_body2: Vec3,
    pub position_correction: PositionCorrection,
}

impl BallSocketJointDesc {
    pub fn new(body1: EntityId, body2: EntityId) -> Self {
        Self {
            body1,
            body2,
            local_anchor_body1: Vec3::ZERO,
            local_anchor_body2: Vec3::ZERO,
            position_correction: PositionCorrection::default(),
        }
    }

    pub fn with_local_anchor_1(mut self, anchor: Vec3) -> Self {
        self.local_anchor_body1 = anchor;
        self
    }

    pub fn with_local_anchor_2(mut self, anchor: Vec3) -> Self {
        self.local_anchor_body2 = anchor;
        self
    }

    pub fn with_position_correction(mut self, technique: PositionCorrection) -> Self {
        self.position_correction = technique;
        self
    }
}

/// Base joint family: which bodies a joint connects and how its drift is
/// corrected. Shared by every joint type.
#[derive(Default)]
pub struct JointComponents {
    rows: HashMap<EntityId, usize>,
    nb_enabled: usize,

    pub entities: Vec<EntityId>,
    pub body1_entities: Vec<EntityId>,
    pub body2_entities: Vec<EntityId>,
    pub position_corrections: Vec<PositionCorrection>,
}

impl JointComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        entity: EntityId,
        body1: EntityId,
        body2: EntityId,
        position_correction: PositionCorrection,
    ) {
        debug_assert!(!self.rows.contains_key(&entity));

        let row = self.entities.len();
        self.entities.push(entity);
        self.body1_entities.push(body1);
        self.body2_entities.push(body2);
        self.position_corrections.push(position_correction);
        self.rows.insert(entity, row);

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
        self.body1_entities.pop();
        self.body2_entities.pop();
        self.position_corrections.pop();
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

    /// Entities of every joint attached to `body`, enabled or not.
    pub fn joints_of_body(&self, body: EntityId) -> Vec<EntityId> {
        self.entities
            .iter()
            .zip(self.body1_entities.iter().zip(&self.body2_entities))
            .filter(|(_, (b1, b2))| **b1 == body || **b2 == body)
            .map(|(joint, _)| *joint)
            .collect()
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
        self.body1_entities.swap(a, b);
        self.body2_entities.swap(a, b);
        self.position_corrections.swap(a, b);
        self.rows.insert(self.entities[a], a);
        self.rows.insert(self.entities[b], b);
    }
}

/// Ball-and-socket joint family: anchor geometry plus the per-step derived
/// state the solver kernels read and write.
///
/// `impulses` outlives the step: it is the warm-start seed for the next one.
#[derive(Default)]
pub struct BallSocketJointComponents {
    rows: HashMap<EntityId, usize>,
    nb_enabled: usize,

    /// Entity of the owning joint row in [`JointComponents`].
    pub joint_entities: Vec<EntityId>,
    pub local_anchors_body1: Vec<Vec3>,
    pub local_anchors_body2: Vec<Vec3>,

    // Derived each step by the pre-solver (and by the position solver for
    // its own pass).
    pub r1_world: Vec<Vec3>,
    pub r2_world: Vec<Vec3>,
    pub i1: Vec<Mat3>,
    pub i2: Vec<Mat3>,
    pub inverse_mass_matrices: Vec<Mat3>,
    pub bias_vectors: Vec<Vec3>,

    /// Accumulated Lagrange multiplier, carried across steps.
    pub impulses: Vec<Vec3>,
}

impl BallSocketJointComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, joint_entity: EntityId, desc: &BallSocketJointDesc) {
        debug_assert!(!self.rows.contains_key(&joint_entity));

        let row = self.joint_entities.len();
        self.joint_entities.push(joint_entity);
        self.local_anchors_body1.push(desc.local_anchor_body1);
        self.local_anchors_body2.push(desc.local_anchor_body2);
        self.r1_world.push(Vec3::ZERO);
        self.r2_world.push(Vec3::ZERO);
        self.i1.push(Mat3::ZERO);
        self.i2.push(Mat3::ZERO);
        self.inverse_mass_matrices.push(Mat3::ZERO);
        self.bias_vectors.push(Vec3::ZERO);
        self.impulses.push(Vec3::ZERO);
        self.rows.insert(joint_entity, row);

        self.swap_rows(row, self.nb_enabled);
        self.nb_enabled += 1;
    }

    pub fn remove(&mut self, joint_entity: EntityId) {
        let Some(mut row) = self.rows.get(&joint_entity).copied() else {
            return;
        };

        if row < self.nb_enabled {
            self.nb_enabled -= 1;
            self.swap_rows(row, self.nb_enabled);
            row = self.nb_enabled;
        }

        let last = self.joint_entities.len() - 1;
        self.swap_rows(row, last);
        self.joint_entities.pop();
        self.local_anchors_body1.pop();
        self.local_anchors_body2.pop();
        self.r1_world.pop();
        self.r2_world.pop();
        self.i1.pop();
        self.i2.pop();
        self.inverse_mass_matrices.pop();
        self.bias_vectors.pop();
        self.impulses.pop();
        self.rows.remove(&joint_entity);
    }

    pub fn set_enabled(&mut self, joint_entity: EntityId, enabled: bool) {
        let Some(row) = self.rows.get(&joint_entity).copied() else {
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

    pub fn row_of(&self, joint_entity: EntityId) -> Option<usize> {
        self.rows.get(&joint_entity).copied()
    }

    pub fn nb_enabled(&self) -> usize {
        self.nb_enabled
    }

    pub fn len(&self) -> usize {
        self.joint_entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joint_entities.is_empty()
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.joint_entities.swap(a, b);
        self.local_anchors_body1.swap(a, b);
        self.local_anchors_body2.swap(a, b);
        self.r1_world.swap(a, b);
        self.r2_world.swap(a, b);
        self.i1.swap(a, b);
        self.i2.swap(a, b);
        self.inverse_mass_matrices.swap(a, b);
        self.bias_vectors.swap(a, b);
        self.impulses.swap(a, b);
        self.rows.insert(self.joint_entities[a], a);
        self.rows.insert(self.joint_entities[b], b);
    }
}
