use std::collections::HashMap;

use crate::core::types::Transform;
use crate::utils::allocator::EntityId;

/// Column store for world poses, aligned with the rigid-body family through
/// the shared entity ids.
#[derive(Default)]
pub struct TransformComponents {
    rows: HashMap<EntityId, usize>,
    nb_enabled: usize,

    pub entities: Vec<EntityId>,
    pub transforms: Vec<Transform>,
}

impl TransformComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityId, transform: Transform) {
        debug_assert!(!self.rows.contains_key(&entity));

        let row = self.entities.len();
        self.entities.push(entity);
        self.transforms.push(transform);
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
        self.transforms.pop();
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

    pub fn get(&self, entity: EntityId) -> Option<&Transform> {
        self.row_of(entity).map(|row| &self.transforms[row])
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Transform> {
        let row = self.row_of(entity)?;
        Some(&mut self.transforms[row])
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
        self.transforms.swap(a, b);
        self.rows.insert(self.entities[a], a);
        self.rows.insert(self.entities[b], b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn lookup_follows_row_moves() {
        let mut transforms = TransformComponents::new();
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        transforms.insert(a, Transform::new(Vec3::X, Quat::IDENTITY));
        transforms.insert(b, Transform::new(Vec3::Y, Quat::IDENTITY));

        transforms.set_enabled(a, false);
        assert_eq!(transforms.get(a).unwrap().position, Vec3::X);
        assert_eq!(transforms.get(b).unwrap().position, Vec3::Y);

        transforms.remove(b);
        assert!(transforms.get(b).is_none());
        assert_eq!(transforms.get(a).unwrap().position, Vec3::X);
    }
}
