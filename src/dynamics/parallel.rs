//! Joint coloring and the parallel velocity-solver path.
//!
//! Gauss-Seidel order matters wherever two joints share a body, so the only
//! legal parallelism is across joints that share nothing. The batcher
//! greedily colors the enabled joints into batches with pairwise-disjoint
//! body sets; batches run in sequence, and inside a batch the impulse
//! increments are computed in parallel from the batch-entry velocities and
//! applied serially. Because no body appears twice in a batch, this equals a
//! sequential sweep in batch order.

use std::collections::HashSet;

use glam::Vec3;
use rayon::prelude::*;

use crate::core::body::RigidBodyComponents;
use crate::core::joint::{BallSocketJointComponents, JointComponents};
use crate::dynamics::ball_socket;
use crate::utils::allocator::EntityId;

/// Row batches with pairwise-disjoint bodies, rebuilt whenever the joint set
/// changes.
#[derive(Debug, Default, Clone)]
pub struct JointBatches {
    batches: Vec<Vec<usize>>,
}

impl JointBatches {
    pub fn batches(&self) -> &[Vec<usize>] {
        &self.batches
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Greedy first-fit coloring of the enabled ball-socket rows.
pub fn color_joints(
    joints: &JointComponents,
    ball_sockets: &BallSocketJointComponents,
) -> JointBatches {
    let mut batches: Vec<Vec<usize>> = Vec::new();
    let mut batch_bodies: Vec<HashSet<EntityId>> = Vec::new();

    for i in 0..ball_sockets.nb_enabled() {
        let Some(joint_row) = joints.row_of(ball_sockets.joint_entities[i]) else {
            continue;
        };
        let body1 = joints.body1_entities[joint_row];
        let body2 = joints.body2_entities[joint_row];

        let slot = batch_bodies
            .iter()
            .position(|bodies| !bodies.contains(&body1) && !bodies.contains(&body2));

        match slot {
            Some(slot) => {
                batches[slot].push(i);
                batch_bodies[slot].insert(body1);
                batch_bodies[slot].insert(body2);
            }
            None => {
                batches.push(vec![i]);
                batch_bodies.push(HashSet::from([body1, body2]));
            }
        }
    }

    JointBatches { batches }
}

/// One velocity iteration over the color batches.
pub fn solve_velocity_batched(
    bodies: &mut RigidBodyComponents,
    joints: &JointComponents,
    ball_sockets: &mut BallSocketJointComponents,
    batches: &JointBatches,
) {
    for batch in &batches.batches {
        // Deltas first, against the batch-entry velocities. Joints in a
        // batch touch disjoint bodies, so this equals in-order application.
        let deltas: Vec<(usize, usize, usize, Vec3)> = {
            let bodies: &RigidBodyComponents = bodies;
            let ball_sockets: &BallSocketJointComponents = ball_sockets;
            batch
                .par_iter()
                .filter_map(|&i| {
                    let joint_row = joints.row_of(ball_sockets.joint_entities[i])?;
                    let body1 = bodies.row_of(joints.body1_entities[joint_row])?;
                    let body2 = bodies.row_of(joints.body2_entities[joint_row])?;
                    let delta = ball_socket::velocity_delta(bodies, ball_sockets, i, body1, body2);
                    Some((i, body1, body2, delta))
                })
                .collect()
        };

        for (i, body1, body2, delta) in deltas {
            ball_socket::accumulate_and_apply(bodies, ball_sockets, i, body1, body2, delta);
        }
    }
}
