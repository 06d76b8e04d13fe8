use pivot_physics::{
    BallSocketJointDesc, EntityId, Mat3, RigidBodyDesc, Vec3, Velocity, World,
};

const DT: f32 = 1.0 / 60.0;
const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// Fixed pivot at the origin, dynamic bob hanging one unit below, anchored
/// at the pivot's center.
fn make_pendulum() -> (World, EntityId, EntityId, EntityId) {
    let mut world = World::new();
    let pivot = world.create_body(&RigidBodyDesc::fixed());
    let bob = world.create_body(
        &RigidBodyDesc::dynamic()
            .with_mass(1.0)
            .with_position(Vec3::new(0.0, -1.0, 0.0)),
    );
    let joint = world.create_ball_socket_joint(
        &BallSocketJointDesc::new(pivot, bob).with_local_anchor_2(Vec3::Y),
    );
    (world, pivot, bob, joint)
}

fn kick_with_gravity(world: &mut World, body: EntityId) {
    let velocity = world.velocity(body).unwrap();
    world.set_velocity(
        body,
        Velocity::new(velocity.linear + GRAVITY * DT, velocity.angular),
    );
}

#[test]
fn test_pendulum_at_rest_stays_put() {
    let (mut world, _pivot, bob, joint) = make_pendulum();

    for _ in 0..120 {
        world.solve_step(DT);
    }

    let position = world.transform(bob).unwrap().position;
    println!("Rest position after 120 steps: {position:?}");
    assert!(
        (position - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-6,
        "bob drifted to {position:?}"
    );
    assert_eq!(world.joint_impulse(joint).unwrap(), Vec3::ZERO);
}

#[test]
fn test_gravity_pendulum_one_step() {
    let (mut world, _pivot, bob, joint) = make_pendulum();
    world.config.velocity_iterations = 10;
    world.config.position_iterations = 5;
    world.config.warm_start = true;

    kick_with_gravity(&mut world, bob);
    world.solve_step(DT);
    world.profiler.report();

    let residual = world.anchor_velocity_residual(joint).unwrap();
    println!("Anchor velocity residual: {residual:?}");
    assert!(
        residual.length() <= 1e-4,
        "residual too large: {}",
        residual.length()
    );

    let error = world.anchor_position_error(joint).unwrap();
    println!("Anchor position error: {error:?}");
    assert!(error.length() <= 1e-5, "error too large: {}", error.length());
}

#[test]
fn test_static_static_joint_is_inert() {
    let mut world = World::new();
    let a = world.create_body(&RigidBodyDesc::fixed());
    let b = world.create_body(&RigidBodyDesc::fixed().with_position(Vec3::new(0.0, -1.0, 0.0)));
    let joint = world.create_ball_socket_joint(
        &BallSocketJointDesc::new(a, b).with_local_anchor_2(Vec3::Y),
    );

    for _ in 0..30 {
        world.solve_step(DT);
    }

    let row = world.ball_sockets.row_of(joint).unwrap();
    assert_eq!(world.ball_sockets.inverse_mass_matrices[row], Mat3::ZERO);
    assert_eq!(world.joint_impulse(joint).unwrap(), Vec3::ZERO);
    assert_eq!(world.velocity(a).unwrap().linear, Vec3::ZERO);
    assert_eq!(world.velocity(b).unwrap().linear, Vec3::ZERO);
    assert_eq!(
        world.transform(b).unwrap().position,
        Vec3::new(0.0, -1.0, 0.0)
    );
}

#[test]
fn test_singular_configuration_produces_no_nans() {
    // Coincident bodies, zero anchors, zero mass and inertia: K is singular
    // and the joint must degenerate to a no-op instead of dividing by zero.
    let mut world = World::new();
    let degenerate = RigidBodyDesc::dynamic()
        .with_mass(0.0)
        .with_local_inertia(Mat3::ZERO);
    let a = world.create_body(&degenerate.clone());
    let b = world.create_body(&degenerate);
    let joint = world.create_ball_socket_joint(&BallSocketJointDesc::new(a, b));

    world.set_velocity(b, Velocity::new(Vec3::X, Vec3::ZERO));
    for _ in 0..10 {
        world.solve_step(DT);
    }

    let impulse = world.joint_impulse(joint).unwrap();
    assert_eq!(impulse, Vec3::ZERO);

    let velocity = world.velocity(b).unwrap();
    assert!(velocity.linear.is_finite() && velocity.angular.is_finite());
    assert_eq!(velocity.linear, Vec3::X, "solver must not touch a singular row");

    let position = world.transform(b).unwrap().position;
    assert!(position.is_finite());
}

#[test]
fn test_warm_start_iteration_count_converges() {
    // Swinging pendulum: the bob starts off-axis so the joint keeps working.
    let mut world = World::new();
    let pivot = world.create_body(&RigidBodyDesc::fixed());
    let start = Vec3::new(0.6, -0.8, 0.0);
    let bob = world.create_body(&RigidBodyDesc::dynamic().with_position(start));
    let joint = world.create_ball_socket_joint(
        &BallSocketJointDesc::new(pivot, bob).with_local_anchor_2(-start),
    );
    world.config.warm_start = true;

    let mut counts = Vec::new();
    for _ in 0..120 {
        kick_with_gravity(&mut world, bob);

        world.begin_step(DT);
        world.apply_warm_start();

        let mut iterations = 0;
        while world.anchor_velocity_residual(joint).unwrap().length() > 1e-5 {
            world.velocity_iteration();
            iterations += 1;
            assert!(iterations <= 32, "velocity solve failed to converge");
        }
        counts.push(iterations);

        world.integrate_candidates(DT);
        for _ in 0..world.config.position_iterations {
            world.position_iteration();
        }
        world.commit();
    }

    println!("Iteration counts: {:?}", &counts[..10.min(counts.len())]);
    assert!(
        counts[5..].iter().all(|&count| count <= 3),
        "warm-started steps should converge in a few iterations: {counts:?}"
    );
}

#[test]
fn test_lock_factors_freeze_masked_axes() {
    let mut world = World::new();
    let a = world.create_body(
        &RigidBodyDesc::dynamic().with_linear_lock_factors(Vec3::new(1.0, 0.0, 1.0)),
    );
    let b = world.create_body(&RigidBodyDesc::dynamic().with_position(Vec3::new(0.0, -1.0, 0.0)));
    world.create_ball_socket_joint(&BallSocketJointDesc::new(a, b).with_local_anchor_2(Vec3::Y));

    world.set_velocity(a, Velocity::new(Vec3::new(0.0, 2.0, 0.0), Vec3::ZERO));
    world.set_velocity(b, Velocity::new(Vec3::new(0.3, 0.0, -0.1), Vec3::ZERO));

    for _ in 0..30 {
        world.solve_step(DT);
        let velocity = world.velocity(a).unwrap();
        assert_eq!(
            velocity.linear.y, 2.0,
            "locked axis must never be modified by the solver"
        );
    }
}
