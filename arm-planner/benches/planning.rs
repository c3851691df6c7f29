use arm_planner::{
    collision::{create_robot_collision_detector, RobotCollisionDetectorConfig},
    create_ik_solver, generate_random_joint_positions_from_limits, CartesianPlanner,
    CollisionCheck, FromUrdf, IkSolverParameters,
};
use criterion::{criterion_group, criterion_main, Criterion};
use ncollide3d::shape::Compound;

const PREPARED: [f64; 6] = [0.0, 0.3, 0.6, 0.0, 0.6, 0.0];

fn bench_check_environmental_collisions(c: &mut Criterion) {
    let detector = create_robot_collision_detector(
        "sample.urdf",
        &RobotCollisionDetectorConfig::default(),
        vec![],
    )
    .unwrap();
    let limits = detector.robot.iter_joints().map(|j| j.limits).collect();
    let obstacles = Compound::<f64>::from_urdf_file("obstacles.urdf").unwrap();

    c.bench_function("bench_check_environmental_collisions", |b| {
        b.iter(|| {
            let angles = generate_random_joint_positions_from_limits(&limits);
            detector.robot.set_joint_positions(&angles).unwrap();
            detector.env_collision_link_names(&obstacles);
        });
    });
}

fn bench_cartesian_line(c: &mut Criterion) {
    let detector = create_robot_collision_detector(
        "sample.urdf",
        &RobotCollisionDetectorConfig::default(),
        vec![],
    )
    .unwrap();
    let arm = k::SerialChain::from_end(detector.robot.find("tool_joint").unwrap());
    arm.set_joint_positions(&PREPARED).unwrap();
    arm.update_transforms();
    let mut goal = arm.end_transform();
    goal.translation.vector.y += 0.05;
    let planner = CartesianPlanner::new(
        create_ik_solver(&IkSolverParameters::default()),
        k::Constraints::default(),
    );

    c.bench_function("bench_cartesian_line", |b| {
        b.iter(|| {
            let check = CollisionCheck {
                detector: &detector,
                objects: None,
            };
            planner
                .compute(&arm, &PREPARED, &[goal], 0.01, 0.0, Some(check))
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_check_environmental_collisions,
    bench_cartesian_line
);
criterion_main!(benches);
