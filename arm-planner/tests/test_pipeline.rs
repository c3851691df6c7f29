use arm_planner::{
    collision::parse_colon_separated_pairs, create_ik_solver, create_joint_path_planner,
    generate_clamped_joint_positions_from_limits, interpolate, velocity_limits_from_urdf,
    CartesianPlanner, CollisionCheck, FromUrdf, IkSolverParameters, JointPathPlannerConfig,
    TimeParameterization,
};
use assert_approx_eq::assert_approx_eq;
use ncollide3d::shape::Compound;

const PREPARED: [f64; 6] = [0.0, 0.3, 0.6, 0.0, 0.6, 0.0];

fn joint_names() -> Vec<String> {
    (1..=6).map(|i| format!("joint{i}")).collect()
}

#[flaky_test::flaky_test]
fn test_joint_path_to_timed_trajectory() {
    let urdf_robot = urdf_rs::read_file("sample.urdf").unwrap();
    let pairs = parse_colon_separated_pairs(&["root:joint6".to_owned()]).unwrap();
    let planner =
        create_joint_path_planner(&urdf_robot, pairs, &JointPathPlannerConfig::default()).unwrap();
    let obstacles = Compound::<f64>::from_urdf_file("obstacles.urdf").unwrap();

    let path = planner
        .plan(&joint_names(), &[0.0; 6], &PREPARED, Some(&obstacles))
        .unwrap();
    let dense = if path.len() > 1 {
        interpolate(&path, 1.0, 0.05)
            .unwrap()
            .into_iter()
            .map(|p| p.position)
            .collect()
    } else {
        path
    };
    let limits = planner
        .collision_check_robot()
        .iter_joints()
        .map(|j| j.limits)
        .collect();
    let dense = dense
        .iter()
        .map(|p| generate_clamped_joint_positions_from_limits(p, &limits))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let velocities = velocity_limits_from_urdf(&urdf_robot, &joint_names()).unwrap();
    let tp = TimeParameterization::new(velocities, vec![2.0; 6]).unwrap();
    let trajectory = tp.parameterize(&dense, 0.2, 0.2).unwrap();
    assert_eq!(trajectory.len(), dense.len());
    for w in trajectory.windows(2) {
        assert!(w[1].time_from_start > w[0].time_from_start);
    }
    let last = trajectory.last().unwrap();
    for (q, goal) in last.positions.iter().zip(PREPARED) {
        assert_approx_eq!(*q, goal, 1e-6);
    }
}

#[test]
fn test_cartesian_path_with_obstacles_file() {
    let urdf_robot = urdf_rs::read_file("sample.urdf").unwrap();
    let planner =
        create_joint_path_planner(&urdf_robot, vec![], &JointPathPlannerConfig::default()).unwrap();
    let obstacles = Compound::<f64>::from_urdf_file("obstacles.urdf").unwrap();
    let arm = k::SerialChain::from_end(planner.collision_check_robot().find("tool_joint").unwrap());
    arm.set_joint_positions(&PREPARED).unwrap();
    arm.update_transforms();
    let start = arm.end_transform();

    let parameters = IkSolverParameters {
        allowable_position_error: 0.001,
        allowable_angle_error: 0.01,
        ..Default::default()
    };
    let cartesian = CartesianPlanner::new(create_ik_solver(&parameters), k::Constraints::default());
    let check = CollisionCheck {
        detector: planner.robot_collision_detector(),
        objects: Some(&obstacles),
    };

    // going down hits the table
    let mut down = start;
    down.translation.vector.z -= 0.3;
    let plan = cartesian
        .compute(&arm, &PREPARED, &[down], 0.01, 0.0, Some(check))
        .unwrap();
    assert!(plan.fraction > 0.3 && plan.fraction < 1.0, "{}", plan.fraction);

    // a small sideways move is free
    let mut side = start;
    side.translation.vector.y += 0.04;
    let plan = cartesian
        .compute(&arm, &PREPARED, &[side], 0.01, 0.0, Some(check))
        .unwrap();
    assert_approx_eq!(plan.fraction, 1.0);
}
