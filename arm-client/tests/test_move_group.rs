use std::{sync::Arc, time::Duration};

use arm_client::{AsyncSpinner, Error, MoveGroup, MoveGroupConfig, RobotTrajectory};
use arm_interface::{DummyJointTrajectoryClient, JointTrajectoryClient};
use arm_planner::FromUrdf;
use assert_approx_eq::assert_approx_eq;
use ncollide3d::shape::Compound;

const URDF_PATH: &str = "../arm-planner/sample.urdf";
const OBSTACLES_PATH: &str = "../arm-planner/obstacles.urdf";
const PREPARED: [f64; 6] = [0.0, 0.3, 0.6, 0.0, 0.6, 0.0];

fn joint_names() -> Vec<String> {
    (1..=6).map(|i| format!("joint{i}")).collect()
}

fn config() -> MoveGroupConfig {
    let mut config = MoveGroupConfig::new("tool_joint");
    config
        .named_targets
        .insert("prepared".to_owned(), PREPARED.to_vec());
    config.self_collision_pairs = vec!["root:joint6".to_owned(), "joint2:joint6".to_owned()];
    config.max_velocity_scaling_factor = 0.5;
    config.max_acceleration_scaling_factor = 0.5;
    config
}

fn move_group_at(positions: &[f64]) -> MoveGroup<Arc<DummyJointTrajectoryClient>> {
    let client = Arc::new(
        DummyJointTrajectoryClient::new(joint_names())
            .with_initial_positions(positions.to_vec())
            .unwrap(),
    );
    MoveGroup::from_urdf_file(client, URDF_PATH, config()).unwrap()
}

fn end_pose_by_model(positions: &[f64]) -> k::Isometry3<f64> {
    let chain = k::Chain::<f64>::from_urdf_file(URDF_PATH).unwrap();
    let arm = k::SerialChain::from_end(chain.find("tool_joint").unwrap());
    arm.set_joint_positions(positions).unwrap();
    arm.update_transforms();
    arm.end_transform()
}

#[test]
fn test_accessors() {
    let mut move_group = move_group_at(&[0.0; 6]);
    assert_eq!(move_group.name(), "manipulator");
    assert_eq!(move_group.end_effector_link(), "tool0");
    assert_eq!(move_group.joint_names(), joint_names().as_slice());
    assert_eq!(move_group.named_targets(), vec!["prepared".to_owned()]);
    assert_eq!(move_group.pose_reference_frame(), "base_link");

    move_group.set_pose_reference_frame("link1").unwrap();
    assert_eq!(move_group.pose_reference_frame(), "link1");
    assert!(matches!(
        move_group.set_pose_reference_frame("no_link"),
        Err(Error::NoFrame(_))
    ));
    assert_eq!(move_group.pose_reference_frame(), "link1");

    move_group.remember_joint_values("home", vec![0.0; 6]).unwrap();
    assert_eq!(move_group.named_target_values("home"), Some([0.0; 6].as_slice()));
    assert!(move_group.remember_joint_values("bad", vec![0.0; 2]).is_err());
}

#[test]
fn test_joint_names_mismatch() {
    let client = DummyJointTrajectoryClient::new(vec!["joint1".to_owned()]);
    assert!(matches!(
        MoveGroup::from_urdf_file(client, URDF_PATH, config()),
        Err(Error::JointNamesMismatch { .. })
    ));

    let client = DummyJointTrajectoryClient::new(joint_names());
    let mut config = config();
    config.ik_target = "no_joint".to_owned();
    assert!(matches!(
        MoveGroup::from_urdf_file(client, URDF_PATH, config),
        Err(Error::NoJoint(_))
    ));
}

#[test]
fn test_targets() {
    let mut move_group = move_group_at(&[0.0; 6]);
    assert!(move_group.target().is_none());
    assert!(matches!(move_group.plan(), Err(Error::NoTarget)));
    assert!(matches!(
        move_group.set_named_target("unknown"),
        Err(Error::NoNamedTarget(_))
    ));
    move_group.set_named_target("prepared").unwrap();
    assert_eq!(move_group.target(), Some(PREPARED.as_slice()));

    assert!(matches!(
        move_group.set_joint_value_target(vec![0.0; 3]),
        Err(Error::MismatchedLength(3, 6))
    ));
    assert!(matches!(
        move_group.set_joint_value_target(vec![0.0, 3.0, 0.0, 0.0, 0.0, 0.0]),
        Err(Error::TargetOutOfLimits(_))
    ));
    // the previous target is kept
    assert_eq!(move_group.target(), Some(PREPARED.as_slice()));
}

#[test]
fn test_scaling_factors_and_tolerances() {
    let mut move_group = move_group_at(&[0.0; 6]);
    assert_approx_eq!(move_group.max_velocity_scaling_factor(), 0.5);
    move_group.set_max_velocity_scaling_factor(0.2);
    move_group.set_max_acceleration_scaling_factor(0.2);
    assert_approx_eq!(move_group.max_velocity_scaling_factor(), 0.2);
    assert_approx_eq!(move_group.max_acceleration_scaling_factor(), 0.2);
    move_group.set_max_velocity_scaling_factor(0.0);
    move_group.set_max_acceleration_scaling_factor(2.0);
    assert_approx_eq!(move_group.max_velocity_scaling_factor(), 1.0);
    assert_approx_eq!(move_group.max_acceleration_scaling_factor(), 1.0);

    move_group.set_goal_position_tolerance(0.001);
    move_group.set_goal_orientation_tolerance(0.01);
    assert_approx_eq!(move_group.goal_position_tolerance(), 0.001);
    assert_approx_eq!(move_group.goal_orientation_tolerance(), 0.01);
    move_group.set_goal_tolerance(0.002);
    assert_approx_eq!(move_group.goal_joint_tolerance(), 0.002);
}

#[test]
fn test_current_pose() {
    let mut move_group = move_group_at(&PREPARED);
    assert_eq!(move_group.current_joint_values().unwrap(), PREPARED.to_vec());
    let expected = end_pose_by_model(&PREPARED);
    let pose = move_group.current_pose(None).unwrap();
    assert_eq!(pose.frame_id, "base_link");
    assert_approx_eq!(pose.pose.translation.vector.x, expected.translation.vector.x);
    assert_approx_eq!(pose.pose.translation.vector.z, expected.translation.vector.z);
    assert_approx_eq!(pose.pose.rotation.angle_to(&expected.rotation), 0.0);

    // joint2, joint3 and joint5 pitch the tool about y, joint1, joint4 and joint6 are zero
    let pitch = PREPARED[1] + PREPARED[2] + PREPARED[4];
    let by_pitch = k::UnitQuaternion::from_axis_angle(&k::Vector3::y_axis(), pitch);
    assert_approx_eq!(pose.pose.rotation.angle_to(&by_pitch), 0.0);
    let x_axis = pose.pose.rotation * k::Vector3::x();
    assert_approx_eq!(x_axis.x, pitch.cos());
    assert_approx_eq!(x_axis.z, -pitch.sin());

    let link6 = move_group.current_pose(Some("link6")).unwrap();
    assert!(link6.pose.translation.vector.z > pose.pose.translation.vector.z);
    assert!(matches!(
        move_group.current_pose(Some("no_link")),
        Err(Error::NoFrame(_))
    ));

    move_group.set_pose_reference_frame("link6").unwrap();
    let relative = move_group.current_pose(None).unwrap();
    assert_eq!(relative.frame_id, "link6");
    assert_approx_eq!(
        relative.pose.translation.vector.norm(),
        (pose.pose.translation.vector - link6.pose.translation.vector).norm()
    );
}

#[tokio::test]
async fn test_move_to_named_target() {
    let mut move_group = move_group_at(&[0.0; 6]);
    move_group.set_named_target("prepared").unwrap();
    let plan = move_group.plan().unwrap();
    assert_eq!(plan.start_positions, vec![0.0; 6]);
    assert!(plan.trajectory.len() >= 2);
    assert_eq!(plan.trajectory.joint_names, joint_names());
    for w in plan.trajectory.points.windows(2) {
        assert!(w[1].time_from_start > w[0].time_from_start);
    }
    let last = plan.trajectory.points.last().unwrap();
    for (q, goal) in last.positions.iter().zip(PREPARED) {
        assert_approx_eq!(*q, goal, 1e-6);
    }

    move_group.execute(&plan).await.unwrap();
    let positions = move_group.client().current_joint_positions().unwrap();
    for (q, goal) in positions.iter().zip(PREPARED) {
        assert_approx_eq!(*q, goal, 1e-6);
    }

    // already there
    move_group.allow_replanning(true);
    move_group.move_to_target().await.unwrap();
}

#[tokio::test]
async fn test_cartesian_path() {
    let mut move_group = move_group_at(&PREPARED);
    move_group.set_max_velocity_scaling_factor(0.2);
    move_group.set_max_acceleration_scaling_factor(0.2);
    move_group.set_goal_position_tolerance(0.001);
    move_group.set_goal_orientation_tolerance(0.01);
    let start = move_group.current_pose(None).unwrap().pose;
    let mut side = start;
    side.translation.vector.y += 0.03;
    let mut forward = side;
    forward.translation.vector.x += 0.02;

    let path = move_group
        .compute_cartesian_path(&[side, forward], 0.01, 0.0)
        .unwrap();
    assert_approx_eq!(path.fraction, 1.0);
    assert!(path.trajectory.len() >= 6);
    let velocity_limits = [1.5, 1.5, 2.0, 3.0, 3.0, 3.0];
    for point in &path.trajectory.points {
        for (v, limit) in point.velocities.as_ref().unwrap().iter().zip(velocity_limits) {
            assert!(v.abs() <= limit * 0.2 + 1e-6);
        }
    }
    for w in path.trajectory.points.windows(2) {
        assert!(w[1].time_from_start > w[0].time_from_start);
    }

    move_group.execute_trajectory(&path.trajectory).await.unwrap();
    let reached = move_group.current_pose(None).unwrap().pose;
    assert!((reached.translation.vector - forward.translation.vector).norm() < 0.002);
}

#[tokio::test]
async fn test_cartesian_path_in_other_frame() {
    let mut move_group = move_group_at(&PREPARED);
    move_group.set_pose_reference_frame("link1").unwrap();
    let start = move_group.current_pose(None).unwrap().pose;
    let mut waypoint = start;
    waypoint.translation.vector.z += 0.03;
    let path = move_group
        .compute_cartesian_path(&[waypoint], 0.01, 0.0)
        .unwrap();
    assert_approx_eq!(path.fraction, 1.0);
    move_group.execute_trajectory(&path.trajectory).await.unwrap();
    let reached = move_group.current_pose(None).unwrap().pose;
    assert!((reached.translation.vector - waypoint.translation.vector).norm() < 0.01);
}

#[test]
fn test_cartesian_path_into_obstacle() {
    let mut move_group = move_group_at(&PREPARED);
    move_group.set_obstacles(Compound::<f64>::from_urdf_file(OBSTACLES_PATH).unwrap());
    let start = move_group.current_pose(None).unwrap().pose;
    let mut down = start;
    down.translation.vector.z -= 0.3;
    let path = move_group.compute_cartesian_path(&[down], 0.01, 0.0).unwrap();
    assert!(path.fraction > 0.0 && path.fraction < 1.0, "{}", path.fraction);

    assert!(move_group.compute_cartesian_path(&[], 0.01, 0.0).is_err());
    assert!(move_group.compute_cartesian_path(&[down], 0.0, 0.0).is_err());

    move_group.clear_obstacles();
    let path = move_group.compute_cartesian_path(&[down], 0.01, 0.0).unwrap();
    assert!(path.fraction > 0.0);
}

#[tokio::test]
async fn test_execute_checks() {
    let move_group = move_group_at(&[0.0; 6]);
    assert!(matches!(
        move_group
            .execute_trajectory(&RobotTrajectory::default())
            .await,
        Err(Error::EmptyTrajectory)
    ));

    let mut trajectory = RobotTrajectory {
        joint_names: joint_names(),
        points: vec![
            arm_interface::TrajectoryPoint::new(PREPARED.to_vec(), Duration::ZERO),
            arm_interface::TrajectoryPoint::new(vec![0.0; 6], Duration::from_secs(1)),
        ],
    };
    assert!(matches!(
        move_group.execute_trajectory(&trajectory).await,
        Err(Error::StartStateMismatch { .. })
    ));
    assert!(move_group.client().last_trajectory.lock().unwrap().is_empty());

    trajectory.joint_names.reverse();
    assert!(matches!(
        move_group.execute_trajectory(&trajectory).await,
        Err(Error::JointNamesMismatch { .. })
    ));
}

#[tokio::test]
async fn test_target_in_collision() {
    let mut move_group = move_group_at(&[0.0; 6]);
    move_group.set_obstacles(Compound::<f64>::from_urdf_file(OBSTACLES_PATH).unwrap());
    move_group
        .set_joint_value_target(vec![0.0, 1.3, 0.3, 0.0, 0.0, 0.0])
        .unwrap();
    move_group.allow_replanning(true);
    move_group.set_replan_attempts(2);
    assert!(matches!(
        move_group.move_to_target().await,
        Err(Error::Planner(arm_planner::Error::Collision { .. }))
    ));
    assert_eq!(
        move_group.client().current_joint_positions().unwrap(),
        vec![0.0; 6]
    );
}

#[tokio::test]
async fn test_with_spinner() {
    let client = Arc::new(DummyJointTrajectoryClient::new(joint_names()).with_playback(4.0));
    let mut spinner = AsyncSpinner::start(client.clone(), Duration::from_millis(5)).unwrap();
    let mut move_group = MoveGroup::from_urdf_file(client.clone(), URDF_PATH, config())
        .unwrap()
        .with_state_monitor(spinner.monitor());
    move_group.set_max_velocity_scaling_factor(1.0);
    move_group.set_max_acceleration_scaling_factor(1.0);

    move_group
        .set_joint_value_target(vec![0.2, 0.0, 0.0, 0.0, 0.0, 0.0])
        .unwrap();
    move_group.move_to_target().await.unwrap();
    assert_approx_eq!(move_group.current_joint_values().unwrap()[0], 0.2, 1e-6);
    spinner.stop();
    // falls back to the controller
    assert_approx_eq!(move_group.current_joint_values().unwrap()[0], 0.2, 1e-6);
}
