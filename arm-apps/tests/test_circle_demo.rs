use std::path::Path;

use arm_apps::{utils::resolve_circle_demo_config, CircleDemoConfig, DemoRobot};
use arm_interface::JointTrajectoryClient;

const SAMPLE_CONFIG: &str = "config/sample_circle_demo.toml";
const PREPARED: [f64; 6] = [0.0, 0.3, 0.6, 0.0, 0.6, 0.0];

fn assert_at_prepared(robot: &DemoRobot) {
    let positions = robot.move_group.current_joint_values().unwrap();
    for (p, q) in positions.iter().zip(PREPARED) {
        assert!((p - q).abs() < 1e-3, "{positions:?}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_circle_demo() {
    let config = resolve_circle_demo_config(
        Some(Path::new(SAMPLE_CONFIG)),
        Some("controller.playback_speed =; demo.settle_time_sec = 0.0"),
    )
    .unwrap();
    let mut robot = DemoRobot::new(&config).unwrap();
    let report = robot.run(&config.demo).await.unwrap();

    assert!(report.executed);
    assert_eq!(report.fraction, 1.0);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.num_waypoints, 35);
    assert_at_prepared(&robot);
    assert!(!robot.move_group.client().last_trajectory.lock().unwrap().is_empty());

    robot.shutdown();
    assert!(!robot.spinner.is_running());
}

/// A small box on the far side of the arc, clear of the prepared pose.
const BLOCKER_URDF: &str = r#"<?xml version="1.0"?>
<robot name="blocker">
  <link name="blocker">
    <collision>
      <origin xyz="0.312 0.035 0.19" rpy="0 0 0"/>
      <geometry><box size="0.016 0.016 0.04"/></geometry>
    </collision>
  </link>
</robot>
"#;

#[tokio::test(flavor = "multi_thread")]
async fn test_circle_demo_blocked() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("blocker.urdf"), BLOCKER_URDF).unwrap();
    let urdf_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../arm-planner/sample.urdf");
    let config_path = dir.path().join("demo.toml");
    let mut config = CircleDemoConfig::default();
    config.urdf_path = urdf_path.to_string_lossy().into_owned();
    config.obstacles_urdf_path = Some("blocker.urdf".to_owned());
    config.controller.initial_positions = Some(PREPARED.to_vec());
    config.demo.max_tries = 3;
    config.demo.log_interval = 2;
    config.demo.settle_time_sec = 0.0;
    std::fs::write(&config_path, toml::to_string(&config).unwrap()).unwrap();

    let config = CircleDemoConfig::try_new(&config_path).unwrap();
    assert_eq!(
        config.obstacles_urdf_full_path(),
        Some(dir.path().join("blocker.urdf").as_path())
    );
    let mut robot = DemoRobot::new(&config).unwrap();
    let report = robot.run(&config.demo).await.unwrap();

    assert!(!report.executed);
    assert_eq!(report.attempts, 3);
    assert!(report.fraction > 0.0, "{report:?}");
    assert!(report.fraction < 1.0, "{report:?}");
    assert_at_prepared(&robot);
    assert_eq!(
        robot.move_group.client().current_joint_positions().unwrap().len(),
        6
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_named_target() {
    let mut config = CircleDemoConfig::default();
    config.urdf_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../arm-planner/sample.urdf")
        .to_string_lossy()
        .into_owned();
    config.demo.named_target = "unknown".to_owned();
    let mut robot = DemoRobot::new(&config).unwrap();
    assert!(robot.run(&config.demo).await.is_err());
}
