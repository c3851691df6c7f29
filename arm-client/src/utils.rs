use std::time::Duration;

use arm_interface::TrajectoryPoint;
use arm_planner::TimedJointPoint;

pub fn isometry(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> k::Isometry3<f64> {
    k::Isometry3::from_parts(
        k::Translation3::new(x, y, z),
        k::UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}

/// Converts time parameterized joint points to controller trajectory points.
pub fn to_trajectory_points(points: Vec<TimedJointPoint>) -> Vec<TrajectoryPoint> {
    points
        .into_iter()
        .map(|p| {
            TrajectoryPoint::new(p.positions, Duration::from_secs_f64(p.time_from_start))
                .with_velocities(p.velocities)
                .with_accelerations(p.accelerations)
        })
        .collect()
}

/// Distance between two poses as (translation [m], rotation [rad]).
pub fn pose_distance(a: &k::Isometry3<f64>, b: &k::Isometry3<f64>) -> (f64, f64) {
    (
        (a.translation.vector - b.translation.vector).norm(),
        a.rotation.angle_to(&b.rotation),
    )
}
