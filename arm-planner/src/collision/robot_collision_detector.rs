use std::path::Path;

use ncollide3d::shape::{Compound, Shape};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::CollisionPose;
use crate::{
    collision::{CollisionDetector, EnvCollisionNames, SelfCollisionPairs},
    errors::*,
};

/// CollisionDetector holding robot information
pub struct RobotCollisionDetector {
    /// Robot model instance used for collision detection
    pub robot: k::Chain<f64>,
    /// Collision detector
    pub collision_detector: CollisionDetector,
    /// Optional self collision check node names
    pub self_collision_pairs: Vec<(String, String)>,
}

impl RobotCollisionDetector {
    pub fn new(
        robot: k::Chain<f64>,
        collision_detector: CollisionDetector,
        self_collision_pairs: Vec<(String, String)>,
    ) -> Self {
        Self {
            robot,
            collision_detector,
            self_collision_pairs,
        }
    }

    /// Detects collisions of the robot with an environmental object and returns names of the colliding links(joints)
    pub fn detect_env<'a>(
        &'a self,
        target_shape: &'a dyn Shape<f64>,
        target_pose: &'a CollisionPose,
    ) -> EnvCollisionNames<'a> {
        self.collision_detector
            .detect_env(&self.robot, target_shape, target_pose)
    }

    /// Detects self collisions and returns name pairs of the self-colliding links(joints)
    pub fn detect_self(&self) -> SelfCollisionPairs<'_> {
        self.collision_detector
            .detect_self(&self.robot, &self.self_collision_pairs)
    }

    /// Gets names of links colliding with environmental objects
    pub fn env_collision_link_names(&self, objects: &Compound<f64>) -> Vec<String> {
        objects
            .shapes()
            .iter()
            .flat_map(|(pose, shape)| self.detect_env(&**shape, pose).collect::<Vec<_>>())
            .collect()
    }

    /// Gets names of self-colliding links
    pub fn self_collision_link_pairs(&self) -> Vec<(String, String)> {
        self.detect_self().collect()
    }

    /// Returns whether any collision of the robot with environmental objects is detected or not
    pub fn is_env_collision_detected(&self, objects: &Compound<f64>) -> bool {
        objects
            .shapes()
            .iter()
            .any(|(pose, shape)| self.detect_env(&**shape, pose).next().is_some())
    }

    /// Returns whether any self collision of the robot is detected or not
    pub fn is_self_collision_detected(&self) -> bool {
        self.detect_self().next().is_some()
    }

    /// Returns whether any collision is detected or not
    ///
    /// Only self collisions are checked when `objects` is `None`.
    pub fn is_collision_detected(&self, objects: Option<&Compound<f64>>) -> bool {
        objects.is_some_and(|objects| self.is_env_collision_detected(objects))
            || self.is_self_collision_detected()
    }
}

/// Configuration struct for RobotCollisionDetector
#[derive(Clone, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RobotCollisionDetectorConfig {
    #[serde(default = "default_prediction")]
    pub prediction: f64,
}

fn default_prediction() -> f64 {
    0.001
}

impl RobotCollisionDetectorConfig {
    pub fn new(prediction: f64) -> Self {
        Self { prediction }
    }
}

impl Default for RobotCollisionDetectorConfig {
    fn default() -> Self {
        Self {
            prediction: default_prediction(),
        }
    }
}

pub fn create_robot_collision_detector<P: AsRef<Path>>(
    urdf_path: P,
    config: &RobotCollisionDetectorConfig,
    self_collision_pairs: Vec<(String, String)>,
) -> Result<RobotCollisionDetector> {
    let urdf_robot = urdf_rs::read_file(urdf_path)?;
    Ok(create_robot_collision_detector_from_urdf(
        &urdf_robot,
        config,
        self_collision_pairs,
    ))
}

pub fn create_robot_collision_detector_from_urdf(
    urdf_robot: &urdf_rs::Robot,
    config: &RobotCollisionDetectorConfig,
    self_collision_pairs: Vec<(String, String)>,
) -> RobotCollisionDetector {
    let robot = k::Chain::<f64>::from(urdf_robot);
    let collision_detector = CollisionDetector::from_urdf_robot(urdf_robot, config.prediction);
    RobotCollisionDetector::new(robot, collision_detector, self_collision_pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::FromUrdf;

    #[test]
    fn test_robot_collision_detector() {
        let detector = create_robot_collision_detector(
            "sample.urdf",
            &RobotCollisionDetectorConfig::default(),
            vec![("joint2".into(), "joint3".into())],
        )
        .unwrap();

        detector.robot.set_joint_positions_clamped(&[0.0; 6]);
        assert!(detector.is_self_collision_detected());
        assert!(detector.is_collision_detected(None));

        detector
            .robot
            .set_joint_positions_clamped(&[0.0, 0.0, -1.0, 0.0, 0.0, 0.0]);
        assert!(!detector.is_self_collision_detected());
        assert!(detector.self_collision_link_pairs().is_empty());

        let obstacles = Compound::<f64>::from_urdf_file("obstacles.urdf").unwrap();
        assert!(!detector.is_env_collision_detected(&obstacles));
        assert!(!detector.is_collision_detected(Some(&obstacles)));
    }

    #[test]
    fn test_table_collision() {
        let detector = create_robot_collision_detector(
            "sample.urdf",
            &RobotCollisionDetectorConfig::new(0.001),
            vec![],
        )
        .unwrap();
        let obstacles = Compound::<f64>::from_urdf_file("obstacles.urdf").unwrap();
        // Leaning forward with the forearm pointing down pushes the wrist into the table.
        detector
            .robot
            .set_joint_positions_clamped(&[0.0, 1.3, 0.3, 0.0, 0.0, 0.0]);
        let names = detector.env_collision_link_names(&obstacles);
        assert!(names.contains(&"joint5".to_owned()), "{names:?}");
        assert!(!names.contains(&"root".to_owned()));
        assert!(detector.is_collision_detected(Some(&obstacles)));
    }

    #[test]
    fn test_missing_urdf() {
        assert!(matches!(
            create_robot_collision_detector(
                "not_found.urdf",
                &RobotCollisionDetectorConfig::default(),
                vec![]
            ),
            Err(Error::Urdf { .. })
        ));
    }
}
