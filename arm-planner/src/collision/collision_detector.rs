/*
Copyright 2017 Takashi Ogura

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use std::{collections::HashMap, fmt, path::Path};

use ncollide3d::{
    bounding_volume::{BoundingVolume, AABB},
    query,
    shape::{Compound, Shape, ShapeHandle},
};
use tracing::{debug, warn};

use super::{
    to_collision_pose,
    urdf::{urdf_collision_pose, urdf_geometry_to_shape_handle},
    CollisionPose,
};
use crate::errors::*;

type NameShapeMap = HashMap<String, Vec<(ShapeHandle<f64>, CollisionPose)>>;

fn is_close(
    detector: &CollisionDetector,
    pose1: &CollisionPose,
    shape1: &dyn Shape<f64>,
    aabb1: &AABB<f64>,
    pose2: &CollisionPose,
    shape2: &dyn Shape<f64>,
) -> bool {
    // Cheap AABB test first, then the exact distance.
    let aabb2 = shape2.aabb(pose2).loosened(detector.prediction);
    aabb1.intersects(&aabb2) && query::distance(pose1, shape1, pose2, shape2) < detector.prediction
}

/// Lists collisions between a robot and an object
pub struct EnvCollisionNames<'a> {
    detector: &'a CollisionDetector,
    target_shape: &'a dyn Shape<f64>,
    target_pose: &'a CollisionPose,
    joints: Vec<&'a k::Node<f64>>,
    index: usize,
}

impl<'a> EnvCollisionNames<'a> {
    pub fn new(
        detector: &'a CollisionDetector,
        robot: &'a k::Chain<f64>,
        target_shape: &'a dyn Shape<f64>,
        target_pose: &'a CollisionPose,
    ) -> Self {
        robot.update_transforms();
        Self {
            detector,
            target_shape,
            target_pose,
            joints: robot.iter().collect(),
            index: 0,
        }
    }
}

impl Iterator for EnvCollisionNames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(&joint) = self.joints.get(self.index) {
            self.index += 1;
            let Some(joint_pose) = joint.world_transform() else {
                continue;
            };
            // `joint()` holds the node lock, so do not keep it across `world_transform`
            let joint_name = joint.joint().name.clone();
            let Some(shapes) = self.detector.name_collision_model_map.get(&joint_name) else {
                continue;
            };
            let joint_pose = to_collision_pose(&joint_pose);
            let target_aabb = self.target_shape.aabb(self.target_pose);
            for (shape, origin) in shapes {
                let pose = joint_pose * origin;
                if is_close(
                    self.detector,
                    self.target_pose,
                    self.target_shape,
                    &target_aabb,
                    &pose,
                    &**shape,
                ) {
                    debug!("env collision: {joint_name}");
                    return Some(joint_name);
                }
            }
        }
        None
    }
}

/// Lists collisions inside robot links
pub struct SelfCollisionPairs<'a> {
    detector: &'a CollisionDetector,
    robot: &'a k::Chain<f64>,
    self_collision_pairs: &'a [(String, String)],
    index: usize,
}

impl<'a> SelfCollisionPairs<'a> {
    pub fn new(
        detector: &'a CollisionDetector,
        robot: &'a k::Chain<f64>,
        self_collision_pairs: &'a [(String, String)],
    ) -> Self {
        robot.update_transforms();
        Self {
            detector,
            robot,
            self_collision_pairs,
            index: 0,
        }
    }

    fn shapes_with_pose(
        &self,
        joint_name: &str,
    ) -> Option<(&'a [(ShapeHandle<f64>, CollisionPose)], CollisionPose)> {
        let shapes = self.detector.name_collision_model_map.get(joint_name)?;
        let pose = match self
            .robot
            .find(joint_name)
            .and_then(|node| node.world_transform())
        {
            Some(pose) => pose,
            None => {
                warn!("self_colliding: joint {joint_name} not found");
                return None;
            }
        };
        Some((shapes.as_slice(), to_collision_pose(&pose)))
    }
}

impl Iterator for SelfCollisionPairs<'_> {
    type Item = (String, String);

    fn next(&mut self) -> Option<(String, String)> {
        let pairs = self.self_collision_pairs;
        while let Some((j1, j2)) = pairs.get(self.index) {
            self.index += 1;
            let (Some((shapes1, pose1)), Some((shapes2, pose2))) =
                (self.shapes_with_pose(j1), self.shapes_with_pose(j2))
            else {
                continue;
            };
            for (shape1, origin1) in shapes1 {
                let pose1 = pose1 * origin1;
                let aabb1 = shape1.aabb(&pose1);
                for (shape2, origin2) in shapes2 {
                    if is_close(
                        self.detector,
                        &pose1,
                        &**shape1,
                        &aabb1,
                        &(pose2 * origin2),
                        &**shape2,
                    ) {
                        debug!("self collision: {j1} and {j2}");
                        return Some((j1.to_owned(), j2.to_owned()));
                    }
                }
            }
        }
        None
    }
}

/// Collision detector
///
/// Collision shapes are registered by the name of the joint that moves the link.
#[derive(Clone)]
pub struct CollisionDetector {
    name_collision_model_map: NameShapeMap,
    /// margin length for collision detection
    pub prediction: f64,
}

impl fmt::Debug for CollisionDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.name_collision_model_map.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("CollisionDetector")
            .field("joint_names", &names)
            .field("prediction", &self.prediction)
            .finish()
    }
}

impl CollisionDetector {
    /// Create CollisionDetector from HashMap
    pub fn new(name_collision_model_map: NameShapeMap, prediction: f64) -> Self {
        Self {
            name_collision_model_map,
            prediction,
        }
    }

    /// Create CollisionDetector from urdf_rs::Robot
    pub fn from_urdf_robot(urdf_robot: &urdf_rs::Robot, prediction: f64) -> Self {
        let mut name_collision_model_map = HashMap::new();
        let link_joint_map = k::urdf::link_to_joint_map(urdf_robot);
        for l in &urdf_robot.links {
            let col_pose_vec = l
                .collision
                .iter()
                .filter_map(|collision| {
                    urdf_geometry_to_shape_handle(&collision.geometry)
                        .map(|col| (col, urdf_collision_pose(&collision.origin)))
                })
                .collect::<Vec<_>>();
            debug!("name={}, ln={}", l.name, col_pose_vec.len());
            if col_pose_vec.is_empty() {
                continue;
            }
            if let Some(joint_name) = link_joint_map.get(&l.name) {
                name_collision_model_map.insert(joint_name.to_owned(), col_pose_vec);
            }
        }
        Self {
            name_collision_model_map,
            prediction,
        }
    }

    /// Returns true if the link moved by `joint_name` has collision shapes.
    pub fn has_collision_model(&self, joint_name: &str) -> bool {
        self.name_collision_model_map.contains_key(joint_name)
    }

    /// Detects collisions of a robot with an environmental object and returns the names of the link(joint) names
    ///
    /// robot: robot model
    /// target_shape: shape of the environmental object
    /// target_pose: pose of the environmental object
    pub fn detect_env<'a>(
        &'a self,
        robot: &'a k::Chain<f64>,
        target_shape: &'a dyn Shape<f64>,
        target_pose: &'a CollisionPose,
    ) -> EnvCollisionNames<'a> {
        EnvCollisionNames::new(self, robot, target_shape, target_pose)
    }

    /// Detects self collisions and returns the names of the link(joint) names
    ///
    /// robot: robot model
    /// self_collision_pairs: pairs of the names of the link(joint)
    pub fn detect_self<'a>(
        &'a self,
        robot: &'a k::Chain<f64>,
        self_collision_pairs: &'a [(String, String)],
    ) -> SelfCollisionPairs<'a> {
        SelfCollisionPairs::new(self, robot, self_collision_pairs)
    }
}

/// Convert urdf object into arm_planner/ncollide3d object
pub trait FromUrdf {
    fn from_urdf_robot(robot: &urdf_rs::Robot) -> Self;
    fn from_urdf_file<P>(path: P) -> ::std::result::Result<Self, urdf_rs::UrdfError>
    where
        Self: ::std::marker::Sized,
        P: AsRef<Path>,
    {
        Ok(Self::from_urdf_robot(&urdf_rs::read_file(path)?))
    }
}

/// Create `ncollide::shape::Compound` from URDF file
///
/// The `<collision>` elements of every `<link>` are used as obstacles.
/// Joints are ignored, so the origins are expressed in the world frame.
impl FromUrdf for Compound<f64> {
    fn from_urdf_robot(urdf_obstacle: &urdf_rs::Robot) -> Self {
        let compound_data = urdf_obstacle
            .links
            .iter()
            .flat_map(|l| &l.collision)
            .filter_map(|collision| {
                urdf_geometry_to_shape_handle(&collision.geometry)
                    .map(|col| (urdf_collision_pose(&collision.origin), col))
            })
            .collect::<Vec<_>>();
        Compound::new(compound_data)
    }
}

/// Parse args to get self collision pair
///
/// # Example
///
/// ```
/// let pairs = arm_planner::collision::parse_colon_separated_pairs(&vec!["ab:cd".to_owned(), "ab:ef".to_owned()]).unwrap();
/// assert_eq!(pairs.len(), 2);
/// assert_eq!(pairs[0].0, "ab");
/// assert_eq!(pairs[0].1, "cd");
/// assert_eq!(pairs[1].0, "ab");
/// assert_eq!(pairs[1].1, "ef");
/// ```
pub fn parse_colon_separated_pairs(pair_strs: &[String]) -> Result<Vec<(String, String)>> {
    pair_strs
        .iter()
        .map(|pair_str| match pair_str.split_once(':') {
            Some((p1, p2)) if !p1.is_empty() && !p2.is_empty() && !p2.contains(':') => {
                Ok((p1.to_owned(), p2.to_owned()))
            }
            _ => Err(Error::ParseError(pair_str.to_owned())),
        })
        .collect()
}
