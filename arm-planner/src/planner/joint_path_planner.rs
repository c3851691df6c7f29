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
use std::path::Path;

use ncollide3d::shape::Compound;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    collision::{CollisionDetector, RobotCollisionDetector},
    errors::*,
    funcs::*,
};

/// Creates a serial chain of `joint_names` sharing the nodes of `robot`.
///
/// The names must form a connected chain ordered from the root side.
pub fn create_chain_from_joint_names(
    robot: &k::Chain<f64>,
    joint_names: &[String],
) -> Result<k::SerialChain<f64>> {
    let (first, last) = match (joint_names.first(), joint_names.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(Error::Other { error: "no joint names".to_owned() }),
    };
    let end = robot
        .find(last)
        .ok_or_else(|| Error::NotFound(last.to_owned()))?;
    let root = robot
        .find(first)
        .ok_or_else(|| Error::NotFound(first.to_owned()))?;
    let chain = k::SerialChain::from_end_to_root(end, root);
    let names = chain
        .iter_joints()
        .map(|j| j.name.clone())
        .collect::<Vec<_>>();
    if names != joint_names {
        return Err(Error::Other {
            error: format!("{joint_names:?} is not a serial chain (found {names:?})"),
        });
    }
    Ok(chain)
}

/// Collision Avoidance Path Planner
pub struct JointPathPlanner {
    /// Robot collision detector
    robot_collision_detector: RobotCollisionDetector,
    /// Unit length for searching
    ///
    /// If the value is large, the path become sparse.
    pub step_length: f64,
    /// Max num of RRT search loop
    pub max_try: usize,
    /// Num of path smoothing trials
    pub num_smoothing: usize,
}

impl JointPathPlanner {
    /// Create `JointPathPlanner`
    pub fn new(
        robot_collision_detector: RobotCollisionDetector,
        step_length: f64,
        max_try: usize,
        num_smoothing: usize,
    ) -> Self {
        Self {
            robot_collision_detector,
            step_length,
            max_try,
            num_smoothing,
        }
    }

    /// Check if the joint_positions are OK
    fn is_feasible(
        &self,
        using_joints: &k::SerialChain<f64>,
        joint_positions: &[f64],
        objects: Option<&Compound<f64>>,
    ) -> bool {
        match using_joints.set_joint_positions(joint_positions) {
            Ok(()) => !self.robot_collision_detector.is_collision_detected(objects),
            Err(err) => {
                debug!("is_feasible: {err}");
                false
            }
        }
    }

    fn collision_error(
        &self,
        point: UnfeasibleTrajectoryPoint,
        objects: Option<&Compound<f64>>,
    ) -> Error {
        let collision_link_names = objects
            .map(|objects| self.env_collision_link_names(objects))
            .unwrap_or_default();
        if collision_link_names.is_empty() {
            Error::SelfCollision {
                point,
                collision_link_names: self.self_collision_link_pairs(),
            }
        } else {
            Error::Collision {
                point,
                collision_link_names,
            }
        }
    }

    /// Plan the sequence of joint angles of `using_joint_names`
    ///
    /// # Arguments
    ///
    /// - `using_joint_names`: part of collision_check_robot. the dof of the following angles must be same as this chain.
    /// - `start_angles`: initial joint angles of `using_joints`.
    /// - `goal_angles`: goal joint angles of `using_joints`.
    /// - `objects`: The collision between `self.collision_check_robot` and `objects` will be checked.
    ///   Only self collisions are checked if it is `None`.
    pub fn plan(
        &self,
        using_joint_names: &[String],
        start_angles: &[f64],
        goal_angles: &[f64],
        objects: Option<&Compound<f64>>,
    ) -> Result<Vec<Vec<f64>>> {
        let using_joints =
            create_chain_from_joint_names(self.collision_check_robot(), using_joint_names)?;
        let dof = using_joints.dof();
        if start_angles.len() != dof {
            return Err(Error::DofMismatch(start_angles.len(), dof));
        }
        if goal_angles.len() != dof {
            return Err(Error::DofMismatch(goal_angles.len(), dof));
        }
        let limits = using_joints.iter_joints().map(|j| j.limits).collect();
        let current_angles = using_joints.joint_positions();

        for (angles, point) in [
            (start_angles, UnfeasibleTrajectoryPoint::Start),
            (goal_angles, UnfeasibleTrajectoryPoint::Goal),
        ] {
            if !self.is_feasible(&using_joints, angles, objects) {
                let err = self.collision_error(point, objects);
                using_joints.set_joint_positions_clamped(&current_angles);
                return Err(err);
            }
        }

        let mut path = match rrt::dual_rrt_connect(
            start_angles,
            goal_angles,
            |angles: &[f64]| self.is_feasible(&using_joints, angles, objects),
            || generate_random_joint_positions_from_limits(&limits),
            self.step_length,
            self.max_try,
        ) {
            Ok(p) => p,
            Err(error) => {
                using_joints.set_joint_positions_clamped(&current_angles);
                return Err(Error::PathPlanFail(error));
            }
        };
        rrt::smooth_path(
            &mut path,
            |angles: &[f64]| self.is_feasible(&using_joints, angles, objects),
            self.step_length,
            self.num_smoothing,
        );
        debug!("planned {} points", path.len());

        // The joint positions of using_joint can be changed in the smoothing,
        // so we need to surely set the goal at the end.
        using_joints.set_joint_positions(goal_angles)?;
        Ok(path)
    }

    /// Calculate the transforms of all of the links
    pub fn update_transforms(&self) -> Vec<k::Isometry3<f64>> {
        self.collision_check_robot().update_transforms()
    }

    /// Get the names of the joints
    pub fn joint_names(&self) -> Vec<String> {
        self.collision_check_robot()
            .iter_joints()
            .map(|j| j.name.clone())
            .collect()
    }

    /// Get the robot model used for collision checking
    pub fn collision_check_robot(&self) -> &k::Chain<f64> {
        &self.robot_collision_detector.robot
    }

    pub fn robot_collision_detector(&self) -> &RobotCollisionDetector {
        &self.robot_collision_detector
    }

    /// Get names of links colliding with environmental objects
    pub fn env_collision_link_names(&self, objects: &Compound<f64>) -> Vec<String> {
        self.robot_collision_detector
            .env_collision_link_names(objects)
    }

    /// Get names of self-colliding links
    pub fn self_collision_link_pairs(&self) -> Vec<(String, String)> {
        self.robot_collision_detector.self_collision_link_pairs()
    }
}

/// Builder pattern to create `JointPathPlanner`
pub struct JointPathPlannerBuilder {
    robot_collision_detector: RobotCollisionDetector,
    step_length: f64,
    max_try: usize,
    num_smoothing: usize,
    collision_check_margin: Option<f64>,
    self_collision_pairs: Vec<(String, String)>,
}

impl JointPathPlannerBuilder {
    /// Create from components
    ///
    /// There are also some utility functions to create from urdf
    pub fn new(robot_collision_detector: RobotCollisionDetector) -> Self {
        Self {
            robot_collision_detector,
            step_length: default_step_length(),
            max_try: default_max_try(),
            num_smoothing: default_num_smoothing(),
            collision_check_margin: None,
            self_collision_pairs: vec![],
        }
    }

    pub fn collision_check_margin(mut self, length: f64) -> Self {
        self.collision_check_margin = Some(length);
        self
    }

    pub fn step_length(mut self, step_length: f64) -> Self {
        self.step_length = step_length;
        self
    }

    pub fn max_try(mut self, max_try: usize) -> Self {
        self.max_try = max_try;
        self
    }

    pub fn num_smoothing(mut self, num_smoothing: usize) -> Self {
        self.num_smoothing = num_smoothing;
        self
    }

    pub fn self_collision_pairs(mut self, self_collision_pairs: Vec<(String, String)>) -> Self {
        self.self_collision_pairs = self_collision_pairs;
        self
    }

    pub fn finalize(mut self) -> Result<JointPathPlanner> {
        if self.step_length <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "step_length must be positive: {}",
                self.step_length
            )));
        }
        if let Some(margin) = self.collision_check_margin {
            self.robot_collision_detector.collision_detector.prediction = margin;
        }
        self.robot_collision_detector.self_collision_pairs = self.self_collision_pairs;
        Ok(JointPathPlanner::new(
            self.robot_collision_detector,
            self.step_length,
            self.max_try,
            self.num_smoothing,
        ))
    }

    /// Try to create `JointPathPlannerBuilder` instance from URDF file
    pub fn from_urdf_file<P>(file: P) -> Result<JointPathPlannerBuilder>
    where
        P: AsRef<Path>,
    {
        let urdf_robot = urdf_rs::read_file(file)?;
        Ok(JointPathPlannerBuilder::from_urdf_robot(&urdf_robot))
    }

    /// Try to create `JointPathPlannerBuilder` instance from `urdf_rs::Robot` instance
    pub fn from_urdf_robot(urdf_robot: &urdf_rs::Robot) -> JointPathPlannerBuilder {
        let robot = k::Chain::from(urdf_robot);
        let collision_detector = CollisionDetector::from_urdf_robot(urdf_robot, default_margin());
        let robot_collision_detector =
            RobotCollisionDetector::new(robot, collision_detector, vec![]);
        JointPathPlannerBuilder::new(robot_collision_detector)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JointPathPlannerConfig {
    #[serde(default = "default_step_length")]
    pub step_length: f64,
    #[serde(default = "default_max_try")]
    pub max_try: usize,
    #[serde(default = "default_num_smoothing")]
    pub num_smoothing: usize,
    #[serde(default = "default_margin")]
    pub margin: f64,
}

fn default_step_length() -> f64 {
    0.1
}

fn default_max_try() -> usize {
    5000
}

fn default_num_smoothing() -> usize {
    100
}

fn default_margin() -> f64 {
    0.001
}

impl Default for JointPathPlannerConfig {
    fn default() -> Self {
        Self {
            step_length: default_step_length(),
            max_try: default_max_try(),
            num_smoothing: default_num_smoothing(),
            margin: default_margin(),
        }
    }
}

pub fn create_joint_path_planner(
    urdf_robot: &urdf_rs::Robot,
    self_collision_check_pairs: Vec<(String, String)>,
    config: &JointPathPlannerConfig,
) -> Result<JointPathPlanner> {
    JointPathPlannerBuilder::from_urdf_robot(urdf_robot)
        .step_length(config.step_length)
        .max_try(config.max_try)
        .num_smoothing(config.num_smoothing)
        .collision_check_margin(config.margin)
        .self_collision_pairs(self_collision_check_pairs)
        .finalize()
}
