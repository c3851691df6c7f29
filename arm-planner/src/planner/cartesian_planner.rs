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
use k::InverseKinematicsSolver;
use ncollide3d::shape::Compound;
use tracing::*;

use crate::{collision::RobotCollisionDetector, errors::*, funcs::*};

const DEFAULT_MAX_ROTATION_STEP: f64 = 0.05;

/// Interpolates end effector poses from `start` through all `waypoints`
///
/// Translation is interpolated linearly and rotation spherically. Each step
/// moves at most `max_translation_step` [m] and `max_rotation_step` [rad].
/// `start` itself is not included and every waypoint is.
pub fn interpolate_poses(
    start: &k::Isometry3<f64>,
    waypoints: &[k::Isometry3<f64>],
    max_translation_step: f64,
    max_rotation_step: f64,
) -> Vec<k::Isometry3<f64>> {
    let mut poses = Vec::new();
    let mut prev = *start;
    for waypoint in waypoints {
        let from = prev.translation.vector;
        let to = waypoint.translation.vector;
        let translation_steps = ((to - from).norm() / max_translation_step).ceil();
        let rotation_steps =
            (prev.rotation.angle_to(&waypoint.rotation) / max_rotation_step).ceil();
        let n = (translation_steps.max(rotation_steps) as usize).max(1);
        for i in 1..=n {
            let t = i as f64 / n as f64;
            let rotation = prev
                .rotation
                .try_slerp(&waypoint.rotation, t, 1.0e-9)
                .unwrap_or(waypoint.rotation);
            poses.push(k::Isometry3::from_parts(
                k::Translation3::from(from.lerp(&to, t)),
                rotation,
            ));
        }
        prev = *waypoint;
    }
    poses
}

/// Returns the index of the last point before the first joint space jump.
///
/// A jump is a step longer than `jump_threshold` times the mean step length.
fn find_jump(joint_path: &[Vec<f64>], jump_threshold: f64) -> Option<usize> {
    let distances = joint_path
        .windows(2)
        .map(|w| {
            w[0].iter()
                .zip(&w[1])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect::<Vec<_>>();
    if distances.is_empty() {
        return None;
    }
    let mean = distances.iter().sum::<f64>() / distances.len() as f64;
    distances
        .iter()
        .position(|d| *d > jump_threshold * mean)
}

/// Collision environment used while following a Cartesian path
///
/// The detector robot must share its nodes with the planning arm.
#[derive(Clone, Copy)]
pub struct CollisionCheck<'a> {
    pub detector: &'a RobotCollisionDetector,
    pub objects: Option<&'a Compound<f64>>,
}

/// Joint path following a Cartesian path
#[derive(Clone, Debug)]
pub struct CartesianPlan {
    /// Joint positions of the arm starting with the start positions
    pub joint_path: Vec<Vec<f64>>,
    /// Ratio of the reached interpolated poses, 1.0 when the whole path is followed
    pub fraction: f64,
    /// Number of interpolated poses of the request
    pub num_requested_poses: usize,
}

/// Plans joint paths that move the end of an arm along Cartesian waypoints
pub struct CartesianPlanner {
    ik_solver: Box<dyn InverseKinematicsSolver<f64> + Send + Sync>,
    constraints: k::Constraints,
    /// Max rotation of the end effector between two interpolated poses
    pub max_rotation_step: f64,
}

impl CartesianPlanner {
    pub fn new(
        ik_solver: Box<dyn InverseKinematicsSolver<f64> + Send + Sync>,
        constraints: k::Constraints,
    ) -> Self {
        Self {
            ik_solver,
            constraints,
            max_rotation_step: DEFAULT_MAX_ROTATION_STEP,
        }
    }

    pub fn set_ik_solver(
        &mut self,
        ik_solver: Box<dyn InverseKinematicsSolver<f64> + Send + Sync>,
    ) {
        self.ik_solver = ik_solver;
    }

    pub fn constraints(&self) -> &k::Constraints {
        &self.constraints
    }

    /// Computes the joint path that follows `waypoints` from the pose at `start`.
    ///
    /// The poses are interpolated with at most `eef_step` [m] per step and IK is
    /// solved for each of them, seeded by the previous solution. Planning stops at
    /// the first pose which cannot be solved, leaves the joint limits or collides.
    /// If `jump_threshold` is positive, the path is cut before the first step longer
    /// than `jump_threshold` times the mean step.
    ///
    /// The joint positions of `arm` are restored before returning.
    pub fn compute(
        &self,
        arm: &k::SerialChain<f64>,
        start: &[f64],
        waypoints: &[k::Isometry3<f64>],
        eef_step: f64,
        jump_threshold: f64,
        collision_check: Option<CollisionCheck<'_>>,
    ) -> Result<CartesianPlan> {
        if !(eef_step > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "eef_step must be positive: {eef_step}"
            )));
        }
        if waypoints.is_empty() {
            return Err(Error::InvalidParameter("no waypoints".to_owned()));
        }
        if start.len() != arm.dof() {
            return Err(Error::DofMismatch(start.len(), arm.dof()));
        }
        let initial_positions = arm.joint_positions();
        arm.set_joint_positions(start)?;
        let plan = self.follow(arm, start, waypoints, eef_step, jump_threshold, collision_check);
        arm.set_joint_positions_clamped(&initial_positions);
        arm.update_transforms();
        Ok(plan)
    }

    fn follow(
        &self,
        arm: &k::SerialChain<f64>,
        start: &[f64],
        waypoints: &[k::Isometry3<f64>],
        eef_step: f64,
        jump_threshold: f64,
        collision_check: Option<CollisionCheck<'_>>,
    ) -> CartesianPlan {
        arm.update_transforms();
        let start_pose = arm.end_transform();
        let poses = interpolate_poses(&start_pose, waypoints, eef_step, self.max_rotation_step);
        let limits = arm.iter_joints().map(|j| j.limits).collect();

        let mut joint_path = vec![start.to_vec()];
        for (i, pose) in poses.iter().enumerate() {
            if let Err(e) = self
                .ik_solver
                .solve_with_constraints(arm, pose, &self.constraints)
            {
                debug!("cartesian path: IK failed at {i}/{}: {e}", poses.len());
                break;
            }
            let positions = arm.joint_positions();
            if !is_within_limits(&positions, &limits) {
                debug!("cartesian path: out of limits at {i}/{}", poses.len());
                break;
            }
            if let Some(check) = collision_check {
                if check.detector.is_collision_detected(check.objects) {
                    debug!("cartesian path: collision at {i}/{}", poses.len());
                    break;
                }
            }
            joint_path.push(positions);
        }

        if jump_threshold > 0.0 {
            if let Some(index) = find_jump(&joint_path, jump_threshold) {
                debug!("cartesian path: jump after {index}");
                joint_path.truncate(index + 1);
            }
        }
        let reached = joint_path.len() - 1;
        CartesianPlan {
            fraction: reached as f64 / poses.len() as f64,
            joint_path,
            num_requested_poses: poses.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::{
        collision::{compound_from_shapes, create_robot_collision_detector_from_urdf},
        collision::RobotCollisionDetectorConfig,
        ik::{create_ik_solver, IkSolverParameters},
    };

    const PREPARED: [f64; 6] = [0.0, 0.3, 0.6, 0.0, 0.6, 0.0];

    fn planner() -> CartesianPlanner {
        let parameters = IkSolverParameters {
            allowable_position_error: 0.001,
            allowable_angle_error: 0.01,
            ..Default::default()
        };
        CartesianPlanner::new(create_ik_solver(&parameters), k::Constraints::default())
    }

    fn detector() -> RobotCollisionDetector {
        let urdf_robot = urdf_rs::read_file("sample.urdf").unwrap();
        create_robot_collision_detector_from_urdf(
            &urdf_robot,
            &RobotCollisionDetectorConfig::default(),
            vec![],
        )
    }

    fn arm_of(detector: &RobotCollisionDetector) -> k::SerialChain<f64> {
        k::SerialChain::from_end(detector.robot.find("tool_joint").unwrap())
    }

    fn start_pose(arm: &k::SerialChain<f64>) -> k::Isometry3<f64> {
        arm.set_joint_positions(&PREPARED).unwrap();
        arm.update_transforms();
        arm.end_transform()
    }

    fn shifted(pose: &k::Isometry3<f64>, x: f64, y: f64) -> k::Isometry3<f64> {
        let mut pose = *pose;
        pose.translation.vector.x += x;
        pose.translation.vector.y += y;
        pose
    }

    #[test]
    fn test_interpolate_poses() {
        let start = k::Isometry3::identity();
        let goal = k::Isometry3::translation(0.1, 0.0, 0.0);
        let poses = interpolate_poses(&start, &[goal], 0.01, 0.1);
        assert!(poses.len() >= 10 && poses.len() <= 11);
        assert_approx_eq!(poses.last().unwrap().translation.vector.x, 0.1);
        for w in poses.windows(2) {
            assert!((w[1].translation.vector - w[0].translation.vector).norm() <= 0.01 + 1e-9);
        }

        let rotated = k::Isometry3::from_parts(
            k::Translation3::new(0.0, 0.0, 0.0),
            k::UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0),
        );
        let poses = interpolate_poses(&start, &[rotated], 0.01, 0.1);
        assert!(poses.len() >= 10 && poses.len() <= 11);
        assert_approx_eq!(poses.last().unwrap().rotation.euler_angles().2, 1.0);
        assert_approx_eq!(poses.last().unwrap().translation.vector.norm(), 0.0);

        // waypoints at the same pose still produce one step each
        assert_eq!(interpolate_poses(&start, &[start, start], 0.01, 0.1).len(), 2);
    }

    #[test]
    fn test_find_jump() {
        let path = vec![vec![0.0], vec![0.1], vec![0.2], vec![1.5], vec![1.6]];
        assert_eq!(find_jump(&path, 2.0), Some(2));
        assert_eq!(find_jump(&path, 10.0), None);
        assert_eq!(find_jump(&path[..1], 2.0), None);
    }

    #[test]
    fn test_full_path() {
        let detector = detector();
        let arm = arm_of(&detector);
        let start = start_pose(&arm);
        let waypoints = [shifted(&start, 0.0, -0.03), shifted(&start, 0.03, -0.03)];
        arm.set_joint_positions(&[0.0; 6]).unwrap();

        let plan = planner()
            .compute(&arm, &PREPARED, &waypoints, 0.01, 0.0, None)
            .unwrap();
        assert_approx_eq!(plan.fraction, 1.0);
        assert_eq!(plan.joint_path.len(), plan.num_requested_poses + 1);
        assert_eq!(plan.joint_path[0], PREPARED.to_vec());
        // the arm is restored
        assert_eq!(arm.joint_positions(), vec![0.0; 6]);

        arm.set_joint_positions(plan.joint_path.last().unwrap()).unwrap();
        arm.update_transforms();
        let reached = arm.end_transform();
        assert!((reached.translation.vector - waypoints[1].translation.vector).norm() < 0.002);
    }

    #[test]
    fn test_blocked_path() {
        let detector = detector();
        let arm = arm_of(&detector);
        let start = start_pose(&arm);
        // The wrist leads the tool by about 0.02 in x, so the box is hit after 0.05.
        let mut box_pose = shifted(&start, 0.095, 0.0);
        box_pose.rotation = k::UnitQuaternion::identity();
        let obstacle = compound_from_shapes([(
            box_pose,
            ncollide3d::shape::ShapeHandle::new(ncollide3d::shape::Cuboid::new(
                ncollide3d::math::Vector::new(0.02, 0.05, 0.04),
            )),
        )]);
        let waypoints = [shifted(&start, 0.03, 0.0), shifted(&start, 0.09, 0.0)];

        let check = CollisionCheck {
            detector: &detector,
            objects: Some(&obstacle),
        };
        let plan = planner()
            .compute(&arm, &PREPARED, &waypoints, 0.01, 0.0, Some(check))
            .unwrap();
        assert!(plan.fraction < 1.0, "{}", plan.fraction);
        // 3 steps to the first waypoint and 6 to the second
        assert_eq!(plan.num_requested_poses, 9);
        assert!(plan.joint_path.len() > 4, "{}", plan.fraction);
        assert!(plan.joint_path.len() < 9, "{}", plan.fraction);

        let unchecked = planner()
            .compute(&arm, &PREPARED, &waypoints, 0.01, 0.0, None)
            .unwrap();
        assert_approx_eq!(unchecked.fraction, 1.0);
    }

    #[test]
    fn test_unreachable_path() {
        let detector = detector();
        let arm = arm_of(&detector);
        let start = start_pose(&arm);
        let plan = planner()
            .compute(&arm, &PREPARED, &[shifted(&start, 2.0, 0.0)], 0.01, 0.0, None)
            .unwrap();
        assert!(plan.fraction < 0.5);
        let reached = (plan.fraction * plan.num_requested_poses as f64).round() as usize;
        assert_eq!(plan.joint_path.len(), reached + 1);
    }

    #[test]
    fn test_invalid_requests() {
        let detector = detector();
        let arm = arm_of(&detector);
        let start = start_pose(&arm);
        let planner = planner();
        assert!(planner
            .compute(&arm, &PREPARED, &[start], 0.0, 0.0, None)
            .is_err());
        assert!(planner.compute(&arm, &PREPARED, &[], 0.01, 0.0, None).is_err());
        assert!(matches!(
            planner.compute(&arm, &[0.0; 3], &[start], 0.01, 0.0, None),
            Err(Error::DofMismatch(3, 6))
        ));
        // start out of joint limits
        assert!(planner
            .compute(&arm, &[0.0, 3.0, 0.0, 0.0, 0.0, 0.0], &[start], 0.01, 0.0, None)
            .is_err());
    }
}
