use std::{
    collections::HashMap,
    path::Path,
    time::{Duration, Instant},
};

use arm_interface::{
    CompleteCondition, EachJointDiffCondition, JointTrajectoryClient, TrajectoryPoint,
};
use arm_planner::{
    collision::parse_colon_separated_pairs, create_ik_solver, create_joint_path_planner,
    generate_clamped_joint_positions_from_limits, interpolate, is_within_limits,
    max_joint_difference, velocity_limits_from_urdf, CartesianPlanner, CollisionCheck,
    JointPathPlanner, TimeParameterization,
};
use ncollide3d::shape::Compound;
use tracing::{debug, info, warn};

use crate::{
    utils::to_trajectory_points, CurrentStateMonitor, Error, JointState, MoveGroupConfig,
};

/// Pose expressed in the frame `frame_id`
#[derive(Clone, Debug)]
pub struct PoseStamped {
    pub frame_id: String,
    pub pose: k::Isometry3<f64>,
}

/// Time parameterized joint trajectory of a move group
#[derive(Clone, Debug, Default)]
pub struct RobotTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

impl RobotTrajectory {
    pub fn duration(&self) -> Duration {
        self.points
            .last()
            .map_or(Duration::ZERO, |p| p.time_from_start)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Result of [`MoveGroup::plan`]
#[derive(Clone, Debug)]
pub struct Plan {
    pub start_positions: Vec<f64>,
    pub trajectory: RobotTrajectory,
    pub planning_time: Duration,
}

/// Result of [`MoveGroup::compute_cartesian_path`]
#[derive(Clone, Debug)]
pub struct CartesianPath {
    pub trajectory: RobotTrajectory,
    /// Ratio of the waypoint path which could be followed, in [0, 1]
    pub fraction: f64,
}

fn checked_scaling_factor(kind: &str, factor: f64) -> f64 {
    if factor > 0.0 && factor <= 1.0 {
        factor
    } else {
        warn!("max {kind} scaling factor must be in (0, 1] but {factor}, use 1.0");
        1.0
    }
}

/// Plans and executes motions of a serial group of joints
///
/// Joint positions are read from (and trajectories sent to) `client`, whose joint
/// names must match the group. Poses are expressed in the pose reference frame.
pub struct MoveGroup<C>
where
    C: JointTrajectoryClient,
{
    client: C,
    config: MoveGroupConfig,
    planner: JointPathPlanner,
    arm: k::SerialChain<f64>,
    joint_names: Vec<String>,
    end_effector_link: String,
    pose_reference_frame: String,
    link_to_joint: HashMap<String, String>,
    cartesian_planner: CartesianPlanner,
    time_parameterization: TimeParameterization,
    target: Option<Vec<f64>>,
    obstacles: Option<Compound<f64>>,
    state_monitor: Option<CurrentStateMonitor>,
}

impl<C> MoveGroup<C>
where
    C: JointTrajectoryClient,
{
    pub fn new(
        client: C,
        urdf_robot: &urdf_rs::Robot,
        mut config: MoveGroupConfig,
    ) -> Result<Self, Error> {
        config.ik.allowable_position_error = config.goal_position_tolerance;
        config.ik.allowable_angle_error = config.goal_orientation_tolerance;
        let pairs = parse_colon_separated_pairs(&config.self_collision_pairs)?;
        let planner = create_joint_path_planner(urdf_robot, pairs, &config.joint_path_planner)?;
        let robot = planner.collision_check_robot();
        let end = robot
            .find(&config.ik_target)
            .ok_or_else(|| Error::NoJoint(config.ik_target.clone()))?;
        let arm = match &config.root_node_name {
            Some(root_name) => {
                let root = robot
                    .find(root_name)
                    .ok_or_else(|| Error::NoJoint(root_name.clone()))?;
                k::SerialChain::from_end_to_root(end, root)
            }
            None => k::SerialChain::from_end(end),
        };
        let joint_names = arm
            .iter_joints()
            .map(|j| j.name.clone())
            .collect::<Vec<_>>();
        let client_joint_names = client.joint_names();
        if client_joint_names != joint_names {
            return Err(Error::JointNamesMismatch {
                client: client_joint_names,
                model: joint_names,
            });
        }
        for (name, positions) in &config.named_targets {
            if positions.len() != joint_names.len() {
                warn!("named target {name} has {} positions", positions.len());
                return Err(Error::MismatchedLength(positions.len(), joint_names.len()));
            }
        }

        let end_effector_link = urdf_robot
            .joints
            .iter()
            .find(|j| j.name == config.ik_target)
            .map(|j| j.child.link.clone())
            .ok_or_else(|| Error::NoJoint(config.ik_target.clone()))?;
        let root_link = urdf_robot
            .links
            .iter()
            .find(|l| !urdf_robot.joints.iter().any(|j| j.child.link == l.name))
            .map(|l| l.name.clone())
            .ok_or_else(|| Error::NoFrame(urdf_robot.name.clone()))?;

        let velocity_limits = velocity_limits_from_urdf(urdf_robot, &joint_names)?;
        let time_parameterization = TimeParameterization::new(
            velocity_limits,
            vec![config.max_acceleration; joint_names.len()],
        )?;
        let mut cartesian_planner =
            CartesianPlanner::new(create_ik_solver(&config.ik), config.constraints.clone());
        cartesian_planner.max_rotation_step = config.max_rotation_step;

        let reference_frame = config
            .pose_reference_frame
            .clone()
            .unwrap_or_else(|| root_link.clone());
        let (velocity_scaling, acceleration_scaling) = (
            config.max_velocity_scaling_factor,
            config.max_acceleration_scaling_factor,
        );
        let mut move_group = Self {
            client,
            config,
            planner,
            arm,
            joint_names,
            end_effector_link,
            pose_reference_frame: root_link,
            link_to_joint: k::urdf::link_to_joint_map(urdf_robot),
            cartesian_planner,
            time_parameterization,
            target: None,
            obstacles: None,
            state_monitor: None,
        };
        move_group.set_pose_reference_frame(&reference_frame)?;
        move_group.set_max_velocity_scaling_factor(velocity_scaling);
        move_group.set_max_acceleration_scaling_factor(acceleration_scaling);
        info!(
            "{}: joints={:?} end effector={} reference frame={}",
            move_group.config.name,
            move_group.joint_names,
            move_group.end_effector_link,
            move_group.pose_reference_frame
        );
        Ok(move_group)
    }

    pub fn from_urdf_file<P: AsRef<Path>>(
        client: C,
        urdf_path: P,
        config: MoveGroupConfig,
    ) -> Result<Self, Error> {
        debug!("Loading {:?}", urdf_path.as_ref());
        let urdf_robot = urdf_rs::read_file(urdf_path)?;
        Self::new(client, &urdf_robot, config)
    }

    /// Reads the current state from `monitor` instead of polling the client.
    pub fn with_state_monitor(mut self, monitor: CurrentStateMonitor) -> Self {
        self.state_monitor = Some(monitor);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn end_effector_link(&self) -> &str {
        &self.end_effector_link
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn named_targets(&self) -> Vec<String> {
        self.config.named_targets.keys().cloned().collect()
    }

    pub fn named_target_values(&self, name: &str) -> Option<&[f64]> {
        self.config.named_targets.get(name).map(Vec::as_slice)
    }

    /// Registers `positions` as the named target `name`.
    pub fn remember_joint_values(&mut self, name: &str, positions: Vec<f64>) -> Result<(), Error> {
        if positions.len() != self.joint_names.len() {
            return Err(Error::MismatchedLength(positions.len(), self.joint_names.len()));
        }
        self.config.named_targets.insert(name.to_owned(), positions);
        Ok(())
    }

    pub fn pose_reference_frame(&self) -> &str {
        &self.pose_reference_frame
    }

    pub fn set_pose_reference_frame(&mut self, frame: &str) -> Result<(), Error> {
        if !self.link_to_joint.contains_key(frame) {
            return Err(Error::NoFrame(frame.to_owned()));
        }
        self.pose_reference_frame = frame.to_owned();
        Ok(())
    }

    pub fn allow_replanning(&mut self, flag: bool) {
        self.config.allow_replanning = flag;
    }

    pub fn set_replan_attempts(&mut self, attempts: usize) {
        self.config.replan_attempts = attempts;
    }

    pub fn goal_position_tolerance(&self) -> f64 {
        self.config.goal_position_tolerance
    }

    pub fn goal_orientation_tolerance(&self) -> f64 {
        self.config.goal_orientation_tolerance
    }

    pub fn goal_joint_tolerance(&self) -> f64 {
        self.config.goal_joint_tolerance
    }

    /// The IK solver accepts poses within this distance [m].
    pub fn set_goal_position_tolerance(&mut self, tolerance: f64) {
        self.config.goal_position_tolerance = tolerance;
        self.config.ik.allowable_position_error = tolerance;
        self.cartesian_planner
            .set_ik_solver(create_ik_solver(&self.config.ik));
    }

    /// The IK solver accepts poses within this angle [rad].
    pub fn set_goal_orientation_tolerance(&mut self, tolerance: f64) {
        self.config.goal_orientation_tolerance = tolerance;
        self.config.ik.allowable_angle_error = tolerance;
        self.cartesian_planner
            .set_ik_solver(create_ik_solver(&self.config.ik));
    }

    pub fn set_goal_joint_tolerance(&mut self, tolerance: f64) {
        self.config.goal_joint_tolerance = tolerance;
    }

    pub fn set_goal_tolerance(&mut self, tolerance: f64) {
        self.set_goal_position_tolerance(tolerance);
        self.set_goal_orientation_tolerance(tolerance);
        self.set_goal_joint_tolerance(tolerance);
    }

    pub fn max_velocity_scaling_factor(&self) -> f64 {
        self.config.max_velocity_scaling_factor
    }

    pub fn max_acceleration_scaling_factor(&self) -> f64 {
        self.config.max_acceleration_scaling_factor
    }

    /// Values out of (0, 1] are replaced with 1.0.
    pub fn set_max_velocity_scaling_factor(&mut self, factor: f64) {
        self.config.max_velocity_scaling_factor = checked_scaling_factor("velocity", factor);
    }

    /// Values out of (0, 1] are replaced with 1.0.
    pub fn set_max_acceleration_scaling_factor(&mut self, factor: f64) {
        self.config.max_acceleration_scaling_factor =
            checked_scaling_factor("acceleration", factor);
    }

    pub fn set_obstacles(&mut self, obstacles: Compound<f64>) {
        self.obstacles = Some(obstacles);
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles = None;
    }

    pub fn target(&self) -> Option<&[f64]> {
        self.target.as_deref()
    }

    pub fn set_named_target(&mut self, name: &str) -> Result<(), Error> {
        let positions = self
            .config
            .named_targets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NoNamedTarget(name.to_owned()))?;
        debug!("{}: target {name} = {positions:?}", self.config.name);
        self.set_joint_value_target(positions)
    }

    pub fn set_joint_value_target(&mut self, positions: Vec<f64>) -> Result<(), Error> {
        if positions.len() != self.joint_names.len() {
            return Err(Error::MismatchedLength(positions.len(), self.joint_names.len()));
        }
        if !is_within_limits(&positions, &self.limits()) {
            return Err(Error::TargetOutOfLimits(positions));
        }
        self.target = Some(positions);
        Ok(())
    }

    fn limits(&self) -> Vec<Option<k::joint::Range<f64>>> {
        self.arm.iter_joints().map(|j| j.limits).collect()
    }

    /// Returns the current joint positions of the group.
    ///
    /// With a state monitor, blocks until a state newer than this call arrives.
    /// Async code should use [`current_joint_values_async`](Self::current_joint_values_async).
    pub fn current_joint_values(&self) -> Result<Vec<f64>, Error> {
        let state = self
            .state_monitor
            .as_ref()
            .map(|monitor| monitor.wait_for_state_since(Instant::now(), self.state_wait_timeout()));
        self.joint_values_from(state)
    }

    /// Same as [`current_joint_values`](Self::current_joint_values) without
    /// blocking the runtime thread.
    pub async fn current_joint_values_async(&self) -> Result<Vec<f64>, Error> {
        let state = match &self.state_monitor {
            Some(monitor) => Some(
                monitor
                    .state_since(Instant::now(), self.state_wait_timeout())
                    .await,
            ),
            None => None,
        };
        self.joint_values_from(state)
    }

    fn state_wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.config.state_wait_timeout_sec)
    }

    /// `state` is `None` without a monitor and `Some(None)` if the monitor timed out.
    fn joint_values_from(&self, state: Option<Option<JointState>>) -> Result<Vec<f64>, Error> {
        match state {
            Some(Some(state)) if state.names == self.joint_names => return Ok(state.positions),
            Some(Some(state)) => {
                return Err(Error::JointNamesMismatch {
                    client: state.names,
                    model: self.joint_names.clone(),
                })
            }
            Some(None) => warn!(
                "no joint state within {:?}, read the controller",
                self.state_wait_timeout()
            ),
            None => {}
        }
        Ok(self.client.current_joint_positions()?)
    }

    fn frame_transform(&self, frame: &str) -> Result<k::Isometry3<f64>, Error> {
        self.link_to_joint
            .get(frame)
            .and_then(|joint| self.planner.collision_check_robot().find(joint))
            .and_then(|node| node.world_transform())
            .ok_or_else(|| Error::NoFrame(frame.to_owned()))
    }

    fn update_model(&self, positions: &[f64]) {
        self.arm.set_joint_positions_clamped(positions);
        self.planner.update_transforms();
    }

    /// Returns the current pose of `link` (the end effector if `None`) in the
    /// pose reference frame.
    pub fn current_pose(&self, link: Option<&str>) -> Result<PoseStamped, Error> {
        let positions = self.current_joint_values()?;
        self.update_model(&positions);
        let link = link.unwrap_or(&self.end_effector_link);
        let reference = self.frame_transform(&self.pose_reference_frame)?;
        let pose = self.frame_transform(link)?;
        Ok(PoseStamped {
            frame_id: self.pose_reference_frame.clone(),
            pose: reference.inverse() * pose,
        })
    }

    /// Plans a collision free trajectory from the current state to the target.
    pub fn plan(&self) -> Result<Plan, Error> {
        self.plan_from(self.current_joint_values()?)
    }

    fn plan_from(&self, start: Vec<f64>) -> Result<Plan, Error> {
        let target = self.target.as_ref().ok_or(Error::NoTarget)?;
        let started = Instant::now();
        let path = self
            .planner
            .plan(&self.joint_names, &start, target, self.obstacles.as_ref())?;
        let path = self.densify(&path)?;
        let trajectory = self.time_parameterize(&path)?;
        let planning_time = started.elapsed();
        info!(
            "{}: planned {} points ({:.2} sec) in {planning_time:?}",
            self.config.name,
            trajectory.len(),
            trajectory.duration().as_secs_f64()
        );
        Ok(Plan {
            start_positions: start,
            trajectory,
            planning_time,
        })
    }

    fn densify(&self, path: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Error> {
        if path.len() < 2 {
            return Ok(path.to_vec());
        }
        let length = path
            .windows(2)
            .map(|w| max_joint_difference(&w[0], &w[1]))
            .sum::<f64>();
        let num_points = ((length / self.config.max_joint_step).ceil() as usize).max(path.len());
        let points = interpolate(path, 1.0, 1.0 / num_points as f64).ok_or_else(|| {
            arm_planner::Error::InterpolationError(format!("failed to interpolate {path:?}"))
        })?;
        let limits = self.limits();
        points
            .iter()
            .map(|p| {
                generate_clamped_joint_positions_from_limits(&p.position, &limits)
                    .map_err(Error::from)
            })
            .collect()
    }

    fn time_parameterize(&self, path: &[Vec<f64>]) -> Result<RobotTrajectory, Error> {
        let points = self.time_parameterization.parameterize(
            path,
            self.config.max_velocity_scaling_factor,
            self.config.max_acceleration_scaling_factor,
        )?;
        Ok(RobotTrajectory {
            joint_names: self.joint_names.clone(),
            points: to_trajectory_points(points),
        })
    }

    /// Computes a trajectory whose end effector follows `waypoints`.
    ///
    /// The waypoints are expressed in the pose reference frame and the path starts
    /// at the current pose. The end effector moves at most `eef_step` [m] between
    /// two points. See [`CartesianPlanner::compute`] for `jump_threshold`.
    pub fn compute_cartesian_path(
        &self,
        waypoints: &[k::Isometry3<f64>],
        eef_step: f64,
        jump_threshold: f64,
    ) -> Result<CartesianPath, Error> {
        let start = self.current_joint_values()?;
        self.update_model(&start);
        let reference = self.frame_transform(&self.pose_reference_frame)?;
        let arm_base =
            self.frame_transform(&self.end_effector_link)? * self.arm.end_transform().inverse();
        let reference_to_arm = arm_base.inverse() * reference;
        let targets = waypoints
            .iter()
            .map(|w| reference_to_arm * w)
            .collect::<Vec<_>>();

        let collision_check = self.config.avoid_collisions.then(|| CollisionCheck {
            detector: self.planner.robot_collision_detector(),
            objects: self.obstacles.as_ref(),
        });
        let plan = self.cartesian_planner.compute(
            &self.arm,
            &start,
            &targets,
            eef_step,
            jump_threshold,
            collision_check,
        )?;
        debug!(
            "{}: cartesian path {}/{} poses",
            self.config.name,
            plan.joint_path.len() - 1,
            plan.num_requested_poses
        );
        Ok(CartesianPath {
            trajectory: self.time_parameterize(&plan.joint_path)?,
            fraction: plan.fraction,
        })
    }

    pub async fn execute(&self, plan: &Plan) -> Result<(), Error> {
        self.execute_trajectory(&plan.trajectory).await
    }

    /// Sends `trajectory` to the controller and waits until the goal is reached.
    ///
    /// The trajectory must start at the current state within the start tolerance.
    pub async fn execute_trajectory(&self, trajectory: &RobotTrajectory) -> Result<(), Error> {
        let (first, last) = match (trajectory.points.first(), trajectory.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::EmptyTrajectory),
        };
        if trajectory.joint_names != self.joint_names {
            return Err(Error::JointNamesMismatch {
                client: trajectory.joint_names.clone(),
                model: self.joint_names.clone(),
            });
        }
        let current = self.current_joint_values_async().await?;
        if first.positions.len() != current.len() {
            return Err(Error::MismatchedLength(first.positions.len(), current.len()));
        }
        if max_joint_difference(&first.positions, &current) > self.config.start_tolerance {
            return Err(Error::StartStateMismatch {
                start: first.positions.clone(),
                current,
            });
        }

        info!(
            "{}: executing {} points ({:.2} sec)",
            self.config.name,
            trajectory.len(),
            trajectory.duration().as_secs_f64()
        );
        self.client
            .send_joint_trajectory(trajectory.points.clone())?
            .await?;
        EachJointDiffCondition::new(
            vec![self.config.goal_joint_tolerance; self.joint_names.len()],
            self.config.goal_time_tolerance_sec,
        )
        .wait(&self.client, &last.positions, 0.0)
        .await?;
        Ok(())
    }

    async fn plan_and_execute(&self) -> Result<(), Error> {
        let plan = self.plan_from(self.current_joint_values_async().await?)?;
        self.execute(&plan).await
    }

    /// Plans and executes a motion to the target.
    ///
    /// If replanning is allowed, a failed attempt is planned again from the
    /// current state up to `replan_attempts` times.
    pub async fn move_to_target(&self) -> Result<(), Error> {
        let mut result = self.plan_and_execute().await;
        let mut attempt = 0;
        while let Err(e) = &result {
            if !self.config.allow_replanning || attempt >= self.config.replan_attempts {
                break;
            }
            attempt += 1;
            warn!(
                "{}: {e}, replanning ({attempt}/{})",
                self.config.name, self.config.replan_attempts
            );
            result = self.plan_and_execute().await;
        }
        result
    }
}
