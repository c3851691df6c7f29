use std::collections::BTreeMap;

use arm_planner::{IkSolverParameters, JointPathPlannerConfig};
use k::Constraints;
use schemars::{gen::SchemaGenerator, schema::Schema, JsonSchema};
use serde::{Deserialize, Serialize};

/// Configuration of [`MoveGroup`](crate::MoveGroup)
#[derive(Clone, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MoveGroupConfig {
    /// Name of the planning group, used in logs
    #[serde(default = "default_name")]
    pub name: String,
    /// Joint whose child link is the end effector
    pub ik_target: String,
    /// First joint of the group. The group reaches the root of the robot if it is `None`.
    pub root_node_name: Option<String>,
    /// Link in which poses are expressed. The root link of the robot if it is `None`.
    pub pose_reference_frame: Option<String>,

    /// unit: m
    #[serde(default = "default_goal_position_tolerance")]
    pub goal_position_tolerance: f64,
    /// unit: rad
    #[serde(default = "default_goal_orientation_tolerance")]
    pub goal_orientation_tolerance: f64,
    /// unit: rad
    #[serde(default = "default_goal_joint_tolerance")]
    pub goal_joint_tolerance: f64,
    /// Allowed difference between the first trajectory point and the current state [rad]
    #[serde(default = "default_start_tolerance")]
    pub start_tolerance: f64,
    /// Time to reach the goal after the controller reports completion [sec]
    #[serde(default = "default_goal_time_tolerance_sec")]
    pub goal_time_tolerance_sec: f64,
    /// Max wait for a joint state newer than the request [sec]
    #[serde(default = "default_state_wait_timeout_sec")]
    pub state_wait_timeout_sec: f64,

    #[serde(default = "default_scaling_factor")]
    pub max_velocity_scaling_factor: f64,
    #[serde(default = "default_scaling_factor")]
    pub max_acceleration_scaling_factor: f64,
    /// Acceleration limit of every joint, URDF does not describe it [rad/s^2]
    #[serde(default = "default_max_acceleration")]
    pub max_acceleration: f64,
    /// Max joint move between two points of a planned trajectory [rad]
    #[serde(default = "default_max_joint_step")]
    pub max_joint_step: f64,
    /// Max end effector rotation between two Cartesian path points [rad]
    #[serde(default = "default_max_rotation_step")]
    pub max_rotation_step: f64,
    /// Check collisions while computing Cartesian paths
    #[serde(default = "default_true")]
    pub avoid_collisions: bool,

    #[serde(default)]
    pub allow_replanning: bool,
    #[serde(default = "default_replan_attempts")]
    pub replan_attempts: usize,

    /// Pairs of joint names like `"joint2:joint6"`
    #[serde(default)]
    pub self_collision_pairs: Vec<String>,

    /// The allowable errors are replaced by the goal position and orientation
    /// tolerances when a [`MoveGroup`](crate::MoveGroup) is created.
    #[serde(default)]
    pub ik: IkSolverParameters,
    #[serde(default)]
    #[schemars(schema_with = "constraints_schema")]
    pub constraints: Constraints,
    #[serde(default)]
    pub joint_path_planner: JointPathPlannerConfig,
    /// Joint positions registered by name
    #[serde(default)]
    pub named_targets: BTreeMap<String, Vec<f64>>,
}

fn default_name() -> String {
    "manipulator".to_owned()
}

fn default_goal_position_tolerance() -> f64 {
    1e-4
}

fn default_goal_orientation_tolerance() -> f64 {
    1e-3
}

fn default_goal_joint_tolerance() -> f64 {
    1e-4
}

fn default_start_tolerance() -> f64 {
    0.01
}

fn default_goal_time_tolerance_sec() -> f64 {
    1.0
}

fn default_state_wait_timeout_sec() -> f64 {
    1.0
}

fn default_scaling_factor() -> f64 {
    0.1
}

fn default_max_acceleration() -> f64 {
    2.0
}

fn default_max_joint_step() -> f64 {
    0.05
}

fn default_max_rotation_step() -> f64 {
    0.05
}

fn default_true() -> bool {
    true
}

fn default_replan_attempts() -> usize {
    1
}

impl MoveGroupConfig {
    pub fn new(ik_target: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            ik_target: ik_target.into(),
            root_node_name: None,
            pose_reference_frame: None,
            goal_position_tolerance: default_goal_position_tolerance(),
            goal_orientation_tolerance: default_goal_orientation_tolerance(),
            goal_joint_tolerance: default_goal_joint_tolerance(),
            start_tolerance: default_start_tolerance(),
            goal_time_tolerance_sec: default_goal_time_tolerance_sec(),
            state_wait_timeout_sec: default_state_wait_timeout_sec(),
            max_velocity_scaling_factor: default_scaling_factor(),
            max_acceleration_scaling_factor: default_scaling_factor(),
            max_acceleration: default_max_acceleration(),
            max_joint_step: default_max_joint_step(),
            max_rotation_step: default_max_rotation_step(),
            avoid_collisions: default_true(),
            allow_replanning: false,
            replan_attempts: default_replan_attempts(),
            ik: IkSolverParameters::default(),
            constraints: Constraints::default(),
            joint_path_planner: JointPathPlannerConfig::default(),
            self_collision_pairs: vec![],
            named_targets: BTreeMap::new(),
        }
    }
}

fn constraints_schema(gen: &mut SchemaGenerator) -> Schema {
    // https://docs.rs/k/0.32/k/struct.Constraints.html
    /// A bundle of flags determining which coordinates are constrained for a target
    #[allow(dead_code)]
    #[derive(Serialize, JsonSchema)]
    struct ConstraintsSchema {
        /// true means the constraint is used.
        ///  The coordinates is the world, not the end of the arm.
        #[serde(default = "default_true")]
        position_x: bool,
        #[serde(default = "default_true")]
        position_y: bool,
        #[serde(default = "default_true")]
        position_z: bool,
        #[serde(default = "default_true")]
        rotation_x: bool,
        #[serde(default = "default_true")]
        rotation_y: bool,
        #[serde(default = "default_true")]
        rotation_z: bool,
        /// Joints which are not moved by IK
        #[serde(default)]
        ignored_joint_names: Vec<String>,
    }

    ConstraintsSchema::json_schema(gen)
}
