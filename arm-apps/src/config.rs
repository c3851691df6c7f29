use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use arm_client::MoveGroupConfig;
use arm_planner::FromUrdf;
use ncollide3d::shape::Compound;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{utils::resolve_relative_path, CircularPath, Error};

const DEFAULT_URDF_PATH: &str = "arm-planner/sample.urdf";
const PREPARED: &str = "prepared";

/// Configuration of `arm_circle_demo`
#[derive(Clone, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CircleDemoConfig {
    /// Robot model, relative to the config file
    pub urdf_path: String,
    #[serde(skip)]
    urdf_full_path: Option<PathBuf>,
    /// Objects around the robot as a URDF, relative to the config file
    pub obstacles_urdf_path: Option<String>,
    #[serde(skip)]
    obstacles_urdf_full_path: Option<PathBuf>,

    #[serde(default)]
    pub controller: ControllerConfig,
    pub move_group: MoveGroupConfig,
    #[serde(default)]
    pub demo: DemoParameters,
}

impl CircleDemoConfig {
    pub fn try_new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let s = fs_err::read_to_string(path).map_err(|e| Error::NoFile(path.to_owned(), e))?;
        Self::from_str(&s, path)
    }

    /// Parses `s`, resolving the paths in it relative to `path`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<P: AsRef<Path>>(s: &str, path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut config: Self =
            toml::from_str(s).map_err(|e| Error::TomlParseFailure(path.to_owned(), e))?;
        config.urdf_full_path = Some(resolve_relative_path(path, &config.urdf_path)?);
        config.obstacles_urdf_full_path = config
            .obstacles_urdf_path
            .as_ref()
            .map(|p| resolve_relative_path(path, p))
            .transpose()?;
        debug!("loaded {path:?}: {config:?}");
        Ok(config)
    }

    pub fn urdf_full_path(&self) -> &Path {
        self.urdf_full_path
            .as_deref()
            .unwrap_or_else(|| Path::new(&self.urdf_path))
    }

    pub fn obstacles_urdf_full_path(&self) -> Option<&Path> {
        self.obstacles_urdf_full_path
            .as_deref()
            .or(self.obstacles_urdf_path.as_deref().map(Path::new))
    }

    pub fn read_urdf(&self) -> Result<urdf_rs::Robot, Error> {
        Ok(urdf_rs::read_file(self.urdf_full_path())?)
    }

    /// Collision shapes of the obstacles, `None` if no obstacle file is given.
    pub fn load_obstacles(&self) -> Result<Option<Compound<f64>>, Error> {
        self.obstacles_urdf_full_path()
            .map(|p| Ok::<_, Error>(Compound::from_urdf_file(p)?))
            .transpose()
    }
}

impl Default for CircleDemoConfig {
    /// The six-axis sample arm of `arm-planner`, with paths relative to the workspace root.
    fn default() -> Self {
        let mut move_group = MoveGroupConfig::new("tool_joint");
        move_group.self_collision_pairs = ["root:joint5", "root:joint6", "joint2:joint6"]
            .map(String::from)
            .to_vec();
        move_group
            .named_targets
            .insert(PREPARED.to_owned(), vec![0.0, 0.3, 0.6, 0.0, 0.6, 0.0]);
        Self {
            urdf_path: DEFAULT_URDF_PATH.to_owned(),
            urdf_full_path: None,
            obstacles_urdf_path: None,
            obstacles_urdf_full_path: None,
            controller: ControllerConfig::default(),
            move_group,
            demo: DemoParameters::default(),
        }
    }
}

/// Simulated controller the demo runs on
#[derive(Clone, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Trajectories are played back in real time scaled by this value.
    /// Goals are reached at once if it is `None`.
    pub playback_speed: Option<f64>,
    /// Joint positions at start. All zero if it is `None`.
    pub initial_positions: Option<Vec<f64>>,
    /// Interval of joint state updates [msec]
    #[serde(default = "default_spinner_period_ms")]
    pub spinner_period_ms: u64,
}

fn default_spinner_period_ms() -> u64 {
    10
}

impl ControllerConfig {
    pub fn spinner_period(&self) -> Duration {
        Duration::from_millis(self.spinner_period_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            playback_speed: None,
            initial_positions: None,
            spinner_period_ms: default_spinner_period_ms(),
        }
    }
}

/// Parameters of the circle demo
#[derive(Clone, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DemoParameters {
    /// Pose the demo starts and ends at
    #[serde(default = "default_named_target")]
    pub named_target: String,
    /// Frame of the circle waypoints
    #[serde(default = "default_reference_frame")]
    pub pose_reference_frame: String,
    /// Max end effector move between two Cartesian path points [m]
    #[serde(default = "default_eef_step")]
    pub eef_step: f64,
    /// 0.0 disables the joint jump check.
    #[serde(default)]
    pub jump_threshold: f64,
    /// Number of Cartesian path computations before giving up
    #[serde(default = "default_max_tries")]
    pub max_tries: usize,
    /// A progress message is logged every `log_interval` failed computations.
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,
    /// Wait after each motion [sec]
    #[serde(default = "default_settle_time_sec")]
    pub settle_time_sec: f64,
    /// unit: m
    #[serde(default = "default_goal_position_tolerance")]
    pub goal_position_tolerance: f64,
    /// unit: rad
    #[serde(default = "default_goal_orientation_tolerance")]
    pub goal_orientation_tolerance: f64,
    #[serde(default = "default_scaling_factor")]
    pub max_velocity_scaling_factor: f64,
    #[serde(default = "default_scaling_factor")]
    pub max_acceleration_scaling_factor: f64,
    #[serde(default = "default_true")]
    pub allow_replanning: bool,
    #[serde(default)]
    pub circle: CircularPath,
}

fn default_named_target() -> String {
    PREPARED.to_owned()
}

fn default_reference_frame() -> String {
    "base_link".to_owned()
}

fn default_eef_step() -> f64 {
    0.01
}

fn default_max_tries() -> usize {
    100
}

fn default_log_interval() -> usize {
    10
}

fn default_settle_time_sec() -> f64 {
    1.0
}

fn default_goal_position_tolerance() -> f64 {
    0.001
}

fn default_goal_orientation_tolerance() -> f64 {
    0.01
}

fn default_scaling_factor() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

impl DemoParameters {
    pub fn settle_time(&self) -> Duration {
        Duration::from_secs_f64(self.settle_time_sec.max(0.0))
    }
}

impl Default for DemoParameters {
    fn default() -> Self {
        Self {
            named_target: default_named_target(),
            pose_reference_frame: default_reference_frame(),
            eef_step: default_eef_step(),
            jump_threshold: 0.0,
            max_tries: default_max_tries(),
            log_interval: default_log_interval(),
            settle_time_sec: default_settle_time_sec(),
            goal_position_tolerance: default_goal_position_tolerance(),
            goal_orientation_tolerance: default_goal_orientation_tolerance(),
            max_velocity_scaling_factor: default_scaling_factor(),
            max_acceleration_scaling_factor: default_scaling_factor(),
            allow_replanning: default_true(),
            circle: CircularPath::default(),
        }
    }
}

/// Names of the movable joints between the root of the group and its IK target,
/// in the order a [`MoveGroup`](arm_client::MoveGroup) expects them.
pub fn move_group_joint_names(
    urdf_robot: &urdf_rs::Robot,
    config: &MoveGroupConfig,
) -> Result<Vec<String>, Error> {
    let chain = k::Chain::<f64>::from(urdf_robot);
    let end = chain
        .find(&config.ik_target)
        .ok_or_else(|| arm_client::Error::NoJoint(config.ik_target.clone()))?;
    let arm = match &config.root_node_name {
        Some(root) => {
            let root = chain
                .find(root)
                .ok_or_else(|| arm_client::Error::NoJoint(root.clone()))?;
            k::SerialChain::from_end_to_root(end, root)
        }
        None => k::SerialChain::from_end(end),
    };
    Ok(arm.iter_joints().map(|j| j.name.clone()).collect())
}
