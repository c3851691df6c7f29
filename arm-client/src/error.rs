use std::path::PathBuf;

use thiserror::Error;
use urdf_rs::UrdfError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("arm-client: arm-interface: {:?}", .0)]
    Interface(#[from] arm_interface::Error),
    #[error("arm-client: arm-planner: {:?}", .0)]
    Planner(#[from] arm_planner::Error),
    #[error("arm-client: k: {:?}", .0)]
    Kinematics(#[from] k::Error),
    #[error("arm-client: MismatchedLength {} != {}.", .0, .1)]
    MismatchedLength(usize, usize),
    #[error("arm-client: No Joint={} is found.", .0)]
    NoJoint(String),
    #[error("arm-client: No Frame={} is found.", .0)]
    NoFrame(String),
    #[error("arm-client: No named target {} is found.", .0)]
    NoNamedTarget(String),
    #[error("arm-client: No target is set.")]
    NoTarget,
    #[error("arm-client: Target {:?} is out of the joint limits.", .0)]
    TargetOutOfLimits(Vec<f64>),
    #[error(
        "arm-client: Joint names mismatch: client = {:?}, model = {:?}",
        client,
        model
    )]
    JointNamesMismatch {
        client: Vec<String>,
        model: Vec<String>,
    },
    #[error("arm-client: Trajectory is empty.")]
    EmptyTrajectory,
    #[error(
        "arm-client: Trajectory starts at {:?} but the current state is {:?}.",
        start,
        current
    )]
    StartStateMismatch { start: Vec<f64>, current: Vec<f64> },
    #[error("arm-client: No File {:?} is found ({}).", .0, .1)]
    NoFile(PathBuf, #[source] std::io::Error),
    #[error("arm-client: urdf-rs: {:?}", .0)]
    UrdfRs(#[from] UrdfError),
    #[error("arm-client: Other: {:?}", .0)]
    Other(#[from] anyhow::Error),
}
