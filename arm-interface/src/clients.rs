mod dummy_joint_trajectory_client;

pub use dummy_joint_trajectory_client::*;
