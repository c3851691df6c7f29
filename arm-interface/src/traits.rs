mod joint_trajectory_client;

pub use joint_trajectory_client::*;
