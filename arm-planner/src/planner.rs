mod cartesian_planner;
mod joint_path_planner;
mod time_parameterization;

pub use self::{cartesian_planner::*, joint_path_planner::*, time_parameterization::*};
