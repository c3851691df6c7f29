use std::{fmt, sync::Arc};

use arm_client::{AsyncSpinner, CartesianPath, MoveGroup};
use arm_interface::{DummyJointTrajectoryClient, JointTrajectoryClient};
use tracing::{info, warn};

use crate::{move_group_joint_names, CircleDemoConfig, DemoParameters, Error};

/// Outcome of [`run_circle_demo`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleDemoReport {
    /// Number of Cartesian path computations
    pub attempts: usize,
    /// Fraction of the waypoints reached by the last computed path
    pub fraction: f64,
    /// The circle was executed without error.
    pub executed: bool,
    pub num_waypoints: usize,
}

/// Moves to the named target, traces the circle and moves back.
///
/// The Cartesian path is computed until it covers every waypoint or
/// `max_tries` computations are done. A partial path is not executed.
/// The arm returns to the named target in both cases.
pub async fn run_circle_demo<C>(
    move_group: &mut MoveGroup<C>,
    params: &DemoParameters,
) -> Result<CircleDemoReport, Error>
where
    C: JointTrajectoryClient,
{
    move_group.set_pose_reference_frame(&params.pose_reference_frame)?;
    move_group.set_goal_position_tolerance(params.goal_position_tolerance);
    move_group.set_goal_orientation_tolerance(params.goal_orientation_tolerance);
    move_group.set_max_velocity_scaling_factor(params.max_velocity_scaling_factor);
    move_group.set_max_acceleration_scaling_factor(params.max_acceleration_scaling_factor);
    move_group.allow_replanning(params.allow_replanning);

    move_to_named_target(move_group, params).await?;

    let start = move_group.current_pose(None)?;
    let waypoints = params.circle.waypoints(&start.pose);
    info!(
        "{} waypoints around {:?} in {}",
        waypoints.len(),
        start.pose.translation.vector.as_slice(),
        start.frame_id
    );

    let mut attempts = 0;
    let mut fraction = 0.0;
    let mut path: Option<CartesianPath> = None;
    while fraction < 1.0 && attempts < params.max_tries {
        match move_group.compute_cartesian_path(&waypoints, params.eef_step, params.jump_threshold)
        {
            Ok(p) => {
                fraction = p.fraction;
                path = Some(p);
            }
            Err(e) => {
                warn!("failed to compute cartesian path: {e}");
                fraction = 0.0;
                path = None;
            }
        }
        attempts += 1;
        if params.log_interval > 0 && attempts % params.log_interval == 0 {
            info!("Still trying after {attempts} attempts...");
        }
    }

    let mut executed = false;
    match path {
        Some(path) if fraction >= 1.0 => {
            info!("Path computed successfully. Moving the arm.");
            match move_group.execute_trajectory(&path.trajectory).await {
                Ok(()) => executed = true,
                Err(e) => warn!("failed to execute the circle: {e}"),
            }
            tokio::time::sleep(params.settle_time()).await;
        }
        _ => info!("Path planning failed with only {fraction:.6} success after {attempts} attempts."),
    }

    move_to_named_target(move_group, params).await?;

    Ok(CircleDemoReport {
        attempts,
        fraction,
        executed,
        num_waypoints: waypoints.len(),
    })
}

async fn move_to_named_target<C>(
    move_group: &mut MoveGroup<C>,
    params: &DemoParameters,
) -> Result<(), Error>
where
    C: JointTrajectoryClient,
{
    move_group.set_named_target(&params.named_target)?;
    info!("moving to {}", params.named_target);
    move_group.move_to_target().await?;
    tokio::time::sleep(params.settle_time()).await;
    Ok(())
}

/// Simulated arm the demo runs on
pub struct DemoRobot {
    pub move_group: MoveGroup<Arc<DummyJointTrajectoryClient>>,
    /// Publishes the joint states [`MoveGroup`] reads.
    pub spinner: AsyncSpinner,
}

impl fmt::Debug for DemoRobot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoRobot")
            .field("joint_names", &self.move_group.joint_names())
            .field("spinner", &self.spinner)
            .finish_non_exhaustive()
    }
}

impl DemoRobot {
    /// Creates the controller, starts the spinner and loads the obstacles.
    pub fn new(config: &CircleDemoConfig) -> Result<Self, Error> {
        let urdf_robot = config.read_urdf()?;
        let joint_names = move_group_joint_names(&urdf_robot, &config.move_group)?;
        let mut client = DummyJointTrajectoryClient::new(joint_names);
        if let Some(speed) = config.controller.playback_speed {
            client = client.with_playback(speed);
        }
        if let Some(positions) = &config.controller.initial_positions {
            client = client.with_initial_positions(positions.clone())?;
        }
        let client = Arc::new(client);

        let spinner = AsyncSpinner::start(client.clone(), config.controller.spinner_period())?;
        let mut move_group = MoveGroup::new(client, &urdf_robot, config.move_group.clone())?
            .with_state_monitor(spinner.monitor());
        if let Some(obstacles) = config.load_obstacles()? {
            info!("obstacles: {} shapes", obstacles.shapes().len());
            move_group.set_obstacles(obstacles);
        }
        Ok(Self {
            move_group,
            spinner,
        })
    }

    pub async fn run(&mut self, params: &DemoParameters) -> Result<CircleDemoReport, Error> {
        run_circle_demo(&mut self.move_group, params).await
    }

    /// Stops the spinner. Dropping the robot does the same.
    pub fn shutdown(&mut self) {
        self.spinner.stop();
    }
}
