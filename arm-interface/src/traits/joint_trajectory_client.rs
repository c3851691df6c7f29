use std::time::Duration;

use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{error::Error, waits::WaitFuture};

/// A point of a joint trajectory, ordered like [`JointTrajectoryClient::joint_names`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    pub velocities: Option<Vec<f64>>,
    pub accelerations: Option<Vec<f64>>,
    pub time_from_start: Duration,
}

impl TrajectoryPoint {
    pub fn new(positions: Vec<f64>, time_from_start: Duration) -> Self {
        Self {
            positions,
            velocities: None,
            accelerations: None,
            time_from_start,
        }
    }

    pub fn with_velocities(mut self, velocities: Vec<f64>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    pub fn with_accelerations(mut self, accelerations: Vec<f64>) -> Self {
        self.accelerations = Some(accelerations);
        self
    }
}

#[auto_impl(Box, Arc)]
pub trait JointTrajectoryClient: Send + Sync {
    /// Returns names of joints that this client handles.
    fn joint_names(&self) -> Vec<String>;

    /// Returns the current joint positions.
    fn current_joint_positions(&self) -> Result<Vec<f64>, Error>;

    /// Send the specified joint positions and returns a future that waits until
    /// complete the move joints.
    ///
    /// # Implementation
    ///
    /// The returned future is expected to behave similarly to
    /// [`std::thread::JoinHandle`] and [`tokio::task::JoinHandle`]:
    ///
    /// - Can wait for the operation to complete by `.await`.
    /// - The operation does not end even if it is dropped.
    fn send_joint_positions(
        &self,
        positions: Vec<f64>,
        duration: Duration,
    ) -> Result<WaitFuture, Error>;

    /// Send the specified joint trajectory and returns a future that waits until
    /// complete the move joints.
    ///
    /// See the "Implementation" section of the
    /// [`send_joint_positions`](Self::send_joint_positions) method.
    fn send_joint_trajectory(&self, trajectory: Vec<TrajectoryPoint>) -> Result<WaitFuture, Error>;
}
