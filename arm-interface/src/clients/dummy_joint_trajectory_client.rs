use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    error::Error,
    traits::{JointTrajectoryClient, TrajectoryPoint},
    waits::WaitFuture,
};

const PLAYBACK_TICK: Duration = Duration::from_millis(5);

/// Dummy JointTrajectoryClient for Debug or Tests
///
/// By default every command is applied at once. With [`with_playback`](Self::with_playback)
/// the trajectory is replayed on a background thread and the returned [`WaitFuture`]
/// completes when the last point has been reached.
#[derive(Debug)]
pub struct DummyJointTrajectoryClient {
    joint_names: Vec<String>,
    pub positions: Arc<Mutex<Vec<f64>>>,
    pub last_trajectory: Arc<Mutex<Vec<TrajectoryPoint>>>,
    playback_speed: Option<f64>,
}

impl DummyJointTrajectoryClient {
    pub fn new(joint_names: Vec<String>) -> Self {
        let dof = joint_names.len();
        Self {
            joint_names,
            positions: Arc::new(Mutex::new(vec![0.0; dof])),
            last_trajectory: Arc::new(Mutex::new(Vec::new())),
            playback_speed: None,
        }
    }

    /// Replays trajectories in real time multiplied by `speed`.
    pub fn with_playback(mut self, speed: f64) -> Self {
        self.playback_speed = Some(speed);
        self
    }

    pub fn with_initial_positions(self, positions: Vec<f64>) -> Result<Self, Error> {
        self.check_length(&positions)?;
        *self.positions.lock().unwrap() = positions;
        Ok(self)
    }

    fn check_length(&self, positions: &[f64]) -> Result<(), Error> {
        if positions.len() != self.joint_names.len() {
            return Err(Error::LengthMismatch {
                model: self.joint_names.len(),
                input: positions.len(),
            });
        }
        Ok(())
    }
}

fn play_trajectory(positions: &Mutex<Vec<f64>>, trajectory: &[TrajectoryPoint], speed: f64) {
    let started = Instant::now();
    let mut prev_positions = positions.lock().unwrap().clone();
    let mut prev_time = Duration::ZERO;
    for point in trajectory {
        loop {
            let elapsed = started.elapsed().mul_f64(speed);
            if elapsed >= point.time_from_start {
                break;
            }
            let span = point.time_from_start.saturating_sub(prev_time).as_secs_f64();
            let rate = (elapsed.saturating_sub(prev_time).as_secs_f64() / span).clamp(0.0, 1.0);
            *positions.lock().unwrap() = prev_positions
                .iter()
                .zip(&point.positions)
                .map(|(from, to)| from + (to - from) * rate)
                .collect();
            thread::sleep(PLAYBACK_TICK);
        }
        *positions.lock().unwrap() = point.positions.clone();
        prev_positions.clone_from(&point.positions);
        prev_time = point.time_from_start;
    }
}

impl JointTrajectoryClient for DummyJointTrajectoryClient {
    fn joint_names(&self) -> Vec<String> {
        self.joint_names.clone()
    }

    fn current_joint_positions(&self) -> Result<Vec<f64>, Error> {
        Ok(self.positions.lock().unwrap().clone())
    }

    fn send_joint_positions(
        &self,
        positions: Vec<f64>,
        duration: Duration,
    ) -> Result<WaitFuture, Error> {
        self.send_joint_trajectory(vec![TrajectoryPoint::new(positions, duration)])
    }

    fn send_joint_trajectory(&self, trajectory: Vec<TrajectoryPoint>) -> Result<WaitFuture, Error> {
        for point in &trajectory {
            self.check_length(&point.positions)?;
        }
        *self.last_trajectory.lock().unwrap() = trajectory.clone();
        let speed = match self.playback_speed {
            Some(speed) if speed > 0.0 => speed,
            _ => {
                if let Some(last_point) = trajectory.last() {
                    *self.positions.lock().unwrap() = last_point.positions.clone();
                }
                return Ok(WaitFuture::ready());
            }
        };

        debug!("playing {} points (speed={speed})", trajectory.len());
        let positions = self.positions.clone();
        let (sender, receiver) = oneshot::channel();
        thread::spawn(move || {
            play_trajectory(&positions, &trajectory, speed);
            // The receiver may already be dropped.
            let _ = sender.send(());
        });
        Ok(WaitFuture::new(async move {
            receiver.await.map_err(|e| Error::Canceled {
                message: format!("trajectory playback: {e}"),
            })
        }))
    }
}
