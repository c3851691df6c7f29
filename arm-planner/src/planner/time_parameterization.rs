/*
Copyright 2017 Takashi Ogura

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use tracing::{debug, warn};

use crate::{errors::*, funcs::max_joint_difference};

const MIN_SEGMENT_DURATION: f64 = 1e-3;
const MAX_ITERATIONS: usize = 1000;
const LIMIT_TOLERANCE: f64 = 1e-6;
const DEFAULT_VELOCITY_LIMIT: f64 = 1.0;

/// A joint path point with timing information
#[derive(Clone, Debug)]
pub struct TimedJointPoint {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
    /// unit: sec
    pub time_from_start: f64,
}

/// Reads the velocity limits of `joint_names` from the `<limit>` elements of URDF.
///
/// Joints without a positive velocity limit get 1.0 rad/s.
pub fn velocity_limits_from_urdf(
    urdf_robot: &urdf_rs::Robot,
    joint_names: &[String],
) -> Result<Vec<f64>> {
    joint_names
        .iter()
        .map(|name| {
            let joint = urdf_robot
                .joints
                .iter()
                .find(|j| &j.name == name)
                .ok_or_else(|| Error::NotFound(name.to_owned()))?;
            if joint.limit.velocity > 0.0 {
                Ok(joint.limit.velocity)
            } else {
                warn!("{name} has no velocity limit, use {DEFAULT_VELOCITY_LIMIT}");
                Ok(DEFAULT_VELOCITY_LIMIT)
            }
        })
        .collect()
}

/// Assigns time stamps to a joint path
///
/// Every segment starts with the shortest duration allowed by the velocity limits.
/// Segments which violate the acceleration limits are stretched until no limit is
/// violated. The path starts and ends with zero velocity.
#[derive(Clone, Debug)]
pub struct TimeParameterization {
    max_velocities: Vec<f64>,
    max_accelerations: Vec<f64>,
}

impl TimeParameterization {
    pub fn new(max_velocities: Vec<f64>, max_accelerations: Vec<f64>) -> Result<Self> {
        if max_velocities.len() != max_accelerations.len() {
            return Err(Error::DofMismatch(
                max_velocities.len(),
                max_accelerations.len(),
            ));
        }
        if let Some(v) = max_velocities
            .iter()
            .chain(&max_accelerations)
            .find(|v| **v <= 0.0 || !v.is_finite())
        {
            return Err(Error::InvalidParameter(format!(
                "limits must be positive: {v}"
            )));
        }
        Ok(Self {
            max_velocities,
            max_accelerations,
        })
    }

    pub fn dof(&self) -> usize {
        self.max_velocities.len()
    }

    pub fn max_velocities(&self) -> &[f64] {
        &self.max_velocities
    }

    pub fn max_accelerations(&self) -> &[f64] {
        &self.max_accelerations
    }

    /// Time-parameterizes `path` with the limits multiplied by the scaling factors.
    ///
    /// The scaling factors must be in (0, 1].
    pub fn parameterize(
        &self,
        path: &[Vec<f64>],
        velocity_scaling: f64,
        acceleration_scaling: f64,
    ) -> Result<Vec<TimedJointPoint>> {
        for scaling in [velocity_scaling, acceleration_scaling] {
            if !(scaling > 0.0 && scaling <= 1.0) {
                return Err(Error::InvalidParameter(format!(
                    "scaling factor must be in (0, 1]: {scaling}"
                )));
            }
        }
        if path.is_empty() {
            return Err(Error::TimeParameterization("empty path".to_owned()));
        }
        if let Some(point) = path.iter().find(|p| p.len() != self.dof()) {
            return Err(Error::DofMismatch(point.len(), self.dof()));
        }
        let max_velocities = self
            .max_velocities
            .iter()
            .map(|v| v * velocity_scaling)
            .collect::<Vec<_>>();
        let max_accelerations = self
            .max_accelerations
            .iter()
            .map(|a| a * acceleration_scaling)
            .collect::<Vec<_>>();

        let mut durations = path
            .windows(2)
            .map(|w| {
                w[0].iter()
                    .zip(&w[1])
                    .zip(&max_velocities)
                    .map(|((from, to), max)| (to - from).abs() / max)
                    .fold(MIN_SEGMENT_DURATION, f64::max)
            })
            .collect::<Vec<_>>();

        for iteration in 0..MAX_ITERATIONS {
            let velocities = point_velocities(path, &durations);
            let mut violated = false;
            for (i, duration) in durations.iter_mut().enumerate() {
                let ratio = velocities[i]
                    .iter()
                    .zip(&velocities[i + 1])
                    .zip(&max_accelerations)
                    .map(|((v0, v1), max)| (v1 - v0).abs() / *duration / max)
                    .fold(0.0, f64::max);
                if ratio > 1.0 + LIMIT_TOLERANCE {
                    *duration *= ratio.sqrt();
                    violated = true;
                }
            }
            if !violated {
                debug!("time parameterization converged in {iteration} iterations");
                return Ok(timed_points(path, &durations, velocities));
            }
        }
        Err(Error::TimeParameterization(format!(
            "acceleration limits are not satisfied after {MAX_ITERATIONS} iterations"
        )))
    }
}

/// Velocities at the points, zero at both ends and the mean of the adjacent
/// segment velocities elsewhere.
fn point_velocities(path: &[Vec<f64>], durations: &[f64]) -> Vec<Vec<f64>> {
    let dof = path[0].len();
    let segment_velocities = path
        .windows(2)
        .zip(durations)
        .map(|(w, dt)| {
            w[0].iter()
                .zip(&w[1])
                .map(|(from, to)| (to - from) / dt)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    (0..path.len())
        .map(|i| {
            if i == 0 || i == path.len() - 1 {
                vec![0.0; dof]
            } else {
                segment_velocities[i - 1]
                    .iter()
                    .zip(&segment_velocities[i])
                    .map(|(a, b)| (a + b) * 0.5)
                    .collect()
            }
        })
        .collect()
}

fn timed_points(
    path: &[Vec<f64>],
    durations: &[f64],
    velocities: Vec<Vec<f64>>,
) -> Vec<TimedJointPoint> {
    let n = path.len();
    let mut time_from_start = 0.0;
    velocities
        .iter()
        .enumerate()
        .map(|(i, velocity)| {
            if i > 0 {
                time_from_start += durations[i - 1];
            }
            // central difference inside, one sided at the ends
            let (before, after) = (i.saturating_sub(1), (i + 1).min(n - 1));
            let span = if before == after {
                0.0
            } else {
                durations[before..after].iter().sum::<f64>()
            };
            let accelerations = velocities[after]
                .iter()
                .zip(&velocities[before])
                .map(|(v1, v0)| if span > 0.0 { (v1 - v0) / span } else { 0.0 })
                .collect();
            TimedJointPoint {
                positions: path[i].clone(),
                velocities: velocity.clone(),
                accelerations,
                time_from_start,
            }
        })
        .collect()
}

/// Duration of the longest per-joint move at the given velocity limits
pub fn minimum_duration(from: &[f64], to: &[f64], max_velocities: &[f64]) -> f64 {
    let scaled_from = from
        .iter()
        .zip(max_velocities)
        .map(|(q, v)| q / v)
        .collect::<Vec<_>>();
    let scaled_to = to
        .iter()
        .zip(max_velocities)
        .map(|(q, v)| q / v)
        .collect::<Vec<_>>();
    max_joint_difference(&scaled_from, &scaled_to)
}
