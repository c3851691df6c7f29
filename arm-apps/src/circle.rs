use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Arc of end effector waypoints in the xy plane
///
/// The first waypoint is the start pose moved by `-radius` in y. Each following
/// waypoint advances by `sweep_angle / num_points` along a circle of `radius`,
/// keeping the orientation and z of the start pose.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CircularPath {
    /// unit: m
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_num_points")]
    pub num_points: usize,
    /// unit: rad
    #[serde(default = "default_sweep_angle")]
    pub sweep_angle: f64,
}

fn default_radius() -> f64 {
    0.05
}

fn default_num_points() -> usize {
    36
}

fn default_sweep_angle() -> f64 {
    std::f64::consts::PI
}

impl Default for CircularPath {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            num_points: default_num_points(),
            sweep_angle: default_sweep_angle(),
        }
    }
}

impl CircularPath {
    /// Angle between two consecutive waypoints, 0.0 if `num_points` is 0
    pub fn step_angle(&self) -> f64 {
        if self.num_points == 0 {
            return 0.0;
        }
        self.sweep_angle / self.num_points as f64
    }

    /// Returns `num_points - 1` waypoints, but at least the shifted start pose.
    /// `start` itself is not included. No waypoint is returned if `num_points` is 0.
    pub fn waypoints(&self, start: &k::Isometry3<f64>) -> Vec<k::Isometry3<f64>> {
        if self.num_points == 0 {
            return vec![];
        }
        let theta = self.step_angle();
        let mut pose = *start;
        pose.translation.vector.y -= self.radius;
        let mut waypoints = Vec::with_capacity(self.num_points.max(2) - 1);
        waypoints.push(pose);
        for i in 2..self.num_points {
            let (prev, cur) = ((i - 1) as f64 * theta, i as f64 * theta);
            pose.translation.vector.x += self.radius * (cur.sin() - prev.sin());
            pose.translation.vector.y -= self.radius * (cur.cos() - prev.cos());
            waypoints.push(pose);
        }
        waypoints
    }

    /// Centre of the arc traced by [`waypoints`](Self::waypoints).
    pub fn center(&self, start: &k::Isometry3<f64>) -> k::Vector3<f64> {
        let theta = self.step_angle();
        let p = start.translation.vector;
        k::Vector3::new(
            p.x - self.radius * theta.sin(),
            p.y - self.radius + self.radius * theta.cos(),
            p.z,
        )
    }
}
