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
#![allow(clippy::ptr_arg)]

use std::f64::consts::PI;

use k::{nalgebra as na, nalgebra::RealField};
use num_traits::Float;
use trajectory::{CubicSpline, Trajectory};

use crate::errors::*;

type Limits<T> = Vec<Option<k::joint::Range<T>>>;

/// Clamp joint angles to set angles safely
pub fn generate_clamped_joint_positions_from_limits<T>(
    angles: &[T],
    limits: &Limits<T>,
) -> Result<Vec<T>>
where
    T: RealField + Copy,
{
    if angles.len() != limits.len() {
        return Err(Error::DofMismatch(angles.len(), limits.len()));
    }
    Ok(limits
        .iter()
        .zip(angles.iter())
        .map(|(range, angle)| match range {
            Some(range) if *angle > range.max => range.max,
            Some(range) if *angle < range.min => range.min,
            _ => *angle,
        })
        .collect())
}

/// Returns true if all the angles are inside of the optional limits
pub fn is_within_limits<T>(angles: &[T], limits: &Limits<T>) -> bool
where
    T: RealField + Copy,
{
    angles.len() == limits.len()
        && angles.iter().zip(limits).all(|(angle, range)| match range {
            Some(range) => range.min <= *angle && *angle <= range.max,
            None => true,
        })
}

/// Generate random joint angles from the optional limits
///
/// If the limit is None, -PI <-> PI is used.
pub fn generate_random_joint_positions_from_limits<T>(limits: &Limits<T>) -> Vec<T>
where
    T: RealField + Copy,
{
    limits
        .iter()
        .map(|range| match range {
            Some(range) => {
                (range.max - range.min) * na::convert::<f64, T>(rand::random()) + range.min
            }
            None => na::convert::<f64, T>((rand::random::<f64>() - 0.5) * 2.0 * PI),
        })
        .collect()
}

/// If the joint has no limit, select the nearest value from (x + 2pi *).
///
/// ```
/// let mut a = vec![0.1f64, 10.0];
/// let limits = vec![Some(k::joint::Range::new(0.0, 0.2)), None];
/// arm_planner::modify_to_nearest_angle(&vec![1.0, 0.5], &mut a, &limits);
/// assert_eq!(a[0], 0.1, "no change");
/// assert!((a[1] - 3.716814).abs() < 0.000001);
/// ```
pub fn modify_to_nearest_angle<T>(vec1: &[T], vec2: &mut [T], limits: &Limits<T>)
where
    T: RealField + Copy,
{
    assert_eq!(vec1.len(), vec2.len());
    let pi2 = T::two_pi();
    for i in 0..vec1.len() {
        if limits[i].is_some() {
            continue;
        }
        let dist1 = (vec1[i] - vec2[i]).abs();
        let dist2 = (vec1[i] - (vec2[i] - pi2)).abs();
        if dist1 > dist2 {
            vec2[i] -= pi2;
        } else {
            let dist3 = (vec1[i] - (vec2[i] + pi2)).abs();
            if dist1 > dist3 {
                vec2[i] += pi2;
            }
        }
    }
}

/// Largest absolute per-joint difference between two joint vectors
pub fn max_joint_difference<T>(a: &[T], b: &[T]) -> T
where
    T: Float,
{
    a.iter()
        .zip(b)
        .fold(T::zero(), |max, (a, b)| max.max((*a - *b).abs()))
}

/// A densified joint path point with spline derivatives.
#[derive(Debug, Clone)]
pub struct JointPathPoint<T> {
    pub position: Vec<T>,
    pub velocity: Vec<T>,
    pub acceleration: Vec<T>,
}

/// Interpolate position vectors with a cubic spline
///
/// The key frames are placed at equal intervals over `total_duration` and the
/// spline is sampled every `unit_duration`, plus the final point.
///
/// # Example
///
/// ```
/// let points = arm_planner::interpolate(&[vec![0.0, 1.0], vec![2.0, 0.0]], 1.0, 0.1).unwrap();
/// assert_eq!(points.len(), 12);
/// assert_eq!(points[0].position[0], 0.0);
/// assert_eq!(points[0].position[1], 1.0);
/// assert_eq!(points[1].position[0], 0.2);
/// assert_eq!(points[1].position[1], 0.9);
/// ```
pub fn interpolate<T>(
    points: &[Vec<T>],
    total_duration: T,
    unit_duration: T,
) -> Option<Vec<JointPathPoint<T>>>
where
    T: Float,
{
    if points.len() < 2 || unit_duration <= T::zero() {
        return None;
    }
    let key_frame_unit_duration = total_duration / (T::from(points.len())? - T::one());
    let times = (0..points.len())
        .map(|i| T::from(i).map(|i| i * key_frame_unit_duration))
        .collect::<Option<Vec<T>>>()?;

    let spline = CubicSpline::new(times, points.to_vec())?;
    let sample = |t: T| -> Option<JointPathPoint<T>> {
        Some(JointPathPoint {
            position: spline.position(t)?,
            velocity: spline.velocity(t)?,
            acceleration: spline.acceleration(t)?,
        })
    };
    let mut ret = Vec::with_capacity(points.len());
    let mut t = T::zero();
    while t < total_duration {
        ret.push(sample(t)?);
        t = t + unit_duration;
    }
    ret.push(sample(total_duration)?);
    Some(ret)
}

/// Set random joint angles
pub fn set_random_joint_positions<T>(robot: &k::Chain<T>) -> ::std::result::Result<(), k::Error>
where
    T: RealField + Copy + k::SubsetOf<f64>,
{
    let limits = robot.iter_joints().map(|j| j.limits).collect();
    robot.set_joint_positions(&generate_random_joint_positions_from_limits(&limits))
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_clamp() {
        let limits = vec![Some(k::joint::Range::new(-1.0, 1.0)), None];
        let clamped = generate_clamped_joint_positions_from_limits(&[2.0, 5.0], &limits).unwrap();
        assert_approx_eq!(clamped[0], 1.0);
        assert_approx_eq!(clamped[1], 5.0);
        assert!(matches!(
            generate_clamped_joint_positions_from_limits(&[0.0], &limits),
            Err(Error::DofMismatch(1, 2))
        ));
    }

    #[test]
    fn test_is_within_limits() {
        let limits = vec![
            Some(k::joint::Range::new(-1.0, 1.0)),
            None,
            Some(k::joint::Range::new(0.0, 0.5)),
        ];
        assert!(is_within_limits(&[0.0, 100.0, 0.1], &limits));
        assert!(!is_within_limits(&[0.0, 0.0, 0.6], &limits));
        assert!(!is_within_limits(&[0.0, 0.0], &limits));
    }

    #[test]
    fn test_random_within_limits() {
        let limits = vec![Some(k::joint::Range::new(-0.5, 0.2)), None];
        for _ in 0..100 {
            let angles = generate_random_joint_positions_from_limits(&limits);
            assert!((-0.5..=0.2).contains(&angles[0]));
            assert!((-PI..=PI).contains(&angles[1]));
        }
    }

    #[test]
    fn test_max_joint_difference() {
        assert_approx_eq!(max_joint_difference(&[0.0, 1.0, -1.0], &[0.1, 0.5, -1.2]), 0.5);
        assert_approx_eq!(max_joint_difference::<f64>(&[], &[]), 0.0);
    }

    #[test]
    fn test_interpolate_rejects_single_point() {
        assert!(interpolate(&[vec![0.0]], 1.0, 0.1).is_none());
        let points = interpolate(&[vec![0.0], vec![1.0], vec![0.0]], 2.0, 0.5).unwrap();
        assert_eq!(points.len(), 5);
        assert_approx_eq!(points[2].position[0], 1.0);
        assert_approx_eq!(points[4].position[0], 0.0);
    }
}
