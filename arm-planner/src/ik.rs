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
use std::marker::PhantomData;

use k::{nalgebra as na, InverseKinematicsSolver, SubsetOf};
use na::RealField;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::funcs::*;

/// Randomize initial joint angles before solving
#[derive(Debug)]
pub struct RandomInitializeIkSolver<T, I>
where
    I: InverseKinematicsSolver<T>,
    T: RealField,
{
    /// The IK solver to be used after set random joint angles
    pub solver: I,
    /// The number to try to solve
    pub num_max_try: usize,
    phantom: PhantomData<T>,
}

impl<T, I> RandomInitializeIkSolver<T, I>
where
    T: RealField,
    I: InverseKinematicsSolver<T>,
{
    pub fn new(solver: I, num_max_try: usize) -> Self {
        Self {
            solver,
            num_max_try,
            phantom: PhantomData,
        }
    }
}

impl<T, I> InverseKinematicsSolver<T> for RandomInitializeIkSolver<T, I>
where
    T: RealField + Copy + SubsetOf<f64>,
    I: InverseKinematicsSolver<T>,
{
    fn solve_with_constraints(
        &self,
        arm: &k::SerialChain<T>,
        target_pose: &na::Isometry3<T>,
        constraints: &k::Constraints,
    ) -> Result<(), k::Error> {
        let limits = arm.iter_joints().map(|j| j.limits).collect();
        let initial_angles = arm.joint_positions();
        let mut last_error = None;

        for i in 0..self.num_max_try.max(1) {
            match self
                .solver
                .solve_with_constraints(arm, target_pose, constraints)
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("random initialized IK: retry {i} after {e}");
                    last_error = Some(e);
                }
            }
            let mut new_angles = generate_random_joint_positions_from_limits(&limits);
            modify_to_nearest_angle(&initial_angles, &mut new_angles, &limits);
            arm.set_joint_positions(&new_angles)?;
        }
        // failed
        arm.set_joint_positions(&initial_angles)?;
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Parameters of the Jacobian based IK solver
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IkSolverParameters {
    /// unit: m
    #[serde(default = "default_allowable_position_error")]
    pub allowable_position_error: f64,
    /// unit: rad
    #[serde(default = "default_allowable_angle_error")]
    pub allowable_angle_error: f64,
    #[serde(default = "default_jacobian_multiplier")]
    pub jacobian_multiplier: f64,
    #[serde(default = "default_num_max_try")]
    pub num_max_try: usize,
    /// Retry from random joint angles when the seeded solve fails
    #[serde(default)]
    pub use_random_ik: bool,
}

fn default_allowable_position_error() -> f64 {
    0.005
}

fn default_allowable_angle_error() -> f64 {
    0.005
}

fn default_jacobian_multiplier() -> f64 {
    0.1
}

fn default_num_max_try() -> usize {
    300
}

impl Default for IkSolverParameters {
    fn default() -> Self {
        Self {
            allowable_position_error: default_allowable_position_error(),
            allowable_angle_error: default_allowable_angle_error(),
            jacobian_multiplier: default_jacobian_multiplier(),
            num_max_try: default_num_max_try(),
            use_random_ik: false,
        }
    }
}

pub fn create_jacobian_ik_solver(parameters: &IkSolverParameters) -> k::JacobianIkSolver<f64> {
    k::JacobianIkSolver::new(
        parameters.allowable_position_error,
        parameters.allowable_angle_error,
        parameters.jacobian_multiplier,
        parameters.num_max_try,
    )
}

pub fn create_random_jacobian_ik_solver(
    parameters: &IkSolverParameters,
) -> RandomInitializeIkSolver<f64, k::JacobianIkSolver<f64>> {
    RandomInitializeIkSolver::new(create_jacobian_ik_solver(parameters), parameters.num_max_try)
}

/// Creates the solver described by `parameters` behind a trait object.
pub fn create_ik_solver(
    parameters: &IkSolverParameters,
) -> Box<dyn InverseKinematicsSolver<f64> + Send + Sync> {
    if parameters.use_random_ik {
        Box::new(create_random_jacobian_ik_solver(parameters))
    } else {
        Box::new(create_jacobian_ik_solver(parameters))
    }
}
