use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use auto_impl::auto_impl;
use futures::future::{self, BoxFuture, FutureExt};
use tracing::warn;

use crate::{error::Error, traits::JointTrajectoryClient};

/// Waits until the underlying future is complete.
#[must_use = "You must explicitly choose whether to wait for the complete or do not wait"]
pub struct WaitFuture {
    future: BoxFuture<'static, Result<(), Error>>,
}

impl WaitFuture {
    /// Creates a new `WaitFuture` from the given future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            future: future.boxed(),
        }
    }

    /// Creates a new `WaitFuture` which is already complete.
    pub fn ready() -> Self {
        Self::new(future::ready(Ok(())))
    }

    /// Creates a new `WaitFuture` which waits for all of the given futures.
    pub fn join_all<I>(wait_futures: I) -> Self
    where
        I: IntoIterator<Item = WaitFuture>,
    {
        Self::new(future::try_join_all(wait_futures).map(|r| r.map(|_| ())))
    }
}

impl Future for WaitFuture {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl fmt::Debug for WaitFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitFuture").finish_non_exhaustive()
    }
}

const CHECK_UNIT_SEC: f64 = 0.01;

#[async_trait]
#[auto_impl(Box, Arc)]
pub trait CompleteCondition: Send + Sync {
    async fn wait(
        &self,
        client: &dyn JointTrajectoryClient,
        target_positions: &[f64],
        duration_sec: f64,
    ) -> Result<(), Error>;
}

#[derive(Clone, Debug)]
pub struct TotalJointDiffCondition {
    pub allowable_error: f64,
    pub timeout_sec: f64,
}

impl TotalJointDiffCondition {
    pub fn new(allowable_error: f64, timeout_sec: f64) -> Self {
        Self {
            allowable_error,
            timeout_sec,
        }
    }
}

impl Default for TotalJointDiffCondition {
    fn default() -> Self {
        Self::new(0.02, 10.0)
    }
}

#[async_trait]
impl CompleteCondition for TotalJointDiffCondition {
    async fn wait(
        &self,
        client: &dyn JointTrajectoryClient,
        target_positions: &[f64],
        duration_sec: f64,
    ) -> Result<(), Error> {
        let check_unit_duration = Duration::from_secs_f64(CHECK_UNIT_SEC);
        let num_repeat = ((self.timeout_sec + duration_sec) / CHECK_UNIT_SEC) as usize;
        for _ in 0..=num_repeat {
            let curs = client.current_joint_positions()?;
            let sum_err: f64 = target_positions
                .iter()
                .zip(curs.iter())
                .map(|(tar, cur)| (tar - cur).abs())
                .sum();
            if sum_err <= self.allowable_error {
                return Ok(());
            }
            tokio::time::sleep(check_unit_duration).await;
        }
        Err(Error::TimeoutWithDiff {
            target: target_positions.to_vec(),
            current: client.current_joint_positions()?,
            is_reached: vec![false],
        })
    }
}

#[derive(Clone, Debug)]
pub struct EachJointDiffCondition {
    pub allowable_errors: Vec<f64>,
    pub timeout_sec: f64,
}

impl EachJointDiffCondition {
    pub fn new(allowable_errors: Vec<f64>, timeout_sec: f64) -> Self {
        Self {
            allowable_errors,
            timeout_sec,
        }
    }
}

#[async_trait]
impl CompleteCondition for EachJointDiffCondition {
    async fn wait(
        &self,
        client: &dyn JointTrajectoryClient,
        target_positions: &[f64],
        duration_sec: f64,
    ) -> Result<(), Error> {
        if target_positions.len() != self.allowable_errors.len() {
            warn!("EachJointDiffCondition: condition size mismatch");
            return Err(Error::LengthMismatch {
                model: target_positions.len(),
                input: self.allowable_errors.len(),
            });
        }
        let dof = target_positions.len();
        let mut is_reached = vec![false; dof];
        let check_unit_duration = Duration::from_secs_f64(CHECK_UNIT_SEC);
        let num_repeat = ((self.timeout_sec + duration_sec) / CHECK_UNIT_SEC) as usize;

        for _ in 0..=num_repeat {
            let curs = client.current_joint_positions()?;
            for i in 0..dof {
                if !is_reached[i] {
                    is_reached[i] = (target_positions[i] - curs[i]).abs() < self.allowable_errors[i];
                }
            }
            if !is_reached.contains(&false) {
                return Ok(());
            }
            tokio::time::sleep(check_unit_duration).await;
        }
        Err(Error::TimeoutWithDiff {
            target: target_positions.to_vec(),
            current: client.current_joint_positions()?,
            is_reached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready() {
        assert!(WaitFuture::ready().await.is_ok());
    }

    #[tokio::test]
    async fn test_join_all() {
        let ok = WaitFuture::join_all(vec![WaitFuture::ready(), WaitFuture::ready()]);
        assert!(ok.await.is_ok());

        let err = WaitFuture::join_all(vec![
            WaitFuture::ready(),
            WaitFuture::new(async {
                Err(Error::Canceled {
                    message: "stop".to_owned(),
                })
            }),
        ]);
        assert!(matches!(err.await, Err(Error::Canceled { .. })));
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", WaitFuture::ready()), "WaitFuture { .. }");
    }
}
