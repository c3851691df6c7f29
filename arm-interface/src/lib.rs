//! Abstract interface between motion planning code and a manipulator controller.
//!
//! Planning crates only talk to hardware (or a simulation of it) through
//! [`JointTrajectoryClient`]. Every motion command returns a [`WaitFuture`] that can be
//! awaited until the controller reports completion.

mod clients;
mod error;
mod traits;
mod waits;

pub use clients::*;
pub use error::*;
pub use traits::*;
pub use waits::*;

// re-export
pub use async_trait::async_trait;
