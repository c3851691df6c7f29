use std::ops::RangeInclusive;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("arm-interface: Length mismatch (model = {}, input = {})", model, input)]
    LengthMismatch { model: usize, input: usize },
    #[error("arm-interface: No Joint={} is found.", .0)]
    NoJoint(String),
    #[error(
        "arm-interface: Joint Names Mismatch : left = {:?}, right = {:?}",
        partial,
        full
    )]
    JointNamesMismatch {
        partial: Vec<String>,
        full: Vec<String>,
    },
    #[error(
        "arm-interface: Wait timeout target={:?}, cur={:?} is_reached={:?}",
        target,
        current,
        is_reached
    )]
    TimeoutWithDiff {
        target: Vec<f64>,
        current: Vec<f64>,
        is_reached: Vec<bool>,
    },
    #[error("arm-interface: Uninitialized : {}", message)]
    Uninitialized { message: String },
    #[error("arm-interface: Connection error : {}", message)]
    Connection { message: String },
    #[error("arm-interface: Canceled : {}", message)]
    Canceled { message: String },
    #[error(
        "arm-interface: Out of limit: joint={}, position={}, limit={:?}",
        name,
        position,
        limit
    )]
    OutOfLimit {
        name: String,
        position: f64,
        limit: RangeInclusive<f64>,
    },
    #[error("arm-interface: Other: {:?}", .0)]
    Other(#[from] anyhow::Error),
}
