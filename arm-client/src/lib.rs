#![doc = include_str!("../README.md")]
#![allow(missing_debug_implementations)] // TODO: k::SerialChain and CartesianPlanner don't implement Debug

mod config;
mod error;
mod move_group;
mod spinner;

pub mod utils;

pub use crate::{config::*, error::*, move_group::*, spinner::*};
