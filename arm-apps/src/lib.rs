#![doc = include_str!("../README.md")]

mod circle;
mod config;
mod demo;
mod error;
pub mod overwrite;
pub mod utils;

pub use crate::{circle::*, config::*, demo::*, error::*};
