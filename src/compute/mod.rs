//! Compute module - Grid world, observations, policy network and evolution.

mod grid;
mod network;

pub mod evolution;
pub mod observation;

pub use grid::*;
pub use network::*;
