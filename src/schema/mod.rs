//! Schema module - Configuration, genome and statistics types.

mod config;
mod evolution;

pub use config::*;
pub use evolution::*;
