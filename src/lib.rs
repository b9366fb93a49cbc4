//! Snake Evo - Neuroevolution of snake-playing policies.
//!
//! A population of fixed-topology feed-forward networks is trained with a
//! generational genetic algorithm to play snake on a small grid. Each
//! network sees a short feature vector describing the surroundings of the
//! snake's head and picks one of three relative moves.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, genome and statistics types
//! - `compute`: Grid world, observation encoder, policy network and the
//!   evolutionary search
//!
//! # Example
//!
//! ```rust,no_run
//! use snake_evo::{
//!     compute::{GridWorld, PolicyNetwork, Topology, observation},
//!     schema::EvolutionConfig,
//! };
//!
//! let config = EvolutionConfig::default();
//! let topology = Topology::from_config(&config.network).unwrap();
//! let network = PolicyNetwork::zeros(topology);
//!
//! let mut world = GridWorld::new(&config.game, 7).unwrap();
//! while !world.is_terminal() {
//!     let features = observation::encode(&world, config.network.observation);
//!     let action = network.act(&features).unwrap();
//!     world.step(action).unwrap();
//! }
//!
//! println!("{world}");
//! println!("Score: {}", world.score());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{Action, GridWorld, PolicyNetwork, Topology};
pub use schema::{EvolutionConfig, GameConfig, Genome};
