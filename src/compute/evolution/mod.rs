//! Neuroevolution of snake policies.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): Random initialization, tournament
//!   selection, crossover, and Gaussian mutation
//! - **Fitness** (`fitness`): Episode rollouts scored by a two-phase heuristic
//! - **Search** (`search`): Generational GA with elitism
//! - **Archive** (`archive`): Genome and statistics files
//!
//! # Example
//!
//! ```rust,no_run
//! use snake_evo::schema::EvolutionConfig;
//! use snake_evo::compute::evolution::{EvolutionEngine, GenomeArchive};
//!
//! let config = EvolutionConfig::default();
//! let mut archive = GenomeArchive::new(&config.archive).unwrap();
//!
//! let mut engine = EvolutionEngine::new(config).unwrap();
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!(
//!             "Generation {}: best fitness = {:.1}",
//!             progress.stats.generation, progress.stats.best_fitness
//!         );
//!         archive.record(progress).unwrap();
//!     })
//!     .unwrap();
//!
//! println!("Best fitness: {:.1}", result.stats.best_fitness);
//! ```

mod archive;
mod fitness;
mod genome;
mod search;

pub use archive::{
    ArchiveError, BEST_OVERALL_FILE, GenomeArchive, HISTORY_FILE, load_genome, load_history,
};
pub use fitness::{EpisodeSummary, FitnessEvaluator, Phase, score_episode};
pub use genome::GenomeRng;
pub use search::{EvolutionEngine, EvolutionError, next_generation, rank};
