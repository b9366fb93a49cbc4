//! Generational genetic algorithm over policy genomes.
//!
//! [`next_generation`] is the pure selection and variation step. The
//! [`EvolutionEngine`] owns the population, evaluates it, tracks the
//! best-ever genome and statistics, and drives the generation loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::compute::grid::WorldError;
use crate::compute::network::NetworkError;
use crate::schema::{
    BestRecord, EvolutionConfig, EvolutionConfigError, EvolutionHistory, EvolutionProgress,
    EvolutionResult, EvolutionStats, GenerationStats, GeneticAlgorithmConfig, Genome, StopReason,
};

use super::fitness::FitnessEvaluator;
use super::genome::GenomeRng;

/// Errors raised while training.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Fitness vector has {actual} entries for a population of {expected}")]
    FitnessLength { expected: usize, actual: usize },
    #[error("Population is empty")]
    EmptyPopulation,
    #[error(transparent)]
    Config(#[from] EvolutionConfigError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Population indices sorted by descending fitness. Ties keep population
/// order.
pub fn rank(fitness: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));
    order
}

/// Build the next population from an evaluated one.
///
/// The top `elite_count` genomes are copied unchanged. The remaining slots are
/// filled with mutated children of tournament-selected parent pairs.
pub fn next_generation(
    population: &[Genome],
    fitness: &[f32],
    ga: &GeneticAlgorithmConfig,
    rng: &mut GenomeRng,
) -> Result<Vec<Genome>, EvolutionError> {
    if population.is_empty() {
        return Err(EvolutionError::EmptyPopulation);
    }
    if population.len() != fitness.len() {
        return Err(EvolutionError::FitnessLength {
            expected: population.len(),
            actual: fitness.len(),
        });
    }

    let size = population.len();
    let order = rank(fitness);
    let mut next: Vec<Genome> = order
        .iter()
        .take(ga.elite_count(size))
        .map(|&i| population[i].clone())
        .collect();

    while next.len() < size {
        let parent1 = &population[order[rng.tournament(size, ga.tournament_size)]];
        let parent2 = &population[order[rng.tournament(size, ga.tournament_size)]];

        let (child1, child2) = rng.crossover(parent1, parent2, ga.crossover);
        next.push(rng.mutate(&child1, ga.mutation_rate, ga.mutation_std));
        if next.len() < size {
            next.push(rng.mutate(&child2, ga.mutation_rate, ga.mutation_std));
        }
    }

    Ok(next)
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    evaluator: FitnessEvaluator,
    population: Vec<Genome>,
    history: EvolutionHistory,
    generation: usize,
    best: Option<BestRecord>,
    evaluations: u64,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine with a freshly initialized population.
    pub fn new(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        config.validate()?;

        let mut rng = match config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        let evaluator = FitnessEvaluator::new(
            config.game.clone(),
            &config.network,
            config.fitness.clone(),
            config.evaluation.clone(),
        )?;

        let genome_len = evaluator.topology().parameter_count();
        let population = (0..config.population.size)
            .map(|_| rng.random_genome(genome_len, config.algorithm.init_scale))
            .collect();

        log::debug!(
            "Initialized {} genomes of {} parameters ({:?})",
            config.population.size,
            genome_len,
            evaluator.topology().widths()
        );

        Ok(Self {
            config,
            rng,
            evaluator,
            population,
            history: EvolutionHistory::default(),
            generation: 0,
            best: None,
            evaluations: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    /// Current population, in index order.
    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best genome seen so far.
    pub fn best(&self) -> Option<&BestRecord> {
        self.best.as_ref()
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Evaluate every genome of the current population, in index order.
    pub fn evaluate_population(&mut self) -> Result<Vec<f32>, EvolutionError> {
        let mut fitness = Vec::with_capacity(self.population.len());
        for genome in &self.population {
            fitness.push(self.evaluator.evaluate(genome, &mut self.rng)?);
        }
        self.evaluations += self.population.len() as u64;
        Ok(fitness)
    }

    /// Record statistics for the current population, update the best-ever
    /// genome and replace the population with the next generation.
    ///
    /// On error the engine is left unchanged.
    pub fn evolve(&mut self, fitness: &[f32]) -> Result<GenerationStats, EvolutionError> {
        let next = next_generation(
            &self.population,
            fitness,
            &self.config.algorithm,
            &mut self.rng,
        )?;
        let stats = GenerationStats::from_fitness(self.generation, fitness)
            .ok_or(EvolutionError::EmptyPopulation)?;

        let leader = rank(fitness)[0];
        let improved = self
            .best
            .as_ref()
            .is_none_or(|best| stats.best_fitness > best.fitness);
        if improved {
            self.best = Some(BestRecord {
                genome: self.population[leader].clone(),
                fitness: stats.best_fitness,
                generation: self.generation,
            });
        }

        self.history.push(stats);
        self.population = next;
        self.generation += 1;
        Ok(stats)
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }
        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }
        None
    }

    /// Run evolution with progress callback.
    ///
    /// The callback runs after every completed generation. Cancellation is
    /// checked between generations.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            let fitness = self.evaluate_population()?;
            let leader = rank(&fitness).first().copied().unwrap_or(0);
            let generation_best = self.population[leader].clone();
            let stats = self.evolve(&fitness)?;

            let best_fitness = self.best.as_ref().map_or(stats.best_fitness, |b| b.fitness);
            let improved = self
                .best
                .as_ref()
                .is_some_and(|b| b.generation == stats.generation);

            log::debug!(
                "Generation {}: best {:.2}, mean {:.2}, min {:.2}",
                stats.generation,
                stats.best_fitness,
                stats.mean_fitness,
                stats.min_fitness
            );

            callback(&EvolutionProgress {
                stats,
                total_generations: self.config.population.max_generations,
                generation_best,
                best_fitness,
                improved,
            });
        };

        if stop_reason == StopReason::Cancelled {
            log::warn!("Training cancelled after {} generations", self.generation);
        }

        Ok(EvolutionResult {
            best: self.best.clone(),
            history: self.history.clone(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.evaluations,
                best_fitness: self.best.as_ref().map_or(f32::NEG_INFINITY, |b| b.fitness),
                elapsed_seconds: start_time.elapsed().as_secs_f64(),
                stop_reason,
            },
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}
