//! Evolution configuration types for training snake policies.
//!
//! This module provides the configuration record consumed once at startup,
//! the genome representation, and the statistics records produced for
//! loggers, plotters and viewers after every generation.

use serde::{Deserialize, Serialize};

use super::{ConfigError, GameConfig, ObservationKind, VisualizationConfig};

/// Number of actions the policy chooses between (left, straight, right).
pub const ACTION_COUNT: usize = 3;

/// Top-level configuration for a training run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionConfig {
    /// Grid world settings.
    #[serde(default)]
    pub game: GameConfig,
    /// Observation layout and hidden layer widths.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Selection and variation settings.
    #[serde(default)]
    pub algorithm: GeneticAlgorithmConfig,
    /// Reward shaping for the fitness heuristic.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Episodes per genome and the per-episode step ceiling.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Where genomes and statistics are written.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Viewer preferences, not used by the training loop.
    #[serde(default)]
    pub visualization: VisualizationConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Network shape. The input width comes from the observation kind and the
/// output width is always [`ACTION_COUNT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Observation encoder variant.
    #[serde(default)]
    pub observation: ObservationKind,
    /// Hidden layer widths, in order.
    #[serde(default = "default_hidden")]
    pub hidden: Vec<usize>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            observation: ObservationKind::default(),
            hidden: default_hidden(),
        }
    }
}

fn default_hidden() -> Vec<usize> {
    vec![16, 12]
}

impl NetworkConfig {
    /// Full list of layer widths, input first.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden.len() + 2);
        sizes.push(self.observation.feature_count());
        sizes.extend_from_slice(&self.hidden);
        sizes.push(ACTION_COUNT);
        sizes
    }
}

/// Population configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of genomes per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Number of generations to train.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
        }
    }
}

fn default_population_size() -> usize {
    150
}
fn default_max_generations() -> usize {
    1000
}

/// Genetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Mutation probability per gene (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Standard deviation of the Gaussian noise added to a mutated gene.
    #[serde(default = "default_mutation_std")]
    pub mutation_std: f32,
    /// Fraction of the population carried over unchanged.
    #[serde(default = "default_elitism_fraction")]
    pub elitism_fraction: f32,
    /// Lower bound on the number of elites.
    #[serde(default = "default_min_elitism")]
    pub min_elitism: usize,
    /// Number of distinct ranks sampled per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Recombination operator.
    #[serde(default)]
    pub crossover: CrossoverMode,
    /// Scale of the Gaussian used for the initial population.
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            mutation_rate: default_mutation_rate(),
            mutation_std: default_mutation_std(),
            elitism_fraction: default_elitism_fraction(),
            min_elitism: default_min_elitism(),
            tournament_size: default_tournament_size(),
            crossover: CrossoverMode::default(),
            init_scale: default_init_scale(),
        }
    }
}

impl GeneticAlgorithmConfig {
    /// Number of elites for a population of `population` genomes.
    pub fn elite_count(&self, population: usize) -> usize {
        let fraction = (population as f32 * self.elitism_fraction).floor() as usize;
        fraction.max(self.min_elitism).min(population)
    }
}

fn default_mutation_rate() -> f32 {
    0.1
}
fn default_mutation_std() -> f32 {
    0.2
}
fn default_elitism_fraction() -> f32 {
    0.05
}
fn default_min_elitism() -> usize {
    2
}
fn default_tournament_size() -> usize {
    3
}
fn default_init_scale() -> f32 {
    0.1
}

/// Crossover operator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CrossoverMode {
    /// Each gene taken from either parent with equal probability; the two
    /// children are complementary.
    #[default]
    Uniform,
    /// One split index strictly inside the genome; children swap tails.
    SinglePoint,
}

/// Reward shaping for the two-phase fitness heuristic.
///
/// Episodes whose final snake length is below `phase_threshold * area` are
/// scored in the growth phase, the rest in the survival phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Fraction of the board area separating the growth and survival phases.
    #[serde(default = "default_phase_threshold")]
    pub phase_threshold: f32,
    /// Reward per apple, both phases.
    #[serde(default = "default_apple_reward")]
    pub apple_reward: f32,
    /// Reward per step survived, both phases.
    #[serde(default = "default_step_reward")]
    pub step_reward: f32,
    /// Growth phase: penalty for an episode without apples.
    #[serde(default = "default_zero_score_penalty")]
    pub zero_score_penalty: f32,
    /// Growth phase: penalty for hitting a wall.
    #[serde(default = "default_growth_wall_penalty")]
    pub growth_wall_penalty: f32,
    /// Survival phase: extra reward per step.
    #[serde(default = "default_survival_step_bonus")]
    pub survival_step_bonus: f32,
    /// Survival phase: extra reward per apple.
    #[serde(default = "default_survival_apple_bonus")]
    pub survival_apple_bonus: f32,
    /// Survival phase: penalty for hitting a wall.
    #[serde(default = "default_survival_wall_penalty")]
    pub survival_wall_penalty: f32,
    /// Survival phase: penalty for running into the own body.
    #[serde(default = "default_body_penalty")]
    pub body_penalty: f32,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            phase_threshold: default_phase_threshold(),
            apple_reward: default_apple_reward(),
            step_reward: default_step_reward(),
            zero_score_penalty: default_zero_score_penalty(),
            growth_wall_penalty: default_growth_wall_penalty(),
            survival_step_bonus: default_survival_step_bonus(),
            survival_apple_bonus: default_survival_apple_bonus(),
            survival_wall_penalty: default_survival_wall_penalty(),
            body_penalty: default_body_penalty(),
        }
    }
}

fn default_phase_threshold() -> f32 {
    0.1
}
fn default_apple_reward() -> f32 {
    100.0
}
fn default_step_reward() -> f32 {
    0.5
}
fn default_zero_score_penalty() -> f32 {
    50.0
}
fn default_growth_wall_penalty() -> f32 {
    500.0
}
fn default_survival_step_bonus() -> f32 {
    1.5
}
fn default_survival_apple_bonus() -> f32 {
    200.0
}
fn default_survival_wall_penalty() -> f32 {
    800.0
}
fn default_body_penalty() -> f32 {
    1000.0
}

/// Evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Independent episodes averaged per genome.
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    /// Hard step ceiling per episode.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_episodes() -> usize {
    3
}
fn default_max_steps() -> u64 {
    2000
}

/// Genome and statistics output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory receiving genome files and the statistics history.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Also write the best genome of every generation.
    #[serde(default = "default_save_generation_best")]
    pub save_generation_best: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            save_generation_best: default_save_generation_best(),
        }
    }
}

fn default_output_dir() -> String {
    "models".to_string()
}
fn default_save_generation_best() -> bool {
    true
}

// ============================================================================
// Genome
// ============================================================================

/// Flat weight-and-bias vector for one policy network.
///
/// Serialized as a plain JSON array of numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genome(Vec<f32>);

impl Genome {
    /// Wrap a flat parameter vector.
    pub fn new(genes: Vec<f32>) -> Self {
        Self(genes)
    }

    /// Number of genes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn genes(&self) -> &[f32] {
        &self.0
    }

    pub fn into_genes(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Genome {
    fn from(genes: Vec<f32>) -> Self {
        Self(genes)
    }
}

impl AsRef<[f32]> for Genome {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

// ============================================================================
// Progress and results
// ============================================================================

/// Fitness summary of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    pub min_fitness: f32,
}

impl GenerationStats {
    /// Summarize a fitness vector. Returns `None` for an empty vector.
    pub fn from_fitness(generation: usize, fitness: &[f32]) -> Option<Self> {
        if fitness.is_empty() {
            return None;
        }
        let best_fitness = fitness.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_fitness = fitness.iter().copied().fold(f32::INFINITY, f32::min);
        let mean_fitness = fitness.iter().sum::<f32>() / fitness.len() as f32;
        Some(Self {
            generation,
            best_fitness,
            mean_fitness,
            min_fitness,
        })
    }
}

/// Best genome seen so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestRecord {
    pub genome: Genome,
    pub fitness: f32,
    /// Generation the genome was evaluated in.
    pub generation: usize,
}

/// Per-generation statistics, appended in generation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionHistory {
    pub generations: Vec<GenerationStats>,
}

impl EvolutionHistory {
    pub fn push(&mut self, stats: GenerationStats) {
        self.generations.push(stats);
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn last(&self) -> Option<&GenerationStats> {
        self.generations.last()
    }
}

/// Progress report handed to callers after every completed generation.
#[derive(Debug, Clone)]
pub struct EvolutionProgress {
    /// Statistics of the generation that was just evaluated and evolved.
    pub stats: GenerationStats,
    pub total_generations: usize,
    /// Best genome of that generation.
    pub generation_best: Genome,
    /// Best fitness seen across all generations so far.
    pub best_fitness: f32,
    /// Whether this generation produced a new best-ever genome.
    pub improved: bool,
}

/// Final result of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    pub best: Option<BestRecord>,
    pub history: EvolutionHistory,
    pub stats: EvolutionStats,
}

/// Summary statistics for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Completed generations.
    pub generations: usize,
    /// Genome evaluations performed.
    pub total_evaluations: u64,
    pub best_fitness: f32,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

/// Why training stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    MaxGenerations,
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Hidden layer {0} has zero width")]
    EmptyHiddenLayer(usize),
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("Tournament size must be positive")]
    InvalidTournament,
    #[error("Evaluation needs at least one episode and one step")]
    InvalidEvaluation,
    #[error("Invalid fitness shaping: {0}")]
    InvalidFitness(String),
    #[error("Game config validation failed: {0}")]
    GameConfigError(#[from] ConfigError),
}

impl FitnessConfig {
    /// Check that the penalty schedule keeps its curriculum ordering:
    /// body collision > survival wall collision > zero score, growth wall
    /// collision > zero score, and steps weigh more once the snake is large.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        let values = [
            ("apple_reward", self.apple_reward),
            ("step_reward", self.step_reward),
            ("zero_score_penalty", self.zero_score_penalty),
            ("growth_wall_penalty", self.growth_wall_penalty),
            ("survival_step_bonus", self.survival_step_bonus),
            ("survival_apple_bonus", self.survival_apple_bonus),
            ("survival_wall_penalty", self.survival_wall_penalty),
            ("body_penalty", self.body_penalty),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(EvolutionConfigError::InvalidFitness(format!(
                    "{name} ({value}) must be finite and non-negative"
                )));
            }
        }

        if !(self.phase_threshold > 0.0 && self.phase_threshold <= 1.0) {
            return Err(EvolutionConfigError::InvalidFitness(format!(
                "phase_threshold ({}) must be in (0, 1]",
                self.phase_threshold
            )));
        }

        let ordered = |worse: (&str, f32), milder: (&str, f32)| {
            if worse.1 > milder.1 {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidFitness(format!(
                    "{} ({}) must exceed {} ({})",
                    worse.0, worse.1, milder.0, milder.1
                )))
            }
        };

        ordered(
            ("body_penalty", self.body_penalty),
            ("survival_wall_penalty", self.survival_wall_penalty),
        )?;
        ordered(
            ("survival_wall_penalty", self.survival_wall_penalty),
            ("zero_score_penalty", self.zero_score_penalty),
        )?;
        ordered(
            ("growth_wall_penalty", self.growth_wall_penalty),
            ("zero_score_penalty", self.zero_score_penalty),
        )?;

        if self.survival_step_bonus <= 0.0 {
            return Err(EvolutionConfigError::InvalidFitness(
                "survival_step_bonus must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.game.validate()?;

        if self.population.size < 2 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }

        if let Some(idx) = self.network.hidden.iter().position(|&w| w == 0) {
            return Err(EvolutionConfigError::EmptyHiddenLayer(idx));
        }

        let check_rate = |value: f32, name: &str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidRate(format!(
                    "{name} ({value}) must be in [0, 1]"
                )))
            }
        };
        check_rate(self.algorithm.mutation_rate, "mutation_rate")?;
        check_rate(self.algorithm.elitism_fraction, "elitism_fraction")?;

        if !(self.algorithm.mutation_std.is_finite() && self.algorithm.mutation_std >= 0.0) {
            return Err(EvolutionConfigError::InvalidRate(format!(
                "mutation_std ({}) must be finite and non-negative",
                self.algorithm.mutation_std
            )));
        }

        if self.algorithm.tournament_size == 0 {
            return Err(EvolutionConfigError::InvalidTournament);
        }

        if self.evaluation.episodes == 0 || self.evaluation.max_steps == 0 {
            return Err(EvolutionConfigError::InvalidEvaluation);
        }

        self.fitness.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layer_sizes() {
        let network = NetworkConfig {
            observation: ObservationKind::Basic,
            hidden: vec![16, 12],
        };
        assert_eq!(network.layer_sizes(), vec![6, 16, 12, 3]);

        let network = NetworkConfig {
            observation: ObservationKind::TailReach,
            hidden: vec![],
        };
        assert_eq!(network.layer_sizes(), vec![8, 3]);
    }

    #[test]
    fn test_elite_count() {
        let ga = GeneticAlgorithmConfig::default();
        assert_eq!(ga.elite_count(150), 7);
        assert_eq!(ga.elite_count(20), 2);
        assert_eq!(ga.elite_count(1), 1);
    }

    #[test]
    fn test_penalty_ordering_enforced() {
        let fitness = FitnessConfig {
            body_penalty: 700.0,
            ..Default::default()
        };
        assert!(matches!(
            fitness.validate(),
            Err(EvolutionConfigError::InvalidFitness(_))
        ));

        let fitness = FitnessConfig {
            growth_wall_penalty: 10.0,
            ..Default::default()
        };
        assert!(fitness.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_rates() {
        let mut config = EvolutionConfig::default();
        config.algorithm.mutation_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidRate(_))
        ));

        let mut config = EvolutionConfig::default();
        config.population.size = 1;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::PopulationTooSmall)
        ));
    }

    #[test]
    fn test_generation_stats() {
        let stats = GenerationStats::from_fitness(4, &[1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.generation, 4);
        assert_eq!(stats.best_fitness, 3.0);
        assert_eq!(stats.min_fitness, 1.0);
        assert!((stats.mean_fitness - 2.0).abs() < 1e-6);
        assert!(GenerationStats::from_fitness(0, &[]).is_none());
    }

    #[test]
    fn test_genome_serializes_flat() {
        let genome = Genome::new(vec![0.5, -1.25, 3.0]);
        let json = serde_json::to_string(&genome).unwrap();
        assert_eq!(json, "[0.5,-1.25,3.0]");
        let parsed: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, genome);
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert_eq!(parsed.algorithm.crossover, CrossoverMode::Uniform);

        let partial: EvolutionConfig =
            serde_json::from_str(r#"{"game": {"width": 12, "grow_on_eat": false}}"#).unwrap();
        assert_eq!(partial.game.width, 12);
        assert!(!partial.game.grow_on_eat);
        assert_eq!(partial.evaluation.max_steps, 2000);
    }
}
