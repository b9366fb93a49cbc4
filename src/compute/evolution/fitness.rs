//! Fitness evaluation for snake policies.
//!
//! A genome is scored by playing several fresh episodes with greedy actions
//! and averaging a phase-dependent heuristic over them. Short snakes are in
//! the growth phase and are paid mostly for apples; once the snake reaches
//! the phase threshold it is in the survival phase, where steps pay more and
//! collisions cost much more.

use super::genome::GenomeRng;
use super::search::EvolutionError;
use crate::compute::grid::{GridWorld, TerminalReason};
use crate::compute::network::{NetworkError, PolicyNetwork, Topology};
use crate::compute::observation::ObservationEncoder;
use crate::schema::{
    EvaluationConfig, FitnessConfig, GameConfig, Genome, NetworkConfig, ObservationKind,
};

/// Fitness heuristic phase, chosen from the final snake length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Growth,
    Survival,
}

/// Outcome of one played episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    /// Apples eaten.
    pub score: u32,
    pub steps: u64,
    /// Final snake length.
    pub length: usize,
    /// `None` when the step ceiling ended the episode.
    pub reason: Option<TerminalReason>,
}

impl EpisodeSummary {
    pub fn phase(&self, threshold: f32, area: usize) -> Phase {
        if (self.length as f32) < threshold * area as f32 {
            Phase::Growth
        } else {
            Phase::Survival
        }
    }
}

/// Score one episode, floored at zero.
pub fn score_episode(config: &FitnessConfig, summary: &EpisodeSummary, area: usize) -> f32 {
    let score = summary.score as f32;
    let steps = summary.steps as f32;
    let mut fitness = score * config.apple_reward + steps * config.step_reward;

    match summary.phase(config.phase_threshold, area) {
        Phase::Growth => {
            if summary.score == 0 {
                fitness -= config.zero_score_penalty;
            }
            if summary.reason == Some(TerminalReason::WallCollision) {
                fitness -= config.growth_wall_penalty;
            }
        }
        Phase::Survival => {
            fitness += steps * config.survival_step_bonus;
            fitness += score * config.survival_apple_bonus;
            match summary.reason {
                Some(TerminalReason::WallCollision) => fitness -= config.survival_wall_penalty,
                Some(TerminalReason::BodyCollision) => fitness -= config.body_penalty,
                _ => {}
            }
        }
    }

    fitness.max(0.0)
}

/// Evaluates a genome and returns its fitness.
pub struct FitnessEvaluator {
    game: GameConfig,
    observation: ObservationKind,
    topology: Topology,
    fitness: FitnessConfig,
    evaluation: EvaluationConfig,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    pub fn new(
        game: GameConfig,
        network: &NetworkConfig,
        fitness: FitnessConfig,
        evaluation: EvaluationConfig,
    ) -> Result<Self, NetworkError> {
        Ok(Self {
            game,
            observation: network.observation,
            topology: Topology::from_config(network)?,
            fitness,
            evaluation,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mean episode fitness of `genome`. World seeds are drawn from `rng`.
    pub fn evaluate(&self, genome: &Genome, rng: &mut GenomeRng) -> Result<f32, EvolutionError> {
        let network = PolicyNetwork::from_genome(self.topology.clone(), genome.genes())?;
        let episodes = self.evaluation.episodes.max(1);

        let mut total = 0.0;
        for _ in 0..episodes {
            let summary = self.play_episode(&network, rng.next_seed())?;
            total += score_episode(&self.fitness, &summary, self.game.area());
        }
        Ok(total / episodes as f32)
    }

    /// Play one episode greedily until it ends or hits the step ceiling.
    pub fn play_episode(
        &self,
        network: &PolicyNetwork,
        seed: u64,
    ) -> Result<EpisodeSummary, EvolutionError> {
        let mut world = GridWorld::new(&self.game, seed)?;
        let mut encoder = ObservationEncoder::new(self.observation);
        let mut features = Vec::with_capacity(self.observation.feature_count());

        while !world.is_terminal() && world.steps() < self.evaluation.max_steps {
            encoder.encode_into(&world, &mut features);
            let action = network.act(&features)?;
            world.step(action)?;
        }

        Ok(EpisodeSummary {
            score: world.score(),
            steps: world.steps(),
            length: world.len(),
            reason: world.terminal_reason(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(score: u32, steps: u64, length: usize, reason: Option<TerminalReason>) -> EpisodeSummary {
        EpisodeSummary {
            score,
            steps,
            length,
            reason,
        }
    }

    #[test]
    fn test_phase_threshold() {
        // 10% of a 10x10 board is 10 cells.
        assert_eq!(summary(0, 0, 9, None).phase(0.1, 100), Phase::Growth);
        assert_eq!(summary(0, 0, 10, None).phase(0.1, 100), Phase::Survival);
    }

    #[test]
    fn test_growth_phase_scoring() {
        let config = FitnessConfig::default();

        // 2 apples, 40 steps, starved: 200 + 20.
        let s = summary(2, 40, 5, Some(TerminalReason::Starvation));
        assert_eq!(score_episode(&config, &s, 100), 220.0);

        // No apples and a wall: floored at zero.
        let s = summary(0, 30, 3, Some(TerminalReason::WallCollision));
        assert_eq!(score_episode(&config, &s, 100), 0.0);

        // No apples, step ceiling: 0.5 * 2000 - 50.
        let s = summary(0, 2000, 3, None);
        assert_eq!(score_episode(&config, &s, 100), 950.0);

        // Body collisions carry no extra cost while growing.
        let s = summary(1, 10, 4, Some(TerminalReason::BodyCollision));
        assert_eq!(score_episode(&config, &s, 100), 105.0);
    }

    #[test]
    fn test_survival_phase_scoring() {
        let config = FitnessConfig::default();

        // 9 apples, 200 steps: 900 + 100 + 300 + 1800.
        let alive = summary(9, 200, 12, None);
        assert_eq!(score_episode(&config, &alive, 100), 3100.0);

        let wall = summary(9, 200, 12, Some(TerminalReason::WallCollision));
        assert_eq!(score_episode(&config, &wall, 100), 2300.0);

        let body = summary(9, 200, 12, Some(TerminalReason::BodyCollision));
        assert_eq!(score_episode(&config, &body, 100), 2100.0);
    }

    #[test]
    fn test_penalty_ordering() {
        let config = FitnessConfig::default();
        assert!(config.body_penalty > config.survival_wall_penalty);
        assert!(config.survival_wall_penalty > config.zero_score_penalty);
        assert!(config.growth_wall_penalty > config.zero_score_penalty);
        // Surviving steps are worth more once the snake is long.
        assert!(config.step_reward + config.survival_step_bonus > config.step_reward);
    }

    #[test]
    fn test_evaluate_zero_genome() {
        let network = NetworkConfig::default();
        let evaluator = FitnessEvaluator::new(
            GameConfig::default(),
            &network,
            FitnessConfig::default(),
            EvaluationConfig::default(),
        )
        .unwrap();
        let genome = Genome::new(vec![0.0; evaluator.topology().parameter_count()]);

        // All outputs tie, so the policy always turns left and circles a
        // 2x2 square until it starves.
        let net = PolicyNetwork::from_genome(evaluator.topology().clone(), genome.genes()).unwrap();
        let episode = evaluator.play_episode(&net, 5).unwrap();
        assert_eq!(episode.reason, Some(TerminalReason::Starvation));
        assert!(episode.steps <= 100 * (u64::from(episode.score) + 1));

        let fitness = evaluator.evaluate(&genome, &mut GenomeRng::new(1)).unwrap();
        assert!(fitness >= 0.0);
        assert!(fitness.is_finite());
    }

    #[test]
    fn test_evaluate_rejects_wrong_length() {
        let evaluator = FitnessEvaluator::new(
            GameConfig::default(),
            &NetworkConfig::default(),
            FitnessConfig::default(),
            EvaluationConfig::default(),
        )
        .unwrap();
        let result = evaluator.evaluate(&Genome::new(vec![0.0; 7]), &mut GenomeRng::new(0));
        assert!(matches!(
            result,
            Err(EvolutionError::Network(NetworkError::GenomeLength { actual: 7, .. }))
        ));
    }

    #[test]
    fn test_step_ceiling() {
        let evaluation = EvaluationConfig {
            episodes: 2,
            max_steps: 3,
        };
        let evaluator = FitnessEvaluator::new(
            GameConfig::default(),
            &NetworkConfig::default(),
            FitnessConfig::default(),
            evaluation,
        )
        .unwrap();
        let net = PolicyNetwork::zeros(evaluator.topology().clone());
        let episode = evaluator.play_episode(&net, 0).unwrap();
        assert_eq!(episode.steps, 3);
        assert_eq!(episode.reason, None);
    }

    #[test]
    fn test_episode_matches_fresh_encoding() {
        let evaluator = FitnessEvaluator::new(
            GameConfig::default(),
            &NetworkConfig::default(),
            FitnessConfig::default(),
            EvaluationConfig::default(),
        )
        .unwrap();
        let genome = GenomeRng::new(23).random_genome(evaluator.topology().parameter_count(), 1.0);
        let net = PolicyNetwork::from_genome(evaluator.topology().clone(), genome.genes()).unwrap();

        let episode = evaluator.play_episode(&net, 9).unwrap();

        let mut world = GridWorld::new(&GameConfig::default(), 9).unwrap();
        while !world.is_terminal() && world.steps() < EvaluationConfig::default().max_steps {
            let features = crate::compute::observation::encode(&world, ObservationKind::TailReach);
            world.step(net.act(&features).unwrap()).unwrap();
        }
        assert_eq!(episode.score, world.score());
        assert_eq!(episode.steps, world.steps());
        assert_eq!(episode.length, world.len());
        assert_eq!(episode.reason, world.terminal_reason());
    }

    #[test]
    fn test_evaluate_is_reproducible() {
        let evaluator = FitnessEvaluator::new(
            GameConfig::default(),
            &NetworkConfig::default(),
            FitnessConfig::default(),
            EvaluationConfig::default(),
        )
        .unwrap();
        let genome = GenomeRng::new(11).random_genome(evaluator.topology().parameter_count(), 0.5);
        let a = evaluator.evaluate(&genome, &mut GenomeRng::new(4)).unwrap();
        let b = evaluator.evaluate(&genome, &mut GenomeRng::new(4)).unwrap();
        assert_eq!(a, b);
    }
}
