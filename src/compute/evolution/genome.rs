//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random initialization, tournament selection, crossover, and
//! Gaussian mutation over flat weight vectors.

use crate::schema::{CrossoverMode, Genome};
use rand::prelude::*;

/// Random number generator wrapper for genome operations.
///
/// Also the single source of world seeds during evaluation, so a seeded run
/// is reproducible end to end.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Genome of `len` genes drawn from `N(0, 1) * scale`.
    pub fn random_genome(&mut self, len: usize, scale: f32) -> Genome {
        (0..len)
            .map(|_| self.rng.sample::<f32, _>(rand_distr::StandardNormal) * scale)
            .collect::<Vec<_>>()
            .into()
    }

    /// Tournament selection over ranks `0..population`, where rank 0 is the
    /// fittest. Draws `size` distinct ranks and returns the smallest.
    pub fn tournament(&mut self, population: usize, size: usize) -> usize {
        let k = size.clamp(1, population.max(1));
        rand::seq::index::sample(&mut self.rng, population.max(1), k)
            .into_iter()
            .min()
            .unwrap_or(0)
    }

    /// Produce two children from two parents.
    ///
    /// Parents of different lengths are returned unchanged.
    pub fn crossover(
        &mut self,
        parent1: &Genome,
        parent2: &Genome,
        mode: CrossoverMode,
    ) -> (Genome, Genome) {
        let (a, b) = (parent1.genes(), parent2.genes());
        if a.len() != b.len() {
            return (parent1.clone(), parent2.clone());
        }

        match mode {
            CrossoverMode::Uniform => {
                let mut c1 = Vec::with_capacity(a.len());
                let mut c2 = Vec::with_capacity(a.len());
                for (&x, &y) in a.iter().zip(b) {
                    if self.rng.gen_bool(0.5) {
                        c1.push(x);
                        c2.push(y);
                    } else {
                        c1.push(y);
                        c2.push(x);
                    }
                }
                (c1.into(), c2.into())
            }
            CrossoverMode::SinglePoint => {
                // The split leaves at least one gene from each parent.
                if a.len() < 3 {
                    return (parent1.clone(), parent2.clone());
                }
                let point = self.rng.gen_range(1..a.len() - 1);
                let c1 = [&a[..point], &b[point..]].concat();
                let c2 = [&b[..point], &a[point..]].concat();
                (c1.into(), c2.into())
            }
        }
    }

    /// Gaussian mutation: each gene independently receives `N(0, std)` noise
    /// with probability `rate`. Returns a new genome.
    pub fn mutate(&mut self, genome: &Genome, rate: f32, std: f32) -> Genome {
        let rate = f64::from(rate.clamp(0.0, 1.0));
        genome
            .genes()
            .iter()
            .map(|&gene| {
                if self.rng.gen_bool(rate) {
                    gene + self.gaussian(std)
                } else {
                    gene
                }
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn gaussian(&mut self, std: f32) -> f32 {
        let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
        noise * std
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}
