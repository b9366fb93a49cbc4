//! Fixed-topology feed-forward policy network.
//!
//! Hidden layers use ReLU, the output layer uses tanh. The network is a pure
//! function of its weights: loading a genome replaces every parameter, and
//! [`PolicyNetwork::flatten`] returns exactly the genome that was loaded.
//!
//! Genome layout, per layer in topology order: the `n_in x n_out` weight
//! matrix row-major (`weights[i * n_out + o]` connects input `i` to output
//! `o`), followed by the `n_out` biases.

use serde::{Deserialize, Serialize};

use super::grid::{Action, WorldError};
use crate::schema::{ACTION_COUNT, NetworkConfig};

/// Network errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Invalid topology {widths:?}: {reason}")]
    InvalidTopology { widths: Vec<usize>, reason: String },
    #[error("Genome has {actual} genes, topology needs {expected}")]
    GenomeLength { expected: usize, actual: usize },
    #[error("Observation has {actual} features, network expects {expected}")]
    InputLength { expected: usize, actual: usize },
    #[error(transparent)]
    Action(#[from] WorldError),
}

/// Ordered layer widths, input first, [`ACTION_COUNT`] outputs last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Topology(Vec<usize>);

impl Topology {
    pub fn new(widths: Vec<usize>) -> Result<Self, NetworkError> {
        let reason = if widths.len() < 2 {
            Some("need at least an input and an output layer".to_string())
        } else if widths.contains(&0) {
            Some("layer widths must be positive".to_string())
        } else if widths.last() != Some(&ACTION_COUNT) {
            Some(format!("output layer must have {ACTION_COUNT} units"))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(NetworkError::InvalidTopology { widths, reason }),
            None => Ok(Self(widths)),
        }
    }

    /// Topology described by a network config.
    pub fn from_config(config: &NetworkConfig) -> Result<Self, NetworkError> {
        Self::new(config.layer_sizes())
    }

    #[inline]
    pub fn widths(&self) -> &[usize] {
        &self.0
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.0[0]
    }

    /// `(n_in, n_out)` for every layer.
    pub fn layers(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    /// Genome length: `n_in * n_out + n_out` summed over layers.
    pub fn parameter_count(&self) -> usize {
        self.layers().map(|(n_in, n_out)| n_in * n_out + n_out).sum()
    }
}

impl TryFrom<Vec<usize>> for Topology {
    type Error = NetworkError;

    fn try_from(widths: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(widths)
    }
}

impl From<Topology> for Vec<usize> {
    fn from(topology: Topology) -> Self {
        topology.0
    }
}

#[derive(Debug, Clone)]
struct Layer {
    n_in: usize,
    n_out: usize,
    /// Row-major `n_in x n_out`.
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl Layer {
    fn zeros(n_in: usize, n_out: usize) -> Self {
        Self {
            n_in,
            n_out,
            weights: vec![0.0; n_in * n_out],
            biases: vec![0.0; n_out],
        }
    }

    /// `out = input * W + b`.
    fn affine(&self, input: &[f32], out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(&self.biases);
        for (i, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            let row = &self.weights[i * self.n_out..(i + 1) * self.n_out];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
    }
}

/// Every layer's activation vector from one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Activations {
    /// `layers[0]` is the observation, the last entry the tanh outputs.
    pub layers: Vec<Vec<f32>>,
}

impl Activations {
    /// Output scores.
    pub fn output(&self) -> &[f32] {
        self.layers.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Feed-forward policy network.
#[derive(Debug, Clone)]
pub struct PolicyNetwork {
    topology: Topology,
    layers: Vec<Layer>,
}

impl PolicyNetwork {
    /// Network with every weight and bias set to zero.
    pub fn zeros(topology: Topology) -> Self {
        let layers = topology
            .layers()
            .map(|(n_in, n_out)| Layer::zeros(n_in, n_out))
            .collect();
        Self { topology, layers }
    }

    /// Build a network whose parameters are `genome`.
    pub fn from_genome(topology: Topology, genome: &[f32]) -> Result<Self, NetworkError> {
        let mut network = Self::zeros(topology);
        network.load(genome)?;
        Ok(network)
    }

    /// Replace every parameter with the genes of `genome`.
    pub fn load(&mut self, genome: &[f32]) -> Result<(), NetworkError> {
        let expected = self.topology.parameter_count();
        if genome.len() != expected {
            return Err(NetworkError::GenomeLength {
                expected,
                actual: genome.len(),
            });
        }

        let mut rest = genome;
        for layer in &mut self.layers {
            let (weights, tail) = rest.split_at(layer.n_in * layer.n_out);
            let (biases, tail) = tail.split_at(layer.n_out);
            layer.weights.copy_from_slice(weights);
            layer.biases.copy_from_slice(biases);
            rest = tail;
        }
        Ok(())
    }

    /// Concatenate every layer's weights then biases.
    pub fn flatten(&self) -> Vec<f32> {
        let mut genome = Vec::with_capacity(self.topology.parameter_count());
        for layer in &self.layers {
            genome.extend_from_slice(&layer.weights);
            genome.extend_from_slice(&layer.biases);
        }
        genome
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    fn check_input(&self, observation: &[f32]) -> Result<(), NetworkError> {
        let expected = self.topology.input_size();
        if observation.len() != expected {
            return Err(NetworkError::InputLength {
                expected,
                actual: observation.len(),
            });
        }
        Ok(())
    }

    /// Action scores in (-1, 1).
    pub fn forward(&self, observation: &[f32]) -> Result<Vec<f32>, NetworkError> {
        self.check_input(observation)?;

        let mut current = observation.to_vec();
        let mut next = Vec::new();
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            layer.affine(&current, &mut next);
            activate(&mut next, idx == last);
            std::mem::swap(&mut current, &mut next);
        }
        Ok(current)
    }

    /// Forward pass that keeps every layer's activations for inspection.
    /// The outputs are identical to [`PolicyNetwork::forward`].
    pub fn forward_debug(&self, observation: &[f32]) -> Result<Activations, NetworkError> {
        self.check_input(observation)?;

        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(observation.to_vec());
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut out = Vec::with_capacity(layer.n_out);
            layer.affine(&layers[idx], &mut out);
            activate(&mut out, idx == last);
            layers.push(out);
        }
        Ok(Activations { layers })
    }

    /// Action with the highest score.
    pub fn act(&self, observation: &[f32]) -> Result<Action, NetworkError> {
        let scores = self.forward(observation)?;
        Ok(Action::try_from(argmax(&scores))?)
    }
}

#[inline]
fn activate(values: &mut [f32], output_layer: bool) {
    if output_layer {
        values.iter_mut().for_each(|v| *v = v.tanh());
    } else {
        values.iter_mut().for_each(|v| *v = v.max(0.0));
    }
}

/// Index of the largest value; ties go to the first occurrence.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
