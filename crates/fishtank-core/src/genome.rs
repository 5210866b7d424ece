//! Flat weight genomes, decoding into networks, and the point-mutation operator.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MutationSettings, NetworkLayout};
use crate::math::Matrix;
use crate::network::Network;

/// Offset added to uniformly sampled initial weights.
const INITIAL_WEIGHT_BIAS: f64 = 0.1;

/// Errors raised when decoding genomes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenomeError {
    #[error("genome has {actual} weights, layout requires {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Flat ordered weights encoding every layer matrix of a network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Genome(Vec<f64>);

impl Genome {
    #[must_use]
    pub fn new(weights: Vec<f64>) -> Self {
        Self(weights)
    }

    /// Sample weights uniformly from `[-1, 1)` shifted by a small positive bias.
    #[must_use]
    pub fn random(layout: &NetworkLayout, rng: &mut dyn RngCore) -> Self {
        let weights = (0..layout.genome_len())
            .map(|_| rng.random_range(-1.0..1.0) + INITIAL_WEIGHT_BIAS)
            .collect();
        Self(weights)
    }

    /// All-zero genome; its network maps every input to zeros.
    #[must_use]
    pub fn zeroed(layout: &NetworkLayout) -> Self {
        Self(vec![0.0; layout.genome_len()])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.0
    }

    /// Split into `depth - 1` chunks of `width²` weights, each reshaped row-major.
    pub fn decode(&self, layout: &NetworkLayout) -> Result<Network, GenomeError> {
        let expected = layout.genome_len();
        if self.0.len() != expected || expected == 0 {
            return Err(GenomeError::LengthMismatch {
                expected,
                actual: self.0.len(),
            });
        }
        let width = layout.width;
        let layers = self
            .0
            .chunks_exact(width * width)
            .filter_map(|chunk| Matrix::from_row_major(width, width, chunk.to_vec()))
            .collect();
        Network::from_layers(width, layers).ok_or(GenomeError::LengthMismatch {
            expected,
            actual: self.0.len(),
        })
    }

    /// Perturb one uniformly chosen weight, then keep going with probability
    /// `continued_rate` after each perturbation. Returns the number of perturbations.
    pub fn mutate(&mut self, rng: &mut dyn RngCore, settings: &MutationSettings) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        let mut count = 0;
        loop {
            let index = rng.random_range(0..self.0.len());
            let delta = if settings.magnitude > 0.0 {
                rng.random_range(-settings.magnitude..settings.magnitude)
            } else {
                0.0
            };
            self.0[index] += delta;
            count += 1;
            if rng.random::<f64>() >= settings.continued_rate {
                break;
            }
        }
        count
    }

    /// Copy this genome for an offspring, mutating the copy with probability `rate`.
    ///
    /// Returns the child genome and the number of perturbations applied.
    #[must_use]
    pub fn offspring(&self, rng: &mut dyn RngCore, settings: &MutationSettings) -> (Self, usize) {
        let mut child = self.clone();
        let perturbations = if rng.random::<f64>() < settings.rate {
            child.mutate(rng, settings)
        } else {
            0
        };
        (child, perturbations)
    }
}
