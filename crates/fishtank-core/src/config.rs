//! Simulation configuration surface.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::stats::{STATS_HISTORY_CAPACITY, STATS_HISTORY_RETAIN};

/// Values contributed by each food or neighbour entry in the perception vector.
pub const ENTRY_WIDTH: usize = 3;

/// Errors raised by [`FishtankConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("network field `{field}` spans {start}..{end}, beyond `{limit}`")]
    FieldOverflow {
        field: &'static str,
        start: usize,
        end: usize,
        limit: usize,
    },
}

/// Network shape and perception buffer offsets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkLayout {
    /// Nodes per layer (input and output length).
    pub width: usize,
    /// Number of node layers; the network holds `depth - 1` weight matrices.
    pub depth: usize,
    pub food_start: usize,
    pub food_width: usize,
    pub fish_start: usize,
    pub fish_width: usize,
    pub self_start: usize,
    pub self_width: usize,
    /// Leading raw outputs trimmed off by the worker before returning results.
    pub usable_output_offset: usize,
    /// First index of the previous (trimmed) output echoed back into the input.
    pub feedback_offset: usize,
}

impl Default for NetworkLayout {
    fn default() -> Self {
        Self {
            width: 10,
            depth: 10,
            food_start: 0,
            food_width: 3,
            fish_start: 3,
            fish_width: 3,
            self_start: 6,
            self_width: 1,
            usable_output_offset: 5,
            feedback_offset: 2,
        }
    }
}

impl NetworkLayout {
    /// Number of weight matrices in a decoded network.
    #[must_use]
    pub const fn layer_count(&self) -> usize {
        self.depth.saturating_sub(1)
    }

    /// Required genome length: `width² × (depth − 1)`.
    #[must_use]
    pub const fn genome_len(&self) -> usize {
        self.width * self.width * self.layer_count()
    }

    /// Nearest food items encoded per agent.
    #[must_use]
    pub const fn food_count(&self) -> usize {
        self.food_width / ENTRY_WIDTH
    }

    /// Nearest neighbours encoded per agent.
    #[must_use]
    pub const fn fish_count(&self) -> usize {
        self.fish_width / ENTRY_WIDTH
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 {
            return Err(ConfigError::Invalid("network width must be non-zero"));
        }
        if self.depth < 2 {
            return Err(ConfigError::Invalid("network depth must be at least 2"));
        }
        let fields = [
            ("food", self.food_start, self.food_width, self.fish_start),
            ("fish", self.fish_start, self.fish_width, self.self_start),
            ("self", self.self_start, self.self_width, self.width),
        ];
        for (field, start, width, limit) in fields {
            let end = start + width;
            if end > limit {
                return Err(ConfigError::FieldOverflow {
                    field,
                    start,
                    end,
                    limit,
                });
            }
        }
        if self.usable_output_offset + 2 > self.width {
            return Err(ConfigError::Invalid(
                "usable_output_offset must leave room for two action outputs",
            ));
        }
        Ok(())
    }
}

/// Point-mutation parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MutationSettings {
    /// Probability that an offspring genome is mutated at all.
    pub rate: f64,
    /// Probability of perturbing one more entry after each perturbation.
    pub continued_rate: f64,
    /// Perturbations are drawn uniformly from `[-magnitude, magnitude)`.
    pub magnitude: f64,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            rate: 0.5,
            continued_rate: 0.5,
            magnitude: 0.1,
        }
    }
}

/// Static configuration for a fishtank world. Only edited between steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FishtankConfig {
    /// Fixed integration step in simulated seconds.
    pub dt: f64,
    /// Food magnitude left behind by a dead fish.
    pub fish_to_food_conversion: f64,
    pub linear_acceleration_health_cost: f64,
    pub angular_acceleration_health_cost: f64,
    pub linear_viscosity: f64,
    pub angular_viscosity: f64,
    /// Scale of the age-dependent health decay.
    pub time_health_decrease: f64,
    pub food_pickup_radius: f64,
    pub food_sight_radius: f64,
    /// Expected food items regenerated per simulated second.
    pub food_regeneration: f64,
    /// Magnitude of randomly placed food.
    pub food_magnitude: f64,
    pub initial_fish_count: usize,
    pub initial_food_count: usize,
    /// Health above which a fish reproduces.
    pub reproduction_health: f64,
    /// Health deducted from a parent per offspring.
    pub reproduction_cost: f64,
    pub offspring_health: f64,
    /// Population size below which the floor behaviours kick in.
    pub population_floor: usize,
    /// Suspend health loss while the population is below the floor.
    pub auto_immortal_fish: bool,
    /// Add a random fish each step while the population is below the floor.
    pub auto_fish_spawn: bool,
    pub network: NetworkLayout,
    pub mutation: MutationSettings,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Worker threads; `None` uses the available parallelism minus the coordinator.
    pub worker_count: Option<usize>,
    /// How long a step waits for worker batches before giving up on them.
    pub step_timeout_ms: u64,
    /// Statistics samples held before the history is trimmed.
    pub stats_history_capacity: usize,
    /// Most recent samples kept when trimming.
    pub stats_history_retain: usize,
}

impl Default for FishtankConfig {
    fn default() -> Self {
        Self {
            dt: 0.2,
            fish_to_food_conversion: 1.0,
            linear_acceleration_health_cost: 0.1,
            angular_acceleration_health_cost: 0.1,
            linear_viscosity: 1.0,
            angular_viscosity: 0.2,
            time_health_decrease: 0.002,
            food_pickup_radius: 0.005,
            food_sight_radius: 0.15,
            food_regeneration: 0.2,
            food_magnitude: 0.5,
            initial_fish_count: 15,
            initial_food_count: 200,
            reproduction_health: 2.0,
            reproduction_cost: 1.0,
            offspring_health: 1.0,
            population_floor: 10,
            auto_immortal_fish: true,
            auto_fish_spawn: false,
            network: NetworkLayout::default(),
            mutation: MutationSettings::default(),
            rng_seed: None,
            worker_count: None,
            step_timeout_ms: 5_000,
            stats_history_capacity: STATS_HISTORY_CAPACITY,
            stats_history_retain: STATS_HISTORY_RETAIN,
        }
    }
}

impl FishtankConfig {
    /// Checks ranges and the network field layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(ConfigError::Invalid("dt must be positive and finite"));
        }
        if self.food_pickup_radius <= 0.0 || self.food_sight_radius <= 0.0 {
            return Err(ConfigError::Invalid("food radii must be positive"));
        }
        if self.food_pickup_radius > 0.5 || self.food_sight_radius > 0.5 {
            return Err(ConfigError::Invalid(
                "food radii cannot exceed half the world extent",
            ));
        }
        if self.linear_viscosity < 0.0
            || self.angular_viscosity < 0.0
            || self.time_health_decrease < 0.0
            || self.linear_acceleration_health_cost < 0.0
            || self.angular_acceleration_health_cost < 0.0
            || self.food_regeneration < 0.0
            || self.food_magnitude < 0.0
            || self.fish_to_food_conversion < 0.0
            || self.reproduction_cost < 0.0
        {
            return Err(ConfigError::Invalid(
                "rates, costs, and magnitudes must be non-negative",
            ));
        }
        if self.offspring_health <= 0.0 {
            return Err(ConfigError::Invalid("offspring_health must be positive"));
        }
        let probabilities = [self.mutation.rate, self.mutation.continued_rate];
        if probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(ConfigError::Invalid(
                "mutation probabilities must be within [0, 1]",
            ));
        }
        if self.mutation.continued_rate >= 1.0 {
            return Err(ConfigError::Invalid(
                "mutation continued_rate must be below 1",
            ));
        }
        if self.mutation.magnitude < 0.0 {
            return Err(ConfigError::Invalid("mutation magnitude must be non-negative"));
        }
        if self.worker_count == Some(0) {
            return Err(ConfigError::Invalid("worker_count must be non-zero"));
        }
        if self.step_timeout_ms == 0 {
            return Err(ConfigError::Invalid("step_timeout_ms must be non-zero"));
        }
        if self.stats_history_capacity == 0
            || self.stats_history_retain > self.stats_history_capacity
        {
            return Err(ConfigError::Invalid(
                "stats history retain must not exceed a non-zero capacity",
            ));
        }
        self.network.validate()
    }

    /// Number of workers to start, never less than one.
    #[must_use]
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map_or(1, |n| n.get().saturating_sub(1))
                .max(1)
        })
    }

    #[must_use]
    pub const fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FishtankConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.network.genome_len(), 900);
        assert_eq!(config.network.layer_count(), 9);
        assert_eq!(config.network.food_count(), 1);
        assert_eq!(config.network.fish_count(), 1);
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let mut config = FishtankConfig::default();
        config.network.food_width = 6;
        assert_eq!(
            config.validate(),
            Err(ConfigError::FieldOverflow {
                field: "food",
                start: 0,
                end: 6,
                limit: 3,
            })
        );
    }

    #[test]
    fn bad_probabilities_are_rejected() {
        let config = FishtankConfig {
            mutation: MutationSettings {
                rate: 1.5,
                ..MutationSettings::default()
            },
            ..FishtankConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FishtankConfig {
            worker_count: Some(0),
            ..FishtankConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: FishtankConfig =
            serde_json::from_str(r#"{ "dt": 0.1, "network": { "depth": 3 } }"#).expect("parse");
        assert_eq!(config.dt, 0.1);
        assert_eq!(config.network.depth, 3);
        assert_eq!(config.network.width, 10);
        assert_eq!(config.initial_fish_count, 15);
    }
}
