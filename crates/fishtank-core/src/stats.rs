//! Population statistics, generation records, and read-only world snapshots.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

use crate::Tick;
use crate::config::FishtankConfig;
use crate::entity::{Fish, FishId, Food, Generation};
use crate::genome::Genome;
use crate::math::Vec2;

/// Samples kept before the history is trimmed.
pub const STATS_HISTORY_CAPACITY: usize = 1_300;
/// Samples retained after trimming.
pub const STATS_HISTORY_RETAIN: usize = 1_200;

/// Aggregate state recorded once per simulated second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StatsSample {
    /// Simulated seconds at the time of sampling.
    pub time: f64,
    pub population: usize,
    pub food: usize,
    /// Mean absolute fish velocity; zero when the population is empty.
    pub mean_speed: f64,
}

impl StatsSample {
    #[must_use]
    pub fn collect(time: f64, fish: &[Fish], food: &[Food]) -> Self {
        let mean_speed = if fish.is_empty() {
            0.0
        } else {
            fish.iter().map(|f| f.velocity.abs()).sum::<f64>() / fish.len() as f64
        };
        Self {
            time,
            population: fish.len(),
            food: food.len(),
            mean_speed,
        }
    }
}

/// Bounded rolling history. Once it grows past capacity the oldest samples are dropped
/// down to the retain count.
#[derive(Debug, Clone)]
pub struct StatsHistory {
    samples: VecDeque<StatsSample>,
    capacity: usize,
    retain: usize,
}

impl Default for StatsHistory {
    fn default() -> Self {
        Self::new(STATS_HISTORY_CAPACITY, STATS_HISTORY_RETAIN)
    }
}

impl StatsHistory {
    #[must_use]
    pub fn from_config(config: &FishtankConfig) -> Self {
        Self::new(config.stats_history_capacity, config.stats_history_retain)
    }

    #[must_use]
    pub fn new(capacity: usize, retain: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            retain: retain.clamp(1, capacity),
        }
    }

    pub fn push(&mut self, sample: StatsSample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            let excess = self.samples.len() - self.retain;
            self.samples.drain(..excess);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&StatsSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatsSample> {
        self.samples.iter()
    }
}

/// Receives one sample per simulated second.
pub trait StatsSink: Send {
    fn on_sample(&mut self, sample: &StatsSample);
}

/// Discards samples.
#[derive(Debug, Default)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn on_sample(&mut self, _sample: &StatsSample) {}
}

impl StatsSink for StatsHistory {
    fn on_sample(&mut self, sample: &StatsSample) {
        self.push(*sample);
    }
}

/// Notified when a fish reaches a generation no fish has reached before.
pub trait GenerationRecordSink: Send {
    fn on_new_generation_record(&mut self, generation: Generation, genome: &Genome);
}

/// Logs each new record.
#[derive(Debug, Default)]
pub struct LogGenerationRecord;

impl GenerationRecordSink for LogGenerationRecord {
    fn on_new_generation_record(&mut self, generation: Generation, genome: &Genome) {
        info!(
            generation = generation.0,
            weights = genome.len(),
            "new generation record"
        );
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FishSnapshot {
    pub id: FishId,
    pub position: Vec2,
    pub heading: f64,
    pub health: f64,
    pub generation: Generation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FoodSnapshot {
    pub position: Vec2,
    pub magnitude: f64,
}

/// Read-only copy of the world taken between steps, enough to draw a frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    pub tick: Tick,
    pub time: f64,
    pub fish: Vec<FishSnapshot>,
    pub food: Vec<FoodSnapshot>,
}

impl WorldSnapshot {
    #[must_use]
    pub fn capture(tick: Tick, time: f64, fish: &[Fish], food: &[Food]) -> Self {
        Self {
            tick,
            time,
            fish: fish
                .iter()
                .map(|f| FishSnapshot {
                    id: f.id(),
                    position: f.position,
                    heading: f.heading,
                    health: f.health,
                    generation: f.generation,
                })
                .collect(),
            food: food
                .iter()
                .map(|item| FoodSnapshot {
                    position: item.position,
                    magnitude: item.magnitude,
                })
                .collect(),
        }
    }
}
