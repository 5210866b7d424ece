//! Core simulation for the fishtank workspace: neural-network controlled fish that feed,
//! reproduce, and die on a toroidal unit square.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod entity;
pub mod genome;
pub mod math;
pub mod network;
pub mod perception;
pub mod stats;
pub mod workers;
pub mod world;

pub use config::{ConfigError, FishtankConfig, MutationSettings, NetworkLayout};
pub use entity::{Fish, FishBody, FishId, Food, Generation, NearbyFood};
pub use genome::{Genome, GenomeError};
pub use math::Vec2;
pub use network::Network;
pub use stats::{
    GenerationRecordSink, LogGenerationRecord, NullStats, StatsHistory, StatsSample, StatsSink,
    WorldSnapshot,
};
pub use workers::{DispatchOutcome, WorkerError, WorkerPool};
pub use world::{StepReport, World, WorldError};

/// Monotonic simulation step counter.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}
