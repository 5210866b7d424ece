//! World state and the fixed-step simulation loop.

mod phases;

use rand::{Rng, rngs::SmallRng};
use std::f64::consts::TAU;
use thiserror::Error;
use tracing::debug;

use crate::Tick;
use crate::config::{ConfigError, FishtankConfig};
use crate::entity::{Fish, FishBody, FishId, Food, Generation};
use crate::genome::{Genome, GenomeError};
use crate::math::Vec2;
use crate::stats::{
    GenerationRecordSink, LogGenerationRecord, NullStats, StatsSample, StatsSink, WorldSnapshot,
};
use crate::workers::{WorkerError, WorkerPool};

/// Forward speed of randomly seeded fish.
const INITIAL_VELOCITY: f64 = 0.1;
/// Turning rate of randomly seeded fish.
const INITIAL_ANGULAR_VELOCITY: f64 = 1.0;

/// Errors raised while building a world.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// What happened during one call to [`World::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub tick: Tick,
    /// Random fish added because the population was below the floor.
    pub spawned: usize,
    pub births: usize,
    pub deaths: usize,
    pub food_eaten: usize,
    pub food_regenerated: bool,
    /// Workers that missed the step deadline; their fish kept last step's actions.
    pub timed_out_workers: Vec<usize>,
    /// Fish whose output was unavailable this step.
    pub missing_outputs: usize,
    /// Set when a fish reached a generation never seen before.
    pub generation_record: Option<Generation>,
    /// Emitted once per simulated second.
    pub stats: Option<StatsSample>,
}

/// The simulation. Owns fish, food, RNG, and the worker pool.
pub struct World {
    config: FishtankConfig,
    rng: SmallRng,
    fish: Vec<Fish>,
    food: Vec<Food>,
    pool: WorkerPool,
    next_id: u64,
    tick: Tick,
    time: f64,
    generation_record: Generation,
    stats_second: u64,
    stats_sink: Box<dyn StatsSink>,
    record_sink: Box<dyn GenerationRecordSink>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("time", &self.time)
            .field("fish", &self.fish.len())
            .field("food", &self.food.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl World {
    /// Build a world with the default collaborators: no statistics sink and a logging
    /// generation-record sink.
    pub fn new(config: FishtankConfig) -> Result<Self, WorldError> {
        Self::with_sinks(config, Box::new(NullStats), Box::new(LogGenerationRecord))
    }

    /// Build a world and seed the initial fish and food from `config`.
    pub fn with_sinks(
        config: FishtankConfig,
        stats_sink: Box<dyn StatsSink>,
        record_sink: Box<dyn GenerationRecordSink>,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let pool = WorkerPool::new(config.resolved_worker_count(), config.step_timeout())?;
        let rng = config.seeded_rng();
        let mut world = Self {
            config,
            rng,
            fish: Vec::new(),
            food: Vec::new(),
            pool,
            next_id: 1,
            tick: Tick::zero(),
            time: 0.0,
            generation_record: Generation::default(),
            stats_second: 0,
            stats_sink,
            record_sink,
        };
        for _ in 0..world.config.initial_fish_count {
            world.spawn_random_fish()?;
        }
        for _ in 0..world.config.initial_food_count {
            world.add_random_food();
        }
        debug!(
            fish = world.fish.len(),
            food = world.food.len(),
            workers = world.pool.worker_count(),
            "world seeded"
        );
        Ok(world)
    }

    /// Advance the simulation by one fixed `dt`.
    pub fn step(&mut self) -> StepReport {
        self.tick = self.tick.next();
        let mut report = StepReport {
            tick: self.tick,
            ..StepReport::default()
        };

        report.spawned = self.stage_auto_spawn();
        self.stage_physics();
        let outcome = self.stage_inference();
        report.timed_out_workers = outcome.timed_out;
        report.timed_out_workers.extend(outcome.failed);
        report.missing_outputs = outcome.missing.len();

        let lifecycle = self.stage_lifecycle();
        report.births = lifecycle.births;
        report.deaths = lifecycle.deaths;
        report.food_eaten = lifecycle.food_eaten;
        self.stage_remove_eaten_food();
        report.generation_record = self.stage_generation_record(lifecycle.leader);

        report.food_regenerated = self.stage_food_regeneration();
        self.time += self.config.dt;
        report.stats = self.stage_stats();
        report
    }

    /// Add a fish with the given body and genome. The position is wrapped onto the torus.
    pub fn spawn_fish(&mut self, body: FishBody, genome: Genome) -> Result<FishId, GenomeError> {
        let body = FishBody {
            position: body.position.wrapped(),
            ..body
        };
        self.insert_fish(body, genome)
    }

    /// Add a fish with a random body and genome.
    pub fn spawn_random_fish(&mut self) -> Result<FishId, GenomeError> {
        let body = FishBody {
            position: self.random_position(),
            velocity: INITIAL_VELOCITY,
            heading: self.rng.random_range(0.0..TAU),
            angular_velocity: INITIAL_ANGULAR_VELOCITY,
            ..FishBody::default()
        };
        let genome = Genome::random(&self.config.network, &mut self.rng);
        self.insert_fish(body, genome)
    }

    /// Place a food item with the configured pickup radius.
    pub fn add_food(&mut self, position: Vec2, magnitude: f64) {
        self.food.push(Food::new(
            position.wrapped(),
            self.config.food_pickup_radius,
            magnitude,
        ));
    }

    pub fn add_random_food(&mut self) {
        let position = self.random_position();
        self.add_food(position, self.config.food_magnitude);
    }

    /// Replace the configuration between steps. The network layout of a live world is fixed.
    pub fn update_config(&mut self, config: FishtankConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.network != self.config.network {
            return Err(ConfigError::Invalid(
                "network layout cannot change while fish are alive",
            ));
        }
        self.pool.set_timeout(config.step_timeout());
        self.config = config;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &FishtankConfig {
        &self.config
    }

    #[must_use]
    pub fn fish(&self) -> &[Fish] {
        &self.fish
    }

    #[must_use]
    pub fn fish_by_id(&self, id: FishId) -> Option<&Fish> {
        self.fish.iter().find(|fish| fish.id() == id)
    }

    /// Mutable access to one fish between steps.
    pub fn fish_mut(&mut self, id: FishId) -> Option<&mut Fish> {
        self.fish.iter_mut().find(|fish| fish.id() == id)
    }

    #[must_use]
    pub fn food(&self) -> &[Food] {
        &self.food
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Highest generation any fish has reached so far.
    #[must_use]
    pub const fn generation_record(&self) -> Generation {
        self.generation_record
    }

    /// Fish held by each worker.
    #[must_use]
    pub fn worker_load(&self) -> Vec<usize> {
        self.pool.load()
    }

    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.tick, self.time, &self.fish, &self.food)
    }

    fn random_position(&mut self) -> Vec2 {
        Vec2::new(self.rng.random::<f64>(), self.rng.random::<f64>())
    }

    fn insert_fish(&mut self, body: FishBody, genome: Genome) -> Result<FishId, GenomeError> {
        let id = FishId(self.next_id);
        let fish = Fish::new(id, body, genome, &self.config.network)?;
        self.next_id += 1;
        self.pool.assign(&fish, self.config.network.usable_output_offset);
        self.fish.push(fish);
        Ok(id)
    }
}
