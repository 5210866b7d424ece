//! Headless runner plumbing: configuration loading, statistics logging, and run reports.

use std::fs::{self, File};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use fishtank_core::{
    FishtankConfig, Generation, LogGenerationRecord, StatsHistory, StatsSample, StatsSink, World,
};
use serde::Serialize;
use tracing::{info, warn};

/// Load a JSON configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<FishtankConfig> {
    let Some(path) = path else {
        return Ok(FishtankConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: FishtankConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Command-line values that override the loaded configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    pub step_timeout_ms: Option<u64>,
}

impl Overrides {
    pub fn apply(self, config: &mut FishtankConfig) {
        if let Some(seed) = self.seed {
            config.rng_seed = Some(seed);
        }
        if let Some(workers) = self.workers {
            config.worker_count = Some(workers);
        }
        if let Some(timeout) = self.step_timeout_ms {
            config.step_timeout_ms = timeout;
        }
    }
}

/// Statistics sink that logs each sample and keeps a shared rolling history.
#[derive(Debug, Clone)]
pub struct LoggingStats {
    history: Arc<Mutex<StatsHistory>>,
}

impl LoggingStats {
    #[must_use]
    pub fn new(history: StatsHistory) -> Self {
        Self {
            history: Arc::new(Mutex::new(history)),
        }
    }

    /// Copy of the samples collected so far.
    #[must_use]
    pub fn samples(&self) -> Vec<StatsSample> {
        match self.history.lock() {
            Ok(history) => history.iter().copied().collect(),
            Err(poisoned) => poisoned.into_inner().iter().copied().collect(),
        }
    }
}

impl StatsSink for LoggingStats {
    fn on_sample(&mut self, sample: &StatsSample) {
        info!(
            time = sample.time,
            population = sample.population,
            food = sample.food,
            mean_speed = sample.mean_speed,
            "stats"
        );
        match self.history.lock() {
            Ok(mut history) => history.push(*sample),
            Err(poisoned) => poisoned.into_inner().push(*sample),
        }
    }
}

/// Summary of a headless run, serializable to JSON.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub steps: u64,
    pub simulated_seconds: f64,
    pub population: usize,
    pub food: usize,
    pub births: usize,
    pub deaths: usize,
    pub food_eaten: usize,
    pub generation_record: Generation,
    /// Steps in which at least one worker missed the deadline.
    pub degraded_steps: u64,
    pub stats: Vec<StatsSample>,
}

impl RunReport {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize run report")?;
        Ok(())
    }
}

/// Build a world from `config` and advance it `steps` times.
pub fn run(config: FishtankConfig, steps: u64) -> Result<RunReport> {
    let stats = LoggingStats::new(StatsHistory::from_config(&config));
    let mut world = World::with_sinks(
        config,
        Box::new(stats.clone()),
        Box::new(LogGenerationRecord),
    )?;
    info!(
        fish = world.fish().len(),
        food = world.food().len(),
        workers = world.worker_load().len(),
        steps,
        "starting fishtank run"
    );

    let mut report = RunReport::default();
    for _ in 0..steps {
        let step = world.step();
        report.births += step.births;
        report.deaths += step.deaths;
        report.food_eaten += step.food_eaten;
        if !step.timed_out_workers.is_empty() {
            report.degraded_steps += 1;
            warn!(
                tick = step.tick.0,
                workers = ?step.timed_out_workers,
                "step completed without every worker"
            );
        }
    }

    report.steps = world.tick().0;
    report.simulated_seconds = world.time();
    report.population = world.fish().len();
    report.food = world.food().len();
    report.generation_record = world.generation_record();
    report.stats = stats.samples();
    info!(
        population = report.population,
        food = report.food,
        generation = report.generation_record.0,
        "run finished"
    );
    Ok(report)
}
